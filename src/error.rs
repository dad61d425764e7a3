//! Error types.
//!
//! Grab failures are expected gameplay conditions. They are reported as
//! values, logged, and folded into the boolean result of
//! [`try_grab`](crate::lifecycle::try_grab); none of them panic.

use bevy::prelude::*;
use thiserror::Error;

use crate::weight::WeightClass;

/// Why a grab could not be started or had to end.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrabError {
    #[error("entity {0} has no grab controller")]
    MissingController(Entity),
    #[error("a grab session is already active")]
    AlreadyHolding,
    #[error("no valid viewpoint to cast from")]
    NoViewpoint,
    #[error("look ray hit no body within reach")]
    NoTarget,
    #[error("body {0} is not grabbable")]
    NotGrabbable(Entity),
    #[error("body {body} is {class:?} and cannot be grabbed")]
    Immovable { body: Entity, class: WeightClass },
    #[error("held body {0} no longer exists")]
    StaleReference(Entity),
    #[error("could not create grab constraint for {body}: {reason}")]
    ConstraintCreation { body: Entity, reason: String },
}

impl GrabError {
    /// Whether this error means the player simply pointed at nothing useful.
    pub fn is_invalid_target(&self) -> bool {
        matches!(
            self,
            GrabError::NoTarget | GrabError::NotGrabbable(_) | GrabError::Immovable { .. }
        )
    }
}

/// Invalid [`GrabConfig`](crate::config::GrabConfig) values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grab distance range is empty: min {min} > max {max}")]
    EmptyDistanceRange { min: f32, max: f32 },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
}
