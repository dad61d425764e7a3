//! Per-object grab descriptor.

use bevy::prelude::*;

use crate::weight::WeightClass;

/// Optional per-body override of grab behavior.
///
/// Bodies without this component are grabbable and classified purely from
/// their simulated mass. The descriptor is read once when a grab starts and
/// is not re-read during the grab.
///
/// # Example
///
/// ```rust
/// use msg_grab_controller::prelude::*;
///
/// // A crate that should always handle like a heavy object.
/// let descriptor = Grabbable::default().with_weight_class(WeightClass::Heavy);
/// assert!(descriptor.grabbable);
///
/// // Scenery that must never be picked up.
/// assert!(!Grabbable::locked().grabbable);
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct Grabbable {
    /// Whether the body may be grabbed at all.
    pub grabbable: bool,
    /// Forces a weight class regardless of mass.
    pub weight_class: Option<WeightClass>,
    /// Mass (kg) used for classification instead of the simulated mass.
    pub mass: Option<f32>,
    /// Multiplies the class spring multiplier.
    pub spring_scale: f32,
    /// Multiplies the class damper multiplier.
    pub damper_scale: f32,
}

impl Default for Grabbable {
    fn default() -> Self {
        Self {
            grabbable: true,
            weight_class: None,
            mass: None,
            spring_scale: 1.0,
            damper_scale: 1.0,
        }
    }
}

impl Grabbable {
    /// A descriptor that rejects every grab attempt.
    pub fn locked() -> Self {
        Self {
            grabbable: false,
            ..default()
        }
    }

    /// Builder: force a weight class.
    pub fn with_weight_class(mut self, class: WeightClass) -> Self {
        self.weight_class = Some(class);
        self
    }

    /// Builder: classify by this mass instead of the simulated one.
    pub fn with_mass(mut self, mass_kg: f32) -> Self {
        self.mass = Some(mass_kg);
        self
    }

    /// Builder: scale the constraint spring.
    pub fn with_spring_scale(mut self, scale: f32) -> Self {
        self.spring_scale = scale;
        self
    }

    /// Builder: scale the constraint damper.
    pub fn with_damper_scale(mut self, scale: f32) -> Self {
        self.damper_scale = scale;
        self
    }
}
