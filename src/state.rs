//! State marker components.
//!
//! These components mirror the grab state for query-based consumers. They are
//! added and removed by the controller systems every tick.

use bevy::prelude::*;

/// Marker on a controller entity while it holds a body.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_grab_controller::prelude::*;
///
/// fn held_body(holding: Option<&Holding>) -> Option<Entity> {
///     holding.map(|h| h.body)
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct Holding {
    /// The held body.
    pub body: Entity,
}

/// Marker on a body while a controller holds it.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct Held {
    /// The controller holding this body.
    pub by: Entity,
}
