//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement
//! to work with the grab controller. The controller never talks to a physics
//! engine directly: it reads and writes body state, casts rays and manages
//! its one spring constraint through these functions. This allows easy
//! swapping between physics engines (Rapier3D, Avian, custom, etc.).

use bevy::prelude::*;

use crate::collision::RayHit;
use crate::error::GrabError;

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with the grab
/// controller. For an example implementation, see the `rapier` module's
/// `Rapier3dBackend`.
///
/// Functions taking an entity must tolerate that entity being gone: getters
/// return a neutral value or `None`, setters do nothing.
pub trait GrabPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Whether `body` still exists as a simulated rigid body.
    fn is_alive(world: &World, body: Entity) -> bool;

    /// Cast a ray and return the closest hit.
    ///
    /// # Arguments
    /// * `world` - The ECS world
    /// * `origin` - Ray origin in world space
    /// * `direction` - Ray direction (normalized)
    /// * `max_distance` - Maximum cast distance
    /// * `exclude` - Bodies the ray passes through (the anchor, the player)
    fn raycast(
        world: &mut World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: &[Entity],
    ) -> Option<RayHit>;

    /// Get the world pose of a body.
    fn get_transform(world: &World, body: Entity) -> Option<Transform>;

    /// Half-extents of the body's collision shape in world units.
    ///
    /// Used to tell small bodies from large ones. `None` when the backend
    /// cannot size the body; the transform scale is used alone then.
    fn get_half_extents(_world: &World, _body: Entity) -> Option<Vec3> {
        None
    }

    /// Overwrite the rotation of a body.
    fn set_rotation(world: &mut World, body: Entity, rotation: Quat);

    /// Get the linear velocity of a body.
    fn get_velocity(world: &World, body: Entity) -> Vec3;

    /// Set the linear velocity of a body.
    fn set_velocity(world: &mut World, body: Entity, velocity: Vec3);

    /// Get the angular velocity of a body.
    fn get_angular_velocity(world: &World, body: Entity) -> Vec3;

    /// Set the angular velocity of a body.
    fn set_angular_velocity(world: &mut World, body: Entity, angular_velocity: Vec3);

    /// Read the properties a grab temporarily changes.
    fn get_properties(world: &World, body: Entity) -> Option<BodyProperties>;

    /// Write the properties a grab temporarily changes.
    fn set_properties(world: &mut World, body: Entity, properties: BodyProperties);

    /// Put back the properties read by [`get_properties`](Self::get_properties)
    /// before the grab.
    ///
    /// Backends that derive mass from other state (density, extra mass
    /// components) override this to restore that state instead of writing
    /// the plain number back.
    fn restore_properties(world: &mut World, body: Entity, original: BodyProperties) {
        Self::set_properties(world, body, original);
    }

    /// Apply a force at the center of mass for this physics step.
    fn apply_force(world: &mut World, body: Entity, force: Vec3);

    /// Apply a torque for this physics step.
    fn apply_torque(world: &mut World, body: Entity, torque: Vec3);

    /// Apply an instantaneous impulse at the center of mass.
    fn apply_impulse(world: &mut World, body: Entity, impulse: Vec3);

    /// Drop any per-step forces this controller still has queued on `body`.
    ///
    /// Called when a grab ends.
    fn clear_forces(_world: &mut World, _body: Entity) {}

    /// Spawn the kinematic, gravity-free anchor body. Starts inactive.
    fn spawn_anchor(world: &mut World) -> Entity;

    /// Move the anchor body.
    fn set_anchor_pose(world: &mut World, anchor: Entity, position: Vec3, rotation: Quat);

    /// Enable or disable the anchor's participation in the simulation.
    fn set_anchor_active(world: &mut World, anchor: Entity, active: bool);

    /// Create a spring constraint between `body` and `anchor`.
    ///
    /// Returns a handle that identifies the constraint for later updates.
    fn create_spring_constraint(
        world: &mut World,
        body: Entity,
        anchor: Entity,
        params: SpringParams,
    ) -> Result<Entity, GrabError>;

    /// Update the parameters of an existing constraint.
    fn set_constraint_params(world: &mut World, constraint: Entity, params: SpringParams);

    /// Remove a constraint created by [`create_spring_constraint`](Self::create_spring_constraint).
    fn destroy_constraint(world: &mut World, constraint: Entity);

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}

/// Body properties a grab changes and must restore exactly on release.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct BodyProperties {
    /// Mass in kilograms.
    pub mass: f32,
    /// Linear drag (damping) coefficient.
    pub linear_drag: f32,
    /// Angular drag (damping) coefficient.
    pub angular_drag: f32,
    /// Gravity scale; zero means the body ignores gravity.
    pub gravity_scale: f32,
}

impl Default for BodyProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            linear_drag: 0.0,
            angular_drag: 0.05,
            gravity_scale: 1.0,
        }
    }
}

impl BodyProperties {
    /// Whether the body is affected by gravity.
    #[inline]
    pub fn uses_gravity(&self) -> bool {
        self.gravity_scale != 0.0
    }

    /// Builder: set both drag coefficients.
    pub fn with_drag(mut self, linear: f32, angular: f32) -> Self {
        self.linear_drag = linear;
        self.angular_drag = angular;
        self
    }
}

/// Parameters of the spring constraint joining a held body to the anchor.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    /// Attachment point in the held body's local frame.
    pub local_anchor: Vec3,
    /// Separation below which the spring is slack.
    pub min_distance: f32,
    /// Separation beyond which the spring pulls.
    pub max_distance: f32,
    /// Spring stiffness.
    pub spring: f32,
    /// Damper coefficient.
    pub damper: f32,
    /// Mass-scale weighting of the constraint.
    pub mass_scale: f32,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            local_anchor: Vec3::ZERO,
            min_distance: 0.0,
            max_distance: 0.0,
            spring: 0.0,
            damper: 0.0,
            mass_scale: 1.0,
        }
    }
}
