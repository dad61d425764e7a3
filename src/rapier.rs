//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature (on by default).
//!
//! Colliders are expected on the rigid body entity itself: ray hits report
//! the collider entity, and that is the body the controller grabs.

use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::backend::{BodyProperties, GrabPhysicsBackend, SpringParams};
use crate::collision::RayHit;
use crate::error::GrabError;

/// Rapier3D physics backend for the grab controller.
///
/// Body state maps onto Rapier components: mass onto
/// [`ColliderMassProperties`], drag onto [`Damping`], gravity onto
/// [`GravityScale`]. While a body is held its original mass components are
/// kept in a [`GrabMassSnapshot`] and put back on release. The grab constraint is a spring [`ImpulseJoint`] that
/// lives on the anchor entity, so the constraint handle is the anchor.
pub struct Rapier3dBackend;

impl GrabPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn is_alive(world: &World, body: Entity) -> bool {
        world.get::<RigidBody>(body).is_some()
    }

    fn raycast(
        world: &mut World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: &[Entity],
    ) -> Option<RayHit> {
        let mut state = SystemState::<ReadRapierContext>::new(world);
        let read = state.get(world);
        let context = read.single().ok()?;

        let predicate = |entity: Entity| !exclude.contains(&entity);
        let filter = QueryFilter::default().exclude_sensors().predicate(&predicate);

        context
            .cast_ray_and_get_normal(origin, direction, max_distance, true, filter)
            .map(|(entity, hit)| RayHit::new(hit.time_of_impact, hit.normal, hit.point, Some(entity)))
    }

    fn get_transform(world: &World, body: Entity) -> Option<Transform> {
        world.get::<Transform>(body).copied().or_else(|| {
            world
                .get::<GlobalTransform>(body)
                .map(|t| t.compute_transform())
        })
    }

    fn set_rotation(world: &mut World, body: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(body) {
            transform.rotation = rotation;
        }
    }

    fn get_velocity(world: &World, body: Entity) -> Vec3 {
        world
            .get::<Velocity>(body)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, body: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(body) {
            vel.linvel = velocity;
        }
    }

    fn get_angular_velocity(world: &World, body: Entity) -> Vec3 {
        world
            .get::<Velocity>(body)
            .map(|v| v.angvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_angular_velocity(world: &mut World, body: Entity, angular_velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(body) {
            vel.angvel = angular_velocity;
        }
    }

    fn get_half_extents(world: &World, body: Entity) -> Option<Vec3> {
        let half = world.get::<Collider>(body)?.raw.compute_local_aabb().half_extents();
        Some(Vec3::new(half.x, half.y, half.z))
    }

    fn get_properties(world: &World, body: Entity) -> Option<BodyProperties> {
        if world.get::<RigidBody>(body) != Some(&RigidBody::Dynamic) {
            return None;
        }

        let mass = body_mass(world, body).unwrap_or(BodyProperties::default().mass);
        let damping = world.get::<Damping>(body).copied().unwrap_or_default();
        let gravity_scale = world.get::<GravityScale>(body).map(|g| g.0).unwrap_or(1.0);

        Some(BodyProperties {
            mass,
            linear_drag: damping.linear_damping,
            angular_drag: damping.angular_damping,
            gravity_scale,
        })
    }

    fn set_properties(world: &mut World, body: Entity, properties: BodyProperties) {
        let Ok(mut entity) = world.get_entity_mut(body) else {
            return;
        };
        // The first write of a grab remembers where the mass came from.
        if !entity.contains::<GrabMassSnapshot>() {
            let snapshot = GrabMassSnapshot {
                collider: entity.get::<ColliderMassProperties>().cloned(),
                additional: entity.get::<AdditionalMassProperties>().cloned(),
            };
            entity.insert(snapshot);
        }
        entity.remove::<AdditionalMassProperties>();
        entity.insert((
            ColliderMassProperties::Mass(properties.mass),
            Damping {
                linear_damping: properties.linear_drag,
                angular_damping: properties.angular_drag,
            },
            GravityScale(properties.gravity_scale),
        ));
    }

    fn restore_properties(world: &mut World, body: Entity, original: BodyProperties) {
        let Ok(mut entity) = world.get_entity_mut(body) else {
            return;
        };
        entity.insert((
            Damping {
                linear_damping: original.linear_drag,
                angular_damping: original.angular_drag,
            },
            GravityScale(original.gravity_scale),
        ));

        let Some(snapshot) = entity.take::<GrabMassSnapshot>() else {
            entity.insert(ColliderMassProperties::Mass(original.mass));
            return;
        };
        match snapshot.collider {
            Some(collider) => {
                entity.insert(collider);
            }
            None => {
                entity.remove::<ColliderMassProperties>();
            }
        }
        if let Some(additional) = snapshot.additional {
            entity.insert(additional);
        }
    }

    fn apply_force(world: &mut World, body: Entity, force: Vec3) {
        // Accumulate into GrabForces instead of directly modifying ExternalForce.
        // Forces are written to ExternalForce at the end of the step by apply_grab_forces.
        accumulate(world, body, force, Vec3::ZERO);
    }

    fn apply_torque(world: &mut World, body: Entity, torque: Vec3) {
        accumulate(world, body, Vec3::ZERO, torque);
    }

    fn apply_impulse(world: &mut World, body: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(body) {
            ext_impulse.impulse += impulse;
        } else if let Ok(mut entity) = world.get_entity_mut(body) {
            entity.insert(ExternalImpulse {
                impulse,
                ..default()
            });
        }
    }

    fn clear_forces(world: &mut World, body: Entity) {
        let Some(forces) = world.get::<GrabForces>(body).copied() else {
            return;
        };
        if let Some(mut ext_force) = world.get_mut::<ExternalForce>(body) {
            ext_force.force -= forces.applied_force;
            ext_force.torque -= forces.applied_torque;
        }
        if let Ok(mut entity) = world.get_entity_mut(body) {
            entity.remove::<GrabForces>();
        }
    }

    fn spawn_anchor(world: &mut World) -> Entity {
        world
            .spawn((
                Name::new("Grab Anchor"),
                GrabAnchor,
                Transform::default(),
                RigidBody::KinematicPositionBased,
                GravityScale(0.0),
                RigidBodyDisabled,
            ))
            .id()
    }

    fn set_anchor_pose(world: &mut World, anchor: Entity, position: Vec3, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(anchor) {
            transform.translation = position;
            transform.rotation = rotation;
        }
    }

    fn set_anchor_active(world: &mut World, anchor: Entity, active: bool) {
        let Ok(mut entity) = world.get_entity_mut(anchor) else {
            return;
        };
        if active {
            entity.remove::<RigidBodyDisabled>();
        } else {
            entity.insert(RigidBodyDisabled);
        }
    }

    fn create_spring_constraint(
        world: &mut World,
        body: Entity,
        anchor: Entity,
        params: SpringParams,
    ) -> Result<Entity, GrabError> {
        let Some(scale) = Self::get_transform(world, body).map(|t| t.scale) else {
            return Err(GrabError::ConstraintCreation {
                body,
                reason: "body has no transform".into(),
            });
        };
        if !Self::is_alive(world, body) {
            return Err(GrabError::ConstraintCreation {
                body,
                reason: "body has no rigid body".into(),
            });
        }
        let Ok(mut entity) = world.get_entity_mut(anchor) else {
            return Err(GrabError::ConstraintCreation {
                body,
                reason: format!("anchor {anchor} does not exist"),
            });
        };

        entity.insert(ImpulseJoint::new(body, spring_joint(params, scale)));
        Ok(anchor)
    }

    fn set_constraint_params(world: &mut World, constraint: Entity, params: SpringParams) {
        let Some(body) = world.get::<ImpulseJoint>(constraint).map(|joint| joint.parent) else {
            return;
        };
        let scale = Self::get_transform(world, body)
            .map(|t| t.scale)
            .unwrap_or(Vec3::ONE);
        if let Some(mut joint) = world.get_mut::<ImpulseJoint>(constraint) {
            joint.data = spring_joint(params, scale).into();
        }
    }

    fn destroy_constraint(world: &mut World, constraint: Entity) {
        if let Ok(mut entity) = world.get_entity_mut(constraint) {
            entity.remove::<ImpulseJoint>();
        }
    }
}

/// Spring joint from the held body's attachment point to the anchor origin.
///
/// Rapier bodies are unscaled, so the attachment point is scaled back into
/// the body frame. The mass scale and the slack distance have no spring
/// joint counterpart; the spring rests at `min_distance`.
fn spring_joint(params: SpringParams, body_scale: Vec3) -> SpringJoint {
    SpringJointBuilder::new(params.min_distance, params.spring, params.damper)
        .local_anchor1(params.local_anchor * body_scale)
        .local_anchor2(Vec3::ZERO)
        .build()
}

/// Total mass of a body.
///
/// An explicit collider mass is taken as is. Otherwise Rapier's computed
/// mass is used once it exists; before the first step the mass is derived
/// from the collider shape. Additional mass is included either way.
fn body_mass(world: &World, body: Entity) -> Option<f32> {
    let additional = match world.get::<AdditionalMassProperties>(body) {
        Some(AdditionalMassProperties::Mass(mass)) => *mass,
        Some(AdditionalMassProperties::MassProperties(props)) => props.mass,
        None => 0.0,
    };
    let source = world.get::<ColliderMassProperties>(body).cloned().unwrap_or_default();

    let collider_mass = match source {
        ColliderMassProperties::Mass(mass) => return Some(mass + additional),
        ColliderMassProperties::MassProperties(props) => Some(props.mass),
        ColliderMassProperties::Density(density) => world
            .get::<Collider>(body)
            .map(|collider| collider.raw.mass_properties(density).mass()),
    };

    let computed = world
        .get::<ReadMassProperties>(body)
        .map(|props| props.get().mass)
        .filter(|&mass| mass > 0.0);
    computed.or(collider_mass.map(|mass| mass + additional))
}

fn accumulate(world: &mut World, body: Entity, force: Vec3, torque: Vec3) {
    if let Some(mut forces) = world.get_mut::<GrabForces>(body) {
        forces.force += force;
        forces.torque += torque;
        return;
    }
    let Ok(mut entity) = world.get_entity_mut(body) else {
        return;
    };
    if !entity.contains::<ExternalForce>() {
        entity.insert(ExternalForce::default());
    }
    entity.insert(GrabForces {
        force,
        torque,
        ..default()
    });
}

/// How a held body's mass was specified before the grab.
///
/// Written by the first [`Rapier3dBackend::set_properties`] of a grab and
/// consumed on restore, so a density-based body goes back to following its
/// collider and additional mass is not folded into the collider mass.
#[derive(Component, Debug, Clone)]
pub struct GrabMassSnapshot {
    /// The body's `ColliderMassProperties`, if it had one.
    pub collider: Option<ColliderMassProperties>,
    /// The body's `AdditionalMassProperties`, if it had one.
    pub additional: Option<AdditionalMassProperties>,
}

/// Marker on anchor bodies spawned by [`Rapier3dBackend`].
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct GrabAnchor;

/// Per-body accumulator of the forces the grab controller applies.
///
/// Forces are collected during the step and written to [`ExternalForce`]
/// once. What was written is remembered so the next step can take it back
/// out again, leaving forces from other sources untouched.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct GrabForces {
    /// Force accumulated this step.
    pub force: Vec3,
    /// Torque accumulated this step.
    pub torque: Vec3,
    /// Force written to `ExternalForce` last step.
    pub applied_force: Vec3,
    /// Torque written to `ExternalForce` last step.
    pub applied_torque: Vec3,
}

impl GrabForces {
    /// Start a new step; returns what must be subtracted from `ExternalForce`.
    pub fn prepare_new_frame(&mut self) -> (Vec3, Vec3) {
        let applied = (self.applied_force, self.applied_torque);
        *self = Self::default();
        applied
    }

    /// End the step; returns what must be added to `ExternalForce`.
    pub fn finalize_frame(&mut self) -> (Vec3, Vec3) {
        self.applied_force = self.force;
        self.applied_torque = self.torque;
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
        (self.applied_force, self.applied_torque)
    }
}

/// Plugin that sets up Rapier3D-specific systems for the grab controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::GrabSet;

        app.register_type::<GrabForces>();

        // Preparation - take last step's forces back out
        app.add_systems(FixedUpdate, clear_grab_forces.in_set(GrabSet::Preparation));

        // Final Application - write accumulated forces to physics
        app.add_systems(FixedUpdate, apply_grab_forces.in_set(GrabSet::FinalApplication));
    }
}

/// Clear grab forces at the start of each step.
///
/// Subtracts the forces applied last step from `ExternalForce`, restoring it
/// to the external-only state, and clears the accumulators.
pub fn clear_grab_forces(mut q: Query<(&mut ExternalForce, &mut GrabForces)>) {
    for (mut ext_force, mut forces) in &mut q {
        let (force_to_subtract, torque_to_subtract) = forces.prepare_new_frame();
        ext_force.force -= force_to_subtract;
        ext_force.torque -= torque_to_subtract;
    }
}

/// Apply accumulated grab forces at the end of each step.
pub fn apply_grab_forces(mut q: Query<(&mut ExternalForce, &mut GrabForces)>) {
    for (mut ext_force, mut forces) in &mut q {
        let (force_to_apply, torque_to_apply) = forces.finalize_frame();
        ext_force.force += force_to_apply;
        ext_force.torque += torque_to_apply;
    }
}

/// Bundle for a grabbable body with Rapier3D physics.
///
/// Provides every component the backend reads or writes: the rigid body,
/// velocity, external forces and impulses, damping, gravity scale and mass
/// properties. Add a [`Collider`] on the same entity.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_grab_controller::prelude::*;
///
/// fn spawn_crate(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, -3.0),
///         Rapier3dGrabbableBundle::new().with_mass(10.0),
///         Collider::cuboid(0.5, 0.5, 0.5),
///         Grabbable::default(),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `damping`: Linear 0.0, Angular 0.05
/// - `collider_mass`: Density 1.0 (mass computed by Rapier from the collider)
#[derive(Bundle)]
pub struct Rapier3dGrabbableBundle {
    /// The rigid body type. Must be [`RigidBody::Dynamic`] to be grabbed.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Updated by Rapier each physics step.
    pub velocity: Velocity,
    /// Forces written by the grab controller each step.
    pub external_force: ExternalForce,
    /// Impulses, used for the release drop.
    pub external_impulse: ExternalImpulse,
    /// Drag; raised while the body is held.
    pub damping: Damping,
    /// Gravity; disabled for lighter classes while held.
    pub gravity_scale: GravityScale,
    /// Mass source; replaced by an explicit mass while held and restored on release.
    pub collider_mass: ColliderMassProperties,
    /// Computed mass properties. Rapier updates this based on the collider.
    pub mass_properties: ReadMassProperties,
}

impl Default for Rapier3dGrabbableBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dGrabbableBundle {
    /// Create a dynamic grabbable body.
    pub fn new() -> Self {
        let defaults = BodyProperties::default();
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            damping: Damping {
                linear_damping: defaults.linear_drag,
                angular_damping: defaults.angular_drag,
            },
            gravity_scale: GravityScale(defaults.gravity_scale),
            collider_mass: ColliderMassProperties::Density(1.0),
            mass_properties: ReadMassProperties::default(),
        }
    }

    /// Set an explicit mass in kilograms.
    ///
    /// The mass decides the body's weight class unless a [`Grabbable`]
    /// descriptor overrides it.
    ///
    /// [`Grabbable`]: crate::grabbable::Grabbable
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.collider_mass = ColliderMassProperties::Mass(mass);
        self
    }

    /// Set the damping coefficients.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set the gravity scale.
    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = GravityScale(scale);
        self
    }
}
