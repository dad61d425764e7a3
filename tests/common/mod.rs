//! Shared test harness: an in-memory physics backend and app helpers.
//!
//! `MockBackend` keeps body state in plain components, casts rays against
//! spheres and integrates forces with a simple explicit Euler step, which
//! keeps every test deterministic and independent of a physics engine.

#![allow(dead_code)]

use bevy::prelude::*;
use msg_grab_controller::backend::{BodyProperties, GrabPhysicsBackend, SpringParams};
use msg_grab_controller::collision::RayHit;
use msg_grab_controller::error::GrabError;
use msg_grab_controller::prelude::*;

pub const DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBodyKind {
    Dynamic,
    Static,
}

/// Simulated rigid body.
#[derive(Component, Debug, Clone, Copy)]
pub struct MockBody {
    pub kind: MockBodyKind,
    pub props: BodyProperties,
    pub linvel: Vec3,
    pub angvel: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
    pub impulse: Vec3,
    /// Force integrated on the last step.
    pub last_force: Vec3,
    /// Torque integrated on the last step.
    pub last_torque: Vec3,
}

impl MockBody {
    pub fn dynamic(props: BodyProperties) -> Self {
        Self {
            kind: MockBodyKind::Dynamic,
            props,
            linvel: Vec3::ZERO,
            angvel: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            impulse: Vec3::ZERO,
            last_force: Vec3::ZERO,
            last_torque: Vec3::ZERO,
        }
    }

    pub fn fixed() -> Self {
        Self {
            kind: MockBodyKind::Static,
            ..Self::dynamic(BodyProperties::default())
        }
    }
}

/// Sphere collider for the mock raycast.
#[derive(Component, Debug, Clone, Copy)]
pub struct MockSphere {
    pub radius: f32,
}

/// Kinematic anchor body.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct MockAnchor {
    pub active: bool,
}

/// Spring constraint between a body and an anchor.
#[derive(Component, Debug, Clone, Copy)]
pub struct MockJoint {
    pub body: Entity,
    pub anchor: Entity,
    pub params: SpringParams,
}

/// Global knobs and counters of the mock engine.
#[derive(Resource, Debug, Default)]
pub struct MockPhysics {
    /// Refuse every constraint creation.
    pub fail_constraints: bool,
    pub constraints_created: u32,
}

pub struct MockBackend;

pub struct MockPhysicsPlugin;

impl Plugin for MockPhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MockPhysics>();
        app.add_systems(
            FixedUpdate,
            integrate_mock_bodies.in_set(GrabSet::FinalApplication),
        );
    }
}

/// Explicit Euler step. No engine gravity; joints are not simulated.
pub fn integrate_mock_bodies(mut q: Query<(&mut MockBody, &mut Transform)>) {
    for (mut body, mut transform) in &mut q {
        if body.kind != MockBodyKind::Dynamic {
            continue;
        }
        let mass = body.props.mass.max(1.0e-3);
        let impulse = std::mem::take(&mut body.impulse);
        let force = std::mem::take(&mut body.force);
        let torque = std::mem::take(&mut body.torque);
        body.last_force = force;
        body.last_torque = torque;

        let linear_damping = 1.0 / (1.0 + DT * body.props.linear_drag);
        let angular_damping = 1.0 / (1.0 + DT * body.props.angular_drag);
        body.linvel = (body.linvel + impulse / mass + force / mass * DT) * linear_damping;
        body.angvel = (body.angvel + torque / mass * DT) * angular_damping;

        transform.translation += body.linvel * DT;
        let angle = body.angvel.length() * DT;
        if angle > 0.0 {
            transform.rotation = Quat::from_axis_angle(body.angvel.normalize(), angle) * transform.rotation;
        }
    }
}

impl GrabPhysicsBackend for MockBackend {
    fn plugin() -> impl Plugin {
        MockPhysicsPlugin
    }

    fn is_alive(world: &World, body: Entity) -> bool {
        world.get::<MockBody>(body).is_some()
    }

    fn raycast(
        world: &mut World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: &[Entity],
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut q = world.query::<(Entity, &MockSphere, &Transform)>();
        for (entity, sphere, transform) in q.iter(world) {
            if exclude.contains(&entity) {
                continue;
            }
            let to_center = transform.translation - origin;
            let along = to_center.dot(direction);
            let closest_sq = to_center.length_squared() - along * along;
            let radius_sq = sphere.radius * sphere.radius;
            if closest_sq > radius_sq {
                continue;
            }
            let distance = along - (radius_sq - closest_sq).sqrt();
            if distance < 0.0 || distance > max_distance {
                continue;
            }
            if best.is_some_and(|hit| hit.distance <= distance) {
                continue;
            }
            let point = origin + direction * distance;
            let normal = (point - transform.translation).normalize_or_zero();
            best = Some(RayHit::new(distance, normal, point, Some(entity)));
        }
        best
    }

    fn get_transform(world: &World, body: Entity) -> Option<Transform> {
        world.get::<Transform>(body).copied()
    }

    fn get_half_extents(world: &World, body: Entity) -> Option<Vec3> {
        let sphere = world.get::<MockSphere>(body)?;
        let scale = world.get::<Transform>(body).map_or(1.0, |t| t.scale.max_element());
        Some(Vec3::splat(sphere.radius * scale))
    }

    fn set_rotation(world: &mut World, body: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(body) {
            transform.rotation = rotation;
        }
    }

    fn get_velocity(world: &World, body: Entity) -> Vec3 {
        world.get::<MockBody>(body).map(|b| b.linvel).unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, body: Entity, velocity: Vec3) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.linvel = velocity;
        }
    }

    fn get_angular_velocity(world: &World, body: Entity) -> Vec3 {
        world.get::<MockBody>(body).map(|b| b.angvel).unwrap_or(Vec3::ZERO)
    }

    fn set_angular_velocity(world: &mut World, body: Entity, angular_velocity: Vec3) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.angvel = angular_velocity;
        }
    }

    fn get_properties(world: &World, body: Entity) -> Option<BodyProperties> {
        world
            .get::<MockBody>(body)
            .filter(|b| b.kind == MockBodyKind::Dynamic)
            .map(|b| b.props)
    }

    fn set_properties(world: &mut World, body: Entity, properties: BodyProperties) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.props = properties;
        }
    }

    fn apply_force(world: &mut World, body: Entity, force: Vec3) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.force += force;
        }
    }

    fn apply_torque(world: &mut World, body: Entity, torque: Vec3) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.torque += torque;
        }
    }

    fn apply_impulse(world: &mut World, body: Entity, impulse: Vec3) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.impulse += impulse;
        }
    }

    fn clear_forces(world: &mut World, body: Entity) {
        if let Some(mut b) = world.get_mut::<MockBody>(body) {
            b.force = Vec3::ZERO;
            b.torque = Vec3::ZERO;
        }
    }

    fn spawn_anchor(world: &mut World) -> Entity {
        world.spawn((MockAnchor::default(), Transform::default())).id()
    }

    fn set_anchor_pose(world: &mut World, anchor: Entity, position: Vec3, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(anchor) {
            transform.translation = position;
            transform.rotation = rotation;
        }
    }

    fn set_anchor_active(world: &mut World, anchor: Entity, active: bool) {
        if let Some(mut a) = world.get_mut::<MockAnchor>(anchor) {
            a.active = active;
        }
    }

    fn create_spring_constraint(
        world: &mut World,
        body: Entity,
        anchor: Entity,
        params: SpringParams,
    ) -> Result<Entity, GrabError> {
        let fail = world
            .get_resource::<MockPhysics>()
            .is_some_and(|physics| physics.fail_constraints);
        if fail {
            return Err(GrabError::ConstraintCreation {
                body,
                reason: "mock engine refused".into(),
            });
        }
        if let Some(mut physics) = world.get_resource_mut::<MockPhysics>() {
            physics.constraints_created += 1;
        }
        Ok(world.spawn(MockJoint { body, anchor, params }).id())
    }

    fn set_constraint_params(world: &mut World, constraint: Entity, params: SpringParams) {
        if let Some(mut joint) = world.get_mut::<MockJoint>(constraint) {
            joint.params = params;
        }
    }

    fn destroy_constraint(world: &mut World, constraint: Entity) {
        if world.get::<MockJoint>(constraint).is_some() {
            world.despawn(constraint);
        }
    }
}

/// Every grab notification, in order.
#[derive(Resource, Debug, Default)]
pub struct GrabLog {
    pub started: Vec<GrabStarted>,
    pub released: Vec<GrabReleased>,
}

/// Create a minimal test app with the grab controller on the mock backend.
pub fn create_test_app() -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(GrabControllerPlugin::<MockBackend>::default());
    app.insert_resource(Time::<Fixed>::from_hz(60.0));
    app.init_resource::<GrabLog>();

    app.world_mut()
        .add_observer(|trigger: Trigger<GrabStarted>, mut log: ResMut<GrabLog>| {
            log.started.push(*trigger.event());
        });
    app.world_mut()
        .add_observer(|trigger: Trigger<GrabReleased>, mut log: ResMut<GrabLog>| {
            log.released.push(*trigger.event());
        });

    app.finish();
    app.cleanup();
    app
}

/// Run one physics step.
pub fn tick(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

/// Run N physics steps.
pub fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        tick(app);
    }
}

/// Spawn a player at `eye` looking along `forward`.
pub fn spawn_player(app: &mut App, eye: Vec3, forward: Vec3) -> Entity {
    let mut intent = GrabIntent::default();
    intent.set_viewpoint(eye, forward);
    app.world_mut().spawn((GrabController::new(), intent)).id()
}

/// Body properties of a plain dynamic body of `mass`.
pub fn props(mass: f32) -> BodyProperties {
    BodyProperties {
        mass,
        linear_drag: 0.3,
        angular_drag: 0.6,
        gravity_scale: 1.0,
    }
}

/// Spawn a dynamic sphere of radius 0.5.
pub fn spawn_body(app: &mut App, position: Vec3, mass: f32) -> Entity {
    spawn_sphere(app, position, props(mass), 0.5)
}

/// Spawn a dynamic sphere with explicit properties and radius.
pub fn spawn_sphere(app: &mut App, position: Vec3, props: BodyProperties, radius: f32) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            MockBody::dynamic(props),
            MockSphere { radius },
        ))
        .id()
}

pub fn set_grab(app: &mut App, player: Entity, pressed: bool) {
    if let Some(mut intent) = app.world_mut().get_mut::<GrabIntent>(player) {
        intent.set_grab_pressed(pressed);
    }
}

pub fn scroll(app: &mut App, player: Entity, delta: f32) {
    if let Some(mut intent) = app.world_mut().get_mut::<GrabIntent>(player) {
        intent.add_scroll(delta);
    }
}

pub fn look(app: &mut App, player: Entity, eye: Vec3, forward: Vec3) {
    if let Some(mut intent) = app.world_mut().get_mut::<GrabIntent>(player) {
        intent.set_viewpoint(eye, forward);
    }
}

pub fn state(app: &App, player: Entity) -> GrabState {
    app.world()
        .get::<GrabController>(player)
        .map(GrabController::state)
        .unwrap_or(GrabState::Idle)
}

pub fn body(app: &App, entity: Entity) -> MockBody {
    *app.world().get::<MockBody>(entity).unwrap()
}

pub fn tracker(app: &App, player: Entity) -> AnchorTracker {
    app.world().get::<AnchorTracker>(player).unwrap().clone()
}

pub fn joint_count(app: &mut App) -> usize {
    app.world_mut()
        .query::<&MockJoint>()
        .iter(app.world())
        .count()
}

/// Press grab and run until the constraint is engaged.
pub fn grab_and_engage(app: &mut App, player: Entity) {
    set_grab(app, player, true);
    for _ in 0..10 {
        tick(app);
        if state(app, player) == GrabState::Holding {
            return;
        }
    }
    panic!("grab never engaged, state {:?}", state(app, player));
}
