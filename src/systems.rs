//! Core controller systems.
//!
//! These systems drive the grab controller once per physics step. They are
//! generic over the physics backend to allow different physics engines to
//! be used.

use bevy::prelude::*;

use crate::anchor::{billboard, to_world, AnchorTracker};
use crate::backend::GrabPhysicsBackend;
use crate::config::GrabConfig;
use crate::distance::HoldDistance;
use crate::hold::{
    anchor_speed, body_size, distributed_force, drag_force, gravity_compensation, is_stuck, orientation_correction,
    step_anchor, BodyMotion, OrientationCorrection,
};
use crate::intent::{GrabEdge, GrabIntent};
use crate::lifecycle::{advance_session, check_held_body, end_grab, release, try_grab, GrabController, ReleaseReason};
use crate::state::{Held, Holding};

fn controllers(world: &mut World) -> Vec<Entity> {
    world
        .query_filtered::<Entity, With<GrabController>>()
        .iter(world)
        .collect()
}

/// Tear down sessions whose held body was despawned.
pub fn check_held_bodies<B: GrabPhysicsBackend>(world: &mut World) {
    for controller in controllers(world) {
        check_held_body::<B>(world, controller);
    }
}

/// Advance the stabilize / engage / ramp sequence of every session.
pub fn advance_grab_sessions<B: GrabPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);
    for controller in controllers(world) {
        advance_session::<B>(world, controller, dt);
    }
}

/// Turn grab button edges into grab and release requests.
pub fn process_grab_input<B: GrabPhysicsBackend>(world: &mut World) {
    for controller in controllers(world) {
        let Some(edge) = world
            .get_mut::<GrabIntent>(controller)
            .map(|mut intent| intent.take_edge())
        else {
            continue;
        };

        match edge {
            GrabEdge::Pressed => {
                try_grab::<B>(world, controller);
            }
            GrabEdge::Released => release::<B>(world, controller),
            GrabEdge::Held | GrabEdge::Idle => {}
        }
    }
}

/// Apply accumulated scroll to the hold distance.
///
/// A distance change repositions the anchor immediately, stops the held
/// body and damps its spin. Scroll while nothing is held is discarded.
pub fn apply_scroll_input<B: GrabPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    for controller in controllers(world) {
        let Some(delta) = world
            .get_mut::<GrabIntent>(controller)
            .map(|mut intent| intent.take_scroll())
        else {
            continue;
        };
        let Some(config) = world.get::<GrabConfig>(controller).copied() else {
            continue;
        };
        let Some(mut distance) = world.get::<HoldDistance>(controller).copied() else {
            continue;
        };
        distance.tick(dt, &config);

        let held = world
            .get::<GrabController>(controller)
            .and_then(GrabController::session)
            .map(|session| (session.body, session.tuning));

        if let Some((body, tuning)) = held {
            if let Some(current) = distance.apply_scroll(delta, &tuning, &config) {
                let viewpoint = world.get::<GrabIntent>(controller).and_then(|intent| intent.viewpoint);
                if let Some(viewpoint) = viewpoint {
                    let desired = viewpoint.point_at(current);
                    if let Some(mut grab) = world.get_mut::<GrabController>(controller) {
                        if let Some(session) = grab.session.as_mut() {
                            session.desired_position = desired;
                        }
                    }
                    let pose = world.get_mut::<AnchorTracker>(controller).map(|mut tracker| {
                        tracker.position = desired;
                        (tracker.anchor, tracker.rotation)
                    });
                    if let Some((Some(anchor), rotation)) = pose {
                        B::set_anchor_pose(world, anchor, desired, rotation);
                    }
                }

                B::set_velocity(world, body, Vec3::ZERO);
                let spin = B::get_angular_velocity(world, body);
                B::set_angular_velocity(world, body, spin * config.scroll_angular_damping);
            }
        }

        if let Some(mut stored) = world.get_mut::<HoldDistance>(controller) {
            *stored = distance;
        }
    }
}

/// Scan for surfaces or follow the held body, depending on anchor mode.
///
/// While scanning the anchor is spawned lazily on the first hit and hidden
/// on a miss. While locked only the grip point and facing are updated; the
/// hold controller moves the anchor itself.
pub fn update_anchor_tracking<B: GrabPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    for controller in controllers(world) {
        let Some(config) = world.get::<GrabConfig>(controller).copied() else {
            continue;
        };
        let Some(mut tracker) = world.get::<AnchorTracker>(controller).cloned() else {
            continue;
        };
        let viewpoint = world.get::<GrabIntent>(controller).and_then(|intent| intent.viewpoint);
        let held = world
            .get::<GrabController>(controller)
            .and_then(GrabController::session)
            .map(|session| (session.body, session.local_anchor));

        match held {
            Some((body, local_anchor)) => {
                let pose = B::get_transform(world, body);
                tracker.update_locked(pose.as_ref(), local_anchor, viewpoint.map(|v| v.position));
            }
            None => {
                if tracker.is_locked() {
                    tracker.unlock();
                }

                let mut exclude = vec![controller];
                exclude.extend(tracker.anchor);
                let hit = viewpoint.and_then(|v| {
                    B::raycast(world, v.position, v.forward, config.max_track_distance, &exclude)
                });

                let was_active = tracker.active;
                tracker.update_scanning(hit.as_ref(), config.surface_offset, config.anchor_move_speed, dt);

                if tracker.active && tracker.anchor.is_none() {
                    tracker.anchor = Some(B::spawn_anchor(world));
                }
                if let Some(anchor) = tracker.anchor {
                    if tracker.active {
                        B::set_anchor_pose(world, anchor, tracker.position, tracker.rotation);
                    }
                    if tracker.active != was_active {
                        B::set_anchor_active(world, anchor, tracker.active);
                    }
                }
            }
        }

        if let Some(mut stored) = world.get_mut::<AnchorTracker>(controller) {
            *stored = tracker;
        }
    }
}

/// Move the anchor and steer the held body toward the hold point.
///
/// Runs for engaged sessions only. The force acts at the center of mass and
/// orientation is controlled separately by a soft torque spring.
pub fn apply_hold_forces<B: GrabPhysicsBackend>(world: &mut World) {
    let dt = B::get_fixed_timestep(world);

    let controllers: Vec<(Entity, GrabConfig, HoldDistance)> = world
        .query::<(Entity, &GrabController, &GrabConfig, &HoldDistance)>()
        .iter(world)
        .filter(|(_, grab, _, _)| grab.session().is_some_and(|s| s.is_holding()))
        .map(|(e, _, config, distance)| (e, *config, *distance))
        .collect();

    for (controller, config, distance) in controllers {
        let Some(mut session) = world
            .get::<GrabController>(controller)
            .and_then(|grab| grab.session.clone())
        else {
            continue;
        };
        let Some(mut tracker) = world.get::<AnchorTracker>(controller).cloned() else {
            continue;
        };
        let body = session.body;
        let Some(pose) = B::get_transform(world, body) else {
            continue;
        };
        let viewpoint = world.get::<GrabIntent>(controller).and_then(|intent| intent.viewpoint);

        // Anchor. Without a viewpoint the last target is kept.
        if let Some(viewpoint) = viewpoint {
            session.desired_position = viewpoint.point_at(distance.current);
        }
        let snap = distance.is_scrolling();
        tracker.position = step_anchor(
            tracker.position,
            session.desired_position,
            anchor_speed(&config, &session.tuning),
            dt,
            snap,
        );
        if let Some(viewpoint) = viewpoint {
            tracker.rotation = billboard(tracker.position, viewpoint.position, tracker.rotation);
        }
        if let Some(anchor) = tracker.anchor {
            B::set_anchor_pose(world, anchor, tracker.position, tracker.rotation);
        }

        let mut velocity = B::get_velocity(world, body);
        if snap {
            B::set_velocity(world, body, Vec3::ZERO);
            velocity = Vec3::ZERO;
        }

        // Translation
        let grip_point = to_world(&pose, session.local_anchor);
        tracker.grip_point = grip_point;
        let mass = session.held_mass;
        if let Some(force) = distributed_force(grip_point, session.desired_position, mass, &session.tuning, &config) {
            B::apply_force(world, body, force);
        }
        if let Some(force) = drag_force(velocity, mass, &session.tuning, &config) {
            B::apply_force(world, body, force);
        }
        if let Some(force) = gravity_compensation(mass, &session.tuning, &config) {
            B::apply_force(world, body, force);
        }

        // Orientation
        let motion = BodyMotion {
            rotation: pose.rotation,
            size: body_size(pose.scale, B::get_half_extents(world, body)),
            velocity,
            acceleration: if dt > 0.0 {
                (velocity - session.previous_velocity) / dt
            } else {
                Vec3::ZERO
            },
            angular_velocity: B::get_angular_velocity(world, body),
            mass,
        };
        session.previous_velocity = velocity;

        match orientation_correction(&motion, session.original_rotation, &session.tuning, &config, dt) {
            OrientationCorrection::None => {}
            OrientationCorrection::Snap {
                rotation,
                angular_velocity,
            } => {
                B::set_rotation(world, body, rotation);
                B::set_angular_velocity(world, body, angular_velocity);
            }
            OrientationCorrection::Torque(torque) => B::apply_torque(world, body, torque),
        }

        // Wedged bodies
        let gap = grip_point.distance(tracker.position);
        if is_stuck(gap, session.previous_gap, snap, &config, dt) {
            session.stuck_ticks += 1;
        } else {
            session.stuck_ticks = 0;
        }
        session.previous_gap = gap;
        let broken = config.break_ticks > 0 && session.stuck_ticks >= config.break_ticks;

        if let Some(mut stored) = world.get_mut::<AnchorTracker>(controller) {
            *stored = tracker;
        }
        if let Some(mut grab) = world.get_mut::<GrabController>(controller) {
            grab.session = Some(session);
        }

        if broken {
            end_grab::<B>(world, controller, ReleaseReason::Broken);
        }
    }
}

/// Sync the [`Holding`] and [`Held`] markers with controller state.
pub fn sync_state_markers(
    mut commands: Commands,
    q_controllers: Query<(Entity, &GrabController, Option<&Holding>)>,
    q_held: Query<(Entity, &Held)>,
) {
    for (entity, grab, holding) in &q_controllers {
        match (grab.held_body(), holding) {
            (Some(body), Some(marker)) if marker.body == body => {}
            (Some(body), _) => {
                commands.entity(entity).insert(Holding { body });
                if let Ok(mut held) = commands.get_entity(body) {
                    held.insert(Held { by: entity });
                }
            }
            (None, Some(_)) => {
                commands.entity(entity).remove::<Holding>();
            }
            (None, None) => {}
        }
    }

    for (body, held) in &q_held {
        let still_held = q_controllers
            .get(held.by)
            .ok()
            .and_then(|(_, grab, _)| grab.held_body())
            == Some(body);
        if !still_held {
            commands.entity(body).remove::<Held>();
        }
    }
}
