//! Grab lifecycle.
//!
//! `Idle -> Engaging -> Holding -> Releasing -> Idle`
//!
//! A successful [`try_grab`] snapshots the target's physical properties,
//! zeroes its velocity, raises its drag and reduces its mass (Engaging).
//! After the stabilization window the spring constraint to the anchor is
//! created at reduced strength and ramped up (Holding). [`release`] restores
//! the snapshot, removes the constraint and lets the body drop (Releasing is
//! transient and never observed between ticks).

use bevy::log::{debug, info, warn};
use bevy::prelude::*;

use crate::anchor::{billboard, surface_target, to_local, AnchorTracker};
use crate::backend::GrabPhysicsBackend;
use crate::config::GrabConfig;
use crate::distance::HoldDistance;
use crate::error::GrabError;
use crate::grabbable::Grabbable;
use crate::intent::GrabIntent;
use crate::session::{GrabSession, SessionStep};
use crate::weight::{resolve_for_object, WeightClass};

/// Grab controller attached to a player entity.
///
/// Owns at most one [`GrabSession`]. The required components hold its
/// configuration, input and the anchor / distance state.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
#[require(GrabConfig, GrabIntent, AnchorTracker, HoldDistance)]
pub struct GrabController {
    #[reflect(ignore)]
    pub(crate) session: Option<GrabSession>,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabState {
    Idle,
    Engaging,
    Holding,
}

impl GrabController {
    /// Create an idle controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GrabState {
        match &self.session {
            None => GrabState::Idle,
            Some(session) if session.is_holding() => GrabState::Holding,
            Some(_) => GrabState::Engaging,
        }
    }

    /// Whether a body is held (engaging or engaged).
    pub fn is_holding(&self) -> bool {
        self.session.is_some()
    }

    /// The held body, if any.
    pub fn held_body(&self) -> Option<Entity> {
        self.session.as_ref().map(|s| s.body)
    }

    /// Weight class of the held body, if any.
    pub fn weight_class(&self) -> Option<WeightClass> {
        self.session.as_ref().map(|s| s.weight_class)
    }

    /// Active session, if any.
    pub fn session(&self) -> Option<&GrabSession> {
        self.session.as_ref()
    }

    /// Number of spring constraints this controller currently owns (0 or 1).
    pub fn constraint_count(&self) -> usize {
        self.session
            .as_ref()
            .and_then(|s| s.constraint)
            .map_or(0, |_| 1)
    }
}

/// Why a grab ended.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// [`release`] was called or the grab button was let go.
    Requested,
    /// The held body disappeared; nothing was restored.
    BodyLost,
    /// The physics engine refused the constraint.
    ConstraintFailed,
    /// The body got wedged too far from the anchor.
    Broken,
}

/// Triggered on the controller entity when a grab starts.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct GrabStarted {
    pub controller: Entity,
    pub body: Entity,
    pub weight_class: WeightClass,
}

/// Triggered on the controller entity when a grab ends.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct GrabReleased {
    pub controller: Entity,
    pub body: Entity,
    pub reason: ReleaseReason,
}

/// Attempt to grab whatever the controller is looking at.
///
/// Returns `false` and changes nothing when there is no valid target, the
/// target is not grabbable or immovable, or a grab is already active.
pub fn try_grab<B: GrabPhysicsBackend>(world: &mut World, controller: Entity) -> bool {
    match start_grab::<B>(world, controller) {
        Ok(_) => true,
        Err(err) => {
            debug!("grab rejected for {controller}: {err}");
            false
        }
    }
}

/// Release the held body, if any. Safe to call at any time.
pub fn release<B: GrabPhysicsBackend>(world: &mut World, controller: Entity) {
    end_grab::<B>(world, controller, ReleaseReason::Requested);
}

/// Start a grab along the controller's look ray.
///
/// On success returns the grabbed body.
pub fn start_grab<B: GrabPhysicsBackend>(world: &mut World, controller: Entity) -> Result<Entity, GrabError> {
    let missing = GrabError::MissingController(controller);
    let grab = world.get::<GrabController>(controller).ok_or(missing.clone())?;
    if grab.is_holding() {
        return Err(GrabError::AlreadyHolding);
    }
    let config = *world.get::<GrabConfig>(controller).ok_or(missing.clone())?;
    let mut tracker = world.get::<AnchorTracker>(controller).cloned().ok_or(missing.clone())?;
    let mut distance = *world.get::<HoldDistance>(controller).ok_or(missing)?;
    let viewpoint = world
        .get::<GrabIntent>(controller)
        .and_then(|intent| intent.viewpoint)
        .ok_or(GrabError::NoViewpoint)?;

    // Target
    let mut exclude = vec![controller];
    exclude.extend(tracker.anchor);
    let hit = B::raycast(
        world,
        viewpoint.position,
        viewpoint.forward,
        config.max_grab_distance,
        &exclude,
    )
    .ok_or(GrabError::NoTarget)?;
    let body = hit.entity.ok_or(GrabError::NoTarget)?;

    let descriptor = world.get::<Grabbable>(body).copied();
    if descriptor.is_some_and(|d| !d.grabbable) {
        return Err(GrabError::NotGrabbable(body));
    }
    // Static or kinematic bodies expose no properties.
    let original = B::get_properties(world, body).ok_or(GrabError::NotGrabbable(body))?;
    let pose = B::get_transform(world, body).ok_or(GrabError::NotGrabbable(body))?;
    let (weight_class, tuning) = resolve_for_object(descriptor.as_ref(), original.mass);
    if !weight_class.is_grabbable() {
        return Err(GrabError::Immovable {
            body,
            class: weight_class,
        });
    }

    // Anchor and attachment point
    let anchor = match tracker.anchor {
        Some(anchor) => anchor,
        None => {
            let anchor = B::spawn_anchor(world);
            tracker.anchor = Some(anchor);
            anchor
        }
    };
    // The scanned anchor only marks the grip when it was scanning this body.
    let scanned_body = tracker.scan_hit.and_then(|scan| scan.entity);
    let grip_point = if tracker.active && scanned_body == Some(body) {
        tracker.position
    } else {
        surface_target(&hit, config.surface_offset).0
    };
    let mut session = GrabSession::new(
        body,
        weight_class,
        tuning,
        original,
        to_local(&pose, grip_point),
        pose.rotation,
        &config,
    );

    // Stabilize the body before anything pulls on it.
    B::set_velocity(world, body, Vec3::ZERO);
    B::set_angular_velocity(world, body, Vec3::ZERO);
    B::set_properties(world, body, session.stabilizing_properties(&config));

    distance.reset(hit.distance, &config);
    session.desired_position = viewpoint.point_at(distance.current);

    tracker.lock(grip_point);
    tracker.rotation = billboard(grip_point, viewpoint.position, tracker.rotation);
    B::set_anchor_pose(world, anchor, tracker.position, tracker.rotation);
    B::set_anchor_active(world, anchor, true);

    if let Some(mut stored) = world.get_mut::<AnchorTracker>(controller) {
        *stored = tracker;
    }
    if let Some(mut stored) = world.get_mut::<HoldDistance>(controller) {
        *stored = distance;
    }
    if let Some(mut grab) = world.get_mut::<GrabController>(controller) {
        grab.session = Some(session);
    }

    info!("{controller} grabbed {body} ({weight_class:?}, {:.2} kg)", original.mass);
    world.trigger_targets(
        GrabStarted {
            controller,
            body,
            weight_class,
        },
        controller,
    );
    Ok(body)
}

/// End the active grab for `reason`.
///
/// Returns the released body, or `None` when nothing was held (calling this
/// repeatedly is harmless). For [`ReleaseReason::BodyLost`] the body is not
/// touched at all.
pub fn end_grab<B: GrabPhysicsBackend>(
    world: &mut World,
    controller: Entity,
    reason: ReleaseReason,
) -> Option<Entity> {
    let session = world
        .get_mut::<GrabController>(controller)
        .and_then(|mut grab| grab.session.take())?;
    let config = world.get::<GrabConfig>(controller).copied().unwrap_or_default();

    if let Some(constraint) = session.constraint {
        B::destroy_constraint(world, constraint);
    }

    let body = session.body;
    if reason != ReleaseReason::BodyLost && B::is_alive(world, body) {
        B::clear_forces(world, body);
        B::restore_properties(world, body, session.original);
        if reason != ReleaseReason::ConstraintFailed {
            let down = config.gravity.try_normalize().unwrap_or(Vec3::NEG_Y);
            B::apply_impulse(
                world,
                body,
                down * config.release_drop_speed * session.original.mass,
            );
        }
    }

    if let Some(mut tracker) = world.get_mut::<AnchorTracker>(controller) {
        tracker.unlock();
    }
    if let Some(mut distance) = world.get_mut::<HoldDistance>(controller) {
        distance.stop();
    }

    info!("{controller} released {body} ({reason:?})");
    world.trigger_targets(
        GrabReleased {
            controller,
            body,
            reason,
        },
        controller,
    );
    Some(body)
}

/// Tear the session down if its body no longer exists.
pub(crate) fn check_held_body<B: GrabPhysicsBackend>(world: &mut World, controller: Entity) {
    let Some(body) = world
        .get::<GrabController>(controller)
        .and_then(GrabController::held_body)
    else {
        return;
    };
    if !B::is_alive(world, body) {
        warn!("{}", GrabError::StaleReference(body));
        end_grab::<B>(world, controller, ReleaseReason::BodyLost);
    }
}

/// Advance the engage sequence of the controller's session by one tick.
pub(crate) fn advance_session<B: GrabPhysicsBackend>(world: &mut World, controller: Entity, dt: f32) {
    let Some(mut session) = world
        .get::<GrabController>(controller)
        .and_then(|grab| grab.session.clone())
    else {
        return;
    };
    let Some(config) = world.get::<GrabConfig>(controller).copied() else {
        return;
    };
    let Some(anchor) = world
        .get::<AnchorTracker>(controller)
        .and_then(AnchorTracker::anchor)
    else {
        return;
    };

    match session.advance(dt, &config) {
        SessionStep::Stabilizing | SessionStep::Steady => {}
        SessionStep::Engage => {
            let params = session.spring_params(&config, 0.0);
            match B::create_spring_constraint(world, session.body, anchor, params) {
                Ok(constraint) => {
                    session.engage(constraint);
                    B::set_properties(world, session.body, session.holding_properties());
                    debug!("{controller} engaged constraint on {}", session.body);
                }
                Err(err) => {
                    warn!("{err}");
                    end_grab::<B>(world, controller, ReleaseReason::ConstraintFailed);
                    return;
                }
            }
        }
        SessionStep::Ramp(strength) => {
            if let Some(constraint) = session.constraint {
                B::set_constraint_params(world, constraint, session.spring_params(&config, strength));
            }
        }
        SessionStep::RampComplete => {
            if let Some(constraint) = session.constraint {
                B::set_constraint_params(world, constraint, session.spring_params(&config, 1.0));
            }
            B::set_properties(world, session.body, session.settled_properties(&config));
            debug!("{controller} spring ramp complete on {}", session.body);
        }
    }

    if let Some(mut grab) = world.get_mut::<GrabController>(controller) {
        grab.session = Some(session);
    }
}
