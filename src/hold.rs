//! Hold control math.
//!
//! While a grab is engaged, the hold controller moves the anchor toward the
//! point in front of the viewpoint, pushes the body's center of mass toward
//! the same point, adds weight-dependent sag and drag, and keeps the body's
//! orientation near its grab-time orientation with a soft torque spring.
//!
//! Translation and rotation are controlled separately: the force acts at the
//! center of mass, so off-center grabs do not spin the body.

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;

use crate::anchor::smoothing_factor;
use crate::config::GrabConfig;
use crate::weight::WeightTuning;

/// Vectors shorter than this are treated as zero.
const DEGENERATE_LENGTH: f32 = 1.0e-5;

/// Exponential rate at which the held anchor chases its target.
///
/// This is the main "weight feel" signal: heavy objects lag noticeably.
#[inline]
pub fn anchor_speed(config: &GrabConfig, tuning: &WeightTuning) -> f32 {
    config.base_anchor_speed * tuning.speed_multiplier * config.weight_speed_scale
}

/// Next anchor position. Snaps while scrolling.
pub fn step_anchor(current: Vec3, desired: Vec3, speed: f32, dt: f32, snap: bool) -> Vec3 {
    if snap {
        desired
    } else {
        current.lerp(desired, smoothing_factor(speed, dt))
    }
}

/// Force at the center of mass pulling the attachment point toward `desired`.
///
/// `None` when the attachment point already sits on the target.
pub fn distributed_force(
    grip_point: Vec3,
    desired: Vec3,
    mass: f32,
    tuning: &WeightTuning,
    config: &GrabConfig,
) -> Option<Vec3> {
    let offset = desired - grip_point;
    if offset.length() < DEGENERATE_LENGTH {
        return None;
    }
    Some(offset * config.object_move_speed * tuning.force_multiplier * mass)
}

/// Velocity-proportional drag force simulating reluctance to keep moving.
pub fn drag_force(velocity: Vec3, mass: f32, tuning: &WeightTuning, config: &GrabConfig) -> Option<Vec3> {
    if velocity.length() < DEGENERATE_LENGTH {
        return None;
    }
    Some(-velocity * config.drag_force_coefficient * tuning.drag_multiplier * mass)
}

/// Extra gravity for classes whose gravity multiplier exceeds one.
pub fn gravity_compensation(mass: f32, tuning: &WeightTuning, config: &GrabConfig) -> Option<Vec3> {
    let extra = tuning.gravity_multiplier - 1.0;
    (extra > 0.0).then(|| config.gravity * extra * mass * config.gravity_influence)
}

/// Body motion sampled for the orientation controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyMotion {
    pub rotation: Quat,
    /// Larger of the body's largest extent and its largest scale factor.
    pub size: f32,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
}

/// Size of a body for the small-object test.
///
/// The larger of its full extent along the longest axis and its largest
/// transform scale factor.
pub fn body_size(scale: Vec3, half_extents: Option<Vec3>) -> f32 {
    let extent = half_extents.map_or(0.0, |half| 2.0 * half.abs().max_element());
    extent.max(scale.abs().max_element())
}

/// Whether a body far from its anchor counts as stuck this tick.
///
/// A body is stuck while it is beyond `break_distance` and not closing in
/// at `break_closing_speed` or faster. Nothing is stuck while the hold
/// distance is being scrolled, since that moves the anchor away on purpose.
pub fn is_stuck(gap: f32, previous_gap: f32, scrolling: bool, config: &GrabConfig, dt: f32) -> bool {
    if scrolling || gap <= config.break_distance {
        return false;
    }
    previous_gap - gap < config.break_closing_speed * dt
}

/// Output of the orientation controller for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationCorrection {
    /// Nothing to do.
    None,
    /// Small body: overwrite rotation and angular velocity.
    Snap { rotation: Quat, angular_velocity: Vec3 },
    /// Large body: apply this torque.
    Torque(Vec3),
}

/// Angle in degrees between two orientations.
#[inline]
pub fn deviation_degrees(a: Quat, b: Quat) -> f32 {
    a.angle_between(b).to_degrees()
}

/// Deviation (degrees) a large body may show given its motion and class.
pub fn allowed_deviation(motion: &BodyMotion, tuning: &WeightTuning, config: &GrabConfig) -> f32 {
    let activity = motion.velocity.length() * config.deviation_velocity_factor
        + motion.acceleration.length() * config.deviation_acceleration_factor;
    let fraction = activity.clamp(config.min_deviation_fraction.min(1.0), 1.0);
    config.max_orientation_deviation * fraction * tuning.orientation_looseness()
}

/// Shortest rotation from `from` to `to` as a scaled axis (radians).
pub fn rotation_error(from: Quat, to: Quat) -> Vec3 {
    let mut delta = to * from.inverse();
    if delta.w < 0.0 {
        delta = -delta;
    }
    let (axis, mut angle) = delta.to_axis_angle();
    if angle > PI {
        angle -= TAU;
    }
    if angle.abs() < DEGENERATE_LENGTH || !axis.is_finite() {
        return Vec3::ZERO;
    }
    axis * angle
}

/// Soft orientation control toward the grab-time orientation.
///
/// Small bodies are clamped hard to within the tolerance and never wobble.
/// Larger bodies may drift by a motion-dependent amount; past that they are
/// pulled back by a spring-damper torque.
pub fn orientation_correction(
    motion: &BodyMotion,
    original: Quat,
    tuning: &WeightTuning,
    config: &GrabConfig,
    dt: f32,
) -> OrientationCorrection {
    let deviation = deviation_degrees(motion.rotation, original);

    if motion.size < config.small_object_size {
        if deviation <= config.orientation_tolerance {
            return OrientationCorrection::None;
        }
        let t = (config.orientation_snap_rate * dt).clamp(0.0, 1.0);
        return OrientationCorrection::Snap {
            rotation: motion.rotation.slerp(original, t),
            angular_velocity: motion.angular_velocity * config.small_object_angular_damping,
        };
    }

    let target = if deviation > allowed_deviation(motion, tuning, config) {
        original
    } else {
        motion.rotation
    };

    let stiffness = config.orientation_spring * tuning.orientation_spring_factor;
    let damping = config.orientation_damping * tuning.orientation_damping_factor;
    let spring = rotation_error(motion.rotation, target) * stiffness;
    let torque = (spring - motion.angular_velocity * damping) * motion.mass;

    if torque.length() < DEGENERATE_LENGTH {
        OrientationCorrection::None
    } else {
        OrientationCorrection::Torque(torque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::WeightClass;

    fn large_motion(rotation: Quat) -> BodyMotion {
        BodyMotion {
            rotation,
            size: 2.0,
            mass: 1.0,
            ..default()
        }
    }

    #[test]
    fn heavy_anchor_is_slower() {
        let config = GrabConfig::default();
        let light = anchor_speed(&config, &WeightClass::VeryLight.tuning());
        let heavy = anchor_speed(&config, &WeightClass::Heavy.tuning());
        assert!(light > heavy);

        let dt = 1.0 / 60.0;
        let target = Vec3::new(0.0, 0.0, -3.0);
        let a = step_anchor(Vec3::ZERO, target, light, dt, false);
        let b = step_anchor(Vec3::ZERO, target, heavy, dt, false);
        assert!(a.distance(target) < b.distance(target));
    }

    #[test]
    fn scrolling_snaps_anchor() {
        let target = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(step_anchor(Vec3::ZERO, target, 1.0, 1.0 / 60.0, true), target);
    }

    #[test]
    fn force_points_at_target_and_scales_with_class() {
        let config = GrabConfig::default();
        let desired = Vec3::new(0.0, 0.0, -2.0);
        let medium = distributed_force(Vec3::ZERO, desired, 1.0, &WeightClass::Medium.tuning(), &config).unwrap();
        assert!(medium.normalize().dot(Vec3::NEG_Z) > 0.999);

        let heavy = distributed_force(Vec3::ZERO, desired, 1.0, &WeightClass::Heavy.tuning(), &config).unwrap();
        assert!(heavy.length() > medium.length());
    }

    #[test]
    fn body_on_target_gets_no_force() {
        let config = GrabConfig::default();
        let tuning = WeightClass::Medium.tuning();
        assert!(distributed_force(Vec3::ONE, Vec3::ONE, 1.0, &tuning, &config).is_none());
        assert!(drag_force(Vec3::ZERO, 1.0, &tuning, &config).is_none());
    }

    #[test]
    fn drag_opposes_velocity() {
        let config = GrabConfig::default();
        let force = drag_force(Vec3::X, 2.0, &WeightClass::Heavy.tuning(), &config).unwrap();
        assert!(force.x < 0.0);
    }

    #[test]
    fn only_heavy_feeling_classes_get_extra_gravity() {
        let config = GrabConfig::default();
        assert!(gravity_compensation(1.0, &WeightClass::Light.tuning(), &config).is_none());

        let tuning = WeightClass::VeryHeavy.tuning();
        let extra = gravity_compensation(10.0, &tuning, &config).unwrap();
        let expected = (tuning.gravity_multiplier - 1.0) * 10.0 * 9.81;
        assert!(extra.y < 0.0);
        assert!((extra.length() - expected).abs() < 1e-3);
    }

    #[test]
    fn rotation_error_takes_short_way() {
        let error = rotation_error(Quat::IDENTITY, Quat::from_rotation_y(0.5));
        assert!((error - Vec3::Y * 0.5).length() < 1e-4);

        let error = rotation_error(Quat::IDENTITY, Quat::from_rotation_y(-0.5));
        assert!((error - Vec3::NEG_Y * 0.5).length() < 1e-4);

        assert_eq!(rotation_error(Quat::IDENTITY, Quat::IDENTITY), Vec3::ZERO);
    }

    #[test]
    fn small_body_snaps_back_past_tolerance() {
        let config = GrabConfig::default();
        let tuning = WeightClass::Light.tuning();
        let motion = BodyMotion {
            rotation: Quat::from_rotation_x(10f32.to_radians()),
            size: 1.0,
            angular_velocity: Vec3::X * 4.0,
            mass: 1.0,
            ..default()
        };
        match orientation_correction(&motion, Quat::IDENTITY, &tuning, &config, 1.0 / 60.0) {
            OrientationCorrection::Snap {
                rotation,
                angular_velocity,
            } => {
                assert!(deviation_degrees(rotation, Quat::IDENTITY) < 10.0);
                assert!(angular_velocity.length() < 4.0);
            }
            other => panic!("expected snap, got {other:?}"),
        }
    }

    #[test]
    fn small_body_within_tolerance_is_left_alone() {
        let config = GrabConfig::default();
        let motion = BodyMotion {
            rotation: Quat::from_rotation_x(1f32.to_radians()),
            size: 1.0,
            angular_velocity: Vec3::X,
            mass: 1.0,
            ..default()
        };
        assert_eq!(
            orientation_correction(&motion, Quat::IDENTITY, &WeightClass::Light.tuning(), &config, 1.0 / 60.0),
            OrientationCorrection::None
        );
    }

    #[test]
    fn large_body_beyond_allowance_is_pulled_back() {
        let config = GrabConfig::default();
        let tuning = WeightClass::Medium.tuning();
        let motion = large_motion(Quat::from_rotation_y(60f32.to_radians()));
        match orientation_correction(&motion, Quat::IDENTITY, &tuning, &config, 1.0 / 60.0) {
            OrientationCorrection::Torque(torque) => assert!(torque.y < 0.0),
            other => panic!("expected torque, got {other:?}"),
        }
    }

    #[test]
    fn large_body_within_allowance_only_gets_damping() {
        let config = GrabConfig::default();
        let tuning = WeightClass::Medium.tuning();
        let mut motion = large_motion(Quat::from_rotation_y(2f32.to_radians()));
        assert_eq!(
            orientation_correction(&motion, Quat::IDENTITY, &tuning, &config, 1.0 / 60.0),
            OrientationCorrection::None
        );

        motion.angular_velocity = Vec3::Y;
        match orientation_correction(&motion, Quat::IDENTITY, &tuning, &config, 1.0 / 60.0) {
            OrientationCorrection::Torque(torque) => {
                assert!(torque.y < 0.0);
                assert!(torque.x.abs() < 1e-6 && torque.z.abs() < 1e-6);
            }
            other => panic!("expected damping torque, got {other:?}"),
        }
    }

    #[test]
    fn motion_and_weight_widen_allowance() {
        let config = GrabConfig::default();
        let tuning = WeightClass::Medium.tuning();
        let still = BodyMotion::default();
        let moving = BodyMotion {
            velocity: Vec3::X * 5.0,
            ..default()
        };
        assert!(allowed_deviation(&moving, &tuning, &config) > allowed_deviation(&still, &tuning, &config));
        assert!(
            allowed_deviation(&still, &WeightClass::VeryHeavy.tuning(), &config)
                > allowed_deviation(&still, &tuning, &config)
        );
    }

    #[test]
    fn size_uses_extent_or_scale() {
        assert_eq!(body_size(Vec3::ONE, None), 1.0);
        assert_eq!(body_size(Vec3::ONE, Some(Vec3::new(0.25, 1.5, 0.5))), 3.0);
        assert_eq!(body_size(Vec3::splat(2.0), Some(Vec3::splat(0.5))), 2.0);
        assert_eq!(body_size(Vec3::splat(2.0), Some(Vec3::splat(0.1))), 2.0);
    }

    #[test]
    fn distant_body_is_stuck_only_when_not_closing() {
        let config = GrabConfig::default();
        let dt = 1.0 / 60.0;

        assert!(!is_stuck(2.0, 2.0, false, &config, dt), "within break distance");
        assert!(is_stuck(6.0, 6.0, false, &config, dt), "far and still");
        assert!(is_stuck(6.0, 5.9, false, &config, dt), "far and drifting away");
        assert!(!is_stuck(6.0, 6.1, false, &config, dt), "far but closing fast");
        assert!(is_stuck(6.0, 6.001, false, &config, dt), "closing too slowly");
        assert!(!is_stuck(12.0, 12.0, true, &config, dt), "scrolling never counts");
    }
}
