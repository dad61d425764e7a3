//! Controller configuration.
//!
//! [`GrabConfig`] holds the base constants of the grab system. Weight classes
//! scale these through [`WeightTuning`](crate::weight::WeightTuning); nothing
//! here depends on the object being held.

use bevy::prelude::*;

use crate::error::ConfigError;

/// Configuration parameters for the grab controller.
///
/// Distances are in world units (meters), speeds are exponential rates per
/// second unless stated otherwise, angles are in degrees.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct GrabConfig {
    // === Reach & Distance ===
    /// Length of the anchor scan ray.
    pub max_track_distance: f32,
    /// Bodies farther than this along the look ray cannot be grabbed.
    pub max_grab_distance: f32,
    /// Closest a held body can be brought to the viewpoint.
    pub min_hold_distance: f32,
    /// Farthest a held body can be pushed from the viewpoint.
    pub max_hold_distance: f32,
    /// Anchor hovers this far off the scanned surface.
    pub surface_offset: f32,
    /// Exponential rate at which the scanning anchor follows its target.
    pub anchor_move_speed: f32,

    // === Constraint ===
    /// Base spring stiffness of the grab constraint.
    pub base_spring: f32,
    /// Base damper of the grab constraint.
    pub base_damper: f32,
    /// Base mass scale of the grab constraint.
    pub base_mass_scale: f32,
    /// Fraction of full spring strength the constraint starts at.
    pub initial_spring_fraction: f32,
    /// Seconds to ramp the spring from its initial to its full strength.
    pub spring_ramp_duration: f32,

    // === Engage & Release ===
    /// Physics ticks to wait before the constraint engages.
    pub stabilization_ticks: u32,
    /// Linear and angular drag applied during stabilization.
    pub stabilization_drag: f32,
    /// Least fraction of their mass heavy classes keep while held.
    pub heavy_mass_retention: f32,
    /// Post-ramp drag target as a multiple of the body's original drag.
    pub drag_restore_factor: f32,
    /// How far (0-1) drag moves toward the restore target after the ramp.
    pub drag_restore_blend: f32,
    /// Downward speed given to a body when it is released.
    pub release_drop_speed: f32,
    /// Distance between attachment point and anchor that counts as stuck.
    pub break_distance: f32,
    /// Consecutive stuck ticks before the grab breaks.
    pub break_ticks: u32,
    /// Closing speed (m/s) below which a distant body counts as stuck.
    pub break_closing_speed: f32,

    // === Hold Movement ===
    /// Base exponential rate at which the held anchor chases its target.
    pub base_anchor_speed: f32,
    /// Global scale on weight-dependent anchor speed.
    pub weight_speed_scale: f32,
    /// Gain of the center-of-mass force toward the anchor target.
    pub object_move_speed: f32,
    /// Gain of the velocity-proportional drag force.
    pub drag_force_coefficient: f32,
    /// World gravity used for sag compensation.
    pub gravity: Vec3,
    /// Scale on extra gravity for heavy held bodies.
    pub gravity_influence: f32,

    // === Orientation ===
    /// Bodies whose size is below this are "small". Size is the larger of
    /// the body's largest extent and its largest scale factor.
    pub small_object_size: f32,
    /// Deviation (degrees) small bodies may reach before snapping back.
    pub orientation_tolerance: f32,
    /// Slerp rate (per second) used to snap small bodies back.
    pub orientation_snap_rate: f32,
    /// Angular velocity multiplier applied when a small body snaps back.
    pub small_object_angular_damping: f32,
    /// Upper bound (degrees) on motion-justified wobble.
    pub max_orientation_deviation: f32,
    /// Wobble allowance per unit of linear speed.
    pub deviation_velocity_factor: f32,
    /// Wobble allowance per unit of linear acceleration.
    pub deviation_acceleration_factor: f32,
    /// Wobble allowed at rest, as a fraction of the maximum.
    pub min_deviation_fraction: f32,
    /// Base stiffness of the orientation torque spring.
    pub orientation_spring: f32,
    /// Base damping of the orientation torque.
    pub orientation_damping: f32,

    // === Scroll ===
    /// Distance change per scroll unit before weight scaling.
    pub scroll_sensitivity: f32,
    /// Seconds without scroll input before scrolling is considered over.
    pub scroll_timeout: f32,
    /// Angular velocity multiplier applied on every scroll step.
    pub scroll_angular_damping: f32,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            // Reach & distance
            max_track_distance: 15.0,
            max_grab_distance: 8.0,
            min_hold_distance: 0.8,
            max_hold_distance: 15.0,
            surface_offset: 0.05,
            anchor_move_speed: 20.0,

            // Constraint
            base_spring: 500.0,
            base_damper: 50.0,
            base_mass_scale: 1.0,
            initial_spring_fraction: 0.2,
            spring_ramp_duration: 0.2,

            // Engage & release
            stabilization_ticks: 2,
            stabilization_drag: 15.0,
            heavy_mass_retention: 0.7,
            drag_restore_factor: 2.0,
            drag_restore_blend: 0.5,
            release_drop_speed: 0.5,
            break_distance: 2.5,
            break_ticks: 10,
            break_closing_speed: 0.5,

            // Hold movement
            base_anchor_speed: 12.0,
            weight_speed_scale: 1.0,
            object_move_speed: 10.0,
            drag_force_coefficient: 0.5,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            gravity_influence: 1.0,

            // Orientation
            small_object_size: 1.5,
            orientation_tolerance: 2.0,
            orientation_snap_rate: 12.0,
            small_object_angular_damping: 0.5,
            max_orientation_deviation: 25.0,
            deviation_velocity_factor: 0.15,
            deviation_acceleration_factor: 0.02,
            min_deviation_fraction: 0.2,
            orientation_spring: 40.0,
            orientation_damping: 6.0,

            // Scroll
            scroll_sensitivity: 0.5,
            scroll_timeout: 0.1,
            scroll_angular_damping: 0.8,
        }
    }
}

impl GrabConfig {
    /// Config tuned for a typical first-person player.
    pub fn player() -> Self {
        Self::default()
    }

    /// Config for careful placement: stiffer orientation, slower scrolling.
    pub fn precise() -> Self {
        Self {
            base_anchor_speed: 16.0,
            max_orientation_deviation: 10.0,
            orientation_spring: 60.0,
            orientation_damping: 9.0,
            scroll_sensitivity: 0.25,
            ..default()
        }
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_hold_distance > self.max_hold_distance {
            return Err(ConfigError::EmptyDistanceRange {
                min: self.min_hold_distance,
                max: self.max_hold_distance,
            });
        }
        let positive = [
            ("max_track_distance", self.max_track_distance),
            ("max_grab_distance", self.max_grab_distance),
            ("base_anchor_speed", self.base_anchor_speed),
            ("anchor_move_speed", self.anchor_move_speed),
            ("scroll_timeout", self.scroll_timeout),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        Ok(())
    }

    /// Clamp a hold distance into the configured envelope.
    ///
    /// Tolerates an inverted range by treating the minimum as authoritative.
    #[inline]
    pub fn clamp_hold_distance(&self, distance: f32) -> f32 {
        distance
            .min(self.max_hold_distance)
            .max(self.min_hold_distance)
    }

    /// Builder: set the hold distance envelope.
    pub fn with_hold_distance(mut self, min: f32, max: f32) -> Self {
        self.min_hold_distance = min;
        self.max_hold_distance = max;
        self
    }

    /// Builder: set grab reach.
    pub fn with_max_grab_distance(mut self, distance: f32) -> Self {
        self.max_grab_distance = distance;
        self
    }

    /// Builder: set base constraint spring and damper.
    pub fn with_spring(mut self, spring: f32, damper: f32) -> Self {
        self.base_spring = spring;
        self.base_damper = damper;
        self
    }

    /// Builder: set base anchor speed.
    pub fn with_anchor_speed(mut self, speed: f32) -> Self {
        self.base_anchor_speed = speed;
        self
    }

    /// Builder: set scroll sensitivity.
    pub fn with_scroll_sensitivity(mut self, sensitivity: f32) -> Self {
        self.scroll_sensitivity = sensitivity;
        self
    }

    /// Builder: set stabilization window and drag.
    pub fn with_stabilization(mut self, ticks: u32, drag: f32) -> Self {
        self.stabilization_ticks = ticks;
        self.stabilization_drag = drag;
        self
    }

    /// Builder: set world gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder: set orientation torque parameters.
    pub fn with_orientation(mut self, spring: f32, damping: f32) -> Self {
        self.orientation_spring = spring;
        self.orientation_damping = damping;
        self
    }
}
