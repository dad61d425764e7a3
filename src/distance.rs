//! Hold distance control.
//!
//! Scroll input pushes the held object away or pulls it closer within the
//! configured envelope. Scrolling also raises a short-lived "scrolling"
//! flag that makes the hold controller snap the anchor instead of easing it.

use bevy::prelude::*;

use crate::config::GrabConfig;
use crate::weight::WeightTuning;

/// Distance from the viewpoint at which the held object is kept.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct HoldDistance {
    /// Current hold distance.
    pub current: f32,
    /// Seconds since the last scroll step.
    pub idle: f32,
    /// Whether a scroll happened within the scroll timeout.
    pub scrolling: bool,
}

impl Default for HoldDistance {
    fn default() -> Self {
        Self {
            current: 2.0,
            idle: 0.0,
            scrolling: false,
        }
    }
}

impl HoldDistance {
    /// Start a new hold at `distance` (clamped).
    pub fn reset(&mut self, distance: f32, config: &GrabConfig) {
        self.current = config.clamp_hold_distance(distance);
        self.idle = 0.0;
        self.scrolling = false;
    }

    /// Whether the hold controller should snap this tick.
    #[inline]
    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// Apply one scroll delta. Positive deltas pull the object closer.
    ///
    /// Returns the new distance, or `None` when the delta is zero.
    pub fn apply_scroll(&mut self, delta: f32, tuning: &WeightTuning, config: &GrabConfig) -> Option<f32> {
        if delta == 0.0 || !delta.is_finite() {
            return None;
        }
        let step = delta * config.scroll_sensitivity * tuning.scroll_sensitivity_multiplier;
        self.current = config.clamp_hold_distance(self.current - step);
        self.scrolling = true;
        self.idle = 0.0;
        Some(self.current)
    }

    /// Advance the scroll timeout.
    pub fn tick(&mut self, dt: f32, config: &GrabConfig) {
        if !self.scrolling {
            return;
        }
        self.idle += dt;
        if self.idle >= config.scroll_timeout {
            self.scrolling = false;
        }
    }

    /// Forget any scroll state (the grab ended).
    pub fn stop(&mut self) {
        self.scrolling = false;
        self.idle = 0.0;
    }
}
