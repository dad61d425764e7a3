//! Grab session state.
//!
//! A [`GrabSession`] exists from a successful grab until release. It keeps
//! the snapshot needed to restore the held body and the tick-counted state
//! of the multi-step engage sequence: stabilization wait, spring ramp and
//! drag restoration. The lifecycle advances it once per physics step.

use bevy::prelude::*;

use crate::backend::{BodyProperties, SpringParams};
use crate::config::GrabConfig;
use crate::weight::{WeightClass, WeightTuning};

/// Engage sequence position of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrabPhase {
    /// Waiting for the stabilization drag to settle; no constraint yet.
    Engaging { ticks: u32 },
    /// Constraint active; the spring ramps up over `ramp_elapsed` seconds.
    Holding { ramp_elapsed: f32, ramp_complete: bool },
}

/// What the lifecycle must do after advancing a session by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionStep {
    /// Still inside the stabilization window.
    Stabilizing,
    /// Stabilization is over: create the constraint now.
    Engage,
    /// Spring ramp in progress; set the spring to this fraction of full strength.
    Ramp(f32),
    /// Ramp just finished: full spring and partial drag restore.
    RampComplete,
    /// Nothing left to sequence.
    Steady,
}

/// One active grab.
#[derive(Debug, Clone)]
pub struct GrabSession {
    /// Held body. Borrowed, not owned.
    pub body: Entity,
    pub weight_class: WeightClass,
    pub tuning: WeightTuning,
    /// Properties before the grab, restored on release.
    pub original: BodyProperties,
    /// Mass the body carries while held.
    pub held_mass: f32,
    /// Attachment point in the body's local frame, fixed for the session.
    pub local_anchor: Vec3,
    /// Body orientation at grab time; the orientation controller's reference.
    pub original_rotation: Quat,
    /// The one spring constraint of this session, once engaged.
    pub constraint: Option<Entity>,
    pub phase: GrabPhase,
    /// Where the anchor is heading; kept when the viewpoint is lost.
    pub desired_position: Vec3,
    /// Body velocity on the previous tick, for acceleration estimates.
    pub previous_velocity: Vec3,
    /// Consecutive ticks the attachment point was beyond break distance
    /// without closing in on the anchor.
    pub stuck_ticks: u32,
    /// Attachment point to anchor distance on the previous tick.
    pub previous_gap: f32,
}

impl GrabSession {
    /// Start a session in the Engaging phase.
    pub fn new(
        body: Entity,
        weight_class: WeightClass,
        tuning: WeightTuning,
        original: BodyProperties,
        local_anchor: Vec3,
        original_rotation: Quat,
        config: &GrabConfig,
    ) -> Self {
        Self {
            body,
            weight_class,
            tuning,
            original,
            held_mass: held_mass(original.mass, weight_class, &tuning, config),
            local_anchor,
            original_rotation,
            constraint: None,
            phase: GrabPhase::Engaging { ticks: 0 },
            desired_position: Vec3::ZERO,
            previous_velocity: Vec3::ZERO,
            stuck_ticks: 0,
            previous_gap: 0.0,
        }
    }

    /// Whether the constraint is engaged.
    pub fn is_holding(&self) -> bool {
        matches!(self.phase, GrabPhase::Holding { .. })
    }

    /// Advance the engage sequence by one physics tick.
    pub fn advance(&mut self, dt: f32, config: &GrabConfig) -> SessionStep {
        match &mut self.phase {
            GrabPhase::Engaging { ticks } => {
                *ticks += 1;
                if *ticks >= config.stabilization_ticks {
                    SessionStep::Engage
                } else {
                    SessionStep::Stabilizing
                }
            }
            GrabPhase::Holding { ramp_complete: true, .. } => SessionStep::Steady,
            GrabPhase::Holding {
                ramp_elapsed,
                ramp_complete,
            } => {
                *ramp_elapsed += dt;
                let t = if config.spring_ramp_duration > 0.0 {
                    (*ramp_elapsed / config.spring_ramp_duration).min(1.0)
                } else {
                    1.0
                };
                if t >= 1.0 {
                    *ramp_complete = true;
                    SessionStep::RampComplete
                } else {
                    SessionStep::Ramp(t)
                }
            }
        }
    }

    /// Record the created constraint and enter the Holding phase.
    pub fn engage(&mut self, constraint: Entity) {
        self.constraint = Some(constraint);
        self.phase = GrabPhase::Holding {
            ramp_elapsed: 0.0,
            ramp_complete: false,
        };
    }

    /// Properties during the stabilization window: reduced mass, heavy drag,
    /// gravity untouched.
    pub fn stabilizing_properties(&self, config: &GrabConfig) -> BodyProperties {
        BodyProperties {
            mass: self.held_mass,
            linear_drag: config.stabilization_drag,
            angular_drag: config.stabilization_drag,
            gravity_scale: self.original.gravity_scale,
        }
    }

    /// Properties once the constraint engages: weight-dependent drag and
    /// gravity (heavy classes keep it so they sag).
    pub fn holding_properties(&self) -> BodyProperties {
        let gravity_scale = if self.weight_class.keeps_gravity() {
            if self.original.uses_gravity() {
                self.original.gravity_scale
            } else {
                1.0
            }
        } else {
            0.0
        };
        BodyProperties {
            mass: self.held_mass,
            linear_drag: self.tuning.holding_linear_drag,
            angular_drag: self.tuning.holding_angular_drag,
            gravity_scale,
        }
    }

    /// Properties after the ramp: drag blended toward a multiple of the
    /// original drag.
    pub fn settled_properties(&self, config: &GrabConfig) -> BodyProperties {
        let holding = self.holding_properties();
        let blend = config.drag_restore_blend.clamp(0.0, 1.0);
        let target_linear = self.original.linear_drag * config.drag_restore_factor;
        let target_angular = self.original.angular_drag * config.drag_restore_factor;
        holding.with_drag(
            holding.linear_drag + (target_linear - holding.linear_drag) * blend,
            holding.angular_drag + (target_angular - holding.angular_drag) * blend,
        )
    }

    /// Constraint parameters at `strength` (0-1) of the ramp.
    ///
    /// Strength 0 is the reduced initial spring, 1 the full spring.
    pub fn spring_params(&self, config: &GrabConfig, strength: f32) -> SpringParams {
        let full = config.base_spring * self.tuning.spring_multiplier;
        let initial = config.initial_spring_fraction.clamp(0.0, 1.0);
        let fraction = initial + (1.0 - initial) * strength.clamp(0.0, 1.0);
        SpringParams {
            local_anchor: self.local_anchor,
            min_distance: 0.0,
            max_distance: self.tuning.max_slack_distance,
            spring: full * fraction,
            damper: config.base_damper * self.tuning.damper_multiplier,
            mass_scale: config.base_mass_scale * self.tuning.mass_scale,
        }
    }
}

/// Mass a body carries while held.
///
/// Classes from `Heavy` upward keep at least `heavy_mass_retention` of
/// their mass.
pub fn held_mass(mass: f32, class: WeightClass, tuning: &WeightTuning, config: &GrabConfig) -> f32 {
    let factor = if class >= WeightClass::Heavy {
        tuning.mass_reduction_factor.max(config.heavy_mass_retention)
    } else {
        tuning.mass_reduction_factor
    };
    mass * factor
}
