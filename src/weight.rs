//! Weight classification and per-class grab tuning.
//!
//! Every grabbable body is sorted into one of six ordered [`WeightClass`]es.
//! All weight-dependent behavior (spring strength, anchor speed, sag, scroll
//! sensitivity, ...) is read from a single [`WeightTuning`] table keyed by
//! that class.

use bevy::prelude::*;

use crate::grabbable::Grabbable;

/// Discrete weight bucket of a grabbable body, ordered light to heavy.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum WeightClass {
    VeryLight,
    Light,
    #[default]
    Medium,
    Heavy,
    VeryHeavy,
    /// Classified but never grabbed.
    Immovable,
}

impl WeightClass {
    /// All classes in ascending order.
    pub const ALL: [WeightClass; 6] = [
        WeightClass::VeryLight,
        WeightClass::Light,
        WeightClass::Medium,
        WeightClass::Heavy,
        WeightClass::VeryHeavy,
        WeightClass::Immovable,
    ];

    /// Mass bracket `[low, high)` in kilograms.
    ///
    /// `Immovable` has an open upper bound.
    pub const fn mass_range(self) -> (f32, f32) {
        match self {
            WeightClass::VeryLight => (0.0, 1.0),
            WeightClass::Light => (1.0, 5.0),
            WeightClass::Medium => (5.0, 15.0),
            WeightClass::Heavy => (15.0, 30.0),
            WeightClass::VeryHeavy => (30.0, IMMOVABLE_MASS),
            WeightClass::Immovable => (IMMOVABLE_MASS, f32::INFINITY),
        }
    }

    /// Classify a mass in kilograms.
    ///
    /// Total over `f32`: negative masses land in `VeryLight`, NaN and
    /// anything at or above [`IMMOVABLE_MASS`] in `Immovable`.
    pub fn from_mass(mass_kg: f32) -> Self {
        if mass_kg.is_nan() {
            return WeightClass::Immovable;
        }
        Self::ALL
            .into_iter()
            .find(|class| mass_kg < class.mass_range().1)
            .unwrap_or(WeightClass::Immovable)
    }

    /// Whether bodies of this class may be grabbed at all.
    #[inline]
    pub fn is_grabbable(self) -> bool {
        self != WeightClass::Immovable
    }

    /// Whether this class keeps engine gravity while held (so it sags).
    #[inline]
    pub fn keeps_gravity(self) -> bool {
        self >= WeightClass::Heavy
    }

    /// Look up the fixed tuning record for this class.
    pub const fn tuning(self) -> WeightTuning {
        match self {
            WeightClass::VeryLight => WeightTuning {
                spring_multiplier: 1.2,
                damper_multiplier: 1.5,
                speed_multiplier: 1.5,
                mass_reduction_factor: 0.8,
                force_multiplier: 0.6,
                max_slack_distance: 0.05,
                mass_scale: 1.0,
                gravity_multiplier: 1.0,
                drag_multiplier: 1.0,
                orientation_spring_factor: 1.2,
                orientation_damping_factor: 1.5,
                scroll_sensitivity_multiplier: 2.0,
                holding_linear_drag: 10.0,
                holding_angular_drag: 12.0,
            },
            WeightClass::Light => WeightTuning {
                spring_multiplier: 1.0,
                damper_multiplier: 1.2,
                speed_multiplier: 1.2,
                mass_reduction_factor: 0.6,
                force_multiplier: 0.8,
                max_slack_distance: 0.08,
                mass_scale: 1.0,
                gravity_multiplier: 1.0,
                drag_multiplier: 1.1,
                orientation_spring_factor: 1.0,
                orientation_damping_factor: 1.2,
                scroll_sensitivity_multiplier: 1.5,
                holding_linear_drag: 8.0,
                holding_angular_drag: 10.0,
            },
            WeightClass::Medium => WeightTuning {
                spring_multiplier: 1.0,
                damper_multiplier: 1.0,
                speed_multiplier: 1.0,
                mass_reduction_factor: 0.5,
                force_multiplier: 1.0,
                max_slack_distance: 0.12,
                mass_scale: 1.0,
                gravity_multiplier: 1.2,
                drag_multiplier: 1.3,
                orientation_spring_factor: 0.9,
                orientation_damping_factor: 1.0,
                scroll_sensitivity_multiplier: 1.0,
                holding_linear_drag: 5.0,
                holding_angular_drag: 6.0,
            },
            WeightClass::Heavy => WeightTuning {
                spring_multiplier: 0.8,
                damper_multiplier: 0.9,
                speed_multiplier: 0.6,
                mass_reduction_factor: 0.75,
                force_multiplier: 1.3,
                max_slack_distance: 0.2,
                mass_scale: 2.0,
                gravity_multiplier: 1.6,
                drag_multiplier: 1.6,
                orientation_spring_factor: 0.7,
                orientation_damping_factor: 0.8,
                scroll_sensitivity_multiplier: 0.6,
                holding_linear_drag: 3.0,
                holding_angular_drag: 4.0,
            },
            WeightClass::VeryHeavy => WeightTuning {
                spring_multiplier: 0.6,
                damper_multiplier: 0.8,
                speed_multiplier: 0.35,
                mass_reduction_factor: 0.8,
                force_multiplier: 1.6,
                max_slack_distance: 0.3,
                mass_scale: 3.0,
                gravity_multiplier: 2.0,
                drag_multiplier: 2.0,
                orientation_spring_factor: 0.5,
                orientation_damping_factor: 0.6,
                scroll_sensitivity_multiplier: 0.4,
                holding_linear_drag: 2.0,
                holding_angular_drag: 3.0,
            },
            WeightClass::Immovable => WeightTuning {
                spring_multiplier: 0.0,
                damper_multiplier: 0.0,
                speed_multiplier: 0.0,
                mass_reduction_factor: 1.0,
                force_multiplier: 0.0,
                max_slack_distance: 0.0,
                mass_scale: 1.0,
                gravity_multiplier: 1.0,
                drag_multiplier: 1.0,
                orientation_spring_factor: 0.0,
                orientation_damping_factor: 0.0,
                scroll_sensitivity_multiplier: 0.0,
                holding_linear_drag: 0.0,
                holding_angular_drag: 0.0,
            },
        }
    }
}

/// Mass (kg) at and above which a body is [`WeightClass::Immovable`].
pub const IMMOVABLE_MASS: f32 = 50.0;

/// Multipliers applied to the base grab constants for one weight class.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct WeightTuning {
    /// Scales the base spring constant of the grab constraint.
    pub spring_multiplier: f32,
    /// Scales the base damper constant of the grab constraint.
    pub damper_multiplier: f32,
    /// Scales how fast the anchor chases its target.
    pub speed_multiplier: f32,
    /// Temporary mass scale while held.
    pub mass_reduction_factor: f32,
    /// Scales the direct center-of-mass force.
    pub force_multiplier: f32,
    /// Free play allowed by the constraint before it pulls.
    pub max_slack_distance: f32,
    /// Constraint mass-scale parameter.
    pub mass_scale: f32,
    /// Extra simulated gravity while held (1.0 = none).
    pub gravity_multiplier: f32,
    /// Extra linear drag while held.
    pub drag_multiplier: f32,
    pub orientation_spring_factor: f32,
    pub orientation_damping_factor: f32,
    /// Lighter objects scroll further per wheel notch.
    pub scroll_sensitivity_multiplier: f32,
    /// Linear drag set on the body once the constraint engages.
    pub holding_linear_drag: f32,
    /// Angular drag set on the body once the constraint engages.
    pub holding_angular_drag: f32,
}

impl Default for WeightTuning {
    fn default() -> Self {
        WeightClass::Medium.tuning()
    }
}

impl WeightTuning {
    /// Apply per-object spring and damper scales.
    pub fn scaled(mut self, spring_scale: f32, damper_scale: f32) -> Self {
        self.spring_multiplier *= spring_scale;
        self.damper_multiplier *= damper_scale;
        self
    }

    /// Looseness of orientation control; heavier classes sway more.
    pub fn orientation_looseness(&self) -> f32 {
        1.0 / self.orientation_spring_factor.max(0.1)
    }
}

/// Resolve the weight class and tuning for a body.
///
/// Precedence: explicit class, then explicit mass, then the body's simulated
/// mass. The descriptor's spring and damper scales are applied on top of the
/// class table.
pub fn resolve_for_object(
    descriptor: Option<&Grabbable>,
    fallback_mass_kg: f32,
) -> (WeightClass, WeightTuning) {
    let Some(descriptor) = descriptor else {
        let class = WeightClass::from_mass(fallback_mass_kg);
        return (class, class.tuning());
    };

    let class = descriptor
        .weight_class
        .unwrap_or_else(|| WeightClass::from_mass(descriptor.mass.unwrap_or(fallback_mass_kg)));
    let tuning = class
        .tuning()
        .scaled(descriptor.spring_scale, descriptor.damper_scale);
    (class, tuning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bracket_boundaries() {
        assert_eq!(WeightClass::from_mass(0.0), WeightClass::VeryLight);
        assert_eq!(WeightClass::from_mass(0.5), WeightClass::VeryLight);
        assert_eq!(WeightClass::from_mass(1.0), WeightClass::Light);
        assert_eq!(WeightClass::from_mass(10.0), WeightClass::Medium);
        assert_eq!(WeightClass::from_mass(22.5), WeightClass::Heavy);
        assert_eq!(WeightClass::from_mass(30.0), WeightClass::VeryHeavy);
        assert_eq!(WeightClass::from_mass(49.99), WeightClass::VeryHeavy);
        assert_eq!(WeightClass::from_mass(IMMOVABLE_MASS), WeightClass::Immovable);
        assert_eq!(WeightClass::from_mass(60.0), WeightClass::Immovable);
    }

    #[test]
    fn odd_masses_are_still_classified() {
        assert_eq!(WeightClass::from_mass(-3.0), WeightClass::VeryLight);
        assert_eq!(WeightClass::from_mass(f32::INFINITY), WeightClass::Immovable);
        assert_eq!(WeightClass::from_mass(f32::NAN), WeightClass::Immovable);
    }

    #[test]
    fn classification_is_monotonic() {
        let mut previous = WeightClass::from_mass(0.0);
        let mut mass = 0.0;
        while mass < 80.0 {
            let class = WeightClass::from_mass(mass);
            assert!(class >= previous, "class dropped at mass {mass}");
            previous = class;
            mass += 0.05;
        }
    }

    #[test]
    fn brackets_are_contiguous() {
        for pair in WeightClass::ALL.windows(2) {
            assert_eq!(pair[0].mass_range().1, pair[1].mass_range().0);
        }
    }

    #[test]
    fn only_immovable_is_rejected() {
        for class in WeightClass::ALL {
            assert_eq!(class.is_grabbable(), class != WeightClass::Immovable);
        }
    }

    #[test]
    fn heavier_classes_move_slower_and_scroll_less() {
        let grabbable: Vec<_> = WeightClass::ALL
            .into_iter()
            .filter(|c| c.is_grabbable())
            .map(WeightClass::tuning)
            .collect();
        for pair in grabbable.windows(2) {
            assert!(pair[0].speed_multiplier > pair[1].speed_multiplier);
            assert!(pair[0].scroll_sensitivity_multiplier > pair[1].scroll_sensitivity_multiplier);
            assert!(pair[0].holding_linear_drag > pair[1].holding_linear_drag);
        }
    }

    #[test]
    fn gravity_is_kept_from_heavy_upwards() {
        assert!(!WeightClass::Medium.keeps_gravity());
        assert!(WeightClass::Heavy.keeps_gravity());
        assert!(WeightClass::VeryHeavy.keeps_gravity());
        assert!(WeightClass::Immovable.keeps_gravity());
    }

    #[test]
    fn resolve_without_descriptor_uses_body_mass() {
        let (class, tuning) = resolve_for_object(None, 10.0);
        assert_eq!(class, WeightClass::Medium);
        assert_eq!(tuning, WeightClass::Medium.tuning());
    }

    #[test]
    fn explicit_class_beats_explicit_mass() {
        let descriptor = Grabbable::default()
            .with_weight_class(WeightClass::Light)
            .with_mass(40.0);
        let (class, _) = resolve_for_object(Some(&descriptor), 10.0);
        assert_eq!(class, WeightClass::Light);
    }

    #[test]
    fn explicit_mass_beats_body_mass() {
        let descriptor = Grabbable::default().with_mass(0.3);
        let (class, _) = resolve_for_object(Some(&descriptor), 55.0);
        assert_eq!(class, WeightClass::VeryLight);
    }

    #[test]
    fn descriptor_scales_are_multiplicative() {
        let descriptor = Grabbable::default().with_spring_scale(2.0).with_damper_scale(0.5);
        let (_, tuning) = resolve_for_object(Some(&descriptor), 10.0);
        let base = WeightClass::Medium.tuning();
        assert_eq!(tuning.spring_multiplier, base.spring_multiplier * 2.0);
        assert_eq!(tuning.damper_multiplier, base.damper_multiplier * 0.5);
        assert_eq!(tuning.speed_multiplier, base.speed_multiplier);
    }
}
