//! Anchor tracking.
//!
//! The anchor is the player's "virtual hand": a kinematic, gravity-free
//! proxy body the grab constraint attaches to. While nothing is held it
//! scans the look ray and hovers over whatever surface it finds; while
//! holding it is locked to the grab and follows the held body's attachment
//! point.

use bevy::prelude::*;

use crate::collision::RayHit;

/// What the anchor is currently doing.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorMode {
    /// Following the look ray over surfaces.
    #[default]
    Scanning,
    /// Bound to a held body.
    Locked,
}

/// Per-controller anchor state.
///
/// The anchor body itself is spawned lazily by the backend on the first
/// successful surface trace and is never despawned afterwards, only toggled
/// active or inactive.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct AnchorTracker {
    /// Anchor body, once spawned.
    pub(crate) anchor: Option<Entity>,
    /// Current mode.
    pub mode: AnchorMode,
    /// World position of the anchor.
    pub position: Vec3,
    /// World orientation of the anchor.
    pub rotation: Quat,
    /// Whether the anchor participates in the simulation.
    pub active: bool,
    /// World position of the held body's attachment point (Locked mode).
    pub grip_point: Vec3,
    /// Last scan result (Scanning mode).
    #[reflect(ignore)]
    pub scan_hit: Option<RayHit>,
}

impl AnchorTracker {
    /// The anchor body, if it has been spawned.
    pub fn anchor(&self) -> Option<Entity> {
        self.anchor
    }

    /// Whether the anchor is bound to a held body.
    pub fn is_locked(&self) -> bool {
        self.mode == AnchorMode::Locked
    }

    /// Advance one Scanning tick with this tick's look-ray result.
    ///
    /// On a hit the anchor eases toward the surface target; the first
    /// appearance after being hidden snaps so the anchor does not sweep in
    /// from a stale location. A miss hides the anchor.
    pub fn update_scanning(&mut self, hit: Option<&RayHit>, surface_offset: f32, speed: f32, dt: f32) {
        self.scan_hit = hit.copied();
        let Some(hit) = hit else {
            self.active = false;
            return;
        };

        let (target_position, target_rotation) = surface_target(hit, surface_offset);
        if self.active {
            let t = smoothing_factor(speed, dt);
            self.position = self.position.lerp(target_position, t);
            self.rotation = self.rotation.slerp(target_rotation, t);
        } else {
            self.position = target_position;
            self.rotation = target_rotation;
        }
        self.active = true;
    }

    /// Switch to Locked mode with the attachment point at `grip_point`.
    pub fn lock(&mut self, grip_point: Vec3) {
        self.mode = AnchorMode::Locked;
        self.grip_point = grip_point;
        self.position = grip_point;
        self.active = true;
        self.scan_hit = None;
    }

    /// Return to Scanning mode; normal raycasting resumes next tick.
    pub fn unlock(&mut self) {
        self.mode = AnchorMode::Scanning;
    }

    /// Advance one Locked tick.
    ///
    /// The grip point rides along with the body; the anchor keeps facing the
    /// viewpoint. Without a body pose or viewpoint the last values are kept.
    pub fn update_locked(&mut self, body_pose: Option<&Transform>, local_anchor: Vec3, viewpoint: Option<Vec3>) {
        if let Some(pose) = body_pose {
            self.grip_point = to_world(pose, local_anchor);
        }
        if let Some(eye) = viewpoint {
            self.rotation = billboard(self.position, eye, self.rotation);
        }
    }
}

/// Frame-rate independent interpolation factor for an exponential approach.
#[inline]
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    (1.0 - (-rate.max(0.0) * dt.max(0.0)).exp()).clamp(0.0, 1.0)
}

/// Anchor pose for a surface hit: offset along the normal, facing along it.
pub fn surface_target(hit: &RayHit, offset: f32) -> (Vec3, Quat) {
    let normal = hit.normal.try_normalize().unwrap_or(Vec3::Y);
    (hit.point + normal * offset, facing(normal).unwrap_or(Quat::IDENTITY))
}

/// Rotation whose forward (-Z) points along `direction`, kept upright.
///
/// Returns `None` for a zero direction.
pub fn facing(direction: Vec3) -> Option<Quat> {
    let direction = direction.try_normalize()?;
    let up = if direction.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
    Some(Transform::IDENTITY.looking_to(direction, up).rotation)
}

/// Rotation of an anchor at `position` facing `eye`; `fallback` when they coincide.
pub fn billboard(position: Vec3, eye: Vec3, fallback: Quat) -> Quat {
    facing(eye - position).unwrap_or(fallback)
}

/// Express a world point in a body's local frame.
pub fn to_local(pose: &Transform, world_point: Vec3) -> Vec3 {
    let scale = Vec3::select(pose.scale.cmpeq(Vec3::ZERO), Vec3::ONE, pose.scale);
    (pose.rotation.inverse() * (world_point - pose.translation)) / scale
}

/// Express a local point of a body in world space.
#[inline]
pub fn to_world(pose: &Transform, local_point: Vec3) -> Vec3 {
    pose.transform_point(local_point)
}
