//! Grab input intent.
//!
//! The host game translates its raw input (keys, mouse wheel, camera) into a
//! [`GrabIntent`] every frame. The controller systems consume it on the next
//! physics step.

use bevy::prelude::*;

/// Where the player is looking from, sampled once per tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    /// Camera position in world space.
    pub position: Vec3,
    /// Normalized look direction.
    pub forward: Vec3,
}

impl Viewpoint {
    /// Create a viewpoint. Returns `None` for a degenerate look direction.
    pub fn new(position: Vec3, forward: Vec3) -> Option<Self> {
        let forward = forward.try_normalize()?;
        position.is_finite().then_some(Self { position, forward })
    }

    /// Viewpoint from a camera transform (looks down its local -Z).
    pub fn from_transform(transform: &Transform) -> Option<Self> {
        Self::new(transform.translation, transform.forward().as_vec3())
    }

    /// Point at `distance` along the look direction.
    #[inline]
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.position + self.forward * distance
    }
}

/// Grab input for one controller.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_grab_controller::prelude::*;
///
/// let mut intent = GrabIntent::default();
/// intent.set_viewpoint(Vec3::ZERO, Vec3::NEG_Z);
/// intent.set_grab_pressed(true);
/// intent.add_scroll(-1.0);
/// assert!(intent.is_grab_pressed());
/// assert_eq!(intent.scroll, -1.0);
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct GrabIntent {
    /// Whether the grab button is currently held.
    ///
    /// A `false -> true` change attempts a grab, `true -> false` releases.
    pub grab_pressed: bool,
    /// Previous tick's `grab_pressed` (for edge detection).
    pub(crate) grab_pressed_prev: bool,
    /// Scroll delta accumulated since the last physics tick.
    pub scroll: f32,
    /// Current viewpoint; `None` when the camera is unavailable.
    pub viewpoint: Option<Viewpoint>,
}

/// Edge of the grab button observed on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabEdge {
    Pressed,
    Held,
    Released,
    Idle,
}

impl GrabIntent {
    /// Create an empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grab button state. Call this every frame.
    pub fn set_grab_pressed(&mut self, pressed: bool) {
        self.grab_pressed = pressed;
    }

    /// Check if the grab button is currently held.
    pub fn is_grab_pressed(&self) -> bool {
        self.grab_pressed
    }

    /// Accumulate a scroll delta (positive pulls the object closer).
    pub fn add_scroll(&mut self, delta: f32) {
        if delta.is_finite() {
            self.scroll += delta;
        }
    }

    /// Set the viewpoint from a position and look direction.
    ///
    /// A zero-length direction invalidates the viewpoint.
    pub fn set_viewpoint(&mut self, position: Vec3, forward: Vec3) {
        self.viewpoint = Viewpoint::new(position, forward);
    }

    /// Mark the viewpoint as unavailable.
    pub fn clear_viewpoint(&mut self) {
        self.viewpoint = None;
    }

    /// Take the accumulated scroll delta, leaving zero.
    pub(crate) fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll)
    }

    /// Advance edge detection by one tick.
    pub(crate) fn take_edge(&mut self) -> GrabEdge {
        let edge = match (self.grab_pressed_prev, self.grab_pressed) {
            (false, true) => GrabEdge::Pressed,
            (true, true) => GrabEdge::Held,
            (true, false) => GrabEdge::Released,
            (false, false) => GrabEdge::Idle,
        };
        self.grab_pressed_prev = self.grab_pressed;
        edge
    }
}
