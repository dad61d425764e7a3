//! # `msg_grab_controller`
//!
//! A first-person physics grab controller with physics backend abstraction.
//!
//! This crate lets a player pick up, carry and release dynamic rigid bodies
//! so that they feel like they have weight:
//! - Bodies are sorted into weight classes that scale every grab constant
//! - A kinematic anchor ("virtual hand") scans surfaces and carries the grab
//! - Grabs engage in steps (stabilize, then ramp a spring constraint in)
//! - Held bodies are steered by a center-of-mass force with soft orientation
//!   control, so heavy objects lag and sway while light ones snap
//! - Scroll input pushes the held body away or pulls it closer
//! - Abstracts the physics backend for easy swapping (Rapier3D included)
//!
//! ## Architecture
//!
//! Every physics step runs, in order:
//! 1. Backend preparation (clear last step's forces)
//! 2. Input: held-body liveness, engage sequence, grab/release edges, scroll
//! 3. Anchor tracking (scan surfaces or follow the held body)
//! 4. Hold control (anchor motion, forces, torques) and marker sync
//! 5. Backend final application (write accumulated forces)
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use msg_grab_controller::prelude::*;
//!
//! // Controller components for a first-person player
//! let controller = GrabController::new();
//! let config = GrabConfig::player();
//! let mut intent = GrabIntent::default();
//! intent.set_viewpoint(Vec3::new(0.0, 1.7, 0.0), Vec3::NEG_Z);
//!
//! // Spawn them on the player entity; required components fill in the rest
//! ```

use bevy::log::warn;
use bevy::prelude::*;

pub mod anchor;
pub mod backend;
pub mod collision;
pub mod config;
pub mod distance;
pub mod error;
pub mod grabbable;
pub mod hold;
pub mod intent;
pub mod lifecycle;
pub mod session;
pub mod state;
pub mod systems;
pub mod weight;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::anchor::{AnchorMode, AnchorTracker};
    pub use crate::backend::{BodyProperties, GrabPhysicsBackend, SpringParams};
    pub use crate::collision::RayHit;
    pub use crate::config::GrabConfig;
    pub use crate::distance::HoldDistance;
    pub use crate::error::{ConfigError, GrabError};
    pub use crate::grabbable::Grabbable;
    pub use crate::intent::{GrabIntent, Viewpoint};
    pub use crate::lifecycle::{
        end_grab, release, start_grab, try_grab, GrabController, GrabReleased, GrabStarted, GrabState,
        ReleaseReason,
    };
    pub use crate::state::{Held, Holding};
    pub use crate::weight::{WeightClass, WeightTuning};
    pub use crate::{GrabControllerPlugin, GrabSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dGrabbableBundle};
}

/// System sets of the grab controller, run in this order in `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrabSet {
    /// Backend bookkeeping before any controller logic.
    Preparation,
    /// Grab lifecycle and scroll input.
    Input,
    /// Anchor scanning and tracking.
    Anchor,
    /// Hold forces and state markers.
    Hold,
    /// Backend application of accumulated forces.
    FinalApplication,
}

/// Main plugin for the grab controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (raycasting, constraints, force application).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_grab_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(GrabControllerPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct GrabControllerPlugin<B: backend::GrabPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::GrabPhysicsBackend> Default for GrabControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::GrabPhysicsBackend> Plugin for GrabControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<lifecycle::GrabController>();
        app.register_type::<config::GrabConfig>();
        app.register_type::<intent::GrabIntent>();
        app.register_type::<anchor::AnchorTracker>();
        app.register_type::<distance::HoldDistance>();
        app.register_type::<grabbable::Grabbable>();
        app.register_type::<state::Holding>();
        app.register_type::<state::Held>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                GrabSet::Preparation,
                GrabSet::Input,
                GrabSet::Anchor,
                GrabSet::Hold,
                GrabSet::FinalApplication,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                warn_invalid_config,
                systems::check_held_bodies::<B>,
                systems::advance_grab_sessions::<B>,
                systems::process_grab_input::<B>,
                systems::apply_scroll_input::<B>,
            )
                .chain()
                .in_set(GrabSet::Input),
        );
        app.add_systems(
            FixedUpdate,
            systems::update_anchor_tracking::<B>.in_set(GrabSet::Anchor),
        );
        app.add_systems(
            FixedUpdate,
            (systems::apply_hold_forces::<B>, systems::sync_state_markers)
                .chain()
                .in_set(GrabSet::Hold),
        );
    }
}

/// Log configs that fail validation when they are added or changed.
fn warn_invalid_config(q: Query<(Entity, &config::GrabConfig), Changed<config::GrabConfig>>) {
    for (entity, config) in &q {
        if let Err(err) = config.validate() {
            warn!("invalid grab config on {entity}: {err}");
        }
    }
}
