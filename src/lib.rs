//! # Bevy Soft Dynamics
//!
//! Deformable-body simulation plugin for Bevy 0.18.
//!
//! ## Features
//! - Triangle-mesh to soft-body conversion with vertex welding
//! - Substepped position-based solver: stretch, bending, volume, pressure
//! - World collision through avian3d raycasts, plus node-node and self collision
//! - Named presets, pinning, aerodynamics, sleeping, binary snapshots
//! - Render-mesh geometry sync and debug gizmos
//!
//! ## Quick Start
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_soft_dynamics::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(SoftDynamicsPluginGroup)
//!         .run();
//! }
//! ```

pub mod components;
pub mod events;
pub mod resources;
pub mod snapshot;
pub mod systems;
pub mod trimesh;
pub mod types;

pub mod prelude {
    pub use crate::components::*;
    pub use crate::events::*;
    pub use crate::resources::*;
    pub use crate::snapshot::{SnapshotError, SoftBodySnapshot};
    pub use crate::trimesh::TriMeshError;
    pub use crate::types::*;
    pub use crate::SoftDynamicsPluginGroup;
    pub use crate::{SoftDynamicsCorePlugin, SoftDynamicsMeshPlugin, SoftDynamicsSurfacePlugin};
}

use bevy::prelude::*;

/// Main plugin group that includes all soft-body subsystems.
///
/// This plugin group bundles together the core soft-body functionality:
/// - Conversion, solving, collision, and sleep management
/// - Contact response overrides for rigid surfaces
/// - Render-mesh geometry sync
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_soft_dynamics::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(DefaultPlugins)
///         .add_plugins(SoftDynamicsPluginGroup)
///         .run();
/// }
/// ```
#[derive(Default)]
pub struct SoftDynamicsPluginGroup;

impl PluginGroup for SoftDynamicsPluginGroup {
    /// Builds the plugin group by adding all soft-body plugins.
    ///
    /// # Arguments
    /// * `self` - The SoftDynamicsPluginGroup instance
    ///
    /// # Returns
    /// A PluginGroupBuilder with all soft-body plugins added
    fn build(self) -> bevy::app::PluginGroupBuilder {
        bevy::app::PluginGroupBuilder::start::<Self>()
            .add(SoftDynamicsCorePlugin)
            .add(SoftDynamicsSurfacePlugin)
            .add(SoftDynamicsMeshPlugin)
            .add(SoftDynamicsDebugPlugin)
    }
}

/// Core simulation plugin (conversion, solver, collision, sleep).
///
/// This plugin runs the fixed-timestep simulation pipeline:
/// - Spawn requests are converted into simulated bodies
/// - External forces accumulate per node (gravity, drag, wind, pressure)
/// - The substepped solver projects stretch, bending, and volume constraints
/// - Collision passes resolve world and node-node contacts
/// - Resting bodies fall asleep
///
/// # Systems
/// - `spawn_soft_bodies` - Converts spawn requests into body entities
/// - `apply_external_forces` - Accumulates per-node forces
/// - `solve_soft_bodies` - Runs the substepped constraint solver
/// - `begin_contact_pass` - Clears per-node contact flags
/// - `collide_with_world` - Raycasts nodes against rigid geometry
/// - `collide_soft_bodies` - Resolves node-node and self contacts
/// - `update_sleep_state` - Deactivates resting bodies
pub struct SoftDynamicsCorePlugin;

impl Plugin for SoftDynamicsCorePlugin {
    /// Builds the core plugin by registering components and adding systems.
    ///
    /// This method registers all necessary components with reflection,
    /// initializes required resources, adds messages, and schedules the
    /// simulation pipeline.
    ///
    /// # Arguments
    /// * `app` - Mutable reference to the Bevy App
    fn build(&self, app: &mut App) {
        app.register_type::<components::SoftBody>()
            .register_type::<components::SoftBodyMaterial>()
            .register_type::<components::SoftBodySettings>()
            .init_resource::<resources::SoftDynamicsEnvironment>()
            .init_resource::<resources::SoftDynamicsConfig>()
            .insert_resource(resources::SoftBodyPresets::with_defaults())
            .add_message::<events::SpawnSoftBody>()
            .add_message::<events::SoftBodyContact>()
            .add_message::<events::SoftBodyAsleep>()
            .add_message::<events::SoftBodyWoken>();

        // 3D physics pipeline
        #[cfg(feature = "dim3")]
        {
            use avian3d::prelude::SpatialQueryPipeline;
            app.add_systems(
                FixedUpdate,
                (
                    systems::lifecycle::spawn_soft_bodies,
                    systems::forces::apply_external_forces,
                    systems::solver::solve_soft_bodies,
                    systems::collision::begin_contact_pass,
                    systems::collision::collide_with_world
                        .run_if(resource_exists::<SpatialQueryPipeline>),
                    systems::collision::collide_soft_bodies,
                    systems::lifecycle::update_sleep_state,
                )
                    .chain(),
            );
        }

        // Headless pipeline without a physics backend
        #[cfg(not(feature = "dim3"))]
        app.add_systems(
            FixedUpdate,
            (
                systems::lifecycle::spawn_soft_bodies,
                systems::forces::apply_external_forces,
                systems::solver::solve_soft_bodies,
                systems::collision::begin_contact_pass,
                systems::collision::collide_with_world,
                systems::collision::collide_soft_bodies,
                systems::lifecycle::update_sleep_state,
            )
                .chain(),
        );
    }
}

/// Surface interaction plugin (contact response overrides and feedback).
///
/// Registers the component that rigid entities carry to override how
/// soft-body nodes respond on contact: friction, restitution, and how much
/// of the contact impulse feeds back into the rigid body. With a physics
/// backend the feedback pass pushes reported contact impulses into the hit
/// entities' velocities.
///
/// # Systems
/// - `apply_contact_feedback` - Applies contact reactions to rigid bodies
pub struct SoftDynamicsSurfacePlugin;

impl Plugin for SoftDynamicsSurfacePlugin {
    /// Builds the surface interaction plugin by registering components and
    /// adding systems.
    ///
    /// # Arguments
    /// * `app` - Mutable reference to the Bevy App
    fn build(&self, app: &mut App) {
        app.register_type::<components::SoftContactSurface>();

        #[cfg(feature = "dim3")]
        app.add_systems(FixedUpdate, systems::collision::apply_contact_feedback);
    }
}

/// Mesh sync plugin (render geometry follows the simulation).
///
/// This plugin copies simulated node positions and normals back into the
/// render meshes of bodies spawned from mesh assets.
///
/// # Systems
/// - `sync_render_meshes` - Writes node geometry into mesh attributes
pub struct SoftDynamicsMeshPlugin;

impl Plugin for SoftDynamicsMeshPlugin {
    /// Builds the mesh sync plugin by registering components and adding
    /// systems.
    ///
    /// # Arguments
    /// * `app` - Mutable reference to the Bevy App
    fn build(&self, app: &mut App) {
        app.register_type::<components::SoftBodyRenderTarget>()
            .add_systems(Update, systems::sync::sync_render_meshes);
    }
}

/// Debug plugin for soft-body visualization.
pub struct SoftDynamicsDebugPlugin;

impl Plugin for SoftDynamicsDebugPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, systems::debug::draw_soft_body_debug);
    }
}

#[cfg(test)]
mod conversion_pipeline_tests;
