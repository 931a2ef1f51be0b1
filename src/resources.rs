//! Global resources for the soft-body system.

use bevy::prelude::*;

use crate::components::{SoftBodyMaterial, SoftBodySettings};
use crate::types::CollisionFlags;

/// Global environment settings affecting all soft bodies.
///
/// This resource contains the environmental parameters every awake body is
/// subject to: gravity, the surrounding medium, and wind.
///
/// # Fields
/// * `gravity` - Gravity vector in meters per second squared
/// * `air_density` - Density of the surrounding medium in kg/m³, drives drag
/// * `wind` - Steady wind velocity vector in meters per second
/// * `turbulence` - Standard deviation of random gusts added to the wind (m/s)
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_soft_dynamics::resources::SoftDynamicsEnvironment;
///
/// let env = SoftDynamicsEnvironment {
///     gravity: Vec3::new(0.0, -9.81, 0.0),
///     air_density: 1.1,
///     wind: Vec3::new(4.0, 0.0, 0.0),
///     turbulence: 0.5,
/// };
/// ```
#[derive(Resource, Reflect, Clone)]
#[reflect(Resource)]
pub struct SoftDynamicsEnvironment {
    /// Gravity vector (m/s²)
    pub gravity: Vec3,
    /// Density of the surrounding medium (kg/m³)
    pub air_density: f32,
    /// Steady wind velocity (m/s)
    pub wind: Vec3,
    /// Standard deviation of random gusts added to the wind (m/s)
    pub turbulence: f32,
}

impl Default for SoftDynamicsEnvironment {
    /// Creates a default environment with Earth-like conditions.
    ///
    /// Default values:
    /// - Gravity: 9.81 m/s² downward
    /// - Air density: 1.225 kg/m³ (sea level standard)
    /// - No wind, no turbulence
    ///
    /// # Returns
    /// A new SoftDynamicsEnvironment instance with default values
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            air_density: 1.225, // Standard at sea level
            wind: Vec3::ZERO,
            turbulence: 0.0,
        }
    }
}

/// Global configuration for the soft-body system.
///
/// This resource contains configuration options that control the solver and
/// the lifecycle of every body in the scene.
///
/// # Fields
/// * `substeps` - Number of solver substeps per fixed tick
/// * `max_velocity` - Node speed ceiling in meters per second
/// * `sleep_velocity` - Speed below which a body accumulates sleep time (m/s)
/// * `sleep_delay` - Seconds a body must stay slow before it sleeps
/// * `seed` - Seed for constraint shuffling and wind gusts
/// * `debug_draw` - Whether to enable gizmo visualization of bodies
///
/// # Example
/// ```
/// use bevy_soft_dynamics::resources::SoftDynamicsConfig;
///
/// let config = SoftDynamicsConfig {
///     substeps: 8,
///     debug_draw: true,
///     ..Default::default()
/// };
/// ```
#[derive(Resource, Reflect, Clone)]
#[reflect(Resource)]
pub struct SoftDynamicsConfig {
    /// Solver substeps per fixed tick
    pub substeps: u32,
    /// Node speed ceiling (m/s); keeps blowups recoverable
    pub max_velocity: f32,
    /// Speed below which a body accumulates sleep time (m/s)
    pub sleep_velocity: f32,
    /// Seconds a body must stay slow before it sleeps
    pub sleep_delay: f32,
    /// Seed for constraint shuffling and wind gusts
    pub seed: u64,
    /// Debug visualization
    pub debug_draw: bool,
}

impl Default for SoftDynamicsConfig {
    /// Creates a default SoftDynamicsConfig with recommended settings.
    ///
    /// Default values:
    /// - 4 substeps per fixed tick
    /// - 100 m/s velocity ceiling
    /// - Sleep below 0.05 m/s sustained for 1 second
    /// - Seed 0
    /// - Debug drawing disabled
    ///
    /// # Returns
    /// A new SoftDynamicsConfig instance with default values
    fn default() -> Self {
        Self {
            substeps: 4,
            max_velocity: 100.0,
            sleep_velocity: 0.05,
            sleep_delay: 1.0,
            seed: 0,
            debug_draw: false,
        }
    }
}

/// Soft-body preset definitions resource.
///
/// This resource contains predefined body configurations that can be used to
/// quickly set up common soft-body types with consistent parameters.
///
/// # Fields
/// * `presets` - Vector of available soft-body preset configurations
///
/// # Example
/// ```
/// use bevy_soft_dynamics::resources::SoftBodyPresets;
///
/// let presets = SoftBodyPresets::with_defaults();
/// let jelly = presets.get("Jelly").unwrap();
/// assert!(jelly.bending_hops > 0);
/// ```
#[derive(Resource, Default)]
pub struct SoftBodyPresets {
    pub presets: Vec<SoftBodyPreset>,
}

/// A preset soft-body configuration.
///
/// Bundles the material, settings, and topology post-processing applied when
/// a body is spawned through [`crate::events::SpawnSoftBody`].
///
/// # Fields
/// * `name` - Human-readable name for the preset
/// * `material` - Constraint stiffness coefficients
/// * `settings` - Per-body simulation settings
/// * `total_mass` - Mass distributed over the body's nodes (kg)
/// * `mass_from_faces` - Weight node masses by adjacent surface area
/// * `bending_hops` - Graph distance for generated bending links; 0 disables
/// * `clusters` - Number of collision-culling clusters to build
/// * `randomize` - Shuffle constraint order after construction
///
/// # Example
/// ```
/// use bevy_soft_dynamics::resources::SoftBodyPreset;
/// use bevy_soft_dynamics::components::SoftBodyMaterial;
///
/// let preset = SoftBodyPreset {
///     name: "Rubber".to_string(),
///     material: SoftBodyMaterial::new(0.8, 0.6, 0.9),
///     total_mass: 3.0,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct SoftBodyPreset {
    pub name: String,
    pub material: SoftBodyMaterial,
    pub settings: SoftBodySettings,
    pub total_mass: f32,
    pub mass_from_faces: bool,
    pub bending_hops: u32,
    pub clusters: usize,
    pub randomize: bool,
}

impl Default for SoftBodyPreset {
    /// Creates a default SoftBodyPreset: the classic jelly conversion.
    ///
    /// Default values:
    /// - Name: "Default"
    /// - Jelly material (0.3 linear, 0.2 angular, 0.5 volume)
    /// - Stock settings (7 position iterations, full friction)
    /// - 1.5 kg distributed by surface area
    /// - Bending links at distance 2
    /// - 8 clusters, shuffled constraints
    ///
    /// # Returns
    /// A new SoftBodyPreset instance with default values
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            material: SoftBodyMaterial::new(0.3, 0.2, 0.5),
            settings: SoftBodySettings::default(),
            total_mass: 1.5,
            mass_from_faces: true,
            bending_hops: 2,
            clusters: 8,
            randomize: true,
        }
    }
}

impl SoftBodyPresets {
    /// Creates a SoftBodyPresets instance with default body configurations.
    ///
    /// This method returns a collection of commonly used presets:
    /// - Cloth: open sheet, light, bending links, no volume constraint
    /// - Jelly: the stock trimesh conversion, wobbly and self-colliding
    /// - Pressurized: closed shell inflated by internal pressure
    /// - Stiff: nearly rigid body that deforms only under load
    ///
    /// # Returns
    /// A new SoftBodyPresets instance with default configurations
    pub fn with_defaults() -> Self {
        Self {
            presets: vec![
                SoftBodyPreset {
                    name: "Cloth".to_string(),
                    material: SoftBodyMaterial::new(0.09, 0.09, 1.0),
                    settings: SoftBodySettings::default()
                        .with_position_iterations(10)
                        .with_friction(0.5)
                        .with_margin(0.05)
                        .with_collision(CollisionFlags::WORLD | CollisionFlags::SELF),
                    total_mass: 1.0,
                    mass_from_faces: true,
                    bending_hops: 2,
                    clusters: 4,
                    randomize: true,
                },
                SoftBodyPreset {
                    name: "Jelly".to_string(),
                    ..Default::default()
                },
                SoftBodyPreset {
                    name: "Pressurized".to_string(),
                    material: SoftBodyMaterial::new(0.09, 0.09, 0.9),
                    settings: SoftBodySettings::default()
                        .with_position_iterations(20)
                        .with_velocity_iterations(20)
                        .with_pressure(250.0)
                        .with_friction(0.99)
                        .with_sleep(false),
                    total_mass: 2.0,
                    mass_from_faces: true,
                    bending_hops: 0,
                    clusters: 1,
                    randomize: true,
                },
                SoftBodyPreset {
                    name: "Stiff".to_string(),
                    material: SoftBodyMaterial::new(0.9, 0.9, 0.9),
                    settings: SoftBodySettings::default().with_position_iterations(20),
                    total_mass: 1.0,
                    mass_from_faces: true,
                    bending_hops: 2,
                    clusters: 8,
                    randomize: true,
                },
            ],
        }
    }

    /// Looks up a preset by name.
    ///
    /// # Arguments
    /// * `name` - Preset name, case-sensitive
    ///
    /// # Returns
    /// The preset if one with that name exists
    pub fn get(&self, name: &str) -> Option<&SoftBodyPreset> {
        self.presets.iter().find(|p| p.name == name)
    }
}
