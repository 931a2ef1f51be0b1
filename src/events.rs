//! Events for the soft-body system.
//!
//! Note: In Bevy 0.18, buffered events use the `Message` trait instead of `Event`.

use bevy::ecs::message::Message;
use bevy::prelude::*;

use crate::components::{SoftBodyMaterial, SoftBodySettings};

/// Where the triangle mesh for a spawned body comes from.
///
/// # Variants
/// * `Buffers` - raw flat position and index buffers
/// * `Mesh` - a mesh asset, welded before conversion
///
/// # Example
/// ```
/// use bevy_soft_dynamics::events::SoftBodySource;
///
/// let source = SoftBodySource::Buffers {
///     positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
///     indices: vec![0, 1, 2],
/// };
/// ```
#[derive(Clone)]
pub enum SoftBodySource {
    /// Raw flat buffers: `positions` holds xyz triplets, `indices` triangles
    Buffers {
        positions: Vec<f32>,
        indices: Vec<u32>,
    },
    /// A mesh asset; coincident vertices are welded before conversion
    Mesh(Handle<Mesh>),
}

/// Event requesting a soft body to be built and spawned.
///
/// This event is consumed by the spawn system, which converts the source
/// geometry, applies the named preset plus any overrides, and inserts the
/// finished body into the world.
///
/// # Fields
/// * `source` - triangle mesh the body is built from
/// * `transform` - world placement applied to the converted body
/// * `preset` - name of the preset looked up in `SoftBodyPresets`
/// * `target` - existing entity to attach the body to, instead of a new one
/// * `total_mass` - overrides the preset's mass when set
/// * `material` - overrides the preset's material when set
/// * `settings` - overrides the preset's settings when set
/// * `pinned_nodes` - node indices to pin after placement
/// * `pin_direction` - pins the nodes on the body's extreme side along this
///   direction after placement
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_soft_dynamics::events::SpawnSoftBody;
///
/// let spawn = SpawnSoftBody::from_buffers(
///     vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
///     vec![0, 1, 2],
/// )
/// .with_transform(Transform::from_xyz(0.0, 5.0, 0.0))
/// .with_preset("Cloth")
/// .with_total_mass(0.5);
/// ```
#[derive(Message, Clone)]
pub struct SpawnSoftBody {
    /// Triangle mesh the body is built from
    pub source: SoftBodySource,
    /// World placement applied to the converted body
    pub transform: Transform,
    /// Preset name for material, settings, and topology post-processing
    pub preset: String,
    /// Existing entity to attach the body to; a fresh entity when `None`
    pub target: Option<Entity>,
    /// Overrides the preset's total mass (kg)
    pub total_mass: Option<f32>,
    /// Overrides the preset's material
    pub material: Option<SoftBodyMaterial>,
    /// Overrides the preset's settings
    pub settings: Option<SoftBodySettings>,
    /// Node indices to pin after placement
    pub pinned_nodes: Vec<u32>,
    /// Pins the nodes on the extreme side along this direction
    pub pin_direction: Option<Vec3>,
}

impl Default for SpawnSoftBody {
    /// Creates a default SpawnSoftBody with empty buffers and the jelly
    /// preset. The spawn system rejects empty geometry, so a usable event
    /// always goes through [`SpawnSoftBody::from_buffers`] or
    /// [`SpawnSoftBody::from_mesh`].
    ///
    /// # Returns
    /// A new SpawnSoftBody instance with default values
    fn default() -> Self {
        Self {
            source: SoftBodySource::Buffers {
                positions: Vec::new(),
                indices: Vec::new(),
            },
            transform: Transform::IDENTITY,
            preset: "Jelly".to_string(),
            target: None,
            total_mass: None,
            material: None,
            settings: None,
            pinned_nodes: Vec::new(),
            pin_direction: None,
        }
    }
}

impl SpawnSoftBody {
    /// Creates a spawn request from raw flat buffers.
    ///
    /// # Arguments
    /// * `positions` - vertex coordinates as xyz triplets
    /// * `indices` - triangle corners, three per triangle
    ///
    /// # Returns
    /// A new SpawnSoftBody instance for the given geometry
    pub fn from_buffers(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            source: SoftBodySource::Buffers { positions, indices },
            ..Default::default()
        }
    }

    /// Creates a spawn request from a mesh asset. The mesh also becomes the
    /// render target that follows the simulated body.
    ///
    /// # Arguments
    /// * `mesh` - handle of the mesh to convert and deform
    ///
    /// # Returns
    /// A new SpawnSoftBody instance for the given mesh
    pub fn from_mesh(mesh: Handle<Mesh>) -> Self {
        Self {
            source: SoftBodySource::Mesh(mesh),
            ..Default::default()
        }
    }

    /// Sets the world placement of the body.
    ///
    /// # Arguments
    /// * `transform` - transform applied to the converted body
    ///
    /// # Returns
    /// The modified SpawnSoftBody instance for method chaining
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the preset name.
    ///
    /// # Arguments
    /// * `preset` - name looked up in `SoftBodyPresets`
    ///
    /// # Returns
    /// The modified SpawnSoftBody instance for method chaining
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Attaches the body to an existing entity instead of spawning a new
    /// one. Useful when the entity already carries render components.
    pub fn with_target(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    /// Overrides the preset's total mass.
    pub fn with_total_mass(mut self, total_mass: f32) -> Self {
        self.total_mass = Some(total_mass);
        self
    }

    /// Overrides the preset's material.
    pub fn with_material(mut self, material: SoftBodyMaterial) -> Self {
        self.material = Some(material);
        self
    }

    /// Overrides the preset's settings.
    pub fn with_settings(mut self, settings: SoftBodySettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Pins the listed nodes once the body is placed.
    pub fn with_pinned_nodes(mut self, nodes: Vec<u32>) -> Self {
        self.pinned_nodes = nodes;
        self
    }

    /// Pins the nodes on the body's extreme side along `direction` once the
    /// body is placed.
    pub fn with_pinned_side(mut self, direction: Vec3) -> Self {
        self.pin_direction = Some(direction);
        self
    }
}

/// What a soft-body node collided with.
///
/// # Variants
/// * `World` - rigid world geometry found by raycast
/// * `SoftBody` - a node of another soft body
/// * `SelfContact` - a non-neighboring node of the same body
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Rigid world geometry found by raycast
    World,
    /// A node of another soft body
    SoftBody,
    /// A non-neighboring node of the same body
    SelfContact,
}

/// Event fired when a soft-body node touches something.
///
/// Sent for each contact the collision pass resolves, so gameplay can react
/// to impacts without scanning node state.
///
/// # Fields
/// * `body` - soft-body entity owning the node
/// * `surface` - entity that was touched; the same entity for self contacts
/// * `node` - index of the colliding node
/// * `point` - world-space contact point
/// * `normal` - contact normal pointing away from the surface
/// * `impulse` - magnitude of the corrective impulse (kg·m/s)
/// * `kind` - which collision mode produced the contact
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_soft_dynamics::events::{ContactKind, SoftBodyContact};
///
/// let contact = SoftBodyContact {
///     body: Entity::PLACEHOLDER,
///     surface: Entity::PLACEHOLDER,
///     node: 0,
///     point: Vec3::ZERO,
///     normal: Vec3::Y,
///     impulse: 0.2,
///     kind: ContactKind::World,
/// };
/// ```
#[derive(Message, Clone)]
pub struct SoftBodyContact {
    /// Soft-body entity owning the node
    pub body: Entity,
    /// Entity that was touched
    pub surface: Entity,
    /// Index of the colliding node
    pub node: u32,
    /// Contact point in world space
    pub point: Vec3,
    /// Contact normal pointing away from the surface
    pub normal: Vec3,
    /// Magnitude of the corrective impulse (kg·m/s)
    pub impulse: f32,
    /// Which collision mode produced the contact
    pub kind: ContactKind,
}

/// Event fired when a body falls asleep.
///
/// # Fields
/// * `body` - the deactivated soft-body entity
#[derive(Message, Clone)]
pub struct SoftBodyAsleep {
    /// The deactivated soft-body entity
    pub body: Entity,
}

/// Event fired when a sleeping body is woken, either explicitly or by an
/// incoming contact.
///
/// # Fields
/// * `body` - the reactivated soft-body entity
#[derive(Message, Clone)]
pub struct SoftBodyWoken {
    /// The reactivated soft-body entity
    pub body: Entity,
}
