//! Common types for the soft-body system: nodes, links, faces, clusters,
//! flag sets, and the scratch adjacency matrix used during topology builds.

use bevy::prelude::*;
use bitflags::bitflags;

bitflags! {
    /// Per-node state flags.
    ///
    /// # Flags
    /// * `PINNED` - node is anchored; its inverse mass is zero and the solver never moves it
    /// * `BOUNDARY` - node lies on an open mesh boundary (an edge with only one face)
    /// * `COLLIDING` - node was in contact with world geometry during the last step
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u32 {
        const PINNED = 1 << 0;
        const BOUNDARY = 1 << 1;
        const COLLIDING = 1 << 2;
    }
}

bitflags! {
    /// Collision handling modes for a soft body.
    ///
    /// # Flags
    /// * `WORLD` - nodes collide with rigid world geometry via spatial queries
    /// * `SOFT_BODY` - nodes collide with nodes of other soft bodies
    /// * `SELF` - nodes collide with non-linked nodes of the same body
    ///
    /// # Example
    /// ```
    /// use bevy_soft_dynamics::types::CollisionFlags;
    ///
    /// let cloth = CollisionFlags::WORLD | CollisionFlags::SELF;
    /// assert!(cloth.contains(CollisionFlags::WORLD));
    /// assert!(!cloth.contains(CollisionFlags::SOFT_BODY));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CollisionFlags: u32 {
        const WORLD = 1 << 0;
        const SOFT_BODY = 1 << 1;
        const SELF = 1 << 2;
    }
}

impl Default for CollisionFlags {
    /// All collision modes enabled.
    fn default() -> Self {
        CollisionFlags::WORLD | CollisionFlags::SOFT_BODY | CollisionFlags::SELF
    }
}

/// A point mass in a soft body.
///
/// Nodes carry the full kinematic state used by the solver: current and
/// previous positions, velocity, an external force accumulator, and mass.
/// The cached `normal` and `area` come from the adjacent faces and are
/// refreshed after every step.
///
/// # Fields
/// * `position` - current world-space position
/// * `prev_position` - position at the start of the current solver tick,
///   read by the swept collision pass
/// * `velocity` - linear velocity in m/s
/// * `force` - accumulated external force for this step, in newtons
/// * `mass` - node mass in kilograms
/// * `inv_mass` - inverse mass; zero for pinned nodes
/// * `normal` - area-weighted vertex normal
/// * `area` - one third of the total area of adjacent faces
/// * `flags` - per-node state flags
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_soft_dynamics::types::Node;
///
/// let mut node = Node::new(Vec3::new(0.0, 2.0, 0.0));
/// node.pin();
/// assert_eq!(node.inv_mass, 0.0);
/// ```
#[derive(Debug, Clone, Reflect)]
pub struct Node {
    pub position: Vec3,
    pub prev_position: Vec3,
    pub velocity: Vec3,
    pub force: Vec3,
    pub mass: f32,
    pub inv_mass: f32,
    pub normal: Vec3,
    pub area: f32,
    #[reflect(ignore)]
    pub flags: NodeFlags,
}

impl Node {
    /// Create a node at rest at the given position with unit mass.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            prev_position: position,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            mass: 1.0,
            inv_mass: 1.0,
            normal: Vec3::Y,
            area: 0.0,
            flags: NodeFlags::empty(),
        }
    }

    /// Set the node mass, keeping the inverse mass consistent.
    ///
    /// Pinned nodes keep an inverse mass of zero regardless of the stored mass.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
        if !self.flags.contains(NodeFlags::PINNED) {
            self.inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        }
    }

    /// Anchor the node in place. Its inverse mass becomes zero and the
    /// solver will never move it.
    pub fn pin(&mut self) {
        self.flags.insert(NodeFlags::PINNED);
        self.inv_mass = 0.0;
        self.velocity = Vec3::ZERO;
    }

    /// Release a pinned node, restoring mobility from its stored mass.
    pub fn unpin(&mut self) {
        self.flags.remove(NodeFlags::PINNED);
        self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
    }

    /// Whether the node is anchored.
    pub fn is_pinned(&self) -> bool {
        self.flags.contains(NodeFlags::PINNED)
    }
}

/// A distance constraint between two nodes.
///
/// Structural links come from mesh edges; bending links are added between
/// second-degree neighbors by `generate_bending_links` and use the material's
/// angular stiffness instead of its linear stiffness.
///
/// # Fields
/// * `nodes` - the two node indices
/// * `rest_length` - distance the constraint tries to maintain, in meters
/// * `material` - index into the body's material table
/// * `bending` - true for links created by bending-constraint generation
/// * `lambda` - accumulated Lagrange multiplier, reset every substep
#[derive(Debug, Clone, Reflect)]
pub struct Link {
    pub nodes: [u32; 2],
    pub rest_length: f32,
    pub material: u32,
    pub bending: bool,
    pub lambda: f32,
}

impl Link {
    /// Create a structural link between two nodes at the given rest length.
    pub fn new(a: u32, b: u32, rest_length: f32, material: u32) -> Self {
        Self {
            nodes: [a, b],
            rest_length,
            material,
            bending: false,
            lambda: 0.0,
        }
    }

    /// Whether the link connects the given pair, in either order.
    pub fn connects(&self, a: u32, b: u32) -> bool {
        (self.nodes[0] == a && self.nodes[1] == b) || (self.nodes[0] == b && self.nodes[1] == a)
    }
}

/// A triangle face over three nodes.
///
/// Faces define the body's surface: they drive area-weighted mass
/// distribution, normals, aerodynamic and pressure forces, and volume
/// computation for closed bodies.
#[derive(Debug, Clone, Reflect)]
pub struct Face {
    /// The three node indices, counter-clockwise when viewed from outside.
    pub nodes: [u32; 3],
    /// Triangle area at rest, in square meters.
    pub rest_area: f32,
    /// Index into the body's material table.
    pub material: u32,
}

impl Face {
    /// Create a face over three nodes with the given rest area.
    pub fn new(a: u32, b: u32, c: u32, rest_area: f32, material: u32) -> Self {
        Self {
            nodes: [a, b, c],
            rest_area,
            material,
        }
    }
}

/// A k-means grouping of nodes with a bounding sphere.
///
/// Cluster spheres merge into the body bounds the soft-soft broad phase
/// tests, so bodies that cannot touch never feed their nodes into the
/// contact grid.
#[derive(Debug, Clone, Default, Reflect)]
pub struct Cluster {
    /// Indices of the member nodes.
    pub nodes: Vec<u32>,
    /// Mean position of the member nodes.
    pub center: Vec3,
    /// Radius of the smallest sphere around `center` containing every member.
    pub radius: f32,
}

impl Cluster {
    /// Recompute the center and bounding radius from current node positions.
    pub fn refresh(&mut self, nodes: &[Node]) {
        if self.nodes.is_empty() {
            self.center = Vec3::ZERO;
            self.radius = 0.0;
            return;
        }
        let mut sum = Vec3::ZERO;
        for &i in &self.nodes {
            sum += nodes[i as usize].position;
        }
        self.center = sum / self.nodes.len() as f32;
        let mut radius_sq: f32 = 0.0;
        for &i in &self.nodes {
            radius_sq = radius_sq.max(nodes[i as usize].position.distance_squared(self.center));
        }
        self.radius = radius_sq.sqrt();
    }
}

/// Transient square boolean matrix for edge deduplication.
///
/// Sized by the maximum vertex index plus one, allocated for the duration of
/// a topology-building operation and dropped when it returns. Insertion is
/// symmetric: marking `(a, b)` also marks `(b, a)`.
///
/// # Example
/// ```
/// use bevy_soft_dynamics::types::AdjacencyMatrix;
///
/// let mut seen = AdjacencyMatrix::new(4);
/// assert!(seen.insert(0, 2));
/// assert!(!seen.insert(2, 0)); // already present in either order
/// assert!(seen.contains(0, 2));
/// ```
#[derive(Debug, Clone)]
pub struct AdjacencyMatrix {
    size: usize,
    cells: Vec<bool>,
}

impl AdjacencyMatrix {
    /// Allocate an `n x n` matrix with every cell clear.
    pub fn new(n: usize) -> Self {
        Self {
            size: n,
            cells: vec![false; n * n],
        }
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    /// Mark the pair as seen in both orders. Returns true if the pair was
    /// not marked before.
    pub fn insert(&mut self, a: usize, b: usize) -> bool {
        let ab = self.idx(a, b);
        if self.cells[ab] {
            return false;
        }
        let ba = self.idx(b, a);
        self.cells[ab] = true;
        self.cells[ba] = true;
        true
    }

    /// Whether the pair has been marked, in either order.
    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.cells[self.idx(a, b)]
    }
}
