//! Core components for the soft-body system.

use std::collections::VecDeque;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::trimesh::{
    edge_key, triangle_area, Result, TriMeshError, MIN_FACE_AREA, MIN_LINK_LENGTH,
};
use crate::types::{AdjacencyMatrix, Cluster, CollisionFlags, Face, Link, Node};

/// Stiffness below this is clamped so compliance stays finite.
pub const MIN_STIFFNESS: f32 = 1e-3;

/// Scale factor mapping `[0, 1]` stiffness coefficients to solver compliance.
const STIFFNESS_SCALE: f32 = 1e4;

/// Smallest mass a free node can receive from mass distribution.
const MIN_NODE_MASS: f32 = 1e-4;

/// Iteration cap for cluster k-means refinement.
const MAX_KMEANS_ITERATIONS: usize = 64;

/// Material coefficients for soft-body constraints.
///
/// Each coefficient lives in `[0, 1]` where 1.0 means rigid. Structural links
/// built from mesh edges use the linear coefficient, bending links the
/// angular one, and the volume constraint of closed bodies the volume one.
///
/// # Fields
/// * `linear_stiffness` - stretch resistance of structural links
/// * `angular_stiffness` - resistance of bending links
/// * `volume_stiffness` - volume preservation of closed bodies
///
/// # Example
/// ```
/// use bevy_soft_dynamics::components::SoftBodyMaterial;
///
/// let jelly = SoftBodyMaterial::new(0.3, 0.2, 0.5);
/// assert!(jelly.linear_compliance() > SoftBodyMaterial::default().linear_compliance());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct SoftBodyMaterial {
    /// Stretch resistance of structural links, `[0, 1]`
    pub linear_stiffness: f32,
    /// Resistance of bending links, `[0, 1]`
    pub angular_stiffness: f32,
    /// Volume preservation of closed bodies, `[0, 1]`
    pub volume_stiffness: f32,
}

impl Default for SoftBodyMaterial {
    /// Fully rigid coefficients, the engine's default material.
    fn default() -> Self {
        Self {
            linear_stiffness: 1.0,
            angular_stiffness: 1.0,
            volume_stiffness: 1.0,
        }
    }
}

impl SoftBodyMaterial {
    /// Creates a material with the given stiffness coefficients, each
    /// clamped to `[MIN_STIFFNESS, 1]`.
    ///
    /// # Arguments
    /// * `linear` - stretch resistance of structural links
    /// * `angular` - resistance of bending links
    /// * `volume` - volume preservation of closed bodies
    pub fn new(linear: f32, angular: f32, volume: f32) -> Self {
        Self {
            linear_stiffness: linear.clamp(MIN_STIFFNESS, 1.0),
            angular_stiffness: angular.clamp(MIN_STIFFNESS, 1.0),
            volume_stiffness: volume.clamp(MIN_STIFFNESS, 1.0),
        }
    }

    /// Solver compliance of structural links. Zero when fully stiff.
    pub fn linear_compliance(&self) -> f32 {
        compliance_from_stiffness(self.linear_stiffness)
    }

    /// Solver compliance of bending links.
    pub fn angular_compliance(&self) -> f32 {
        compliance_from_stiffness(self.angular_stiffness)
    }

    /// Solver compliance of the volume constraint.
    pub fn volume_compliance(&self) -> f32 {
        compliance_from_stiffness(self.volume_stiffness)
    }
}

fn compliance_from_stiffness(stiffness: f32) -> f32 {
    let k = stiffness.clamp(MIN_STIFFNESS, 1.0);
    (1.0 - k) / (k * STIFFNESS_SCALE)
}

/// Per-body simulation settings.
///
/// Solver iteration counts, collision mode flags, and scalar response
/// coefficients. Every spawned body carries one of these; presets in
/// [`crate::resources::SoftBodyPresets`] bundle common configurations.
///
/// # Fields
/// * `position_iterations` - constraint sweeps per substep
/// * `velocity_iterations` - velocity smoothing sweeps after the position solve
/// * `collision` - which collision modes are active for this body
/// * `friction` - tangential velocity retained fraction lost on contact, `[0, 1]`
/// * `damping` - global velocity damping per second, `[0, 1]`
/// * `pressure` - internal gauge pressure for closed bodies
/// * `margin` - collision skin radius around each node (meters)
/// * `can_sleep` - whether the body may deactivate at rest
///
/// # Example
/// ```
/// use bevy_soft_dynamics::components::SoftBodySettings;
///
/// let settings = SoftBodySettings::default()
///     .with_position_iterations(20)
///     .with_pressure(250.0);
/// assert_eq!(settings.position_iterations, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct SoftBodySettings {
    /// Constraint sweeps per substep
    pub position_iterations: u32,
    /// Velocity smoothing sweeps after the position solve
    pub velocity_iterations: u32,
    /// Active collision modes
    #[reflect(ignore)]
    #[serde(with = "collision_flags_as_bits")]
    pub collision: CollisionFlags,
    /// Fraction of tangential velocity lost on contact, `[0, 1]`
    pub friction: f32,
    /// Global velocity damping per second, `[0, 1]`
    pub damping: f32,
    /// Internal gauge pressure for closed bodies
    pub pressure: f32,
    /// Collision skin radius around each node (meters)
    pub margin: f32,
    /// Whether the body may deactivate at rest
    pub can_sleep: bool,
}

impl Default for SoftBodySettings {
    /// Creates default settings matching the engine's stock soft body.
    ///
    /// Default values:
    /// - 7 position iterations, 0 velocity iterations
    /// - all collision modes enabled
    /// - full contact friction, no damping, no pressure
    /// - 0.04 m collision margin
    /// - sleeping allowed
    fn default() -> Self {
        Self {
            position_iterations: 7,
            velocity_iterations: 0,
            collision: CollisionFlags::default(),
            friction: 1.0,
            damping: 0.0,
            pressure: 0.0,
            margin: 0.04,
            can_sleep: true,
        }
    }
}

impl SoftBodySettings {
    /// Builder pattern: set constraint sweeps per substep.
    pub fn with_position_iterations(mut self, iterations: u32) -> Self {
        self.position_iterations = iterations;
        self
    }

    /// Builder pattern: set velocity smoothing sweeps per substep.
    pub fn with_velocity_iterations(mut self, iterations: u32) -> Self {
        self.velocity_iterations = iterations;
        self
    }

    /// Builder pattern: set the collision mode flags.
    pub fn with_collision(mut self, flags: CollisionFlags) -> Self {
        self.collision = flags;
        self
    }

    /// Builder pattern: set contact friction, clamped to `[0, 1]`.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.clamp(0.0, 1.0);
        self
    }

    /// Builder pattern: set per-second velocity damping, clamped to `[0, 1]`.
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Builder pattern: set internal gauge pressure (closed bodies only).
    pub fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure;
        self
    }

    /// Builder pattern: set the collision skin radius.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    /// Builder pattern: allow or forbid deactivation at rest.
    pub fn with_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }
}

mod collision_flags_as_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::CollisionFlags;

    pub fn serialize<S: Serializer>(
        flags: &CollisionFlags,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(flags.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<CollisionFlags, D::Error> {
        Ok(CollisionFlags::from_bits_truncate(u32::deserialize(
            deserializer,
        )?))
    }
}

/// A deformable body: point masses connected by links and faces.
///
/// Built from a triangle mesh by [`SoftBody::from_trimesh`] or
/// [`SoftBody::from_mesh`] and owned by the ECS world once inserted on an
/// entity. The solver steps every awake body each `FixedUpdate`.
///
/// # Fields
/// * `nodes` - point masses
/// * `links` - distance constraints, structural and bending
/// * `faces` - surface triangles
/// * `materials` - material table; index 0 is the default material
/// * `clusters` - node groupings used to cull collision queries
/// * `settings` - per-body simulation settings
/// * `rest_volume` - signed rest volume, present only for closed meshes
/// * `asleep` - whether the body is currently deactivated
/// * `sleep_timer` - seconds spent below the sleep velocity threshold
///
/// # Example
/// ```
/// use bevy_soft_dynamics::components::SoftBody;
///
/// let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
/// let indices = [0, 1, 2];
/// let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
/// body.set_total_mass(1.5, true);
/// ```
#[derive(Component, Reflect, Clone, Default)]
#[reflect(Component)]
pub struct SoftBody {
    /// Point masses
    pub nodes: Vec<Node>,
    /// Distance constraints, structural and bending
    pub links: Vec<Link>,
    /// Surface triangles
    pub faces: Vec<Face>,
    /// Material table; index 0 is the default material
    pub materials: Vec<SoftBodyMaterial>,
    /// Node groupings used to cull collision queries
    pub clusters: Vec<Cluster>,
    /// Per-body simulation settings
    pub settings: SoftBodySettings,
    /// Signed rest volume, present only for closed meshes
    pub rest_volume: Option<f32>,
    /// Whether the body is currently deactivated
    pub asleep: bool,
    /// Seconds spent below the sleep velocity threshold
    pub sleep_timer: f32,
}

impl SoftBody {
    /// Creates a body over the given nodes with no topology yet and a
    /// single default material.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            links: Vec::new(),
            faces: Vec::new(),
            materials: vec![SoftBodyMaterial::default()],
            clusters: Vec::new(),
            settings: SoftBodySettings::default(),
            rest_volume: None,
            asleep: false,
            sleep_timer: 0.0,
        }
    }

    /// Adds a material to the body's table and returns its index.
    pub fn append_material(&mut self, material: SoftBodyMaterial) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    /// Appends a structural link between two nodes at their current
    /// distance.
    ///
    /// # Errors
    /// Rejects out-of-range node or material indices, identical endpoints,
    /// and zero-length links.
    pub fn append_link(&mut self, a: u32, b: u32, material: u32) -> Result<()> {
        self.check_node(a)?;
        self.check_node(b)?;
        self.check_material(material)?;
        if a == b {
            return Err(TriMeshError::UnsupportedTopology(format!(
                "link endpoints are both node {a}"
            )));
        }
        let rest_length = self.nodes[a as usize]
            .position
            .distance(self.nodes[b as usize].position);
        if rest_length < MIN_LINK_LENGTH {
            return Err(TriMeshError::UnsupportedTopology(format!(
                "link {a}-{b} has zero length"
            )));
        }
        self.links.push(Link::new(a, b, rest_length, material));
        Ok(())
    }

    /// Appends a face over three nodes with its current area as rest area.
    ///
    /// # Errors
    /// Rejects out-of-range node or material indices, repeated corners, and
    /// zero-area faces.
    pub fn append_face(&mut self, a: u32, b: u32, c: u32, material: u32) -> Result<()> {
        self.check_node(a)?;
        self.check_node(b)?;
        self.check_node(c)?;
        self.check_material(material)?;
        if a == b || b == c || c == a {
            return Err(TriMeshError::UnsupportedTopology(format!(
                "face ({a}, {b}, {c}) repeats a corner"
            )));
        }
        let rest_area = triangle_area(
            self.nodes[a as usize].position,
            self.nodes[b as usize].position,
            self.nodes[c as usize].position,
        );
        if rest_area < MIN_FACE_AREA {
            return Err(TriMeshError::UnsupportedTopology(format!(
                "face ({a}, {b}, {c}) has zero area"
            )));
        }
        self.faces.push(Face::new(a, b, c, rest_area, material));
        Ok(())
    }

    fn check_node(&self, index: u32) -> Result<()> {
        if index as usize >= self.nodes.len() {
            return Err(TriMeshError::IndexOutOfBounds {
                index,
                vertex_count: self.nodes.len(),
            });
        }
        Ok(())
    }

    fn check_material(&self, index: u32) -> Result<()> {
        if index as usize >= self.materials.len() {
            return Err(TriMeshError::UnknownMaterial(index));
        }
        Ok(())
    }

    /// Signed volume enclosed by the faces.
    ///
    /// Meaningful for closed meshes only; positive when faces wind
    /// counter-clockwise seen from outside.
    pub fn volume(&self) -> f32 {
        let mut six_v = 0.0;
        for face in &self.faces {
            let a = self.nodes[face.nodes[0] as usize].position;
            let b = self.nodes[face.nodes[1] as usize].position;
            let c = self.nodes[face.nodes[2] as usize].position;
            six_v += a.dot(b.cross(c));
        }
        six_v / 6.0
    }

    /// Sum of the masses of all free (non-pinned) nodes.
    pub fn total_mass(&self) -> f32 {
        self.nodes
            .iter()
            .filter(|n| !n.is_pinned())
            .map(|n| n.mass)
            .sum()
    }

    /// Refreshes per-node normals and areas from current face geometry.
    ///
    /// Node normals are area-weighted averages of adjacent face normals;
    /// node areas collect one third of each adjacent face's area.
    pub fn update_normals(&mut self) {
        for node in &mut self.nodes {
            node.normal = Vec3::ZERO;
            node.area = 0.0;
        }
        for i in 0..self.faces.len() {
            let [a, b, c] = self.faces[i].nodes;
            let pa = self.nodes[a as usize].position;
            let pb = self.nodes[b as usize].position;
            let pc = self.nodes[c as usize].position;
            // Cross product length is twice the face area, so it already
            // weights the accumulated normal by area.
            let cross = (pb - pa).cross(pc - pa);
            let third_area = cross.length() / 6.0;
            for &n in &self.faces[i].nodes {
                self.nodes[n as usize].normal += cross;
                self.nodes[n as usize].area += third_area;
            }
        }
        for node in &mut self.nodes {
            node.normal = node.normal.try_normalize().unwrap_or(Vec3::Y);
        }
    }

    /// Distributes `total` mass across the free nodes.
    ///
    /// With `from_faces`, each node is weighted by one third of the current
    /// area of its adjacent faces; otherwise nodes keep their current mass
    /// ratios. Pinned nodes are excluded and stay immovable. Every free
    /// node receives at least a small minimum mass so isolated nodes remain
    /// dynamic.
    ///
    /// # Arguments
    /// * `total` - total mass to distribute (kg)
    /// * `from_faces` - weight nodes by adjacent surface area instead of
    ///   current mass ratios
    pub fn set_total_mass(&mut self, total: f32, from_faces: bool) {
        let mut weights = vec![0.0f32; self.nodes.len()];
        if from_faces {
            for face in &self.faces {
                let area = triangle_area(
                    self.nodes[face.nodes[0] as usize].position,
                    self.nodes[face.nodes[1] as usize].position,
                    self.nodes[face.nodes[2] as usize].position,
                );
                for &n in &face.nodes {
                    weights[n as usize] += area / 3.0;
                }
            }
        } else {
            for (i, node) in self.nodes.iter().enumerate() {
                weights[i] = node.mass;
            }
        }

        let total_weight: f32 = self
            .nodes
            .iter()
            .zip(&weights)
            .filter(|(node, _)| !node.is_pinned())
            .map(|(_, weight)| *weight)
            .sum();
        let free_count = self.nodes.iter().filter(|n| !n.is_pinned()).count();

        for (node, weight) in self.nodes.iter_mut().zip(&weights) {
            if node.is_pinned() {
                continue;
            }
            let share = if total_weight > 0.0 {
                total * weight / total_weight
            } else if free_count > 0 {
                total / free_count as f32
            } else {
                0.0
            };
            node.set_mass(share.max(MIN_NODE_MASS));
        }
    }

    /// Translates every node. Rest lengths are unaffected.
    pub fn translate(&mut self, offset: Vec3) {
        for node in &mut self.nodes {
            node.position += offset;
            node.prev_position += offset;
        }
    }

    /// Rotates every node about the origin. Rest lengths are unaffected.
    pub fn rotate(&mut self, rotation: Quat) {
        for node in &mut self.nodes {
            node.position = rotation * node.position;
            node.prev_position = rotation * node.prev_position;
            node.normal = rotation * node.normal;
        }
    }

    /// Scales every node about the origin and rebuilds the rest state from
    /// the scaled geometry.
    pub fn scale(&mut self, factor: Vec3) {
        for node in &mut self.nodes {
            node.position *= factor;
            node.prev_position *= factor;
        }
        self.recompute_rest_state();
    }

    /// Applies a full transform. Non-unit scale rebuilds the rest state.
    pub fn apply_transform(&mut self, transform: &Transform) {
        for node in &mut self.nodes {
            node.position = transform.transform_point(node.position);
            node.prev_position = transform.transform_point(node.prev_position);
            node.normal = transform.rotation * node.normal;
        }
        if (transform.scale - Vec3::ONE).length_squared() > 1e-12 {
            self.recompute_rest_state();
        }
    }

    /// Rebuilds rest lengths, rest areas, rest volume, and normals from
    /// current node positions.
    pub fn recompute_rest_state(&mut self) {
        for i in 0..self.links.len() {
            let [a, b] = self.links[i].nodes;
            self.links[i].rest_length = self.nodes[a as usize]
                .position
                .distance(self.nodes[b as usize].position);
        }
        for i in 0..self.faces.len() {
            let [a, b, c] = self.faces[i].nodes;
            self.faces[i].rest_area = triangle_area(
                self.nodes[a as usize].position,
                self.nodes[b as usize].position,
                self.nodes[c as usize].position,
            );
        }
        if self.rest_volume.is_some() {
            self.rest_volume = Some(self.volume());
        }
        self.update_normals();
    }

    /// Connects node pairs at exactly `hops` graph distance with bending
    /// links, deduplicated against the existing topology.
    ///
    /// Distances below 2 do nothing, mirroring the engine behavior this
    /// follows. Returns the number of links added.
    ///
    /// # Arguments
    /// * `hops` - graph distance between endpoints of new links
    /// * `material` - material index for the new links
    ///
    /// # Errors
    /// Rejects an out-of-range material index.
    pub fn generate_bending_links(&mut self, hops: u32, material: u32) -> Result<usize> {
        self.check_material(material)?;
        if hops < 2 || self.nodes.is_empty() {
            return Ok(0);
        }

        let n = self.nodes.len();
        let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); n];
        let mut seen = AdjacencyMatrix::new(n);
        for link in &self.links {
            let [a, b] = link.nodes;
            if seen.insert(a as usize, b as usize) {
                adjacency[a as usize].push(b);
                adjacency[b as usize].push(a);
            }
        }

        let mut added = 0usize;
        let mut depth = vec![u32::MAX; n];
        let mut queue: VecDeque<u32> = VecDeque::new();
        for start in 0..n as u32 {
            depth.fill(u32::MAX);
            depth[start as usize] = 0;
            queue.clear();
            queue.push_back(start);

            while let Some(i) = queue.pop_front() {
                let d = depth[i as usize];
                if d == hops {
                    continue;
                }
                for &j in &adjacency[i as usize] {
                    if depth[j as usize] != u32::MAX {
                        continue;
                    }
                    depth[j as usize] = d + 1;
                    queue.push_back(j);
                    if d + 1 == hops && j > start && seen.insert(start as usize, j as usize) {
                        let rest_length = self.nodes[start as usize]
                            .position
                            .distance(self.nodes[j as usize].position);
                        if rest_length >= MIN_LINK_LENGTH {
                            self.links.push(Link {
                                nodes: [start, j],
                                rest_length,
                                material,
                                bending: true,
                                lambda: 0.0,
                            });
                            added += 1;
                        }
                    }
                }
            }
        }
        Ok(added)
    }

    /// Shuffles link and face order with a seeded RNG to decorrelate the
    /// sequential constraint sweeps. The same seed always produces the same
    /// order.
    pub fn randomize_constraints(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.links.shuffle(&mut rng);
        self.faces.shuffle(&mut rng);
    }

    /// Groups nodes into `k` clusters by k-means over positions.
    ///
    /// `k` is clamped to `[1, node_count]`. Seeding is farthest-point from
    /// node 0, so the result is deterministic for a given body. Clusters
    /// emptied during refinement are discarded.
    pub fn generate_clusters(&mut self, k: usize) {
        let n = self.nodes.len();
        if n == 0 {
            self.clusters.clear();
            return;
        }
        let k = k.clamp(1, n);

        let mut centers: Vec<Vec3> = Vec::with_capacity(k);
        centers.push(self.nodes[0].position);
        while centers.len() < k {
            let mut farthest = (0usize, -1.0f32);
            for (i, node) in self.nodes.iter().enumerate() {
                let nearest = centers
                    .iter()
                    .map(|c| node.position.distance_squared(*c))
                    .fold(f32::INFINITY, f32::min);
                if nearest > farthest.1 {
                    farthest = (i, nearest);
                }
            }
            centers.push(self.nodes[farthest.0].position);
        }

        let mut assignment = vec![0usize; n];
        for _ in 0..MAX_KMEANS_ITERATIONS {
            let mut changed = false;
            for (i, node) in self.nodes.iter().enumerate() {
                let mut nearest = 0usize;
                let mut nearest_d = f32::INFINITY;
                for (c, center) in centers.iter().enumerate() {
                    let d = node.position.distance_squared(*center);
                    if d < nearest_d {
                        nearest_d = d;
                        nearest = c;
                    }
                }
                if assignment[i] != nearest {
                    assignment[i] = nearest;
                    changed = true;
                }
            }

            let mut sums = vec![Vec3::ZERO; k];
            let mut counts = vec![0u32; k];
            for (i, node) in self.nodes.iter().enumerate() {
                sums[assignment[i]] += node.position;
                counts[assignment[i]] += 1;
            }
            for c in 0..k {
                if counts[c] > 0 {
                    centers[c] = sums[c] / counts[c] as f32;
                }
            }
            if !changed {
                break;
            }
        }

        let mut clusters: Vec<Cluster> = (0..k).map(|_| Cluster::default()).collect();
        for (i, &c) in assignment.iter().enumerate() {
            clusters[c].nodes.push(i as u32);
        }
        clusters.retain(|c| !c.nodes.is_empty());
        for cluster in &mut clusters {
            cluster.refresh(&self.nodes);
        }
        self.clusters = clusters;
    }

    /// Refreshes cluster centers and radii from current node positions.
    pub fn refresh_clusters(&mut self) {
        let nodes = &self.nodes;
        for cluster in &mut self.clusters {
            cluster.refresh(nodes);
        }
    }

    /// Pins a single node in place.
    ///
    /// # Errors
    /// Rejects an out-of-range node index.
    pub fn pin_node(&mut self, index: u32) -> Result<()> {
        self.check_node(index)?;
        self.nodes[index as usize].pin();
        Ok(())
    }

    /// Pins every node within `tolerance` of the body's extreme position
    /// along `direction`, returning how many were pinned.
    ///
    /// `pin_side(Vec3::Y, 0.01)` anchors the top edge of a hanging cloth.
    pub fn pin_side(&mut self, direction: Vec3, tolerance: f32) -> usize {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return 0;
        }
        let extreme = self
            .nodes
            .iter()
            .map(|n| n.position.dot(dir))
            .fold(f32::NEG_INFINITY, f32::max);
        let mut pinned = 0;
        for node in &mut self.nodes {
            if node.position.dot(dir) >= extreme - tolerance {
                node.pin();
                pinned += 1;
            }
        }
        pinned
    }

    /// Clears the sleep state.
    pub fn wake(&mut self) {
        self.asleep = false;
        self.sleep_timer = 0.0;
    }

    /// Whether two nodes share a link, in either order.
    pub fn nodes_linked(&self, a: u32, b: u32) -> bool {
        let key = edge_key(a, b);
        self.links
            .iter()
            .any(|link| edge_key(link.nodes[0], link.nodes[1]) == key)
    }
}

/// Contact response overrides for world geometry.
///
/// Attach to rigid entities to change how soft-body nodes respond when they
/// touch. Without this component, contacts use full friction and no bounce.
///
/// # Fields
/// * `friction` - tangential velocity loss on contact, `[0, 1]`
/// * `restitution` - normal velocity bounce-back, `[0, 1]`
/// * `feedback` - fraction of the contact impulse pushed back into this
///   entity's rigid-body velocity
///
/// # Example
/// ```
/// use bevy_soft_dynamics::components::SoftContactSurface;
///
/// let ice = SoftContactSurface {
///     friction: 0.05,
///     restitution: 0.1,
///     feedback: 1.0,
/// };
/// ```
#[derive(Component, Reflect, Clone, Copy)]
#[reflect(Component)]
pub struct SoftContactSurface {
    /// Tangential velocity loss on contact, `[0, 1]`
    pub friction: f32,
    /// Normal velocity bounce-back, `[0, 1]`
    pub restitution: f32,
    /// Fraction of contact impulse transferred to the rigid body
    pub feedback: f32,
}

impl Default for SoftContactSurface {
    /// Full grip, no bounce, full impulse feedback.
    fn default() -> Self {
        Self {
            friction: 1.0,
            restitution: 0.0,
            feedback: 1.0,
        }
    }
}

/// Marks a soft-body entity whose render mesh receives per-frame geometry
/// updates.
///
/// Carries the node-to-render-vertex association recorded when a welded
/// mesh was converted, so one simulated node can drive every coincident
/// render vertex.
///
/// # Fields
/// * `index_association` - for each node, the render-mesh vertex indices
///   that share its position
#[derive(Component, Reflect, Clone, Default)]
#[reflect(Component)]
pub struct SoftBodyRenderTarget {
    /// For each node, the render-mesh vertex indices sharing its position
    pub index_association: Vec<Vec<u32>>,
}
