//! Triangle-mesh to soft-body conversion.
//!
//! Takes externally-owned flat buffers (3 floats per vertex, 3 indices per
//! triangle), builds one node per vertex, deduplicates edges through a
//! transient square boolean matrix, and appends one face per triangle. The
//! matrix is scratch memory: it lives for the duration of the build and is
//! dropped on return.

use std::collections::HashMap;

use bevy::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};
use bevy::prelude::*;
use thiserror::Error;

use crate::components::SoftBody;
use crate::types::{AdjacencyMatrix, Node, NodeFlags};

/// Tolerance used when merging coincident vertices.
pub const WELD_EPSILON: f32 = 1e-6;

/// Links shorter than this are considered degenerate and skipped.
pub const MIN_LINK_LENGTH: f32 = 1e-6;

/// Faces with less area than this are considered degenerate and skipped.
pub const MIN_FACE_AREA: f32 = 1e-10;

/// Errors produced while converting mesh data into a soft body.
#[derive(Debug, Error)]
pub enum TriMeshError {
    /// The position buffer is empty.
    #[error("mesh has no vertices")]
    NoVertices,

    /// The index buffer is empty.
    #[error("mesh has no triangles")]
    NoTriangles,

    /// The position buffer length is not a multiple of three.
    #[error("position buffer length {0} is not a multiple of 3")]
    PositionCountNotTriplets(usize),

    /// The index buffer length is not a multiple of three.
    #[error("index buffer length {0} is not a multiple of 3")]
    IndexCountNotTriangular(usize),

    /// An index references a vertex past the end of the position buffer.
    #[error("index {index} out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds { index: u32, vertex_count: usize },

    /// A vertex coordinate is NaN or infinite.
    #[error("vertex {0} has a non-finite coordinate")]
    NonFinitePosition(usize),

    /// A referenced material slot does not exist.
    #[error("material index {0} does not exist")]
    UnknownMaterial(u32),

    /// A required mesh attribute is absent or has the wrong format.
    #[error("mesh is missing {0}")]
    MissingAttribute(&'static str),

    /// The mesh topology cannot be simulated.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),
}

/// Result alias for conversion operations.
pub type Result<T> = std::result::Result<T, TriMeshError>;

impl SoftBody {
    /// Build a soft body from flat vertex/index triangle buffers.
    ///
    /// `positions` holds 3 floats per vertex; `indices` holds 3 vertex
    /// indices per triangle. One node is created for every input vertex
    /// (vertices never referenced by the index buffer become isolated
    /// nodes). Every triangle contributes its three wrapping edges as links,
    /// deduplicated through an adjacency matrix sized by the largest index
    /// actually present, and one face.
    ///
    /// Degenerate edges and faces are skipped; a mesh whose every face is
    /// degenerate is rejected. Closed meshes (every edge shared by exactly
    /// two faces) record their rest volume, enabling pressure and volume
    /// stiffness. Nodes on open boundaries are flagged `BOUNDARY`.
    ///
    /// # Arguments
    /// * `positions` - flat vertex position buffer, `3 * vertex_count` floats
    /// * `indices` - flat triangle index buffer, `3 * triangle_count` entries
    ///
    /// # Returns
    /// The populated soft body, or a [`TriMeshError`] describing the first
    /// problem found in the input.
    ///
    /// # Example
    /// ```
    /// use bevy_soft_dynamics::components::SoftBody;
    ///
    /// // One quad: two triangles sharing the diagonal 0-2.
    /// let positions = [
    ///     0.0, 0.0, 0.0,
    ///     1.0, 0.0, 0.0,
    ///     1.0, 0.0, 1.0,
    ///     0.0, 0.0, 1.0,
    /// ];
    /// let indices = [0, 1, 2, 0, 2, 3];
    ///
    /// let body = SoftBody::from_trimesh(&positions, &indices).unwrap();
    /// assert_eq!(body.nodes.len(), 4);
    /// assert_eq!(body.links.len(), 5); // 4 rim edges + 1 shared diagonal
    /// assert_eq!(body.faces.len(), 2);
    /// ```
    pub fn from_trimesh(positions: &[f32], indices: &[u32]) -> Result<SoftBody> {
        if positions.is_empty() {
            return Err(TriMeshError::NoVertices);
        }
        if positions.len() % 3 != 0 {
            return Err(TriMeshError::PositionCountNotTriplets(positions.len()));
        }
        if indices.is_empty() {
            return Err(TriMeshError::NoTriangles);
        }
        if indices.len() % 3 != 0 {
            return Err(TriMeshError::IndexCountNotTriangular(indices.len()));
        }

        // All nodes are built from the input buffer before any topology work;
        // the input is only ever read.
        let vertex_count = positions.len() / 3;
        let mut nodes = Vec::with_capacity(vertex_count);
        for (i, p) in positions.chunks_exact(3).enumerate() {
            let v = Vec3::new(p[0], p[1], p[2]);
            if !v.is_finite() {
                return Err(TriMeshError::NonFinitePosition(i));
            }
            nodes.push(Node::new(v));
        }

        // The largest index actually present sizes the scratch matrix.
        let mut max_index = 0u32;
        for &i in indices {
            if i as usize >= vertex_count {
                return Err(TriMeshError::IndexOutOfBounds {
                    index: i,
                    vertex_count,
                });
            }
            max_index = max_index.max(i);
        }

        let mut body = SoftBody::new(nodes);
        let mut seen = AdjacencyMatrix::new(max_index as usize + 1);
        let mut edge_faces: HashMap<(u32, u32), u32> = HashMap::new();
        let mut degenerate_links = 0usize;
        let mut degenerate_faces = 0usize;

        for tri in indices.chunks_exact(3) {
            let idx = [tri[0], tri[1], tri[2]];

            // Wrapping edge pairs (2,0) (0,1) (1,2).
            let mut j = 2usize;
            for k in 0..3usize {
                let (a, b) = (idx[j], idx[k]);
                j = k;
                if a == b {
                    degenerate_links += 1;
                    continue;
                }
                if !seen.insert(a as usize, b as usize) {
                    continue;
                }
                let length = body.nodes[a as usize]
                    .position
                    .distance(body.nodes[b as usize].position);
                if length < MIN_LINK_LENGTH {
                    degenerate_links += 1;
                    continue;
                }
                body.append_link(a, b, 0)?;
            }

            let area = triangle_area(
                body.nodes[idx[0] as usize].position,
                body.nodes[idx[1] as usize].position,
                body.nodes[idx[2] as usize].position,
            );
            if idx[0] == idx[1] || idx[1] == idx[2] || idx[2] == idx[0] || area < MIN_FACE_AREA {
                degenerate_faces += 1;
                continue;
            }
            body.append_face(idx[0], idx[1], idx[2], 0)?;

            let mut j = 2usize;
            for k in 0..3usize {
                let key = edge_key(idx[j], idx[k]);
                j = k;
                *edge_faces.entry(key).or_insert(0) += 1;
            }
        }

        if body.faces.is_empty() {
            return Err(TriMeshError::UnsupportedTopology(format!(
                "every face is degenerate ({degenerate_faces} skipped)"
            )));
        }
        if degenerate_links > 0 || degenerate_faces > 0 {
            debug!(
                "soft body conversion skipped {} degenerate edges and {} degenerate faces",
                degenerate_links, degenerate_faces
            );
        }

        // Open boundaries and closedness both fall out of the edge use counts.
        let mut closed = true;
        for (&(a, b), &count) in &edge_faces {
            if count == 1 {
                closed = false;
                body.nodes[a as usize].flags.insert(NodeFlags::BOUNDARY);
                body.nodes[b as usize].flags.insert(NodeFlags::BOUNDARY);
            } else if count != 2 {
                closed = false;
            }
        }
        if closed {
            body.rest_volume = Some(body.volume());
        }

        body.update_normals();
        Ok(body)
    }

    /// Build a soft body from a Bevy mesh.
    ///
    /// Coincident vertices are welded first (render meshes duplicate
    /// vertices along hard edges and UV seams), so a cube primitive becomes
    /// one connected closed body instead of six disconnected quads. Use
    /// [`extract_mesh_buffers`] and [`weld_vertices`] directly when the
    /// welded-to-render index association is needed for geometry sync.
    pub fn from_mesh(mesh: &Mesh) -> Result<SoftBody> {
        let (positions, indices) = extract_mesh_buffers(mesh)?;
        let (welded_positions, welded_indices, _) =
            weld_vertices(&positions, &indices, WELD_EPSILON);
        SoftBody::from_trimesh(&welded_positions, &welded_indices)
    }
}

/// Pull flat position/index buffers out of a Bevy mesh.
///
/// Non-indexed meshes are treated as triangle soup (implicit sequential
/// indices). Only `TriangleList` topology is supported.
pub fn extract_mesh_buffers(mesh: &Mesh) -> Result<(Vec<f32>, Vec<u32>)> {
    if mesh.primitive_topology() != PrimitiveTopology::TriangleList {
        return Err(TriMeshError::UnsupportedTopology(format!(
            "{:?} (expected TriangleList)",
            mesh.primitive_topology()
        )));
    }

    let positions = match mesh.attribute(Mesh::ATTRIBUTE_POSITION) {
        Some(VertexAttributeValues::Float32x3(values)) => {
            values.as_flattened().to_vec()
        }
        _ => return Err(TriMeshError::MissingAttribute("float3 position attribute")),
    };

    let indices = match mesh.indices() {
        Some(Indices::U32(values)) => values.clone(),
        Some(Indices::U16(values)) => values.iter().map(|&i| u32::from(i)).collect(),
        None => (0..(positions.len() / 3) as u32).collect(),
    };

    Ok((positions, indices))
}

/// Merge coincident vertices and remap the index buffer.
///
/// Returns the welded position buffer, the remapped index buffer, and, for
/// each welded vertex, the indices of the input vertices that collapsed into
/// it. The association is what lets per-frame geometry sync write one
/// simulated node back to every render vertex that shares its position.
///
/// Vertices are bucketed on a grid of `epsilon` cells, so two vertices merge
/// when they quantize to the same cell.
pub fn weld_vertices(
    positions: &[f32],
    indices: &[u32],
    epsilon: f32,
) -> (Vec<f32>, Vec<u32>, Vec<Vec<u32>>) {
    let vertex_count = positions.len() / 3;
    let inv_eps = 1.0 / epsilon.max(f32::MIN_POSITIVE);

    let mut buckets: HashMap<(i64, i64, i64), u32> = HashMap::with_capacity(vertex_count);
    let mut remap = vec![0u32; vertex_count];
    let mut welded_positions: Vec<f32> = Vec::with_capacity(positions.len());
    let mut association: Vec<Vec<u32>> = Vec::new();

    for i in 0..vertex_count {
        let p = &positions[i * 3..i * 3 + 3];
        let key = (
            (p[0] * inv_eps).round() as i64,
            (p[1] * inv_eps).round() as i64,
            (p[2] * inv_eps).round() as i64,
        );
        let welded = *buckets.entry(key).or_insert_with(|| {
            let id = association.len() as u32;
            welded_positions.extend_from_slice(p);
            association.push(Vec::new());
            id
        });
        remap[i] = welded;
        association[welded as usize].push(i as u32);
    }

    let welded_indices = indices.iter().map(|&i| remap[i as usize]).collect();
    (welded_positions, welded_indices, association)
}

pub(crate) fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    0.5 * (b - a).cross(c - a).length()
}
