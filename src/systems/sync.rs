//! Pushes simulated geometry back into render meshes.

use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;

use crate::components::{SoftBody, SoftBodyRenderTarget};

/// Copy node positions and normals into the render meshes that follow
/// soft bodies spawned from mesh assets.
///
/// Welding collapsed duplicate render vertices into shared nodes, so one
/// node usually feeds several render vertices; the association recorded at
/// spawn fans the write-back out. Bodies built from raw buffers with a
/// matching vertex count are written 1:1.
///
/// # Arguments
/// * `meshes` - Mesh assets to update in place
/// * `query` - Simulated bodies with a render target
pub fn sync_render_meshes(
    mut meshes: ResMut<Assets<Mesh>>,
    query: Query<(&SoftBody, &SoftBodyRenderTarget, &Mesh3d)>,
) {
    for (body, target, mesh_handle) in query.iter() {
        if body.asleep {
            continue;
        }
        let Some(mesh) = meshes.get_mut(&mesh_handle.0) else {
            continue;
        };
        write_node_geometry(body, &target.index_association, mesh);
    }
}

/// Write one body's node geometry into a mesh's position and normal
/// attributes.
fn write_node_geometry(body: &SoftBody, association: &[Vec<u32>], mesh: &mut Mesh) {
    let fan_out = association.len() == body.nodes.len();

    if let Some(VertexAttributeValues::Float32x3(positions)) =
        mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION)
    {
        if fan_out {
            for (node, render_indices) in body.nodes.iter().zip(association) {
                for &render_index in render_indices {
                    if let Some(slot) = positions.get_mut(render_index as usize) {
                        *slot = node.position.to_array();
                    }
                }
            }
        } else if positions.len() == body.nodes.len() {
            for (slot, node) in positions.iter_mut().zip(&body.nodes) {
                *slot = node.position.to_array();
            }
        } else {
            warn!(
                "render mesh has {} vertices but the body has {} nodes and no association",
                positions.len(),
                body.nodes.len()
            );
            return;
        }
    }

    if let Some(VertexAttributeValues::Float32x3(normals)) =
        mesh.attribute_mut(Mesh::ATTRIBUTE_NORMAL)
    {
        if fan_out {
            for (node, render_indices) in body.nodes.iter().zip(association) {
                for &render_index in render_indices {
                    if let Some(slot) = normals.get_mut(render_index as usize) {
                        *slot = node.normal.to_array();
                    }
                }
            }
        } else if normals.len() == body.nodes.len() {
            for (slot, node) in normals.iter_mut().zip(&body.nodes) {
                *slot = node.normal.to_array();
            }
        }
    }
}
