//! End-to-end conversion pipeline tests: raw buffers and render meshes in,
//! configured simulated bodies out.

use crate::prelude::*;
use crate::systems::solver::step_body;
use crate::trimesh::weld_vertices;
use approx::assert_relative_eq;
use bevy::prelude::*;

/// Unit cube with 8 shared vertices, wound outward.
fn shared_cube() -> (Vec<f32>, Vec<u32>) {
    #[rustfmt::skip]
    let positions = vec![
        0.0, 0.0, 0.0,
        1.0, 0.0, 0.0,
        1.0, 1.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
        1.0, 0.0, 1.0,
        1.0, 1.0, 1.0,
        0.0, 1.0, 1.0,
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 0, 3, 2,
        4, 5, 6, 4, 6, 7,
        0, 1, 5, 0, 5, 4,
        2, 3, 7, 2, 7, 6,
        1, 2, 6, 1, 6, 5,
        3, 0, 4, 3, 4, 7,
    ];
    (positions, indices)
}

/// Unit cube the way render meshes ship it: four vertices per face,
/// duplicated along every edge, 24 vertices total.
fn render_style_cube() -> (Vec<f32>, Vec<u32>) {
    let faces: [[[f32; 3]; 4]; 6] = [
        [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
        [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
        [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
        [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
        [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
    ];
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for (face, corners) in faces.iter().enumerate() {
        let base = (face * 4) as u32;
        for corner in corners {
            positions.extend_from_slice(corner);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (positions, indices)
}

#[test]
fn test_shared_cube_converts_completely() {
    let (positions, indices) = shared_cube();
    let body = SoftBody::from_trimesh(&positions, &indices).unwrap();

    assert_eq!(body.nodes.len(), 8);
    // 12 cube edges plus 6 face diagonals, each edge once
    assert_eq!(body.links.len(), 18);
    assert_eq!(body.faces.len(), 12);
    assert_relative_eq!(body.rest_volume.unwrap(), 1.0, epsilon = 1e-5);

    // Watertight mesh has no boundary nodes
    assert!(body.nodes.iter().all(|node| !node.flags.contains(NodeFlags::BOUNDARY)));
}

#[test]
fn test_render_cube_welds_into_shared_body() {
    let (positions, indices) = render_style_cube();
    let (welded_positions, welded_indices, association) =
        weld_vertices(&positions, &indices, 1e-6);

    // 24 duplicated corners collapse to the 8 real ones
    assert_eq!(welded_positions.len(), 8 * 3);
    assert_eq!(association.len(), 8);
    assert_eq!(association.iter().map(Vec::len).sum::<usize>(), 24);
    // Every cube corner sits on three faces
    assert!(association.iter().all(|renders| renders.len() == 3));

    let body = SoftBody::from_trimesh(&welded_positions, &welded_indices).unwrap();
    assert_eq!(body.nodes.len(), 8);
    assert_relative_eq!(body.rest_volume.unwrap(), 1.0, epsilon = 1e-5);
}

#[test]
fn test_open_quad_flags_boundary_and_skips_volume() {
    let positions = vec![
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
    ];
    let indices = vec![0u32, 1, 2, 0, 2, 3];
    let body = SoftBody::from_trimesh(&positions, &indices).unwrap();

    assert!(body.rest_volume.is_none());
    assert!(body.nodes.iter().all(|node| node.flags.contains(NodeFlags::BOUNDARY)));
}

#[test]
fn test_conversion_rejects_bad_buffers() {
    assert!(matches!(
        SoftBody::from_trimesh(&[], &[0, 1, 2]),
        Err(TriMeshError::NoVertices)
    ));
    let positions = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    assert!(matches!(
        SoftBody::from_trimesh(&positions, &[0, 1, 9]),
        Err(TriMeshError::IndexOutOfBounds { index: 9, .. })
    ));
}

#[test]
fn test_configured_cube_falls_and_keeps_shape() {
    let (positions, indices) = shared_cube();
    let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
    body.materials[0] = SoftBodyMaterial::new(0.5, 0.3, 0.7);
    body.generate_bending_links(2, 0).unwrap();
    body.apply_transform(&Transform::from_xyz(0.0, 5.0, 0.0));
    body.set_total_mass(2.0, true);
    body.generate_clusters(4);

    let start = body.nodes.iter().map(|n| n.position.y).sum::<f32>() / 8.0;
    let gravity = Vec3::new(0.0, -9.81, 0.0);
    let dt = 1.0 / 60.0;
    for _ in 0..60 {
        for node in &mut body.nodes {
            node.force = gravity * node.mass;
        }
        step_body(&mut body, dt, 4, 100.0);
    }

    // One second of symplectic free fall drops just over g/2
    let end = body.nodes.iter().map(|n| n.position.y).sum::<f32>() / 8.0;
    let dropped = start - end;
    assert!(dropped > 4.5 && dropped < 5.5, "dropped {dropped}");

    // The cube must still look like a cube
    for link in &body.links {
        let a = body.nodes[link.nodes[0] as usize].position;
        let b = body.nodes[link.nodes[1] as usize].position;
        let strain = (a.distance(b) - link.rest_length).abs() / link.rest_length;
        assert!(strain < 0.05, "link strained by {strain}");
    }
}

#[test]
fn test_snapshot_survives_serialization() {
    let (positions, indices) = shared_cube();
    let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
    body.set_total_mass(2.0, true);

    let gravity = Vec3::new(0.0, -9.81, 0.0);
    for _ in 0..10 {
        for node in &mut body.nodes {
            node.force = gravity * node.mass;
        }
        step_body(&mut body, 1.0 / 60.0, 4, 100.0);
    }

    let bytes = body.capture().to_bytes().unwrap();
    let snapshot = SoftBodySnapshot::from_bytes(&bytes).unwrap();

    let mut restored = SoftBody::from_trimesh(&positions, &indices).unwrap();
    restored.set_total_mass(2.0, true);
    restored.restore(&snapshot).unwrap();

    for (a, b) in body.nodes.iter().zip(&restored.nodes) {
        assert_relative_eq!(a.position.x, b.position.x, epsilon = 1e-6);
        assert_relative_eq!(a.position.y, b.position.y, epsilon = 1e-6);
        assert_relative_eq!(a.position.z, b.position.z, epsilon = 1e-6);
        assert_relative_eq!(a.velocity.y, b.velocity.y, epsilon = 1e-6);
    }
}

#[test]
fn test_bending_links_span_two_hops() {
    let (positions, indices) = shared_cube();
    let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
    let structural = body.links.len();

    let added = body.generate_bending_links(2, 0).unwrap();
    assert!(added > 0);
    assert_eq!(body.links.len(), structural + added);

    for link in &body.links[structural..] {
        assert!(link.bending);
        // Two hops away means never directly linked
        let (a, b) = (link.nodes[0], link.nodes[1]);
        assert!(!body.links[..structural]
            .iter()
            .any(|other| other.connects(a, b)));
    }
}
