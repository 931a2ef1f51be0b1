//! Benchmark for soft-body solver and conversion performance.

use bevy::prelude::*;
use bevy_soft_dynamics::components::{SoftBody, SoftBodyMaterial};
use bevy_soft_dynamics::systems::collision::resolve_node_pair;
use bevy_soft_dynamics::systems::solver::step_body;
use bevy_soft_dynamics::trimesh::weld_vertices;
use bevy_soft_dynamics::types::Node;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// Flat cloth grid of `n x n` vertices in the XZ plane.
fn grid_buffers(n: usize) -> (Vec<f32>, Vec<u32>) {
    let mut positions = Vec::with_capacity(n * n * 3);
    for row in 0..n {
        for col in 0..n {
            positions.extend_from_slice(&[col as f32 * 0.1, 0.0, row as f32 * 0.1]);
        }
    }
    let mut indices = Vec::with_capacity((n - 1) * (n - 1) * 6);
    for row in 0..n - 1 {
        for col in 0..n - 1 {
            let a = (row * n + col) as u32;
            let b = a + 1;
            let c = a + n as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    (positions, indices)
}

fn benchmark_solver_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("Solver Step");

    for grid in [8usize, 16, 32].iter() {
        let (positions, indices) = grid_buffers(*grid);
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        body.generate_bending_links(2, 0).unwrap();
        body.set_total_mass(1.0, true);
        let gravity = Vec3::new(0.0, -9.81, 0.0);

        group.bench_with_input(
            BenchmarkId::from_parameter(grid * grid),
            grid,
            |bench, &_grid| {
                bench.iter(|| {
                    for node in &mut body.nodes {
                        node.force = gravity * node.mass;
                    }
                    step_body(&mut body, 1.0 / 60.0, 4, 100.0);
                });
            },
        );
    }

    group.finish();
}

fn benchmark_closed_volume_step(c: &mut Criterion) {
    // Watertight cube, so the volume constraint and normals refresh run too
    #[rustfmt::skip]
    let positions = [
        0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  1.0, 1.0, 0.0,  0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,  1.0, 0.0, 1.0,  1.0, 1.0, 1.0,  0.0, 1.0, 1.0,
    ];
    #[rustfmt::skip]
    let indices = [
        0, 2, 1, 0, 3, 2,
        4, 5, 6, 4, 6, 7,
        0, 1, 5, 0, 5, 4,
        2, 3, 7, 2, 7, 6,
        1, 2, 6, 1, 6, 5,
        3, 0, 4, 3, 4, 7,
    ];
    let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
    body.materials[0] = SoftBodyMaterial::new(0.3, 0.2, 0.5);
    body.generate_bending_links(2, 0).unwrap();
    body.set_total_mass(1.5, true);
    let gravity = Vec3::new(0.0, -9.81, 0.0);

    c.bench_function("Closed Volume Step", |bench| {
        bench.iter(|| {
            for node in &mut body.nodes {
                node.force = gravity * node.mass;
            }
            step_body(&mut body, 1.0 / 60.0, 4, 100.0);
        });
    });
}

fn benchmark_bending_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bending Generation");

    for grid in [8usize, 16, 32].iter() {
        let (positions, indices) = grid_buffers(*grid);
        let base = SoftBody::from_trimesh(&positions, &indices).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(grid * grid),
            grid,
            |bench, &_grid| {
                bench.iter(|| {
                    let mut body = base.clone();
                    body.generate_bending_links(2, 0).unwrap();
                    body
                });
            },
        );
    }

    group.finish();
}

fn benchmark_trimesh_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("TriMesh Conversion");

    for grid in [8usize, 16, 32].iter() {
        let (positions, indices) = grid_buffers(*grid);

        group.bench_with_input(
            BenchmarkId::from_parameter(grid * grid),
            grid,
            |bench, &_grid| {
                bench.iter(|| SoftBody::from_trimesh(&positions, &indices).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_vertex_weld(c: &mut Criterion) {
    // Triangle soup: every triangle carries its own three vertices
    let (grid_positions, grid_indices) = grid_buffers(32);
    let mut positions = Vec::with_capacity(grid_indices.len() * 3);
    for &index in &grid_indices {
        let at = index as usize * 3;
        positions.extend_from_slice(&grid_positions[at..at + 3]);
    }
    let indices: Vec<u32> = (0..grid_indices.len() as u32).collect();

    c.bench_function("Vertex Weld", |bench| {
        bench.iter(|| weld_vertices(&positions, &indices, 1e-6));
    });
}

fn benchmark_contact_resolution(c: &mut Criterion) {
    c.bench_function("Node Pair Resolution", |bench| {
        bench.iter(|| {
            let mut a = Node::new(Vec3::new(-0.01, 0.0, 0.0));
            let mut b = Node::new(Vec3::new(0.01, 0.0, 0.0));
            resolve_node_pair(&mut a, &mut b, 0.08, 1.0, 1.0 / 60.0)
        });
    });
}

criterion_group!(
    benches,
    benchmark_solver_step,
    benchmark_closed_volume_step,
    benchmark_bending_generation,
    benchmark_trimesh_conversion,
    benchmark_vertex_weld,
    benchmark_contact_resolution
);
criterion_main!(benches);
