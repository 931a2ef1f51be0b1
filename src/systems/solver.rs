//! Constraint solver - substepped position-based dynamics.
//!
//! Each fixed tick is split into substeps. A substep integrates node
//! velocities, projects the distance and volume constraints a configurable
//! number of sweeps, then rebuilds velocities from the positional change.
//! Compliance makes stiffness independent of iteration count and timestep.

use bevy::prelude::*;

use crate::components::{SoftBody, SoftBodyMaterial};
use crate::resources::SoftDynamicsConfig;

/// Substeps shorter than this are skipped entirely.
const MIN_SUBSTEP: f32 = 1e-6;

/// Fraction of relative along-link velocity removed per velocity iteration.
const LINK_VELOCITY_SMOOTHING: f32 = 0.05;

/// Advance every awake soft body by one fixed tick.
///
/// Runs in FixedUpdate after force accumulation. Bodies are independent
/// until the collision pass, so they solve in parallel.
///
/// # Arguments
/// * `time` - Bevy FixedTime resource to get delta time
/// * `config` - Global configuration with substep count and velocity ceiling
/// * `query` - Query for soft bodies to step
pub fn solve_soft_bodies(
    time: Res<Time<Fixed>>,
    config: Res<SoftDynamicsConfig>,
    mut query: Query<&mut SoftBody>,
) {
    let dt = time.delta_secs();
    if dt <= MIN_SUBSTEP {
        return;
    }
    let substeps = config.substeps.max(1);
    let max_velocity = config.max_velocity;

    query.par_iter_mut().for_each(|mut body| {
        if body.asleep {
            return;
        }
        step_body(&mut body, dt, substeps, max_velocity);
        body.update_normals();
        body.refresh_clusters();
    });
}

/// Advance one body by a full fixed tick.
///
/// # Arguments
/// * `body` - body to step
/// * `dt` - fixed tick length in seconds
/// * `substeps` - number of substeps to split the tick into
/// * `max_velocity` - node speed ceiling in m/s
pub fn step_body(body: &mut SoftBody, dt: f32, substeps: u32, max_velocity: f32) {
    let h = dt / substeps.max(1) as f32;
    if h <= MIN_SUBSTEP || body.nodes.is_empty() {
        return;
    }

    // Tick-start positions feed the swept collision pass afterwards.
    for node in &mut body.nodes {
        node.prev_position = node.position;
    }

    let mut substep_start = vec![Vec3::ZERO; body.nodes.len()];
    let mut gradients = vec![Vec3::ZERO; body.nodes.len()];
    let damping = (1.0 - body.settings.damping * h).max(0.0);

    for _ in 0..substeps {
        for link in &mut body.links {
            link.lambda = 0.0;
        }
        let mut volume_lambda = 0.0;

        for (i, node) in body.nodes.iter_mut().enumerate() {
            substep_start[i] = node.position;
            if node.inv_mass == 0.0 {
                continue;
            }
            node.velocity += node.force * (node.inv_mass * h);
            node.position += node.velocity * h;
        }

        for _ in 0..body.settings.position_iterations.max(1) {
            solve_links(body, h);
            solve_volume(body, h, &mut volume_lambda, &mut gradients);
        }

        for (i, node) in body.nodes.iter_mut().enumerate() {
            if node.inv_mass == 0.0 {
                node.velocity = Vec3::ZERO;
                continue;
            }
            node.velocity = (node.position - substep_start[i]) / h;
            node.velocity = (node.velocity * damping).clamp_length_max(max_velocity);
        }

        for _ in 0..body.settings.velocity_iterations {
            smooth_link_velocities(body);
        }
    }
}

/// One Gauss-Seidel sweep over every distance constraint.
fn solve_links(body: &mut SoftBody, h: f32) {
    let h2 = h * h;
    for i in 0..body.links.len() {
        let ([a, b], rest_length, material, bending) = {
            let link = &body.links[i];
            (link.nodes, link.rest_length, link.material, link.bending)
        };
        let (a, b) = (a as usize, b as usize);

        let w_sum = body.nodes[a].inv_mass + body.nodes[b].inv_mass;
        if w_sum == 0.0 {
            continue;
        }
        let delta = body.nodes[b].position - body.nodes[a].position;
        let length = delta.length();
        if length < 1e-6 {
            continue;
        }

        let material = link_material(body, material);
        let compliance = if bending {
            material.angular_compliance()
        } else {
            material.linear_compliance()
        };
        let alpha = compliance / h2;

        let c = length - rest_length;
        let d_lambda = (-c - alpha * body.links[i].lambda) / (w_sum + alpha);
        body.links[i].lambda += d_lambda;

        let correction = delta / length * d_lambda;
        let wa = body.nodes[a].inv_mass;
        let wb = body.nodes[b].inv_mass;
        body.nodes[a].position -= correction * wa;
        body.nodes[b].position += correction * wb;
    }
}

/// One sweep of the global volume constraint for closed bodies.
///
/// The constraint C = V - V_rest uses the exact volume gradient: for a face
/// (a, b, c) the partial derivatives are (b x c) / 6 and its rotations.
fn solve_volume(body: &mut SoftBody, h: f32, lambda: &mut f32, gradients: &mut [Vec3]) {
    let Some(rest_volume) = body.rest_volume else {
        return;
    };
    let compliance = link_material(body, 0).volume_compliance();
    let alpha = compliance / (h * h);

    gradients.fill(Vec3::ZERO);
    for face in &body.faces {
        let [a, b, c] = face.nodes;
        let pa = body.nodes[a as usize].position;
        let pb = body.nodes[b as usize].position;
        let pc = body.nodes[c as usize].position;
        gradients[a as usize] += pb.cross(pc) / 6.0;
        gradients[b as usize] += pc.cross(pa) / 6.0;
        gradients[c as usize] += pa.cross(pb) / 6.0;
    }

    let mut w_sum = 0.0;
    for (node, gradient) in body.nodes.iter().zip(gradients.iter()) {
        w_sum += node.inv_mass * gradient.length_squared();
    }
    if w_sum + alpha == 0.0 {
        return;
    }

    let c = body.volume() - rest_volume;
    let d_lambda = (-c - alpha * *lambda) / (w_sum + alpha);
    *lambda += d_lambda;

    for (node, gradient) in body.nodes.iter_mut().zip(gradients.iter()) {
        node.position += *gradient * (node.inv_mass * d_lambda);
    }
}

/// One sweep bleeding relative along-link velocity out of the body.
///
/// Keeps high-frequency stretch oscillation from surviving the position
/// solve when a body asks for velocity iterations.
fn smooth_link_velocities(body: &mut SoftBody) {
    for i in 0..body.links.len() {
        let [a, b] = body.links[i].nodes;
        let (a, b) = (a as usize, b as usize);
        let wa = body.nodes[a].inv_mass;
        let wb = body.nodes[b].inv_mass;
        let w_sum = wa + wb;
        if w_sum == 0.0 {
            continue;
        }
        let delta = body.nodes[b].position - body.nodes[a].position;
        let Some(dir) = delta.try_normalize() else {
            continue;
        };
        let relative = body.nodes[b].velocity - body.nodes[a].velocity;
        let along = dir * relative.dot(dir) * LINK_VELOCITY_SMOOTHING;
        body.nodes[a].velocity += along * (wa / w_sum);
        body.nodes[b].velocity -= along * (wb / w_sum);
    }
}

/// Material lookup with a rigid fallback for bodies built by hand.
fn link_material(body: &SoftBody, index: u32) -> SoftBodyMaterial {
    body.materials
        .get(index as usize)
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetra_body() -> SoftBody {
        let positions = [
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        let indices = [0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3];
        SoftBody::from_trimesh(&positions, &indices).unwrap()
    }

    fn max_link_strain(body: &SoftBody) -> f32 {
        body.links
            .iter()
            .map(|link| {
                let current = body.nodes[link.nodes[0] as usize]
                    .position
                    .distance(body.nodes[link.nodes[1] as usize].position);
                (current - link.rest_length).abs() / link.rest_length
            })
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_free_fall_matches_gravity() {
        let mut body = tetra_body();
        let gravity = Vec3::new(0.0, -9.81, 0.0);
        for node in &mut body.nodes {
            node.force = gravity * node.mass;
        }
        let start = body.nodes[0].position;

        // Symplectic Euler over one tick: dy = g * h * h summed per substep
        let dt = 1.0 / 60.0;
        step_body(&mut body, dt, 4, 100.0);

        let fallen = start.y - body.nodes[0].position.y;
        assert!(fallen > 0.0);
        assert!(fallen < 9.81 * dt * dt * 1.5);
        // Rigid links under uniform acceleration stay rest-length
        assert!(max_link_strain(&body) < 1e-3);
    }

    #[test]
    fn test_stretched_link_pulls_back() {
        let mut body = tetra_body();
        body.nodes[1].position.x = 2.0; // doubled edge length

        for _ in 0..10 {
            for node in &mut body.nodes {
                node.force = Vec3::ZERO;
            }
            step_body(&mut body, 1.0 / 60.0, 4, 100.0);
        }
        assert!(max_link_strain(&body) < 0.05);
    }

    #[test]
    fn test_pinned_node_never_moves() {
        let mut body = tetra_body();
        body.pin_node(0).unwrap();
        let anchored = body.nodes[0].position;
        for node in &mut body.nodes {
            node.force = Vec3::new(0.0, -9.81, 0.0) * node.mass;
        }

        for _ in 0..30 {
            step_body(&mut body, 1.0 / 60.0, 4, 100.0);
        }
        assert_eq!(body.nodes[0].position, anchored);
        assert_eq!(body.nodes[0].velocity, Vec3::ZERO);
    }

    #[test]
    fn test_velocity_ceiling_is_enforced() {
        let mut body = tetra_body();
        for node in &mut body.nodes {
            node.force = Vec3::new(0.0, -1e6, 0.0);
        }
        step_body(&mut body, 1.0 / 60.0, 4, 10.0);

        for node in &body.nodes {
            assert!(node.velocity.length() <= 10.0 + 1e-3);
        }
    }

    #[test]
    fn test_volume_recovers_after_crush() {
        let mut body = tetra_body();
        let rest = body.rest_volume.unwrap();
        // Crush one corner inward
        body.nodes[3].position *= 0.2;

        for _ in 0..60 {
            for node in &mut body.nodes {
                node.force = Vec3::ZERO;
            }
            step_body(&mut body, 1.0 / 60.0, 4, 100.0);
        }
        let recovered = body.volume();
        assert_relative_eq!(recovered, rest, epsilon = rest * 0.1);
    }

    #[test]
    fn test_determinism_across_runs() {
        let run = || {
            let mut body = tetra_body();
            for node in &mut body.nodes {
                node.force = Vec3::new(0.3, -9.81, 0.1) * node.mass;
            }
            for _ in 0..20 {
                step_body(&mut body, 1.0 / 60.0, 4, 100.0);
            }
            body.nodes.iter().map(|n| n.position).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_damping_slows_body() {
        let mut free = tetra_body();
        let mut damped = tetra_body();
        damped.settings.damping = 0.9;
        for body in [&mut free, &mut damped] {
            for node in &mut body.nodes {
                node.velocity = Vec3::new(5.0, 0.0, 0.0);
                node.force = Vec3::ZERO;
            }
        }

        for _ in 0..30 {
            step_body(&mut free, 1.0 / 60.0, 4, 100.0);
            step_body(&mut damped, 1.0 / 60.0, 4, 100.0);
        }
        let speed = |body: &SoftBody| body.nodes[0].velocity.length();
        assert!(speed(&damped) < speed(&free));
    }

    #[test]
    fn test_prev_position_marks_tick_start() {
        let mut body = tetra_body();
        let before: Vec<Vec3> = body.nodes.iter().map(|n| n.position).collect();
        step_body(&mut body, 1.0 / 60.0, 4, 100.0);

        for (node, start) in body.nodes.iter().zip(before) {
            assert_eq!(node.prev_position, start);
        }
    }
}
