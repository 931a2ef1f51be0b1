//! External force accumulation - gravity, wind, drag, and pressure.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::components::SoftBody;
use crate::resources::{SoftDynamicsConfig, SoftDynamicsEnvironment};

/// Drag coefficient applied to every node, sized for thin flexible surfaces.
const NODE_DRAG_COEFFICIENT: f32 = 1.2;

/// Accumulate external forces on every awake body.
///
/// Runs in FixedUpdate at the start of each solver tick. Node forces are
/// cleared and rebuilt from gravity, aerodynamic drag against the wind
/// field, and internal pressure for closed bodies.
///
/// # Arguments
/// * `time` - Bevy FixedTime resource, used to vary wind gusts per tick
/// * `env` - Environment resource with gravity, medium density, and wind
/// * `config` - Global configuration resource, seeds the gust sampling
/// * `query` - Query for soft bodies to update
pub fn apply_external_forces(
    time: Res<Time<Fixed>>,
    env: Res<SoftDynamicsEnvironment>,
    config: Res<SoftDynamicsConfig>,
    mut query: Query<&mut SoftBody>,
) {
    // One gust per tick, shared by all bodies. Seeding from the fixed clock
    // keeps runs with the same seed identical.
    let tick = time.elapsed().as_nanos() as u64;
    let wind = env.wind + sample_gust(config.seed ^ tick, env.turbulence);

    query.par_iter_mut().for_each(|mut body| {
        if body.asleep {
            return;
        }

        for node in &mut body.nodes {
            node.force = Vec3::ZERO;
            if node.is_pinned() {
                continue;
            }
            node.force += env.gravity * node.mass;
            node.force += aerodynamic_drag(wind - node.velocity, node.area, env.air_density);
        }

        let pressure = body.settings.pressure;
        if pressure != 0.0 {
            accumulate_pressure(&mut body, pressure);
        }
    });
}

/// Random gust vector sampled from a normal distribution.
///
/// # Arguments
/// * `seed` - RNG seed for this tick
/// * `turbulence` - standard deviation of each gust component (m/s)
///
/// # Returns
/// A gust velocity to add to the steady wind, zero when turbulence is off
pub fn sample_gust(seed: u64, turbulence: f32) -> Vec3 {
    if turbulence <= 0.0 {
        return Vec3::ZERO;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    match Normal::new(0.0f32, turbulence) {
        Ok(gust) => Vec3::new(
            gust.sample(&mut rng),
            gust.sample(&mut rng),
            gust.sample(&mut rng),
        ),
        Err(_) => Vec3::ZERO,
    }
}

/// Quadratic aerodynamic drag on one node.
///
/// Uses the drag equation: F_drag = 0.5 * ρ * |v|² * Cd * A, directed along
/// the relative flow, with the node's share of the surface area.
///
/// # Arguments
/// * `relative_flow` - air velocity relative to the node (wind minus node
///   velocity)
/// * `area` - node surface area in m²
/// * `air_density` - density of the surrounding medium in kg/m³
///
/// # Returns
/// The drag force vector acting on the node
pub fn aerodynamic_drag(relative_flow: Vec3, area: f32, air_density: f32) -> Vec3 {
    let speed = relative_flow.length();
    if speed < 1e-4 || area <= 0.0 {
        return Vec3::ZERO;
    }
    relative_flow * (0.5 * air_density * speed * NODE_DRAG_COEFFICIENT * area)
}

/// Accumulate internal pressure forces on a closed body.
///
/// Each face pushes its three corner nodes outward along the face normal.
/// The effective pressure scales with `rest_volume / volume`, so a squeezed
/// body pushes back harder and an over-inflated one relaxes.
///
/// # Arguments
/// * `body` - body to update; open bodies are left untouched
/// * `pressure` - gauge pressure from the body settings
pub fn accumulate_pressure(body: &mut SoftBody, pressure: f32) {
    let Some(rest_volume) = body.rest_volume else {
        return;
    };
    let volume = body.volume();
    if volume.abs() < 1e-6 || rest_volume.abs() < 1e-6 {
        return;
    }
    let effective = pressure * rest_volume / volume;

    for i in 0..body.faces.len() {
        let [a, b, c] = body.faces[i].nodes;
        let pa = body.nodes[a as usize].position;
        let pb = body.nodes[b as usize].position;
        let pc = body.nodes[c as usize].position;
        // cross / 2 is the area-weighted outward normal; a third per corner.
        let face_force = (pb - pa).cross(pc - pa) * (effective / 6.0);
        for &n in &body.faces[i].nodes {
            let node = &mut body.nodes[n as usize];
            if !node.is_pinned() {
                node.force += face_force;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_drag_opposes_motion() {
        // Still air, node moving along +X: flow relative to the node is -X
        let force = aerodynamic_drag(Vec3::new(-10.0, 0.0, 0.0), 0.1, 1.225);
        assert!(force.x < 0.0);
        assert_eq!(force.y, 0.0);

        assert_eq!(aerodynamic_drag(Vec3::ZERO, 0.1, 1.225), Vec3::ZERO);
        assert_eq!(aerodynamic_drag(Vec3::X, 0.0, 1.225), Vec3::ZERO);
    }

    #[test]
    fn test_drag_grows_quadratically() {
        let slow = aerodynamic_drag(Vec3::new(-1.0, 0.0, 0.0), 0.1, 1.225).length();
        let fast = aerodynamic_drag(Vec3::new(-2.0, 0.0, 0.0), 0.1, 1.225).length();
        assert!((fast / slow - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_gust_is_deterministic() {
        let a = sample_gust(42, 1.5);
        let b = sample_gust(42, 1.5);
        assert_eq!(a, b);
        assert_eq!(sample_gust(42, 0.0), Vec3::ZERO);
    }

    #[test]
    fn test_pressure_pushes_outward() {
        let mut body = tetra_body();
        accumulate_pressure(&mut body, 100.0);

        let centroid = body
            .nodes
            .iter()
            .map(|n| n.position)
            .sum::<Vec3>()
            / body.nodes.len() as f32;
        for node in &body.nodes {
            let outward = node.position - centroid;
            assert!(node.force.dot(outward) > 0.0);
        }
    }

    #[test]
    fn test_pressure_skips_open_bodies() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let mut body = SoftBody::from_trimesh(&positions, &[0, 1, 2]).unwrap();
        assert!(body.rest_volume.is_none());

        accumulate_pressure(&mut body, 100.0);
        assert!(body.nodes.iter().all(|n| n.force == Vec3::ZERO));
    }

    #[test]
    fn test_squeezed_body_pushes_back_harder() {
        let mut inflated = tetra_body();
        let mut squeezed = tetra_body();
        squeezed.scale(Vec3::splat(0.5));
        // Pretend the squeezed body still wants its original volume
        squeezed.rest_volume = inflated.rest_volume;

        accumulate_pressure(&mut inflated, 100.0);
        accumulate_pressure(&mut squeezed, 100.0);

        let total = |body: &SoftBody| -> f32 {
            body.nodes.iter().map(|n| n.force.length()).sum()
        };
        assert!(total(&squeezed) > total(&inflated));
    }
}
