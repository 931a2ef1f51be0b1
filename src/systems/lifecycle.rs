//! Spawning and sleep management for soft bodies.

use bevy::ecs::message::{MessageReader, MessageWriter};
use bevy::prelude::*;

use crate::components::{SoftBody, SoftBodyRenderTarget};
use crate::events::{SoftBodyAsleep, SoftBodySource, SoftBodyWoken, SpawnSoftBody};
use crate::resources::{SoftBodyPreset, SoftBodyPresets, SoftDynamicsConfig};
use crate::trimesh::{extract_mesh_buffers, weld_vertices, Result, WELD_EPSILON};

/// How close to the extreme plane a node must sit for [`SoftBody::pin_side`].
const PIN_SIDE_TOLERANCE: f32 = 1e-3;

/// Build and spawn soft bodies requested through [`SpawnSoftBody`] messages.
///
/// Geometry comes either from raw triangle buffers or from a mesh asset
/// (welded first, with the render-vertex association kept for geometry
/// sync). The preset named by the request drives material, settings, and
/// topology post-processing; explicit fields on the request override the
/// preset. Requests whose mesh asset has not finished loading are retried
/// on the next tick.
///
/// # Arguments
/// * `commands` - Commands for spawning entities
/// * `spawns` - Incoming spawn requests
/// * `pending` - Requests waiting for their mesh asset to load
/// * `presets` - Named preset configurations
/// * `config` - Global solver configuration (seed for constraint shuffling)
/// * `meshes` - Mesh assets to resolve handles against
pub fn spawn_soft_bodies(
    mut commands: Commands,
    mut spawns: MessageReader<SpawnSoftBody>,
    mut pending: Local<Vec<SpawnSoftBody>>,
    presets: Res<SoftBodyPresets>,
    config: Res<SoftDynamicsConfig>,
    meshes: Res<Assets<Mesh>>,
) {
    let requests: Vec<SpawnSoftBody> = pending.drain(..).chain(spawns.read().cloned()).collect();

    for spawn in requests {
        let preset = match presets.get(&spawn.preset) {
            Some(preset) => preset.clone(),
            None => {
                warn!(
                    "unknown soft-body preset {:?}, falling back to default",
                    spawn.preset
                );
                SoftBodyPreset::default()
            }
        };

        match &spawn.source {
            SoftBodySource::Buffers { positions, indices } => {
                let mut body = match SoftBody::from_trimesh(positions, indices) {
                    Ok(body) => body,
                    Err(error) => {
                        warn!("soft body conversion failed: {error}");
                        continue;
                    }
                };
                if let Err(error) = configure_body(&mut body, &spawn, &preset, config.seed) {
                    warn!("soft body configuration failed: {error}");
                    continue;
                }
                attach_body(&mut commands, spawn.target, (body, Transform::IDENTITY));
            }
            SoftBodySource::Mesh(handle) => {
                let Some(mesh) = meshes.get(handle) else {
                    // Asset still loading, try again next tick
                    pending.push(spawn.clone());
                    continue;
                };
                let (mut body, association) = match body_from_mesh(mesh) {
                    Ok(built) => built,
                    Err(error) => {
                        warn!("soft body conversion failed: {error}");
                        continue;
                    }
                };
                if let Err(error) = configure_body(&mut body, &spawn, &preset, config.seed) {
                    warn!("soft body configuration failed: {error}");
                    continue;
                }
                attach_body(
                    &mut commands,
                    spawn.target,
                    (
                        body,
                        SoftBodyRenderTarget {
                            index_association: association,
                        },
                        Mesh3d(handle.clone()),
                        Transform::IDENTITY,
                    ),
                );
            }
        }
    }
}

/// Insert the finished body onto the requested target entity, or spawn a
/// fresh one.
fn attach_body(commands: &mut Commands, target: Option<Entity>, bundle: impl Bundle) {
    match target {
        Some(entity) => match commands.get_entity(entity) {
            Ok(mut entity_commands) => {
                entity_commands.insert(bundle);
            }
            Err(_) => warn!("soft-body target entity {entity} no longer exists"),
        },
        None => {
            commands.spawn(bundle);
        }
    }
}

/// Convert a mesh asset, keeping the welded-node to render-vertex
/// association that geometry sync fans updated positions out through.
fn body_from_mesh(mesh: &Mesh) -> Result<(SoftBody, Vec<Vec<u32>>)> {
    let (positions, indices) = extract_mesh_buffers(mesh)?;
    let (welded_positions, welded_indices, association) =
        weld_vertices(&positions, &indices, WELD_EPSILON);
    let body = SoftBody::from_trimesh(&welded_positions, &welded_indices)?;
    Ok((body, association))
}

/// Apply a preset and the request's overrides to a freshly converted body.
///
/// Order matters: bending links and constraint shuffling work on rest-state
/// topology, the transform bakes world placement into the nodes, pinning
/// picks nodes by world position, and mass distribution skips whatever got
/// pinned.
fn configure_body(
    body: &mut SoftBody,
    spawn: &SpawnSoftBody,
    preset: &SoftBodyPreset,
    seed: u64,
) -> Result<()> {
    body.materials[0] = spawn.material.unwrap_or(preset.material);
    body.settings = spawn.settings.unwrap_or(preset.settings);

    let bending = body.generate_bending_links(preset.bending_hops, 0)?;
    if bending > 0 {
        debug!("generated {bending} bending links");
    }
    if preset.randomize {
        body.randomize_constraints(seed);
    }

    body.apply_transform(&spawn.transform);

    for &index in &spawn.pinned_nodes {
        body.pin_node(index)?;
    }
    if let Some(direction) = spawn.pin_direction {
        let pinned = body.pin_side(direction, PIN_SIDE_TOLERANCE);
        if pinned == 0 {
            warn!("pin direction {direction} matched no nodes");
        }
    }

    body.set_total_mass(
        spawn.total_mass.unwrap_or(preset.total_mass),
        preset.mass_from_faces,
    );
    body.generate_clusters(preset.clusters);
    Ok(())
}

/// Put resting bodies to sleep and wake sleeping bodies that were stirred.
///
/// A body whose fastest node stays below the sleep velocity for the
/// configured delay deactivates: its velocities zero out and the solver and
/// collision passes skip it. A contact or an externally written node
/// velocity reactivates it.
///
/// # Arguments
/// * `time` - Bevy FixedTime resource to get delta time
/// * `config` - Global solver configuration with sleep thresholds
/// * `asleep_events` - Event writer for deactivation notifications
/// * `woken_events` - Event writer for reactivation notifications
/// * `query` - Query for soft-body entities
pub fn update_sleep_state(
    time: Res<Time<Fixed>>,
    config: Res<SoftDynamicsConfig>,
    mut asleep_events: MessageWriter<SoftBodyAsleep>,
    mut woken_events: MessageWriter<SoftBodyWoken>,
    mut query: Query<(Entity, &mut SoftBody)>,
) {
    let dt = time.delta_secs();
    let threshold_squared = config.sleep_velocity * config.sleep_velocity;
    for (entity, mut body) in query.iter_mut() {
        if body.asleep {
            let stirred = body
                .nodes
                .iter()
                .any(|node| node.velocity.length_squared() > threshold_squared);
            if stirred {
                body.wake();
                woken_events.write(SoftBodyWoken { body: entity });
            }
            continue;
        }
        if advance_sleep(&mut body, dt, config.sleep_velocity, config.sleep_delay) {
            asleep_events.write(SoftBodyAsleep { body: entity });
        }
    }
}

/// Advance one body's sleep timer.
///
/// # Returns
/// `true` when the body fell asleep this tick
pub fn advance_sleep(body: &mut SoftBody, dt: f32, sleep_velocity: f32, sleep_delay: f32) -> bool {
    if body.asleep || !body.settings.can_sleep {
        return false;
    }
    let peak_squared = body
        .nodes
        .iter()
        .map(|node| node.velocity.length_squared())
        .fold(0.0f32, f32::max);
    if peak_squared >= sleep_velocity * sleep_velocity {
        body.sleep_timer = 0.0;
        return false;
    }

    body.sleep_timer += dt;
    if body.sleep_timer < sleep_delay {
        return false;
    }
    body.asleep = true;
    for node in &mut body.nodes {
        node.velocity = Vec3::ZERO;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::SoftBodyPresets;
    use approx::assert_relative_eq;

    /// Unit cube as 8 shared vertices and 12 triangles, watertight.
    fn cube_buffers() -> (Vec<f32>, Vec<u32>) {
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

    fn spawn_request(preset: &str) -> SpawnSoftBody {
        let (positions, indices) = cube_buffers();
        SpawnSoftBody::from_buffers(positions, indices).with_preset(preset)
    }

    #[test]
    fn test_configure_applies_preset() {
        let presets = SoftBodyPresets::with_defaults();
        let preset = presets.get("Pressurized").unwrap().clone();
        let spawn = spawn_request("Pressurized");

        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        configure_body(&mut body, &spawn, &preset, 0).unwrap();

        assert_eq!(body.settings.pressure, 250.0);
        assert_eq!(body.materials[0].volume_stiffness, 0.9);
        assert_relative_eq!(body.total_mass(), 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_request_overrides_beat_preset() {
        let presets = SoftBodyPresets::with_defaults();
        let preset = presets.get("Jelly").unwrap().clone();
        let spawn = spawn_request("Jelly").with_total_mass(7.0);

        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        configure_body(&mut body, &spawn, &preset, 0).unwrap();

        assert_relative_eq!(body.total_mass(), 7.0, epsilon = 1e-4);
    }

    #[test]
    fn test_configure_adds_bending_links_and_clusters() {
        let presets = SoftBodyPresets::with_defaults();
        let preset = presets.get("Jelly").unwrap().clone();
        let spawn = spawn_request("Jelly");

        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        let structural = body.links.len();
        configure_body(&mut body, &spawn, &preset, 0).unwrap();

        assert!(body.links.len() > structural);
        assert!(body.links.iter().any(|link| link.bending));
        assert!(!body.clusters.is_empty());
    }

    #[test]
    fn test_pin_direction_pins_extreme_nodes() {
        let presets = SoftBodyPresets::with_defaults();
        let preset = presets.get("Cloth").unwrap().clone();
        let spawn = spawn_request("Cloth").with_pinned_side(Vec3::Y);

        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        configure_body(&mut body, &spawn, &preset, 0).unwrap();

        let pinned: Vec<_> = body.nodes.iter().filter(|node| node.is_pinned()).collect();
        assert_eq!(pinned.len(), 4);
        for node in pinned {
            assert_relative_eq!(node.position.y, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_pinned_node_list_is_honored() {
        let presets = SoftBodyPresets::with_defaults();
        let preset = presets.get("Jelly").unwrap().clone();
        let spawn = spawn_request("Jelly").with_pinned_nodes(vec![0, 6]);

        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        configure_body(&mut body, &spawn, &preset, 0).unwrap();

        assert!(body.nodes[0].is_pinned());
        assert!(body.nodes[6].is_pinned());
        assert_eq!(body.nodes.iter().filter(|node| node.is_pinned()).count(), 2);

        // An out-of-range pin is a configuration error
        let bad = spawn_request("Jelly").with_pinned_nodes(vec![99]);
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        assert!(configure_body(&mut body, &bad, &preset, 0).is_err());
    }

    #[test]
    fn test_transform_is_baked_into_nodes() {
        let presets = SoftBodyPresets::with_defaults();
        let preset = presets.get("Jelly").unwrap().clone();
        let spawn =
            spawn_request("Jelly").with_transform(Transform::from_xyz(0.0, 10.0, 0.0));

        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        configure_body(&mut body, &spawn, &preset, 0).unwrap();

        for node in &body.nodes {
            assert!(node.position.y >= 10.0 - 1e-4);
        }
    }

    #[test]
    fn test_body_sleeps_after_delay() {
        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        for node in &mut body.nodes {
            node.velocity = Vec3::new(0.01, 0.0, 0.0);
        }

        let dt = 0.25;
        assert!(!advance_sleep(&mut body, dt, 0.05, 1.0));
        assert!(!advance_sleep(&mut body, dt, 0.05, 1.0));
        assert!(!advance_sleep(&mut body, dt, 0.05, 1.0));
        assert!(advance_sleep(&mut body, dt, 0.05, 1.0));

        assert!(body.asleep);
        for node in &body.nodes {
            assert_eq!(node.velocity, Vec3::ZERO);
        }
        // Already asleep, no second transition
        assert!(!advance_sleep(&mut body, dt, 0.05, 1.0));
    }

    #[test]
    fn test_fast_node_resets_sleep_timer() {
        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();

        assert!(!advance_sleep(&mut body, 0.5, 0.05, 1.0));
        assert!(body.sleep_timer > 0.0);

        body.nodes[0].velocity = Vec3::new(1.0, 0.0, 0.0);
        assert!(!advance_sleep(&mut body, 0.5, 0.05, 1.0));
        assert_eq!(body.sleep_timer, 0.0);
    }

    #[test]
    fn test_sleep_disabled_by_settings() {
        let (positions, indices) = cube_buffers();
        let mut body = SoftBody::from_trimesh(&positions, &indices).unwrap();
        body.settings.can_sleep = false;

        for _ in 0..100 {
            assert!(!advance_sleep(&mut body, 0.5, 0.05, 1.0));
        }
        assert!(!body.asleep);
    }
}
