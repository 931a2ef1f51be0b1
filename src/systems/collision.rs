//! Collision systems - swept world raycasts and node-node resolution.

use std::collections::{HashMap, HashSet};

#[cfg(feature = "dim3")]
use bevy::ecs::message::MessageReader;
use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;

#[cfg(feature = "dim3")]
use avian3d::prelude::*;

use crate::components::{SoftBody, SoftContactSurface};
use crate::events::{ContactKind, SoftBodyContact, SoftBodyWoken};
use crate::trimesh::edge_key;
use crate::types::{CollisionFlags, Node, NodeFlags};

/// Ticks shorter than this are skipped.
const MIN_TICK: f32 = 1e-6;

/// Node travel below this is treated as stationary.
const MIN_TRAVEL: f32 = 1e-9;

/// Clear per-node contact flags before the collision passes run.
///
/// # Arguments
/// * `query` - Query for soft bodies to reset
pub fn begin_contact_pass(mut query: Query<&mut SoftBody>) {
    for mut body in query.iter_mut() {
        for node in &mut body.nodes {
            node.flags.remove(NodeFlags::COLLIDING);
        }
    }
}

/// Collide soft-body nodes against rigid world geometry.
///
/// Casts a ray per free node from its tick-start position along its travel,
/// extended by the collision margin so resting contacts stay detected. Uses
/// avian3d SpatialQuery for actual physics-based collision detection. Hit
/// nodes are pushed out to the margin and their velocity response applies
/// friction and restitution; the reported contacts drive the rigid-body
/// feedback pass.
///
/// # Arguments
/// * `time` - Bevy FixedTime resource to get delta time
/// * `spatial_query` - Avian3D spatial query against world colliders
/// * `contacts` - Event writer for contact notifications
/// * `bodies` - Query for soft-body entities
/// * `surfaces` - Query for contact response overrides on rigid entities
#[cfg(feature = "dim3")]
pub fn collide_with_world(
    time: Res<Time<Fixed>>,
    spatial_query: SpatialQuery,
    mut contacts: MessageWriter<SoftBodyContact>,
    mut bodies: Query<(Entity, &mut SoftBody)>,
    surfaces: Query<&SoftContactSurface>,
) {
    let dt = time.delta_secs();
    if dt <= MIN_TICK {
        return;
    }

    for (entity, mut body) in bodies.iter_mut() {
        if body.asleep || !body.settings.collision.contains(CollisionFlags::WORLD) {
            continue;
        }
        let margin = body.settings.margin;
        let body_friction = body.settings.friction;

        for index in 0..body.nodes.len() {
            let (origin, travel) = {
                let node = &body.nodes[index];
                if node.inv_mass == 0.0 {
                    continue;
                }
                (node.prev_position, node.position - node.prev_position)
            };
            let distance = travel.length();
            if distance < MIN_TRAVEL {
                continue;
            }
            let Ok(direction) = Dir3::new(travel / distance) else {
                continue;
            };

            if let Some(hit) = spatial_query.cast_ray(
                origin,
                direction,
                distance + margin,
                true, // solid
                &SpatialQueryFilter::default(),
            ) {
                let contact_point = origin + *direction * hit.distance;
                let surface = surfaces.get(hit.entity).copied().unwrap_or_default();

                let impulse = resolve_world_contact(
                    &mut body.nodes[index],
                    contact_point,
                    hit.normal,
                    margin,
                    body_friction * surface.friction,
                    surface.restitution,
                );

                contacts.write(SoftBodyContact {
                    body: entity,
                    surface: hit.entity,
                    node: index as u32,
                    point: contact_point,
                    normal: hit.normal,
                    impulse: impulse.length(),
                    kind: ContactKind::World,
                });
            }
        }
    }
}

/// Fallback world collision when the dim3 feature is not enabled.
///
/// Without a physics backend there is no world geometry to test against.
#[cfg(not(feature = "dim3"))]
pub fn collide_with_world(
    _bodies: Query<(Entity, &mut SoftBody)>,
    _surfaces: Query<&SoftContactSurface>,
) {
}

/// Push world-contact reactions into the rigid bodies that were hit.
///
/// For every contact the world pass reported, the normal impulse is taken
/// out of the hit entity's velocity, scaled by its surface's feedback
/// fraction. Entities without a velocity (static geometry) absorb the hit.
///
/// # Arguments
/// * `contacts` - Contacts reported by the world collision pass
/// * `surfaces` - Query for contact response overrides on rigid entities
/// * `rigid_velocities` - Query for rigid-body velocities receiving feedback
#[cfg(feature = "dim3")]
pub fn apply_contact_feedback(
    mut contacts: MessageReader<SoftBodyContact>,
    surfaces: Query<&SoftContactSurface>,
    mut rigid_velocities: Query<&mut LinearVelocity>,
) {
    for contact in contacts.read() {
        if contact.kind != ContactKind::World {
            continue;
        }
        let feedback = surfaces
            .get(contact.surface)
            .copied()
            .unwrap_or_default()
            .feedback;
        if feedback == 0.0 {
            continue;
        }
        if let Ok(mut velocity) = rigid_velocities.get_mut(contact.surface) {
            velocity.0 -= contact.normal * (contact.impulse * feedback);
        }
    }
}

/// Resolve one node-vs-world contact in place.
///
/// Pushes the node out to the collision margin, reflects the normal
/// velocity by the restitution, and drains tangential velocity by the
/// friction coefficient.
///
/// # Arguments
/// * `node` - node to correct
/// * `contact_point` - world-space surface point that was hit
/// * `normal` - surface normal at the contact
/// * `margin` - collision skin radius to rest at
/// * `friction` - combined friction coefficient, `[0, 1]`
/// * `restitution` - bounce-back coefficient, `[0, 1]`
///
/// # Returns
/// The impulse applied to the node (kg·m/s); its negation acts on the
/// surface
pub fn resolve_world_contact(
    node: &mut Node,
    contact_point: Vec3,
    normal: Vec3,
    margin: f32,
    friction: f32,
    restitution: f32,
) -> Vec3 {
    node.position = contact_point + normal * margin;

    let velocity = node.velocity;
    let normal_speed = velocity.dot(normal);
    let tangential = velocity - normal * normal_speed;
    let bounced = if normal_speed < 0.0 {
        -normal_speed * restitution.clamp(0.0, 1.0)
    } else {
        normal_speed
    };
    node.velocity = tangential * (1.0 - friction.clamp(0.0, 1.0)) + normal * bounced;
    node.flags.insert(NodeFlags::COLLIDING);

    (node.velocity - velocity) * node.mass
}

/// Collide soft-body nodes against each other.
///
/// Covers both contacts between different bodies and self contacts between
/// non-neighboring nodes of one body. Nodes go into a spatial hash sized by
/// the largest collision margin; candidate pairs from the same or adjacent
/// cells are resolved sequentially in deterministic cell order. Cluster
/// bounds cull body pairs that cannot touch. Contact with a sleeping body
/// wakes it.
///
/// # Arguments
/// * `time` - Bevy FixedTime resource to get delta time
/// * `contacts` - Event writer for contact notifications
/// * `woken` - Event writer for bodies reactivated by a contact
/// * `query` - Query for soft-body entities
pub fn collide_soft_bodies(
    time: Res<Time<Fixed>>,
    mut contacts: MessageWriter<SoftBodyContact>,
    mut woken: MessageWriter<SoftBodyWoken>,
    mut query: Query<(Entity, &mut SoftBody)>,
) {
    let dt = time.delta_secs();
    if dt <= MIN_TICK {
        return;
    }

    let mut bodies: Vec<(Entity, Mut<SoftBody>)> = query.iter_mut().collect();
    if bodies.is_empty() {
        return;
    }

    // Broad phase over cluster bounds: a body only enters the grid when it
    // self collides or its bounds overlap another body's.
    let bounds: Vec<BodyBounds> = bodies.iter().map(|(_, body)| body_bounds(body)).collect();
    let mut active = vec![false; bodies.len()];
    for i in 0..bodies.len() {
        let modes_i = bodies[i].1.settings.collision;
        if modes_i.contains(CollisionFlags::SELF) {
            active[i] = true;
        }
        if !modes_i.contains(CollisionFlags::SOFT_BODY) {
            continue;
        }
        for j in i + 1..bodies.len() {
            if bodies[j].1.settings.collision.contains(CollisionFlags::SOFT_BODY)
                && bounds[i].overlaps(&bounds[j])
            {
                active[i] = true;
                active[j] = true;
            }
        }
    }
    if !active.contains(&true) {
        return;
    }

    // One grid for everything, sized by the largest pair radius.
    let cell_size = bodies
        .iter()
        .map(|(_, body)| body.settings.margin)
        .fold(0.01f32, f32::max)
        * 2.0;

    // Per-body lookup of linked node pairs, for bodies that self collide.
    let linked: Vec<Option<HashSet<(u32, u32)>>> = bodies
        .iter()
        .map(|(_, body)| {
            body.settings.collision.contains(CollisionFlags::SELF).then(|| {
                body.links
                    .iter()
                    .map(|link| edge_key(link.nodes[0], link.nodes[1]))
                    .collect()
            })
        })
        .collect();

    let mut grid: HashMap<(i32, i32, i32), Vec<(usize, u32)>> = HashMap::new();
    for (body_index, (_, body)) in bodies.iter().enumerate() {
        if !active[body_index] {
            continue;
        }
        for (node_index, node) in body.nodes.iter().enumerate() {
            grid.entry(cell_key(node.position, cell_size))
                .or_default()
                .push((body_index, node_index as u32));
        }
    }

    // Forward half of the 27-cell neighborhood, so each pair is seen once.
    const NEIGHBORS: [(i32, i32, i32); 13] = [
        (1, -1, -1),
        (1, -1, 0),
        (1, -1, 1),
        (1, 0, -1),
        (1, 0, 0),
        (1, 0, 1),
        (1, 1, -1),
        (1, 1, 0),
        (1, 1, 1),
        (0, 1, -1),
        (0, 1, 0),
        (0, 1, 1),
        (0, 0, 1),
    ];

    // Sorted cell order keeps the sequential resolution deterministic.
    let mut cells: Vec<(i32, i32, i32)> = grid.keys().copied().collect();
    cells.sort_unstable();

    for cell in cells {
        let occupants = &grid[&cell];
        for (slot, &a) in occupants.iter().enumerate() {
            for &b in &occupants[slot + 1..] {
                resolve_candidate(a, b, &mut bodies, &linked, dt, &mut contacts, &mut woken);
            }
            for offset in NEIGHBORS {
                let neighbor = (cell.0 + offset.0, cell.1 + offset.1, cell.2 + offset.2);
                if let Some(others) = grid.get(&neighbor) {
                    for &b in others {
                        resolve_candidate(a, b, &mut bodies, &linked, dt, &mut contacts, &mut woken);
                    }
                }
            }
        }
    }
}

fn cell_key(position: Vec3, cell_size: f32) -> (i32, i32, i32) {
    (
        (position.x / cell_size).floor() as i32,
        (position.y / cell_size).floor() as i32,
        (position.z / cell_size).floor() as i32,
    )
}

/// Bounding sphere of one body, inflated by its collision margin.
#[derive(Debug, Clone, Copy)]
struct BodyBounds {
    center: Vec3,
    radius: f32,
}

impl BodyBounds {
    fn overlaps(&self, other: &Self) -> bool {
        self.center.distance_squared(other.center)
            <= (self.radius + other.radius) * (self.radius + other.radius)
    }
}

/// Merge a body's cluster spheres into one bounding sphere. Bodies without
/// clusters fall back to a sweep over their nodes.
fn body_bounds(body: &SoftBody) -> BodyBounds {
    let margin = body.settings.margin;
    if body.clusters.is_empty() {
        let count = body.nodes.len().max(1) as f32;
        let center = body.nodes.iter().map(|node| node.position).sum::<Vec3>() / count;
        let radius = body
            .nodes
            .iter()
            .map(|node| node.position.distance(center))
            .fold(0.0f32, f32::max);
        return BodyBounds {
            center,
            radius: radius + margin,
        };
    }
    let count = body.clusters.len() as f32;
    let center = body.clusters.iter().map(|cluster| cluster.center).sum::<Vec3>() / count;
    let radius = body
        .clusters
        .iter()
        .map(|cluster| cluster.center.distance(center) + cluster.radius)
        .fold(0.0f32, f32::max);
    BodyBounds {
        center,
        radius: radius + margin,
    }
}

/// Test one candidate node pair from the spatial hash and resolve it if it
/// actually overlaps and the collision modes allow it.
fn resolve_candidate(
    a: (usize, u32),
    b: (usize, u32),
    bodies: &mut [(Entity, Mut<SoftBody>)],
    linked: &[Option<HashSet<(u32, u32)>>],
    dt: f32,
    contacts: &mut MessageWriter<SoftBodyContact>,
    woken: &mut MessageWriter<SoftBodyWoken>,
) {
    if a.0 == b.0 {
        let body_index = a.0;
        let (entity, radius, friction) = {
            let (entity, body) = &bodies[body_index];
            if !body.settings.collision.contains(CollisionFlags::SELF) {
                return;
            }
            (*entity, body.settings.margin * 2.0, body.settings.friction)
        };
        if a.1 == b.1 {
            return;
        }
        if let Some(Some(links)) = linked.get(body_index) {
            if links.contains(&edge_key(a.1, b.1)) {
                return;
            }
        }
        let body = &mut bodies[body_index].1;
        if body.asleep {
            return;
        }
        // Disjoint node borrows within one body
        let (lo, hi) = (a.1.min(b.1) as usize, a.1.max(b.1) as usize);
        let (head, tail) = body.nodes.split_at_mut(hi);
        if let Some((point, normal, impulse)) =
            resolve_node_pair(&mut head[lo], &mut tail[0], radius, friction, dt)
        {
            contacts.write(SoftBodyContact {
                body: entity,
                surface: entity,
                node: a.1,
                point,
                normal,
                impulse,
                kind: ContactKind::SelfContact,
            });
        }
        return;
    }

    // Two different bodies: both must opt in, and at least one is awake.
    let (i, j) = (a.0.min(b.0), a.0.max(b.0));
    let (node_i, node_j) = if a.0 < b.0 { (a.1, b.1) } else { (b.1, a.1) };
    {
        let modes_i = bodies[i].1.settings.collision;
        let modes_j = bodies[j].1.settings.collision;
        if !modes_i.contains(CollisionFlags::SOFT_BODY)
            || !modes_j.contains(CollisionFlags::SOFT_BODY)
        {
            return;
        }
        if bodies[i].1.asleep && bodies[j].1.asleep {
            return;
        }
    }

    let radius = bodies[i].1.settings.margin + bodies[j].1.settings.margin;
    let friction = bodies[i].1.settings.friction * bodies[j].1.settings.friction;
    let (left, right) = bodies.split_at_mut(j);
    let (entity_i, body_i) = &mut left[i];
    let (entity_j, body_j) = &mut right[0];

    if let Some((point, normal, impulse)) = resolve_node_pair(
        &mut body_i.nodes[node_i as usize],
        &mut body_j.nodes[node_j as usize],
        radius,
        friction,
        dt,
    ) {
        for (entity, body) in [(*entity_i, &mut **body_i), (*entity_j, &mut **body_j)] {
            if body.asleep {
                body.wake();
                woken.write(SoftBodyWoken { body: entity });
            }
        }
        contacts.write(SoftBodyContact {
            body: *entity_i,
            surface: *entity_j,
            node: node_i,
            point,
            normal,
            impulse,
            kind: ContactKind::SoftBody,
        });
    }
}

/// Resolve an overlapping node pair in place.
///
/// Separates the nodes along their offset weighted by inverse mass, removes
/// approaching relative velocity, and drains tangential slip by the
/// friction coefficient.
///
/// # Arguments
/// * `a` - first node
/// * `b` - second node
/// * `radius` - combined collision radius of the pair
/// * `friction` - combined friction coefficient, `[0, 1]`
/// * `dt` - fixed tick length, used to express the impulse
///
/// # Returns
/// Contact point, normal from `a` to `b`, and impulse magnitude when the
/// pair overlapped
pub fn resolve_node_pair(
    a: &mut Node,
    b: &mut Node,
    radius: f32,
    friction: f32,
    dt: f32,
) -> Option<(Vec3, Vec3, f32)> {
    let w_sum = a.inv_mass + b.inv_mass;
    if w_sum == 0.0 {
        return None;
    }
    let delta = b.position - a.position;
    let distance = delta.length();
    if distance >= radius {
        return None;
    }
    let (normal, penetration) = if distance > MIN_TRAVEL {
        (delta / distance, radius - distance)
    } else {
        // Coincident nodes have no direction; pick one
        (Vec3::Y, radius)
    };

    a.position -= normal * (penetration * a.inv_mass / w_sum);
    b.position += normal * (penetration * b.inv_mass / w_sum);

    let approach = (b.velocity - a.velocity).dot(normal);
    if approach < 0.0 {
        let along = normal * approach;
        a.velocity += along * (a.inv_mass / w_sum);
        b.velocity -= along * (b.inv_mass / w_sum);
    }
    let relative = b.velocity - a.velocity;
    let slip = (relative - normal * relative.dot(normal)) * friction.clamp(0.0, 1.0);
    a.velocity += slip * (a.inv_mass / w_sum);
    b.velocity -= slip * (b.inv_mass / w_sum);

    a.flags.insert(NodeFlags::COLLIDING);
    b.flags.insert(NodeFlags::COLLIDING);

    let point = (a.position + b.position) * 0.5;
    let impulse = penetration / dt.max(MIN_TICK) / w_sum;
    Some((point, normal, impulse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_world_contact_rests_at_margin() {
        let mut node = Node::new(Vec3::new(0.0, -0.1, 0.0));
        node.velocity = Vec3::new(2.0, -5.0, 0.0);

        let impulse =
            resolve_world_contact(&mut node, Vec3::ZERO, Vec3::Y, 0.04, 0.0, 0.0);

        assert_relative_eq!(node.position.y, 0.04, epsilon = 1e-6);
        // Inelastic floor: downward velocity removed, tangential kept
        assert_relative_eq!(node.velocity.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(node.velocity.x, 2.0, epsilon = 1e-6);
        assert!(impulse.y > 0.0);
        assert!(node.flags.contains(NodeFlags::COLLIDING));
    }

    #[test]
    fn test_world_contact_friction_and_bounce() {
        let mut node = Node::new(Vec3::new(0.0, -0.1, 0.0));
        node.velocity = Vec3::new(2.0, -4.0, 0.0);

        resolve_world_contact(&mut node, Vec3::ZERO, Vec3::Y, 0.04, 1.0, 0.5);

        // Full friction wipes tangential motion, half restitution bounces
        assert_relative_eq!(node.velocity.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(node.velocity.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_separating_contact_keeps_normal_velocity() {
        let mut node = Node::new(Vec3::new(0.0, 0.01, 0.0));
        node.velocity = Vec3::new(0.0, 3.0, 0.0);

        resolve_world_contact(&mut node, Vec3::ZERO, Vec3::Y, 0.04, 0.0, 0.9);
        assert_relative_eq!(node.velocity.y, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_node_pair_separates_symmetrically() {
        let mut a = Node::new(Vec3::new(-0.01, 0.0, 0.0));
        let mut b = Node::new(Vec3::new(0.01, 0.0, 0.0));

        let result = resolve_node_pair(&mut a, &mut b, 0.08, 0.0, 1.0 / 60.0);
        let (_, normal, impulse) = result.unwrap();

        assert_relative_eq!(normal.x, 1.0, epsilon = 1e-6);
        assert!(impulse > 0.0);
        // Equal masses split the push evenly
        assert_relative_eq!(a.position.x, -0.04, epsilon = 1e-5);
        assert_relative_eq!(b.position.x, 0.04, epsilon = 1e-5);
        assert_relative_eq!(b.position.x - a.position.x, 0.08, epsilon = 1e-5);
    }

    #[test]
    fn test_node_pair_respects_pinned() {
        let mut a = Node::new(Vec3::new(-0.01, 0.0, 0.0));
        a.pin();
        let mut b = Node::new(Vec3::new(0.01, 0.0, 0.0));

        resolve_node_pair(&mut a, &mut b, 0.08, 0.0, 1.0 / 60.0).unwrap();
        assert_eq!(a.position.x, -0.01);
        assert_relative_eq!(b.position.x, 0.07, epsilon = 1e-5);

        // Two pinned nodes cannot be separated at all
        let mut c = Node::new(Vec3::ZERO);
        c.pin();
        let mut d = Node::new(Vec3::new(0.001, 0.0, 0.0));
        d.pin();
        assert!(resolve_node_pair(&mut c, &mut d, 0.08, 0.0, 1.0 / 60.0).is_none());
    }

    #[test]
    fn test_node_pair_ignores_separated_nodes() {
        let mut a = Node::new(Vec3::ZERO);
        let mut b = Node::new(Vec3::new(1.0, 0.0, 0.0));
        assert!(resolve_node_pair(&mut a, &mut b, 0.08, 0.0, 1.0 / 60.0).is_none());
    }

    #[test]
    fn test_coincident_nodes_get_a_direction() {
        let mut a = Node::new(Vec3::ZERO);
        let mut b = Node::new(Vec3::ZERO);

        let (_, normal, _) = resolve_node_pair(&mut a, &mut b, 0.08, 0.0, 1.0 / 60.0).unwrap();
        assert_eq!(normal, Vec3::Y);
        assert!(b.position.y > a.position.y);
    }

    #[test]
    fn test_approaching_pair_stops_approaching() {
        let mut a = Node::new(Vec3::new(-0.01, 0.0, 0.0));
        let mut b = Node::new(Vec3::new(0.01, 0.0, 0.0));
        a.velocity = Vec3::new(1.0, 0.0, 0.0);
        b.velocity = Vec3::new(-1.0, 0.0, 0.0);

        resolve_node_pair(&mut a, &mut b, 0.08, 0.0, 1.0 / 60.0).unwrap();
        let approach = (b.velocity - a.velocity).x;
        assert!(approach.abs() < 1e-5);
    }

    #[test]
    fn test_cell_key_quantizes() {
        assert_eq!(cell_key(Vec3::new(0.05, -0.05, 0.0), 0.1), (0, -1, 0));
        assert_eq!(cell_key(Vec3::new(-0.001, 0.0, 0.25), 0.1), (-1, 0, 2));
    }

    #[test]
    fn test_body_bounds_cover_all_nodes() {
        let nodes = vec![
            Node::new(Vec3::new(-1.0, 0.0, 0.0)),
            Node::new(Vec3::new(1.0, 0.0, 0.0)),
            Node::new(Vec3::new(0.0, 2.0, 0.0)),
        ];
        let body = SoftBody::new(nodes);
        let bounds = body_bounds(&body);

        for node in &body.nodes {
            assert!(bounds.center.distance(node.position) <= bounds.radius + 1e-5);
        }
    }

    #[test]
    fn test_distant_bounds_do_not_overlap() {
        let near = BodyBounds {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let far = BodyBounds {
            center: Vec3::new(5.0, 0.0, 0.0),
            radius: 1.0,
        };
        let touching = BodyBounds {
            center: Vec3::new(1.5, 0.0, 0.0),
            radius: 1.0,
        };
        assert!(!near.overlaps(&far));
        assert!(near.overlaps(&touching));
    }
}
