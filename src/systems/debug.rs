use crate::components::SoftBody;
use bevy::prelude::*;

/// Draw debug gizmos for soft bodies.
///
/// Draws links, pinned nodes, and cluster bounds for simulated bodies.
pub fn draw_soft_body_debug(
    mut gizmos: Gizmos,
    query: Query<&SoftBody>,
    config: Res<crate::resources::SoftDynamicsConfig>,
) {
    if !config.debug_draw {
        return;
    }

    for body in query.iter() {
        // Structural links in green, bending links in blue
        for link in &body.links {
            let a = body.nodes[link.nodes[0] as usize].position;
            let b = body.nodes[link.nodes[1] as usize].position;
            let color = if link.bending {
                Color::srgb(0.2, 0.4, 1.0)
            } else {
                Color::srgb(0.0, 1.0, 0.0)
            };
            gizmos.line(a, b, color);
        }

        for node in &body.nodes {
            if node.is_pinned() {
                gizmos.sphere(node.position, 0.03, Color::srgb(1.0, 0.0, 0.0));
            }
        }

        for cluster in &body.clusters {
            gizmos.sphere(
                cluster.center,
                cluster.radius,
                Color::srgba(1.0, 1.0, 0.0, 0.25),
            );
        }
    }
}
