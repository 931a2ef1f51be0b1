//! Capture and restore of soft-body motion state.
//!
//! A snapshot holds the per-node dynamic state of one body, detached from
//! its topology. Snapshots serialize to compact binary for save games or
//! replication, and restore onto a body converted from the same mesh.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::SoftBody;

/// Errors raised when restoring or transcoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot was captured from a body with a different node count.
    #[error("snapshot holds {snapshot} nodes but the body has {body}")]
    NodeCountMismatch { snapshot: usize, body: usize },
    /// Binary encoding or decoding failed.
    #[error("snapshot serialization failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// Dynamic state of one soft body at a point in time.
///
/// Captures only what the solver mutates: node motion and the sleep state.
/// Topology, materials, and settings are reproduced by converting the same
/// mesh again, so they are not stored.
///
/// # Fields
/// * `positions` - node positions in world space
/// * `velocities` - node velocities
/// * `asleep` - whether the body was deactivated
/// * `sleep_timer` - accumulated seconds below the sleep threshold
///
/// # Example
/// ```
/// use bevy_soft_dynamics::components::SoftBody;
///
/// let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
/// let mut body = SoftBody::from_trimesh(&positions, &[0, 1, 2]).unwrap();
/// let snapshot = body.capture();
/// let bytes = snapshot.to_bytes().unwrap();
/// body.restore(&snapshot).unwrap();
/// assert!(!bytes.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftBodySnapshot {
    /// Node positions in world space
    pub positions: Vec<Vec3>,
    /// Node velocities
    pub velocities: Vec<Vec3>,
    /// Whether the body was deactivated
    pub asleep: bool,
    /// Accumulated seconds below the sleep threshold
    pub sleep_timer: f32,
}

impl SoftBodySnapshot {
    /// Encodes the snapshot to a compact binary buffer.
    ///
    /// # Errors
    /// Propagates encoder failures.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes a snapshot from a binary buffer produced by
    /// [`SoftBodySnapshot::to_bytes`].
    ///
    /// # Errors
    /// Propagates decoder failures on truncated or foreign data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl SoftBody {
    /// Captures the body's current motion state.
    pub fn capture(&self) -> SoftBodySnapshot {
        SoftBodySnapshot {
            positions: self.nodes.iter().map(|n| n.position).collect(),
            velocities: self.nodes.iter().map(|n| n.velocity).collect(),
            asleep: self.asleep,
            sleep_timer: self.sleep_timer,
        }
    }

    /// Restores a previously captured motion state onto this body.
    ///
    /// Derived data (normals, cluster bounds) is refreshed afterwards so
    /// the body is immediately consistent for the next solver step.
    ///
    /// # Errors
    /// Rejects snapshots whose node count does not match the body.
    pub fn restore(&mut self, snapshot: &SoftBodySnapshot) -> Result<(), SnapshotError> {
        if snapshot.positions.len() != self.nodes.len()
            || snapshot.velocities.len() != self.nodes.len()
        {
            return Err(SnapshotError::NodeCountMismatch {
                snapshot: snapshot.positions.len(),
                body: self.nodes.len(),
            });
        }

        for (node, (&position, &velocity)) in self
            .nodes
            .iter_mut()
            .zip(snapshot.positions.iter().zip(&snapshot.velocities))
        {
            node.position = position;
            node.prev_position = position;
            node.velocity = if node.is_pinned() { Vec3::ZERO } else { velocity };
        }
        self.asleep = snapshot.asleep;
        self.sleep_timer = snapshot.sleep_timer;
        self.update_normals();
        self.refresh_clusters();
        Ok(())
    }
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

    #[test]
    fn test_capture_restore_round_trip() {
        let mut body = tetra_body();
        for node in &mut body.nodes {
            node.velocity = Vec3::new(1.0, -2.0, 0.5);
        }
        let snapshot = body.capture();

        body.translate(Vec3::splat(10.0));
        for node in &mut body.nodes {
            node.velocity = Vec3::ZERO;
        }
        body.restore(&snapshot).unwrap();

        for (node, position) in body.nodes.iter().zip(&snapshot.positions) {
            assert_relative_eq!(node.position.x, position.x, epsilon = 1e-6);
            assert_relative_eq!(node.position.y, position.y, epsilon = 1e-6);
            assert_relative_eq!(node.position.z, position.z, epsilon = 1e-6);
            assert_relative_eq!(node.velocity.x, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_restore_rejects_foreign_snapshot() {
        let mut body = tetra_body();
        let snapshot = SoftBodySnapshot {
            positions: vec![Vec3::ZERO; 2],
            velocities: vec![Vec3::ZERO; 2],
            asleep: false,
            sleep_timer: 0.0,
        };
        assert!(matches!(
            body.restore(&snapshot),
            Err(SnapshotError::NodeCountMismatch { snapshot: 2, body: 4 })
        ));
    }

    #[test]
    fn test_restore_keeps_pinned_nodes_still() {
        let mut body = tetra_body();
        body.pin_node(0).unwrap();
        let mut snapshot = body.capture();
        snapshot.velocities[0] = Vec3::splat(9.0);

        body.restore(&snapshot).unwrap();
        assert_eq!(body.nodes[0].velocity, Vec3::ZERO);
    }

    #[test]
    fn test_binary_round_trip() {
        let mut body = tetra_body();
        body.asleep = true;
        body.sleep_timer = 0.75;
        let snapshot = body.capture();

        let bytes = snapshot.to_bytes().unwrap();
        let decoded = SoftBodySnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.positions.len(), 4);
        assert!(decoded.asleep);
        assert_relative_eq!(decoded.sleep_timer, 0.75, epsilon = 1e-6);

        assert!(SoftBodySnapshot::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }
}
