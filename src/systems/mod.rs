//! Systems module - all ECS systems for the soft-body simulation.

pub mod collision;
pub mod debug;
pub mod forces;
pub mod lifecycle;
pub mod solver;
pub mod sync;
