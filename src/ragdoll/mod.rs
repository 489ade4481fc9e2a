pub mod controller;
pub mod physics;

pub use controller::{Mode, RagdollController};
pub use physics::{BodyHandle, Constraint, ConstraintKind, PhysicsWorld, RigidBody, SimpleWorld};
