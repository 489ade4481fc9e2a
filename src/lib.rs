pub mod avatar;
pub mod config;
pub mod error;
pub mod fusion;
pub mod osc;
pub mod pipeline;
pub mod pose;
pub mod ragdoll;
pub mod rig;
pub mod tracker;

pub use error::TrackingError;
