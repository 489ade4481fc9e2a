pub mod index;
pub mod landmark;

pub use index::PoseLandmark;
pub use landmark::{FrameSchema, Landmark, LandmarkFrame};
