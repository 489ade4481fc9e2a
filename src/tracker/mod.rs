pub mod gesture;
pub mod guard;
pub mod smooth;
pub mod stabilizer;
pub mod support;

pub use gesture::{classify, HandGesture, PinchEdge, PinchTracker};
pub use guard::{guard, JumpGuard};
pub use smooth::{smooth_frame, smooth_observed, Smoother};
pub use stabilizer::{KinematicBody, RootStabilizer};
pub use support::{root_target, RootAnchor, RootTarget, SupportLeg, SupportLegDetector, VerticalAxis};
