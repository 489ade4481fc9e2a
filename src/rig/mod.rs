pub mod joint;
pub mod mapper;
pub mod projection;
pub mod segment;

pub use joint::{Joint, JointName, JointSource, JointSpec, Rig, SmoothGroup};
pub use mapper::{FrameKind, JointMapper, JointUpdate, MapReport, SkipReason};
pub use projection::{Projection, Unprojection, WorldProjection};
pub use segment::{Segment, LIMBS};
