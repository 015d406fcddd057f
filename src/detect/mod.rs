mod backend;
mod backends;
pub(crate) mod result;

pub use backend::{apply_thresholds, TrackerBackend, TrackerSettings};
pub use backends::{ReplayTracker, ScriptedFrame, ScriptedTracker};
pub use result::{BoundingBox, Detection};
