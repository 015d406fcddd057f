pub mod replay;
pub mod scripted;

pub use replay::ReplayTracker;
pub use scripted::{ScriptedFrame, ScriptedTracker};
