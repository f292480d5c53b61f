//! Core functionalities.
mod batch;
mod replay_buffer;
pub use batch::TransitionBatch;
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
