//! Replay buffer holding transitions as tensors.
mod base;
mod config;
pub use base::{TensorReplayBuffer, Transition};
pub use config::TensorReplayBufferConfig;
