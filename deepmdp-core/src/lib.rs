#![warn(missing_docs)]
//! Backend-agnostic building blocks of the latent-model SAC agent.
//!
//! The agent itself lives in `deepmdp-tch-agent`. This crate holds the
//! contracts it talks to:
//!
//! * [`ReplayBufferBase`] - the source of training minibatches,
//! * [`TransitionBatch`] - the six-field minibatch unpacked by the agent,
//! * [`record::Recorder`] - the sink of scalar metrics keyed by step.
pub mod error;
pub mod record;

mod base;
pub use base::{ExperienceBufferBase, ReplayBufferBase, TransitionBatch};
pub use error::DeepMdpError;
