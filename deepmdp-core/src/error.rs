//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum DeepMdpError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// The observation shape cannot be processed by the requested network.
    #[error("Invalid network geometry: {0}")]
    InvalidGeometry(String),

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A variable expected by a network is absent from a checkpoint file.
    #[error("Variable {name} is not found in {path}")]
    MissingVariable {
        /// Name of the variable.
        name: String,
        /// Checkpoint file.
        path: String,
    },

    /// Sampling was requested from a buffer without transitions.
    #[error("Replay buffer has no transitions")]
    EmptyReplayBuffer,
}
