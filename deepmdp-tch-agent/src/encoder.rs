//! Observation encoders.
//!
//! An encoder maps a raw observation to a latent feature vector. The critic's
//! encoder is the one trained by the critic, transition and decoder losses;
//! the actor holds its own encoder whose convolutional layers are copied from
//! the critic's one when the agent is built.
mod base;
mod config;
pub use base::{Encoder, PixelEncoder};
pub use config::{conv_out_dim, EncoderConfig, EncoderType};
