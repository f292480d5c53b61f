//! DeepMDP agent.
//!
//! Soft actor-critic whose critic encoder is additionally trained to predict
//! the next latent state and the reward, and optionally to decode
//! observations.
mod actor;
mod base;
mod config;
mod critic;
mod decoder;
mod ent_coef;
mod transition;
pub use actor::{Actor, ActorConfig, ActorOutput};
pub use base::DeepMdp;
pub use config::{DecoderType, DeepMdpConfig, TransitionModelType};
pub use critic::{Critic, CriticConfig};
pub use decoder::{PixelDecoder, PixelDecoderConfig};
pub use ent_coef::EntCoef;
pub use transition::{transition_loss, ProbabilisticTransition, TransitionModel};
