//! Soft actor-critic with a learned latent transition model, implemented with
//! [tch](https://crates.io/crates/tch).
//!
//! The agent, [`deepmdp::DeepMdp`], learns a policy, twin critics, a transition
//! model over latent states, a reward predictor and optionally an observation
//! decoder, all on top of the latent produced by the critic's encoder.
pub mod deepmdp;
pub mod encoder;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod replay_buffer;
mod tensor_batch;
pub mod util;
use serde::{Deserialize, Serialize};
pub use tensor_batch::TensorBatch;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
/// Device for using tch.
///
/// This enum is added because [`tch::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl From<tch::Device> for Device {
    fn from(device: tch::Device) -> Self {
        match device {
            tch::Device::Cuda(n) => Self::Cuda(n),
            _ => Self::Cpu,
        }
    }
}

impl From<Device> for tch::Device {
    fn from(device: Device) -> Self {
        match device {
            Device::Cpu => tch::Device::Cpu,
            Device::Cuda(n) => tch::Device::Cuda(n),
        }
    }
}
