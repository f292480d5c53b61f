//! Twin Q-heads on top of the shared encoder.
use crate::{
    encoder::{Encoder, EncoderConfig},
    mlp::{Mlp, MlpConfig},
    model::{ModelBase, Network},
    util::{track, NamedTensors},
};
use anyhow::Result;
use log::info;
use std::path::Path;
use tch::{nn::VarStore, Device, Tensor};

/// Configuration of [`Critic`].
#[derive(Debug, Clone, PartialEq)]
pub struct CriticConfig {
    pub encoder_config: EncoderConfig,
    pub action_dim: i64,
    pub hidden_dim: i64,
}

/// Encoder and two action-value heads.
pub struct Critic {
    encoder: Network<Encoder>,
    q1: Network<Mlp>,
    q2: Network<Mlp>,
}

impl Critic {
    /// Constructs [`Critic`].
    pub fn build(config: CriticConfig, device: Device) -> Self {
        let encoder = Network::<Encoder>::build(config.encoder_config, device);
        let in_dim = encoder.model().feature_dim() + config.action_dim;
        let q_config = MlpConfig::new(in_dim, vec![config.hidden_dim, config.hidden_dim], 1, false);
        let q1 = Network::<Mlp>::build(q_config.clone(), device);
        let q2 = Network::<Mlp>::build(q_config, device);

        Self { encoder, q1, q2 }
    }

    /// Returns a copy with the same parameters, used as the target critic.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            encoder: self.encoder.try_clone()?,
            q1: self.q1.try_clone()?,
            q2: self.q2.try_clone()?,
        })
    }

    /// Returns the action values of the two heads, each of shape `[batch, 1]`.
    pub fn forward(&self, obs: &Tensor, action: &Tensor, detach_encoder: bool) -> (Tensor, Tensor) {
        let h = self.encoder.model().encode(obs, detach_encoder);
        let q1 = self.q1.model().forward_cat(&h, action);
        let q2 = self.q2.model().forward_cat(&h, action);
        (q1, q2)
    }

    /// Returns the encoder.
    pub fn encoder(&self) -> &Network<Encoder> {
        &self.encoder
    }

    /// [`VarStore`]s holding the parameters of the critic.
    pub fn var_stores(&self) -> [&VarStore; 3] {
        [
            self.encoder.get_var_store(),
            self.q1.get_var_store(),
            self.q2.get_var_store(),
        ]
    }

    /// Moves the parameters of `self` toward those of `src`.
    ///
    /// The Q-heads use `critic_tau` and the encoder uses `encoder_tau`.
    pub fn soft_update(&mut self, src: &Critic, critic_tau: f64, encoder_tau: f64) {
        track(&mut self.q1, &src.q1, critic_tau);
        track(&mut self.q2, &src.q2, critic_tau);
        track(&mut self.encoder, &src.encoder, encoder_tau);
    }

    /// Save the parameters into a file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let mut tensors = NamedTensors::new();
        tensors.copy_from("encoder", self.encoder.get_var_store());
        tensors.copy_from("q1", self.q1.get_var_store());
        tensors.copy_from("q2", self.q2.get_var_store());
        tensors.save(&path)?;
        info!("Save critic to {:?}", path.as_ref());
        Ok(())
    }

    /// Load the parameters from a file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let tensors = NamedTensors::load(&path)?;
        tensors.copy_to("encoder", self.encoder.get_var_store_mut())?;
        tensors.copy_to("q1", self.q1.get_var_store_mut())?;
        tensors.copy_to("q2", self.q2.get_var_store_mut())?;
        info!("Load critic from {:?}", path.as_ref());
        Ok(())
    }
}
