//! Tanh-squashed Gaussian policy on top of an encoder.
use crate::{
    encoder::{Encoder, EncoderConfig},
    mlp::{Mlp, MlpConfig},
    model::{ModelBase, Network},
    util::NamedTensors,
};
use anyhow::Result;
use log::info;
use std::path::Path;
use tch::{nn::VarStore, Device, Kind, Tensor};

/// Configuration of [`Actor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActorConfig {
    pub encoder_config: EncoderConfig,
    pub action_dim: i64,
    pub hidden_dim: i64,
    pub log_std_min: f64,
    pub log_std_max: f64,
}

/// Output of [`Actor::forward`].
pub struct ActorOutput {
    /// Squashed mean of the policy.
    pub mu: Tensor,

    /// Squashed sample from the policy.
    pub pi: Option<Tensor>,

    /// Log-probability of `pi`, shape `[batch, 1]`.
    pub log_pi: Option<Tensor>,

    /// Log standard deviation before squashing.
    pub log_std: Tensor,
}

/// Log density of `noise` under the standard normal, shifted by `-log_std`.
fn gaussian_logprob(noise: &Tensor, log_std: &Tensor) -> Tensor {
    let d = *noise.size().last().unwrap_or(&1) as f64;
    let residual = (-0.5f64 * noise.pow_tensor_scalar(2) - log_std).sum_dim_intlist(
        Some([-1i64].as_slice()),
        true,
        Kind::Float,
    );
    residual - 0.5 * (2.0 * std::f64::consts::PI).ln() * d
}

/// Draws a reparameterized sample before squashing and its log density.
fn rsample(mu: &Tensor, log_std: &Tensor) -> (Tensor, Tensor) {
    let noise = mu.randn_like();
    let pi = mu + &noise * log_std.exp();
    (pi, gaussian_logprob(&noise, log_std))
}

/// Corrects the log density for the `tanh` applied to the sample.
fn squash_log_pi(pi: &Tensor, log_pi: Tensor) -> Tensor {
    let correction = ((1.0f64 - pi.pow_tensor_scalar(2)).relu() + 1e-6)
        .log()
        .sum_dim_intlist(Some([-1i64].as_slice()), true, Kind::Float);
    log_pi - correction
}

/// Stochastic policy of the agent.
///
/// The actor has its own encoder. Only the convolutional layers of it are
/// initialized from the critic's encoder; the actor loss never updates them
/// because the encoder output is detached in the actor update.
pub struct Actor {
    encoder: Network<Encoder>,
    trunk: Network<Mlp>,
    log_std_min: f64,
    log_std_max: f64,
}

impl Actor {
    /// Constructs [`Actor`].
    pub fn build(config: ActorConfig, device: Device) -> Self {
        let encoder = Network::<Encoder>::build(config.encoder_config, device);
        let feature_dim = encoder.model().feature_dim();
        let trunk_config = MlpConfig::new(
            feature_dim,
            vec![config.hidden_dim, config.hidden_dim],
            2 * config.action_dim,
            false,
        );
        let trunk = Network::<Mlp>::build(trunk_config, device);

        Self {
            encoder,
            trunk,
            log_std_min: config.log_std_min,
            log_std_max: config.log_std_max,
        }
    }

    /// Mean before squashing and the bounded log standard deviation.
    fn gaussian(&self, obs: &Tensor, detach_encoder: bool) -> (Tensor, Tensor) {
        let h = self.encoder.model().encode(obs, detach_encoder);
        let out = self.trunk.forward(&h);
        let chunks = out.chunk(2, -1);
        let log_std = chunks[1].tanh();
        let log_std = self.log_std_min
            + 0.5 * (self.log_std_max - self.log_std_min) * (log_std + 1.0);
        (chunks[0].shallow_clone(), log_std)
    }

    /// Computes the policy for a batch of observations.
    ///
    /// `compute_log_pi` has no effect without `compute_pi`.
    pub fn forward(
        &self,
        obs: &Tensor,
        compute_pi: bool,
        compute_log_pi: bool,
        detach_encoder: bool,
    ) -> ActorOutput {
        let (mu, log_std) = self.gaussian(obs, detach_encoder);
        let (pi, log_pi) = if compute_pi {
            let (pi, log_pi) = rsample(&mu, &log_std);
            let pi = pi.tanh();
            let log_pi = compute_log_pi.then(|| squash_log_pi(&pi, log_pi));
            (Some(pi), log_pi)
        } else {
            (None, None)
        };

        ActorOutput {
            mu: mu.tanh(),
            pi,
            log_pi,
            log_std,
        }
    }

    /// Samples squashed actions without their log-probability.
    pub fn sample_pi(&self, obs: &Tensor, detach_encoder: bool) -> Tensor {
        let (mu, log_std) = self.gaussian(obs, detach_encoder);
        (&mu + mu.randn_like() * log_std.exp()).tanh()
    }

    /// Samples squashed actions.
    ///
    /// Returns `(pi, log_pi, log_std)`.
    pub fn sample(&self, obs: &Tensor, detach_encoder: bool) -> (Tensor, Tensor, Tensor) {
        let (mu, log_std) = self.gaussian(obs, detach_encoder);
        let (pi, log_pi) = rsample(&mu, &log_std);
        let pi = pi.tanh();
        let log_pi = squash_log_pi(&pi, log_pi);
        (pi, log_pi, log_std)
    }

    /// Returns the encoder.
    pub fn encoder(&self) -> &Network<Encoder> {
        &self.encoder
    }

    /// Returns the encoder as a mutable reference.
    pub fn encoder_mut(&mut self) -> &mut Network<Encoder> {
        &mut self.encoder
    }

    /// [`VarStore`]s holding the parameters of the actor.
    pub fn var_stores(&self) -> [&VarStore; 2] {
        [self.encoder.get_var_store(), self.trunk.get_var_store()]
    }

    /// Save the parameters into a file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let mut tensors = NamedTensors::new();
        tensors.copy_from("encoder", self.encoder.get_var_store());
        tensors.copy_from("trunk", self.trunk.get_var_store());
        tensors.save(&path)?;
        info!("Save actor to {:?}", path.as_ref());
        Ok(())
    }

    /// Load the parameters from a file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let tensors = NamedTensors::load(&path)?;
        tensors.copy_to("encoder", self.encoder.get_var_store_mut())?;
        tensors.copy_to("trunk", self.trunk.get_var_store_mut())?;
        info!("Load actor from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderType;

    fn actor() -> Actor {
        let encoder_config = EncoderConfig {
            encoder_type: EncoderType::Identity,
            obs_shape: vec![4],
            feature_dim: 4,
            num_layers: 1,
            num_filters: 1,
            stride: 1,
        };
        let config = ActorConfig {
            encoder_config,
            action_dim: 2,
            hidden_dim: 16,
            log_std_min: -10.0,
            log_std_max: 2.0,
        };
        Actor::build(config, Device::Cpu)
    }

    #[test]
    fn test_actor_output() {
        let actor = actor();
        let obs = Tensor::randn(&[5, 4], tch::kind::FLOAT_CPU);

        let out = actor.forward(&obs, true, true, false);
        assert_eq!(out.mu.size(), vec![5, 2]);
        assert_eq!(out.log_std.size(), vec![5, 2]);
        assert_eq!(out.log_pi.as_ref().map(|t| t.size()), Some(vec![5, 1]));
        let pi = out.pi.unwrap();
        assert!(pi.abs().max().double_value(&[]) <= 1.0);
        assert!(out.log_std.min().double_value(&[]) >= -10.0);
        assert!(out.log_std.max().double_value(&[]) <= 2.0);

        let out = actor.forward(&obs, false, true, false);
        assert!(out.pi.is_none());
        assert!(out.log_pi.is_none());

        let out = actor.forward(&obs, true, false, false);
        assert!(out.pi.is_some());
        assert!(out.log_pi.is_none());

        let (pi, log_pi, log_std) = actor.sample(&obs, true);
        assert_eq!(pi.size(), vec![5, 2]);
        assert_eq!(log_pi.size(), vec![5, 1]);
        assert_eq!(log_std.size(), vec![5, 2]);
    }

    #[test]
    fn test_sample_pi_matches_forward() {
        let actor = actor();
        let obs = Tensor::randn(&[5, 4], tch::kind::FLOAT_CPU);

        tch::manual_seed(1);
        let expected = actor.forward(&obs, true, false, false).pi.unwrap();
        tch::manual_seed(1);
        let pi = actor.sample_pi(&obs, false);
        assert_eq!(pi.size(), vec![5, 2]);
        assert!(pi.allclose(&expected, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_gaussian_logprob() {
        // Standard normal at the origin in 2-d
        let noise = Tensor::zeros(&[1, 2], tch::kind::FLOAT_CPU);
        let log_std = Tensor::zeros(&[1, 2], tch::kind::FLOAT_CPU);
        let lp = gaussian_logprob(&noise, &log_std).double_value(&[0, 0]);
        let expected = -(2.0 * std::f64::consts::PI).ln();
        assert!((lp - expected).abs() < 1e-5);
    }
}
