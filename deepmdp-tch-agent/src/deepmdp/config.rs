//! Configuration of the DeepMDP agent.
use crate::{
    encoder::{EncoderConfig, EncoderType},
    opt::OptimizerConfig,
    Device,
};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Kind of the observation decoder.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum DecoderType {
    /// Decodes the latent predicted by the transition model into the next
    /// observation.
    #[default]
    Pixel,

    /// Decodes the latent of the current observation back into it.
    Reconstruction,

    /// No observation decoder.
    Identity,
}

/// Kind of the latent transition model.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum TransitionModelType {
    /// Predicts the mean only.
    #[default]
    Deterministic,

    /// Predicts the mean and standard deviation of a diagonal Gaussian.
    Probabilistic,

    /// Ensemble of probabilistic models.
    Ensemble,
}

/// Constructs [`DeepMdp`](super::DeepMdp).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DeepMdpConfig {
    pub obs_shape: Vec<i64>,
    pub action_shape: Vec<i64>,
    pub hidden_dim: i64,
    pub discount: f64,
    pub init_temperature: f64,
    pub alpha_lr: f64,
    pub alpha_beta: f64,
    pub actor_lr: f64,
    pub actor_beta: f64,
    pub actor_log_std_min: f64,
    pub actor_log_std_max: f64,
    pub actor_update_freq: usize,
    pub critic_lr: f64,
    pub critic_beta: f64,
    pub critic_tau: f64,
    pub critic_target_update_freq: usize,
    pub encoder_type: EncoderType,
    pub encoder_feature_dim: i64,
    pub encoder_lr: f64,
    pub encoder_beta: f64,
    pub encoder_tau: f64,
    pub encoder_stride: i64,
    pub decoder_type: DecoderType,
    pub decoder_lr: f64,
    pub decoder_beta: f64,
    pub decoder_update_freq: usize,
    pub decoder_weight_lambda: f64,
    pub transition_model_type: TransitionModelType,
    pub num_layers: i64,
    pub num_filters: i64,
    pub param_log_freq: usize,
    pub seed: Option<i64>,
    pub device: Device,
}

impl Default for DeepMdpConfig {
    fn default() -> Self {
        Self {
            obs_shape: vec![3, 84, 84],
            action_shape: vec![1],
            hidden_dim: 256,
            discount: 0.99,
            init_temperature: 0.01,
            alpha_lr: 1e-3,
            alpha_beta: 0.9,
            actor_lr: 1e-3,
            actor_beta: 0.9,
            actor_log_std_min: -10.0,
            actor_log_std_max: 2.0,
            actor_update_freq: 2,
            critic_lr: 1e-3,
            critic_beta: 0.9,
            critic_tau: 0.005,
            critic_target_update_freq: 2,
            encoder_type: EncoderType::Pixel,
            encoder_feature_dim: 50,
            encoder_lr: 1e-3,
            encoder_beta: 0.9,
            encoder_tau: 0.005,
            encoder_stride: 2,
            decoder_type: DecoderType::Pixel,
            decoder_lr: 1e-3,
            decoder_beta: 0.9,
            decoder_update_freq: 1,
            decoder_weight_lambda: 0.0,
            transition_model_type: TransitionModelType::Deterministic,
            num_layers: 4,
            num_filters: 32,
            param_log_freq: 10000,
            seed: None,
            device: Device::Cpu,
        }
    }
}

impl DeepMdpConfig {
    /// Shape of observations.
    pub fn obs_shape(mut self, v: Vec<i64>) -> Self {
        self.obs_shape = v;
        self
    }

    /// Shape of actions.
    pub fn action_shape(mut self, v: Vec<i64>) -> Self {
        self.action_shape = v;
        self
    }

    /// Width of the hidden layers of the actor and the Q-heads.
    pub fn hidden_dim(mut self, v: i64) -> Self {
        self.hidden_dim = v;
        self
    }

    /// Discount factor.
    pub fn discount(mut self, v: f64) -> Self {
        self.discount = v;
        self
    }

    /// Initial value of the entropy coefficient.
    pub fn init_temperature(mut self, v: f64) -> Self {
        self.init_temperature = v;
        self
    }

    /// Learning rate and `beta1` of the optimizer of the entropy coefficient.
    pub fn alpha_opt(mut self, lr: f64, beta: f64) -> Self {
        self.alpha_lr = lr;
        self.alpha_beta = beta;
        self
    }

    /// Learning rate and `beta1` of the actor optimizer.
    pub fn actor_opt(mut self, lr: f64, beta: f64) -> Self {
        self.actor_lr = lr;
        self.actor_beta = beta;
        self
    }

    /// Bounds of the log standard deviation of the policy.
    pub fn actor_log_std(mut self, min: f64, max: f64) -> Self {
        self.actor_log_std_min = min;
        self.actor_log_std_max = max;
        self
    }

    /// Interval of actor and entropy coefficient updates.
    pub fn actor_update_freq(mut self, v: usize) -> Self {
        self.actor_update_freq = v;
        self
    }

    /// Learning rate and `beta1` of the critic optimizer.
    pub fn critic_opt(mut self, lr: f64, beta: f64) -> Self {
        self.critic_lr = lr;
        self.critic_beta = beta;
        self
    }

    /// Soft update coefficient of the Q-heads of the target critic.
    pub fn critic_tau(mut self, v: f64) -> Self {
        self.critic_tau = v;
        self
    }

    /// Interval of soft updates of the target critic.
    pub fn critic_target_update_freq(mut self, v: usize) -> Self {
        self.critic_target_update_freq = v;
        self
    }

    /// Kind of the encoder.
    pub fn encoder_type(mut self, v: EncoderType) -> Self {
        self.encoder_type = v;
        self
    }

    /// Dimension of the latent of the pixel encoder.
    pub fn encoder_feature_dim(mut self, v: i64) -> Self {
        self.encoder_feature_dim = v;
        self
    }

    /// Learning rate and `beta1` of the encoder optimizer.
    pub fn encoder_opt(mut self, lr: f64, beta: f64) -> Self {
        self.encoder_lr = lr;
        self.encoder_beta = beta;
        self
    }

    /// Soft update coefficient of the encoder of the target critic.
    pub fn encoder_tau(mut self, v: f64) -> Self {
        self.encoder_tau = v;
        self
    }

    /// Stride of the first convolution.
    pub fn encoder_stride(mut self, v: i64) -> Self {
        self.encoder_stride = v;
        self
    }

    /// Kind of the observation decoder.
    pub fn decoder_type(mut self, v: DecoderType) -> Self {
        self.decoder_type = v;
        self
    }

    /// Learning rate and `beta1` of the decoder optimizer.
    pub fn decoder_opt(mut self, lr: f64, beta: f64) -> Self {
        self.decoder_lr = lr;
        self.decoder_beta = beta;
        self
    }

    /// Interval of observation decoder updates.
    pub fn decoder_update_freq(mut self, v: usize) -> Self {
        self.decoder_update_freq = v;
        self
    }

    /// Weight decay of the decoder optimizer.
    pub fn decoder_weight_lambda(mut self, v: f64) -> Self {
        self.decoder_weight_lambda = v;
        self
    }

    /// Kind of the transition model.
    pub fn transition_model_type(mut self, v: TransitionModelType) -> Self {
        self.transition_model_type = v;
        self
    }

    /// Number of convolutional layers of the encoder and the decoder.
    pub fn num_layers(mut self, v: i64) -> Self {
        self.num_layers = v;
        self
    }

    /// Number of channels of the convolutional layers.
    pub fn num_filters(mut self, v: i64) -> Self {
        self.num_filters = v;
        self
    }

    /// Interval of logging statistics of the parameters.
    pub fn param_log_freq(mut self, v: usize) -> Self {
        self.param_log_freq = v;
        self
    }

    /// Random seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Device.
    pub fn device(mut self, device: tch::Device) -> Self {
        self.device = device.into();
        self
    }

    /// Configuration of the encoders of the actor and the critic.
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            encoder_type: self.encoder_type,
            obs_shape: self.obs_shape.clone(),
            feature_dim: self.encoder_feature_dim,
            num_layers: self.num_layers,
            num_filters: self.num_filters,
            stride: self.encoder_stride,
        }
    }

    /// Dimension of the flattened action.
    pub fn action_dim(&self) -> i64 {
        self.action_shape.iter().product()
    }

    pub(super) fn actor_opt_config(&self) -> OptimizerConfig {
        OptimizerConfig::adam(self.actor_lr).beta1(self.actor_beta)
    }

    pub(super) fn critic_opt_config(&self) -> OptimizerConfig {
        OptimizerConfig::adam(self.critic_lr).beta1(self.critic_beta)
    }

    pub(super) fn alpha_opt_config(&self) -> OptimizerConfig {
        OptimizerConfig::adam(self.alpha_lr).beta1(self.alpha_beta)
    }

    pub(super) fn encoder_opt_config(&self) -> OptimizerConfig {
        OptimizerConfig::adam(self.encoder_lr).beta1(self.encoder_beta)
    }

    pub(super) fn decoder_opt_config(&self) -> OptimizerConfig {
        OptimizerConfig::adam(self.decoder_lr)
            .beta1(self.decoder_beta)
            .weight_decay(self.decoder_weight_lambda)
    }

    /// Constructs [`DeepMdpConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DeepMDP agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`DeepMdpConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DeepMDP agent into {:?}", path_);
        Ok(())
    }
}
