use super::{
    transition_loss, Actor, ActorConfig, Critic, CriticConfig, DecoderType, DeepMdpConfig,
    EntCoef, PixelDecoder, PixelDecoderConfig, TransitionModel,
};
use crate::{
    encoder::EncoderType,
    mlp::{Mlp, MlpConfig},
    model::{ModelBase, Network},
    opt::{joint_backward_step, Optimizer},
    util::{copy_vars, mse, param_stats, preprocess_obs},
    TensorBatch,
};
use anyhow::Result;
use deepmdp_core::{
    record::{Record, RecordValue, Recorder},
    DeepMdpError, ReplayBufferBase, TransitionBatch,
};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tch::{Kind, Tensor};

const REWARD_DECODER_WIDTH: i64 = 512;
const PREPROCESS_BITS: i64 = 5;

fn scalar(t: &Tensor) -> f32 {
    t.double_value(&[]) as f32
}

/// Sends the scalars of `record` to `recorder`.
fn log_scalars(recorder: &mut dyn Recorder, record: &Record, step: usize) {
    for (k, RecordValue::Scalar(v)) in record.iter() {
        recorder.log(k, *v, step);
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Soft actor-critic agent with a latent transition model and a reward decoder.
///
/// All losses except the actor's flow into the encoder of the critic, which
/// is thereby shaped by the critic, transition, reward and decoder
/// objectives. The actor has its own encoder whose convolutional layers are
/// copied from the critic's encoder at construction.
///
/// ```mermaid
/// graph LR
///     obs --> Enc[critic encoder] --> h
///     h --> Q[Q1, Q2]
///     h --> T[transition model] --> nh[next latent]
///     h --> R[reward decoder]
///     nh --> D[observation decoder]
///     obs --> AEnc[actor encoder] --> Pi[actor trunk]
/// ```
///
/// Parameters are updated by five Adam optimizers:
///
/// | optimizer | parameters |
/// |---|---|
/// | actor | actor encoder, actor trunk |
/// | critic | critic encoder, Q-heads |
/// | alpha | `log_alpha` |
/// | encoder | critic encoder |
/// | decoder | transition model, reward decoder, observation decoder |
pub struct DeepMdp {
    actor: Actor,
    critic: Critic,
    critic_tgt: Critic,
    transition: TransitionModel,
    reward_decoder: Network<Mlp>,
    decoder: Option<Network<PixelDecoder>>,
    reconstruction: bool,
    ent_coef: EntCoef,
    actor_opt: Optimizer,
    critic_opt: Optimizer,
    encoder_opt: Optimizer,
    decoder_opt: Optimizer,
    discount: f64,
    critic_tau: f64,
    encoder_tau: f64,
    actor_update_freq: usize,
    critic_target_update_freq: usize,
    decoder_update_freq: usize,
    param_log_freq: usize,
    train: bool,
    device: tch::Device,
}

impl DeepMdp {
    fn check_config(config: &DeepMdpConfig) -> Result<()> {
        config.encoder_config().check()?;

        let invalid = |msg: &str| -> Result<()> {
            Err(DeepMdpError::InvalidConfig(msg.to_string()).into())
        };
        if config.action_shape.is_empty() || config.action_shape.iter().any(|&d| d < 1) {
            return invalid("action_shape must be non-empty with positive dimensions");
        }
        if config.actor_update_freq == 0
            || config.critic_target_update_freq == 0
            || config.decoder_update_freq == 0
            || config.param_log_freq == 0
        {
            return invalid("update and logging intervals must be positive");
        }
        if config.init_temperature <= 0.0 {
            return invalid("init_temperature must be positive");
        }
        if config.encoder_type == EncoderType::Identity
            && config.decoder_type != DecoderType::Identity
        {
            return invalid("observation decoders require the pixel encoder");
        }

        Ok(())
    }

    /// Constructs the agent.
    ///
    /// Fails without building anything if the configuration is invalid.
    pub fn build(config: DeepMdpConfig) -> Result<Self> {
        Self::check_config(&config)?;

        if let Some(seed) = config.seed {
            tch::manual_seed(seed);
            fastrand::seed(seed as u64);
        }

        let device: tch::Device = config.device.into();
        let encoder_config = config.encoder_config();
        let feature_dim = encoder_config.out_dim();
        let action_dim = config.action_dim();

        let mut actor = Actor::build(
            ActorConfig {
                encoder_config: encoder_config.clone(),
                action_dim,
                hidden_dim: config.hidden_dim,
                log_std_min: config.actor_log_std_min,
                log_std_max: config.actor_log_std_max,
            },
            device,
        );
        let critic = Critic::build(
            CriticConfig {
                encoder_config,
                action_dim,
                hidden_dim: config.hidden_dim,
            },
            device,
        );
        let critic_tgt = critic.try_clone()?;

        // Tie the convolutional layers of the encoders
        copy_vars(
            actor.encoder_mut().get_var_store_mut(),
            critic.encoder().get_var_store(),
            |name| name.starts_with("convs."),
        )?;

        let transition =
            TransitionModel::build(config.transition_model_type, feature_dim, action_dim, device);
        let reward_decoder = Network::<Mlp>::build(
            MlpConfig::new(
                feature_dim + action_dim,
                vec![REWARD_DECODER_WIDTH],
                1,
                false,
            )
            .layer_norm(true),
            device,
        );

        let decoder_config = |out_channels| PixelDecoderConfig {
            obs_shape: config.obs_shape.clone(),
            out_channels,
            feature_dim,
            num_layers: config.num_layers,
            num_filters: config.num_filters,
            stride: config.encoder_stride,
        };
        let channels = config.obs_shape[0];
        let (decoder, reconstruction) = match config.decoder_type {
            DecoderType::Identity => (None, false),
            DecoderType::Pixel => (
                Some(Network::<PixelDecoder>::build(
                    decoder_config(channels.min(3)),
                    device,
                )),
                false,
            ),
            DecoderType::Reconstruction => {
                let decoder = Network::<PixelDecoder>::build(decoder_config(channels), device);
                (Some(decoder), true)
            }
        };

        let target_entropy = -(action_dim as f64);
        let ent_coef = EntCoef::new(
            config.init_temperature,
            target_entropy,
            &config.alpha_opt_config(),
            device,
        )?;

        let actor_opt = config.actor_opt_config().build(&actor.var_stores())?;
        let critic_opt = config.critic_opt_config().build(&critic.var_stores())?;
        let encoder_opt = config
            .encoder_opt_config()
            .build(&[critic.encoder().get_var_store()])?;
        let decoder_opt = {
            let mut var_stores = transition.var_stores();
            var_stores.push(reward_decoder.get_var_store());
            if let Some(decoder) = &decoder {
                var_stores.push(decoder.get_var_store());
            }
            config.decoder_opt_config().build(&var_stores)?
        };

        info!(
            "Build DeepMDP agent: encoder {:?}, decoder {:?}, transition {:?}",
            config.encoder_type, config.decoder_type, config.transition_model_type
        );

        Ok(Self {
            actor,
            critic,
            critic_tgt,
            transition,
            reward_decoder,
            decoder,
            reconstruction,
            ent_coef,
            actor_opt,
            critic_opt,
            encoder_opt,
            decoder_opt,
            discount: config.discount,
            critic_tau: config.critic_tau,
            encoder_tau: config.encoder_tau,
            actor_update_freq: config.actor_update_freq,
            critic_target_update_freq: config.critic_target_update_freq,
            decoder_update_freq: config.decoder_update_freq,
            param_log_freq: config.param_log_freq,
            train: true,
            device,
        })
    }

    /// Returns the mean of the policy for a single observation.
    pub fn select_action(&self, obs: &Tensor) -> Result<Vec<f32>> {
        tch::no_grad(|| {
            let obs = obs.to(self.device).unsqueeze(0);
            let mu = self.actor.forward(&obs, false, false, false).mu;
            Ok(Vec::<f32>::try_from(&mu.to(tch::Device::Cpu).flatten(0, -1))?)
        })
    }

    /// Samples an action from the policy for a single observation.
    pub fn sample_action(&self, obs: &Tensor) -> Result<Vec<f32>> {
        tch::no_grad(|| {
            let obs = obs.to(self.device).unsqueeze(0);
            let pi = self.actor.sample_pi(&obs, false);
            Ok(Vec::<f32>::try_from(&pi.to(tch::Device::Cpu).flatten(0, -1))?)
        })
    }

    /// Bootstrapped target of the critic.
    ///
    /// `reward + not_done * discount * (min(Q1', Q2') - alpha * log_pi)`, where
    /// the next action is sampled from the current actor and `Q'` is the
    /// target critic.
    pub fn critic_target(&self, reward: &Tensor, next_obs: &Tensor, not_done: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let (next_act, log_pi, _) = self.actor.sample(next_obs, false);
            let (q1, q2) = self.critic_tgt.forward(next_obs, &next_act, false);
            let target_v = q1.min_other(&q2) - self.ent_coef.alpha() * log_pi;
            reward + not_done * self.discount * target_v
        })
    }

    /// Regresses both Q-heads onto the bootstrapped target.
    pub fn update_critic(
        &mut self,
        batch: &TensorBatch,
        recorder: &mut dyn Recorder,
        step: usize,
    ) -> Record {
        let target_q = self.critic_target(&batch.reward, &batch.next_obs, &batch.not_done);
        let (q1, q2) = self.critic.forward(&batch.obs, &batch.act, false);
        let loss = mse(&q1, &target_q) + mse(&q2, &target_q);
        self.critic_opt.backward_step(&loss);

        let record = Record::from_scalar("train_critic/loss", scalar(&loss));
        log_scalars(recorder, &record, step);
        record
    }

    /// Updates the actor and then the entropy coefficient.
    ///
    /// The encoders are detached, so the actor loss does not change any
    /// convolutional layer.
    pub fn update_actor_and_alpha(
        &mut self,
        obs: &Tensor,
        recorder: &mut dyn Recorder,
        step: usize,
    ) -> Record {
        let (pi, log_pi, log_std) = self.actor.sample(obs, true);
        let (q1, q2) = self.critic.forward(obs, &pi, true);
        let actor_q = q1.min_other(&q2);
        let actor_loss = (self.ent_coef.alpha() * &log_pi - actor_q).mean(Kind::Float);

        let d = log_std.size()[1] as f64;
        let entropy = 0.5 * d * (1.0 + (2.0 * std::f64::consts::PI).ln())
            + log_std.sum_dim_intlist(Some([-1i64].as_slice()), false, Kind::Float);

        self.actor_opt.backward_step(&actor_loss);

        let alpha = scalar(&self.ent_coef.alpha().squeeze());
        let alpha_loss = self.ent_coef.update(&log_pi);

        let record = Record::from_slice(&[
            ("train_actor/loss", RecordValue::Scalar(scalar(&actor_loss))),
            (
                "train_actor/target_entropy",
                RecordValue::Scalar(self.ent_coef.target_entropy() as f32),
            ),
            (
                "train_actor/entropy",
                RecordValue::Scalar(scalar(&entropy.mean(Kind::Float))),
            ),
            ("train_alpha/loss", RecordValue::Scalar(alpha_loss)),
            ("train_alpha/value", RecordValue::Scalar(alpha)),
        ]);
        log_scalars(recorder, &record, step);
        record
    }

    /// Trains the transition model and the reward decoder together with the
    /// critic's encoder.
    pub fn update_transition_reward_model(
        &mut self,
        batch: &TensorBatch,
        recorder: &mut dyn Recorder,
        step: usize,
    ) -> Record {
        let encoder = self.critic.encoder();
        let h = encoder.forward(&batch.obs);
        let h_act = Tensor::cat(&[&h, &batch.act], 1);
        let (mu, sigma) = self.transition.forward(&h_act);
        let next_h = encoder.forward(&batch.next_obs).detach();
        let transition_loss = transition_loss(&mu, sigma.as_ref(), &next_h);

        let pred_reward = self.reward_decoder.forward(&h_act);
        let reward_loss = mse(&pred_reward, &batch.reward);
        let total_loss = &transition_loss + &reward_loss;

        joint_backward_step(
            &mut [&mut self.encoder_opt, &mut self.decoder_opt],
            &total_loss,
        );

        let record = Record::from_slice(&[
            (
                "train_ae/transition_loss",
                RecordValue::Scalar(scalar(&transition_loss)),
            ),
            ("train_ae/reward_loss", RecordValue::Scalar(scalar(&reward_loss))),
        ]);
        log_scalars(recorder, &record, step);
        record
    }

    /// Trains the observation decoder together with the critic's encoder.
    ///
    /// Without reconstruction, the decoder maps the latent sampled from the
    /// transition model to `target_obs` rescaled to `[-0.5, 0.5]`. With
    /// reconstruction, it maps the latent of `obs` back to `obs`. Returns an
    /// empty record if the agent has no decoder.
    ///
    /// # Panics
    ///
    /// If `target_obs` is not a batch of images.
    pub fn update_decoder(
        &mut self,
        obs: &Tensor,
        action: &Tensor,
        target_obs: &Tensor,
        recorder: &mut dyn Recorder,
        step: usize,
    ) -> Record {
        let decoder = match &self.decoder {
            Some(decoder) => decoder,
            None => return Record::empty(),
        };

        assert_eq!(target_obs.dim(), 4, "target observations must be [B, C, H, W]");
        let channels = target_obs.size()[1].min(3);
        let target_obs = target_obs.narrow(1, 0, channels);

        let h = self.critic.encoder().forward(obs);
        let loss = if self.reconstruction {
            let rec_obs = decoder.forward(&h);
            mse(&rec_obs, &obs.to_kind(Kind::Float))
        } else {
            let next_h = self
                .transition
                .sample_prediction(&Tensor::cat(&[&h, action], 1));
            let target_obs = preprocess_obs(&target_obs, PREPROCESS_BITS);
            let rec_obs = decoder.forward(&next_h);
            mse(&rec_obs, &target_obs)
        };

        joint_backward_step(&mut [&mut self.encoder_opt, &mut self.decoder_opt], &loss);

        let record = Record::from_scalar("train_ae/ae_loss", scalar(&loss));
        log_scalars(recorder, &record, step);
        record
    }

    /// Moves the target critic toward the critic.
    pub fn soft_update_targets(&mut self) {
        self.critic_tgt
            .soft_update(&self.critic, self.critic_tau, self.encoder_tau);
    }

    /// Statistics of the parameters of the critic, the actor and the decoder.
    fn param_record(&self) -> Record {
        let mut record = Record::empty();
        let [enc, q1, q2] = self.critic.var_stores();
        record.merge_inplace(param_stats("train_critic/encoder", enc));
        record.merge_inplace(param_stats("train_critic/q1", q1));
        record.merge_inplace(param_stats("train_critic/q2", q2));
        let [enc, trunk] = self.actor.var_stores();
        record.merge_inplace(param_stats("train_actor/encoder", enc));
        record.merge_inplace(param_stats("train_actor/trunk", trunk));
        if let Some(decoder) = &self.decoder {
            record.merge_inplace(param_stats("train_decoder", decoder.get_var_store()));
        }
        record
    }

    /// Runs one training step on a batch.
    ///
    /// The order is: critic, transition and reward models, actor and
    /// temperature (every `actor_update_freq` steps), soft update of the
    /// target critic (every `critic_target_update_freq` steps) and the
    /// observation decoder (every `decoder_update_freq` steps).
    pub fn update_with_batch(
        &mut self,
        batch: &TensorBatch,
        recorder: &mut dyn Recorder,
        step: usize,
    ) -> Record {
        let mut record = Record::from_scalar(
            "train/batch_reward",
            scalar(&batch.reward.mean(Kind::Float)),
        );
        log_scalars(recorder, &record, step);

        record.merge_inplace(self.update_critic(batch, recorder, step));
        record.merge_inplace(self.update_transition_reward_model(batch, recorder, step));

        if step % self.actor_update_freq == 0 {
            record.merge_inplace(self.update_actor_and_alpha(&batch.obs, recorder, step));
        }

        if step % self.critic_target_update_freq == 0 {
            self.soft_update_targets();
        }

        if self.decoder.is_some() && step % self.decoder_update_freq == 0 {
            record.merge_inplace(self.update_decoder(
                &batch.obs,
                &batch.act,
                &batch.next_obs,
                recorder,
                step,
            ));
        }

        if step % self.param_log_freq == 0 {
            let params = self.param_record();
            log_scalars(recorder, &params, step);
            record.merge_inplace(params);
        }

        debug!(
            "step {}: critic loss {:?}, transition loss {:?}",
            step,
            record.get_scalar("train_critic/loss").ok(),
            record.get_scalar("train_ae/transition_loss").ok(),
        );

        record
    }

    /// Samples a batch from `buffer` and runs one training step on it.
    pub fn update<R>(
        &mut self,
        buffer: &mut R,
        recorder: &mut dyn Recorder,
        step: usize,
    ) -> Result<Record>
    where
        R: ReplayBufferBase,
        R::Batch: TransitionBatch,
        <R::Batch as TransitionBatch>::ObsBatch: Into<Tensor>,
        <R::Batch as TransitionBatch>::ActBatch: Into<Tensor>,
        <R::Batch as TransitionBatch>::ValueBatch: Into<Tensor>,
    {
        let batch = TensorBatch::from_batch(buffer.sample()?, self.device);
        Ok(self.update_with_batch(&batch, recorder, step))
    }

    /// Saves the actor, the critic and the decoder into `dir`.
    ///
    /// Files are named `actor_{step}.pt`, `critic_{step}.pt` and
    /// `decoder_{step}.pt`. Returns the paths of the written files.
    pub fn save<T: AsRef<Path>>(&self, dir: T, step: usize) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut paths = vec![];

        let path = dir.join(format!("actor_{}.pt", step));
        self.actor.save(&path)?;
        paths.push(path);

        let path = dir.join(format!("critic_{}.pt", step));
        self.critic.save(&path)?;
        paths.push(path);

        if let Some(decoder) = &self.decoder {
            let path = dir.join(format!("decoder_{}.pt", step));
            decoder.save(&path)?;
            paths.push(path);
        }

        Ok(paths)
    }

    /// Loads the actor, the critic and the decoder saved by [`DeepMdp::save`].
    pub fn load<T: AsRef<Path>>(&mut self, dir: T, step: usize) -> Result<()> {
        let dir = dir.as_ref();
        self.actor.load(dir.join(format!("actor_{}.pt", step)))?;
        self.critic.load(dir.join(format!("critic_{}.pt", step)))?;
        if let Some(decoder) = &mut self.decoder {
            decoder.load(dir.join(format!("decoder_{}.pt", step)))?;
        }
        Ok(())
    }

    /// Sets the agent to training mode.
    pub fn train(&mut self) {
        self.train = true;
    }

    /// Sets the agent to evaluation mode.
    pub fn eval(&mut self) {
        self.train = false;
    }

    /// Returns `true` in training mode.
    pub fn is_train(&self) -> bool {
        self.train
    }

    /// Current entropy coefficient.
    pub fn alpha(&self) -> f32 {
        scalar(&self.ent_coef.alpha().squeeze())
    }

    /// Returns the entropy coefficient.
    pub fn ent_coef(&self) -> &EntCoef {
        &self.ent_coef
    }

    /// Target entropy of the policy, `-|A|`.
    pub fn target_entropy(&self) -> f64 {
        self.ent_coef.target_entropy()
    }

    /// Returns `true` if the decoder reconstructs the current observation.
    pub fn is_reconstruction(&self) -> bool {
        self.reconstruction
    }

    /// Returns `true` if the agent has an observation decoder.
    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Returns the actor.
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Returns the critic.
    pub fn critic(&self) -> &Critic {
        &self.critic
    }

    /// Returns the target critic.
    pub fn critic_tgt(&self) -> &Critic {
        &self.critic_tgt
    }

    /// Returns the transition model.
    pub fn transition(&self) -> &TransitionModel {
        &self.transition
    }

    /// Returns the observation decoder.
    pub fn decoder(&self) -> Option<&Network<PixelDecoder>> {
        self.decoder.as_ref()
    }

    /// Returns the device of the agent.
    pub fn device(&self) -> tch::Device {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        deepmdp::TransitionModelType,
        replay_buffer::{TensorReplayBuffer, TensorReplayBufferConfig, Transition},
    };
    use deepmdp_core::{
        record::{BufferedRecorder, NullRecorder},
        ExperienceBufferBase,
    };
    use tch::{kind::FLOAT_CPU, Device};
    use tempdir::TempDir;
    use test_log::test;

    fn state_config() -> DeepMdpConfig {
        DeepMdpConfig::default()
            .obs_shape(vec![4])
            .action_shape(vec![2])
            .encoder_type(EncoderType::Identity)
            .decoder_type(DecoderType::Identity)
            .hidden_dim(32)
            .seed(42)
    }

    fn pixel_config() -> DeepMdpConfig {
        DeepMdpConfig::default()
            .obs_shape(vec![6, 20, 20])
            .action_shape(vec![2])
            .encoder_feature_dim(50)
            .num_filters(8)
            .hidden_dim(32)
            .actor_update_freq(2)
            .decoder_type(DecoderType::Pixel)
            .seed(42)
    }

    fn pixel_obs(n: i64) -> Tensor {
        Tensor::randint(256, &[n, 6, 20, 20], FLOAT_CPU)
    }

    fn pixel_batch(n: i64) -> TensorBatch {
        TensorBatch {
            obs: pixel_obs(n),
            act: Tensor::rand(&[n, 2], FLOAT_CPU) * 2.0 - 1.0,
            curr_reward: Tensor::zeros(&[n, 1], FLOAT_CPU),
            reward: Tensor::randn(&[n, 1], FLOAT_CPU),
            next_obs: pixel_obs(n),
            not_done: Tensor::ones(&[n, 1], FLOAT_CPU),
        }
    }

    fn var(network: &impl ModelBase, name: &str) -> Tensor {
        network.get_var_store().variables()[name].copy()
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        assert!(DeepMdp::build(pixel_config().obs_shape(vec![6, 8, 8])).is_err());
        assert!(DeepMdp::build(pixel_config().obs_shape(vec![6, 20, 24])).is_err());
        assert!(DeepMdp::build(pixel_config().action_shape(vec![])).is_err());
        assert!(DeepMdp::build(pixel_config().actor_update_freq(0)).is_err());
        assert!(DeepMdp::build(state_config().decoder_type(DecoderType::Pixel)).is_err());
    }

    #[test]
    fn test_critic_target_of_terminal_transitions() -> Result<()> {
        let agent = DeepMdp::build(state_config())?;
        let reward = Tensor::from_slice(&[1.5f32, -2.0, 0.0]).view([3, 1]);
        let next_obs = Tensor::randn(&[3, 4], FLOAT_CPU);
        let not_done = Tensor::zeros(&[3, 1], FLOAT_CPU);

        let target = agent.critic_target(&reward, &next_obs, &not_done);
        assert!(target.equal(&reward));
        Ok(())
    }

    #[test]
    fn test_alpha() -> Result<()> {
        let mut agent = DeepMdp::build(state_config())?;
        let log_alpha = agent.ent_coef().log_alpha().double_value(&[0]);
        assert!((agent.alpha() as f64 - log_alpha.exp()).abs() < 1e-6);
        assert!((agent.alpha() - 0.01).abs() < 1e-6);
        assert_eq!(agent.target_entropy(), -2.0);

        let obs = Tensor::randn(&[8, 4], FLOAT_CPU);
        let record = agent.update_actor_and_alpha(&obs, &mut NullRecorder::new(), 0);
        assert_eq!(record.get_scalar("train_actor/target_entropy")?, -2.0);
        assert!((record.get_scalar("train_alpha/value")? - 0.01).abs() < 1e-6);

        let log_alpha_ = agent.ent_coef().log_alpha().double_value(&[0]);
        assert_ne!(log_alpha, log_alpha_);
        assert!((agent.alpha() as f64 - log_alpha_.exp()).abs() < 1e-6);
        assert_eq!(agent.target_entropy(), -2.0);
        Ok(())
    }

    #[test]
    fn test_select_action_is_idempotent() -> Result<()> {
        let agent = DeepMdp::build(pixel_config())?;
        let obs = pixel_obs(1).squeeze_dim(0);

        let a1 = agent.select_action(&obs)?;
        let a2 = agent.select_action(&obs)?;
        assert_eq!(a1.len(), 2);
        assert_eq!(a1, a2);
        assert!(a1.iter().all(|a| a.abs() <= 1.0));

        let a3 = agent.sample_action(&obs)?;
        assert_eq!(a3.len(), 2);
        assert!(a3.iter().all(|a| a.abs() <= 1.0));
        Ok(())
    }

    #[test]
    fn test_encoders_are_tied_once() -> Result<()> {
        let mut agent = DeepMdp::build(pixel_config())?;
        let name = "convs.0.weight";
        assert!(var(agent.actor().encoder(), name).equal(&var(agent.critic().encoder(), name)));
        assert!(var(agent.critic_tgt().encoder(), name).equal(&var(agent.critic().encoder(), name)));

        agent.update_critic(&pixel_batch(4), &mut NullRecorder::new(), 1);
        assert!(!var(agent.actor().encoder(), name).equal(&var(agent.critic().encoder(), name)));
        Ok(())
    }

    #[test]
    fn test_parameters_updated_by_each_loss() -> Result<()> {
        let mut agent = DeepMdp::build(pixel_config())?;
        let batch = pixel_batch(4);
        let conv = "convs.0.weight";
        let head = "mlp.ln0.weight";
        let snapshot = |agent: &DeepMdp| {
            let [critic_enc, q1, q2] = agent.critic().var_stores();
            let [actor_enc, trunk] = agent.actor().var_stores();
            [
                critic_enc.variables()[conv].copy(),
                q1.variables()[head].copy(),
                q2.variables()[head].copy(),
                actor_enc.variables()[conv].copy(),
                trunk.variables()[head].copy(),
            ]
        };

        // Actor loss: only the actor trunk (and its encoder head) moves
        let before = snapshot(&agent);
        agent.update_actor_and_alpha(&batch.obs, &mut NullRecorder::new(), 0);
        let after = snapshot(&agent);
        assert!(after[0].equal(&before[0]));
        assert!(after[1].equal(&before[1]));
        assert!(after[2].equal(&before[2]));
        assert!(after[3].equal(&before[3]));
        assert!(!after[4].equal(&before[4]));

        // Transition and reward losses shape the critic's encoder only
        let before = after;
        agent.update_transition_reward_model(&batch, &mut NullRecorder::new(), 0);
        let after = snapshot(&agent);
        assert!(!after[0].equal(&before[0]));
        assert!(after[1].equal(&before[1]));
        assert!(after[2].equal(&before[2]));
        assert!(after[3].equal(&before[3]));

        // So does the decoder loss
        let before = after;
        agent.update_decoder(&batch.obs, &batch.act, &batch.next_obs, &mut NullRecorder::new(), 0);
        let after = snapshot(&agent);
        assert!(!after[0].equal(&before[0]));
        assert!(after[1].equal(&before[1]));
        assert!(after[2].equal(&before[2]));
        assert!(after[3].equal(&before[3]));
        Ok(())
    }

    #[test]
    fn test_soft_update_targets() -> Result<()> {
        let config = pixel_config().critic_tau(0.1).encoder_tau(0.2);
        let mut agent = DeepMdp::build(config)?;
        agent.update_critic(&pixel_batch(4), &mut NullRecorder::new(), 1);

        let enc = "fc.weight";
        let (tgt_enc, src_enc) = (
            var(agent.critic_tgt().encoder(), enc),
            var(agent.critic().encoder(), enc),
        );
        assert!(!tgt_enc.equal(&src_enc));

        agent.soft_update_targets();
        let expected = 0.2 * &src_enc + 0.8 * &tgt_enc;
        let actual = var(agent.critic_tgt().encoder(), enc);
        assert!(actual.allclose(&expected, 1e-5, 1e-6, false));
        Ok(())
    }

    #[test]
    fn test_reconstruction() -> Result<()> {
        let mut agent = DeepMdp::build(pixel_config().decoder_type(DecoderType::Reconstruction))?;
        assert!(agent.is_reconstruction());
        let batch = pixel_batch(4);

        let expected = {
            let h = agent.critic().encoder().forward(&batch.obs);
            let rec_obs = agent.decoder().map(|d| d.forward(&h)).unwrap();
            assert_eq!(rec_obs.size(), vec![4, 6, 20, 20]);
            scalar(&mse(&rec_obs, &batch.obs))
        };

        let record =
            agent.update_decoder(&batch.obs, &batch.act, &batch.next_obs, &mut NullRecorder::new(), 0);
        let loss = record.get_scalar("train_ae/ae_loss")?;
        assert!((loss - expected).abs() <= 1e-4 * expected.abs().max(1.0));
        Ok(())
    }

    #[test]
    fn test_decoder_predicts_rgb_channels() -> Result<()> {
        let agent = DeepMdp::build(pixel_config())?;
        assert!(!agent.is_reconstruction());
        let h = Tensor::randn(&[2, 50], FLOAT_CPU);
        let rec_obs = agent.decoder().map(|d| d.forward(&h).size());
        assert_eq!(rec_obs, Some(vec![2, 3, 20, 20]));

        let agent = DeepMdp::build(pixel_config().decoder_type(DecoderType::Identity))?;
        assert!(!agent.has_decoder());
        Ok(())
    }

    #[test]
    fn test_update_schedule() -> Result<()> {
        let mut agent = DeepMdp::build(pixel_config())?;
        let config = TensorReplayBufferConfig::default().capacity(16).batch_size(4);
        let mut buffer = TensorReplayBuffer::build(&config);
        for i in 0..8 {
            buffer.push(Transition {
                obs: pixel_obs(1).squeeze_dim(0),
                act: Tensor::rand(&[2], FLOAT_CPU) * 2.0 - 1.0,
                curr_reward: 0.0,
                reward: i as f32 * 0.1,
                next_obs: pixel_obs(1).squeeze_dim(0),
                done: i == 7,
            })?;
        }
        let mut recorder = BufferedRecorder::new();

        let record = agent.update(&mut buffer, &mut recorder, 0)?;
        assert!(record.contains_key("train_actor/loss"));
        assert!(record.contains_key("train_alpha/value"));
        assert!(record.contains_key("train_critic/q1/mlp.ln0.weight_mean"));
        for key in [
            "train_critic/loss",
            "train_ae/transition_loss",
            "train_ae/reward_loss",
            "train_ae/ae_loss",
        ] {
            let v = record.get_scalar(key)?;
            assert!(v.is_finite() && v >= 0.0, "{} = {}", key, v);
        }

        let record = agent.update(&mut buffer, &mut recorder, 1)?;
        assert!(!record.contains_key("train_actor/loss"));
        assert!(!record.contains_key("train_critic/q1/mlp.ln0.weight_mean"));
        assert!(record.contains_key("train_ae/ae_loss"));

        let steps: Vec<_> = recorder
            .scalars("train/batch_reward")
            .iter()
            .map(|(step, _)| *step)
            .collect();
        assert_eq!(steps, vec![0, 1]);
        assert_eq!(recorder.scalars("train_actor/loss").len(), 1);
        Ok(())
    }

    #[test]
    fn test_probabilistic_transition_models() -> Result<()> {
        for model_type in [
            TransitionModelType::Probabilistic,
            TransitionModelType::Ensemble,
        ] {
            let config = pixel_config().transition_model_type(model_type);
            let mut agent = DeepMdp::build(config)?;
            let record = agent.update_with_batch(&pixel_batch(4), &mut NullRecorder::new(), 0);
            assert!(record.get_scalar("train_ae/transition_loss")?.is_finite());
            assert!(record.get_scalar("train_ae/ae_loss")?.is_finite());
        }
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("deepmdp")?;
        let mut agent = DeepMdp::build(pixel_config())?;
        agent.update_with_batch(&pixel_batch(4), &mut NullRecorder::new(), 0);
        let paths = agent.save(dir.path(), 3)?;
        assert_eq!(paths.len(), 3);
        assert!(dir.path().join("decoder_3.pt").exists());

        let mut agent_ = DeepMdp::build(pixel_config().seed(7))?;
        let obs = pixel_obs(1).squeeze_dim(0);
        assert_ne!(agent.select_action(&obs)?, agent_.select_action(&obs)?);

        agent_.load(dir.path(), 3)?;
        assert_eq!(agent.select_action(&obs)?, agent_.select_action(&obs)?);

        let empty = TempDir::new("deepmdp_empty")?;
        assert!(agent_.load(empty.path(), 3).is_err());
        Ok(())
    }

    #[test]
    fn test_train_and_eval_mode() -> Result<()> {
        let mut agent = DeepMdp::build(state_config())?;
        assert!(agent.is_train());
        agent.eval();
        assert!(!agent.is_train());
        agent.train();
        assert!(agent.is_train());
        assert_eq!(agent.device(), Device::Cpu);
        Ok(())
    }
}
