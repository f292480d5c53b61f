//! Trains the DeepMDP agent on random pixel transitions.
//!
//! No environment is involved: the replay buffer is filled with noise images,
//! which is enough to exercise every update of the agent and the logging.
use anyhow::Result;
use clap::Parser;
use deepmdp_core::{ExperienceBufferBase, ReplayBufferBase};
use deepmdp_tch_agent::{
    deepmdp::{DecoderType, DeepMdp, DeepMdpConfig, TransitionModelType},
    replay_buffer::{TensorReplayBuffer, TensorReplayBufferConfig, Transition},
};
use deepmdp_tensorboard::TensorboardRecorder;
use log::info;
use std::path::Path;
use tch::{kind::FLOAT_CPU, Tensor};

const OBS_SHAPE: [i64; 3] = [3, 32, 32];
const ACT_DIM: i64 = 2;
const REPLAY_BUFFER_CAPACITY: usize = 1_000;
const BATCH_SIZE: usize = 32;
const MODEL_DIR: &str = "./deepmdp-tch-agent/examples/model/synthetic_pixels";

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file of the agent configuration; written with defaults if missing
    #[arg(long)]
    config: Option<String>,

    /// Number of optimization steps
    #[arg(long, default_value_t = 100)]
    steps: usize,

    /// Number of random transitions put into the replay buffer
    #[arg(long, default_value_t = 256)]
    transitions: usize,

    /// Transition model (deterministic, probabilistic, ensemble)
    #[arg(long, default_value = "deterministic")]
    transition: String,

    /// Reconstruct the current observation instead of predicting the next one
    #[arg(long, default_value_t = false)]
    reconstruction: bool,
}

fn agent_config(args: &Args) -> Result<DeepMdpConfig> {
    if let Some(path) = &args.config {
        if Path::new(path).exists() {
            return DeepMdpConfig::load(path);
        }
    }

    let transition_model_type = match args.transition.as_str() {
        "probabilistic" => TransitionModelType::Probabilistic,
        "ensemble" => TransitionModelType::Ensemble,
        _ => TransitionModelType::Deterministic,
    };
    let decoder_type = match args.reconstruction {
        true => DecoderType::Reconstruction,
        false => DecoderType::Pixel,
    };
    let config = DeepMdpConfig::default()
        .obs_shape(OBS_SHAPE.to_vec())
        .action_shape(vec![ACT_DIM])
        .num_filters(16)
        .transition_model_type(transition_model_type)
        .decoder_type(decoder_type)
        .param_log_freq(50)
        .device(tch::Device::cuda_if_available())
        .seed(42);

    if let Some(path) = &args.config {
        config.save(path)?;
    }
    Ok(config)
}

fn random_transition(i: usize) -> Transition {
    let frame = || Tensor::randint(256, &OBS_SHAPE, FLOAT_CPU);
    Transition {
        obs: frame(),
        act: Tensor::rand(&[ACT_DIM], FLOAT_CPU) * 2.0 - 1.0,
        curr_reward: 0.0,
        reward: fastrand::f32(),
        next_obs: frame(),
        done: i % 100 == 99,
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = agent_config(&args)?;
    let buffer_config = TensorReplayBufferConfig::default()
        .capacity(REPLAY_BUFFER_CAPACITY)
        .batch_size(BATCH_SIZE);
    let mut buffer = TensorReplayBuffer::build(&buffer_config);
    for i in 0..args.transitions {
        buffer.push(random_transition(i))?;
    }
    info!("Replay buffer holds {} transitions", buffer.len());

    let mut agent = DeepMdp::build(config)?;
    let mut recorder = TensorboardRecorder::new(MODEL_DIR);
    for step in 0..args.steps {
        let record = agent.update(&mut buffer, &mut recorder, step)?;
        if step % 10 == 0 {
            info!(
                "step {}: critic loss {:.4}, transition loss {:.4}",
                step,
                record.get_scalar("train_critic/loss")?,
                record.get_scalar("train_ae/transition_loss")?,
            );
        }
    }
    recorder.flush();

    agent.eval();
    let action = agent.select_action(&Tensor::randint(256, &OBS_SHAPE, FLOAT_CPU))?;
    info!("Greedy action on a random frame: {:?}", action);

    let paths = agent.save(MODEL_DIR, args.steps)?;
    info!("Saved {:?}", paths);
    Ok(())
}
