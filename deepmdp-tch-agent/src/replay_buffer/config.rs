//! Configuration of [`TensorReplayBuffer`](super::TensorReplayBuffer).
use crate::Device;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`TensorReplayBuffer`](super::TensorReplayBuffer).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TensorReplayBufferConfig {
    pub(super) capacity: usize,
    pub(super) batch_size: usize,
    pub(super) device: Device,
}

impl Default for TensorReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 100000,
            batch_size: 128,
            device: Device::Cpu,
        }
    }
}

impl TensorReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of transitions in a minibatch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the device on which transitions are stored.
    pub fn device(mut self, device: tch::Device) -> Self {
        self.device = device.into();
        self
    }

    /// Constructs [`TensorReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of replay buffer from {:?}", path_);
        Ok(b)
    }

    /// Saves [`TensorReplayBufferConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of replay buffer into {:?}", path_);
        Ok(())
    }
}
