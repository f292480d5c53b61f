use super::TensorReplayBufferConfig;
use crate::TensorBatch;
use anyhow::Result;
use deepmdp_core::{DeepMdpError, ExperienceBufferBase, ReplayBufferBase};
use log::{info, trace};
use tch::{Device, Kind, Tensor};

/// A single transition.
pub struct Transition {
    pub obs: Tensor,
    pub act: Tensor,
    pub curr_reward: f32,
    pub reward: f32,
    pub next_obs: Tensor,
    pub done: bool,
}

/// Ring buffer of tensors of shape `[capacity, item shape..]`.
///
/// The buffer is allocated at the first push with the shape and kind of the
/// pushed item.
struct TensorRing {
    buf: Option<Tensor>,
    capacity: i64,
    device: Device,
}

impl TensorRing {
    fn new(capacity: usize, device: Device) -> Self {
        Self {
            buf: None,
            capacity: capacity as _,
            device,
        }
    }

    fn push(&mut self, index: i64, item: &Tensor) {
        let (capacity, device) = (self.capacity, self.device);
        let buf = self.buf.get_or_insert_with(|| {
            let mut shape = vec![capacity];
            shape.extend(item.size());
            Tensor::zeros(shape.as_slice(), (item.kind(), device))
        });
        tch::no_grad(|| buf.get(index).copy_(item));
    }

    fn sample(&self, ixs: &Tensor) -> Tensor {
        match &self.buf {
            Some(buf) => buf.index_select(0, ixs),
            None => Tensor::zeros([0], (Kind::Float, self.device)),
        }
    }
}

/// Replay buffer with uniform sampling.
///
/// When the buffer is full, the oldest transition is overwritten.
pub struct TensorReplayBuffer {
    obs: TensorRing,
    act: TensorRing,
    next_obs: TensorRing,
    curr_reward: Tensor,
    reward: Tensor,
    not_done: Tensor,
    capacity: usize,
    batch_size: usize,
    device: Device,
    len: usize,
    i: usize,
}

impl TensorReplayBuffer {
    /// Pushes a transition.
    fn push_transition(&mut self, tr: Transition) {
        let i = self.i as i64;
        self.obs.push(i, &tr.obs);
        self.act.push(i, &tr.act);
        self.next_obs.push(i, &tr.next_obs);
        tch::no_grad(|| {
            let _ = self.curr_reward.get(i).fill_(tr.curr_reward as f64);
            let _ = self.reward.get(i).fill_(tr.reward as f64);
            let _ = self.not_done.get(i).fill_(if tr.done { 0.0 } else { 1.0 });
        });

        self.i = (self.i + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
        trace!("Push transition, len = {}", self.len);
    }

    /// Returns the number of transitions in a minibatch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl ExperienceBufferBase for TensorReplayBuffer {
    type Item = Transition;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.push_transition(tr);
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl ReplayBufferBase for TensorReplayBuffer {
    type Config = TensorReplayBufferConfig;
    type Batch = TensorBatch;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity.max(1);
        let device: Device = config.device.into();
        info!("Construct replay buffer with capacity = {}", capacity);

        let values = || Tensor::zeros([capacity as i64, 1], (Kind::Float, device));

        Self {
            obs: TensorRing::new(capacity, device),
            act: TensorRing::new(capacity, device),
            next_obs: TensorRing::new(capacity, device),
            curr_reward: values(),
            reward: values(),
            not_done: values(),
            capacity,
            batch_size: config.batch_size,
            device,
            len: 0,
            i: 0,
        }
    }

    fn sample(&mut self) -> Result<Self::Batch> {
        if self.len == 0 {
            return Err(DeepMdpError::EmptyReplayBuffer.into());
        }

        let ixs = (0..self.batch_size)
            .map(|_| fastrand::usize(..self.len) as i64)
            .collect::<Vec<_>>();
        let ixs = Tensor::from_slice(&ixs).to(self.device);

        Ok(TensorBatch {
            obs: self.obs.sample(&ixs),
            act: self.act.sample(&ixs),
            curr_reward: self.curr_reward.index_select(0, &ixs),
            reward: self.reward.index_select(0, &ixs),
            next_obs: self.next_obs.sample(&ixs),
            not_done: self.not_done.index_select(0, &ixs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepmdp_core::TransitionBatch;

    fn transition(v: f32, done: bool) -> Transition {
        Transition {
            obs: Tensor::from_slice(&[v; 3]),
            act: Tensor::from_slice(&[v]),
            curr_reward: 0.0,
            reward: v,
            next_obs: Tensor::from_slice(&[v + 1.0; 3]),
            done,
        }
    }

    #[test]
    fn test_sample_from_empty_buffer() {
        let mut buffer = TensorReplayBuffer::build(&TensorReplayBufferConfig::default());
        assert!(buffer.is_empty());
        assert!(buffer.sample().is_err());
    }

    #[test]
    fn test_sample() -> Result<()> {
        let config = TensorReplayBufferConfig::default()
            .capacity(4)
            .batch_size(16);
        let mut buffer = TensorReplayBuffer::build(&config);
        for i in 0..6 {
            buffer.push(transition(i as f32, i % 2 == 1))?;
        }
        assert_eq!(buffer.len(), 4);

        let batch = buffer.sample()?;
        assert_eq!(batch.len(), 16);
        let (obs, act, _, reward, next_obs, not_done) = batch.unpack();
        assert_eq!(obs.size(), vec![16, 3]);
        assert_eq!(act.size(), vec![16, 1]);
        assert_eq!(reward.size(), vec![16, 1]);
        assert_eq!(not_done.size(), vec![16, 1]);

        // Transitions 0 and 1 were overwritten
        assert!(reward.min().double_value(&[]) >= 2.0);
        assert!((next_obs - &obs).eq(1.0).all().int64_value(&[]) == 1);

        // Odd rewards come from terminal transitions
        let odd = reward.fmod(2.0).eq(1.0).to_kind(Kind::Float);
        assert!((odd + not_done).eq(1.0).all().int64_value(&[]) == 1);
        Ok(())
    }
}
