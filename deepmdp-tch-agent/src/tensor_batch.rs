use deepmdp_core::TransitionBatch;
use tch::{Device, Kind, Tensor};

/// A minibatch of transitions held as tensors.
///
/// Rewards and `not_done` have shape `[batch, 1]`.
pub struct TensorBatch {
    pub obs: Tensor,
    pub act: Tensor,
    pub curr_reward: Tensor,
    pub reward: Tensor,
    pub next_obs: Tensor,
    pub not_done: Tensor,
}

impl TensorBatch {
    /// Converts a batch into tensors on `device`.
    ///
    /// Actions, rewards and `not_done` are cast to `f32`; observations keep
    /// their element type.
    pub fn from_batch<B>(batch: B, device: Device) -> Self
    where
        B: TransitionBatch,
        B::ObsBatch: Into<Tensor>,
        B::ActBatch: Into<Tensor>,
        B::ValueBatch: Into<Tensor>,
    {
        let (obs, act, curr_reward, reward, next_obs, not_done) = batch.unpack();
        let float = |t: Tensor| t.to_device(device).to_kind(Kind::Float);
        let column = |t: Tensor| float(t).view([-1, 1]);

        Self {
            obs: obs.into().to_device(device),
            act: float(act.into()),
            curr_reward: column(curr_reward.into()),
            reward: column(reward.into()),
            next_obs: next_obs.into().to_device(device),
            not_done: column(not_done.into()),
        }
    }
}

impl TransitionBatch for TensorBatch {
    type ObsBatch = Tensor;
    type ActBatch = Tensor;
    type ValueBatch = Tensor;

    fn unpack(self) -> (Tensor, Tensor, Tensor, Tensor, Tensor, Tensor) {
        (
            self.obs,
            self.act,
            self.curr_reward,
            self.reward,
            self.next_obs,
            self.not_done,
        )
    }

    fn len(&self) -> usize {
        self.reward.size()[0] as usize
    }
}
