//! Batch.

/// A minibatch of transitions sampled from a replay buffer.
///
/// The batch carries six fields, unpacked in the order
/// `(o_t, a_t, curr_r_t, r_t, o_t+1, not_done_t)`.
/// The third field is kept for compatibility with buffers that store an
/// auxiliary reward next to `r_t`; the agent does not read it.
/// `not_done_t` is 0 if the episode terminated at the transition and 1 otherwise.
pub trait TransitionBatch {
    /// A set of observations in a batch.
    type ObsBatch;

    /// A set of actions in a batch.
    type ActBatch;

    /// A set of per-transition scalars (rewards and not-done flags) in a batch.
    type ValueBatch;

    /// Unpacks the data `(o_t, a_t, curr_r_t, r_t, o_t+1, not_done_t)`.
    #[allow(clippy::type_complexity)]
    fn unpack(
        self,
    ) -> (
        Self::ObsBatch,
        Self::ActBatch,
        Self::ValueBatch,
        Self::ValueBatch,
        Self::ObsBatch,
        Self::ValueBatch,
    );

    /// Returns the number of transitions in the batch.
    fn len(&self) -> usize;

    /// Returns `true` if the batch has no transitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
