use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp) and [`Mlp2`](super::Mlp2).
pub struct MlpConfig {
    pub(super) in_dim: i64,
    pub(super) units: Vec<i64>,
    pub(super) out_dim: i64,
    pub(super) activation_out: bool,
    #[serde(default)]
    pub(super) layer_norm: bool,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `activation_out` - If `true`, activation function is added in the final layer.
    pub fn new(in_dim: i64, units: Vec<i64>, out_dim: i64, activation_out: bool) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
            layer_norm: false,
        }
    }

    /// Inserts layer normalization between each hidden linear layer and its activation.
    pub fn layer_norm(mut self, v: bool) -> Self {
        self.layer_norm = v;
        self
    }

    /// Dimension of the input.
    pub fn in_dim(&self) -> i64 {
        self.in_dim
    }

    /// Dimension of the output.
    pub fn out_dim(&self) -> i64 {
        self.out_dim
    }
}
