//! Optimizers.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tch::{
    nn::{Adam, Optimizer as Optimizer_, OptimizerConfig as OptimizerConfig_, VarStore},
    Tensor,
};

/// Configures an optimizer for training neural networks in the agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,

        /// Coefficient of the running average of gradients.
        beta1: f64,

        /// Coefficient of the running average of squared gradients.
        beta2: f64,

        /// Weight decay.
        wd: f64,
    },
}

impl OptimizerConfig {
    /// Adam with `beta1 = 0.9`, `beta2 = 0.999` and no weight decay.
    pub fn adam(lr: f64) -> Self {
        Self::Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            wd: 0.0,
        }
    }

    /// Sets `beta1`.
    pub fn beta1(self, v: f64) -> Self {
        match self {
            Self::Adam { lr, beta2, wd, .. } => Self::Adam {
                lr,
                beta1: v,
                beta2,
                wd,
            },
        }
    }

    /// Sets weight decay.
    pub fn weight_decay(self, v: f64) -> Self {
        match self {
            Self::Adam {
                lr, beta1, beta2, ..
            } => Self::Adam {
                lr,
                beta1,
                beta2,
                wd: v,
            },
        }
    }

    /// Returns the learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::Adam { lr, .. } => *lr,
        }
    }

    /// Constructs an optimizer over the trainable variables of `var_stores`.
    ///
    /// Each [`VarStore`] gets its own instance of the underlying optimizer;
    /// as Adam works element-wise, this is the same as a single optimizer
    /// over the union of the variables.
    pub fn build(&self, var_stores: &[&VarStore]) -> Result<Optimizer> {
        let opts = var_stores
            .iter()
            .map(|vs| match self {
                Self::Adam {
                    lr,
                    beta1,
                    beta2,
                    wd,
                } => Adam {
                    beta1: *beta1,
                    beta2: *beta2,
                    wd: *wd,
                    ..Default::default()
                }
                .build(vs, *lr),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Optimizer { opts })
    }
}

/// Optimizer spanning one or more [`VarStore`]s.
///
/// This is a thin wrapper of [tch::nn::Optimizer].
///
/// [tch::nn::Optimizer]: https://docs.rs/tch/0.16.0/tch/nn/struct.Optimizer.html
pub struct Optimizer {
    opts: Vec<Optimizer_>,
}

impl Optimizer {
    /// Zeroes the gradients of the variables.
    pub fn zero_grad(&mut self) {
        self.opts.iter_mut().for_each(|opt| opt.zero_grad());
    }

    /// Updates the variables with their current gradients.
    pub fn step(&mut self) {
        self.opts.iter_mut().for_each(|opt| opt.step());
    }

    /// Applies a backward step pass.
    pub fn backward_step(&mut self, loss: &Tensor) {
        self.zero_grad();
        loss.backward();
        self.step();
    }
}

/// Runs one backward pass of `loss` and a step of every optimizer in `opts`.
///
/// Used when several optimizers share a single gradient computation.
pub fn joint_backward_step(opts: &mut [&mut Optimizer], loss: &Tensor) {
    opts.iter_mut().for_each(|opt| opt.zero_grad());
    loss.backward();
    opts.iter_mut().for_each(|opt| opt.step());
}
