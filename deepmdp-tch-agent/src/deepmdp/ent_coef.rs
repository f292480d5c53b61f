//! Entropy coefficient of SAC.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use tch::{nn, Kind, Tensor};

/// The entropy coefficient (temperature) of SAC.
///
/// Trained in log-space; `alpha` is always `exp(log_alpha)`.
pub struct EntCoef {
    var_store: nn::VarStore,
    log_alpha: Tensor,
    target_entropy: f64,
    opt: Optimizer,
}

impl EntCoef {
    /// Constructs an instance of `EntCoef`.
    pub fn new(
        init_temperature: f64,
        target_entropy: f64,
        opt_config: &OptimizerConfig,
        device: tch::Device,
    ) -> Result<Self> {
        let var_store = nn::VarStore::new(device);
        let init = nn::Init::Const(init_temperature.ln());
        let log_alpha = var_store.root().var("log_alpha", &[1], init);
        let opt = opt_config.build(&[&var_store])?;

        Ok(Self {
            var_store,
            log_alpha,
            target_entropy,
            opt,
        })
    }

    /// Returns the entropy coefficient, detached from the graph.
    pub fn alpha(&self) -> Tensor {
        self.log_alpha.detach().exp()
    }

    /// Returns the trainable log of the entropy coefficient.
    pub fn log_alpha(&self) -> &Tensor {
        &self.log_alpha
    }

    /// Returns the target entropy.
    pub fn target_entropy(&self) -> f64 {
        self.target_entropy
    }

    /// Loss of the entropy coefficient given log-probabilities of sampled actions.
    pub fn loss(&self, log_pi: &Tensor) -> Tensor {
        let gap = (-log_pi - self.target_entropy).detach();
        (self.log_alpha.exp() * gap).mean(Kind::Float)
    }

    /// Takes an optimization step and returns the loss.
    pub fn update(&mut self, log_pi: &Tensor) -> f32 {
        let loss = self.loss(log_pi);
        self.opt.backward_step(&loss);
        loss.double_value(&[]) as f32
    }

    /// Returns the [`nn::VarStore`] of `log_alpha`.
    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_step() -> Result<()> {
        let mut ent_coef = EntCoef::new(0.1, -2.0, &OptimizerConfig::adam(1e-2), tch::Device::Cpu)?;
        let log_alpha = ent_coef.log_alpha().double_value(&[0]);
        assert!((ent_coef.alpha().double_value(&[0]) - log_alpha.exp()).abs() < 1e-7);
        assert!((log_alpha - 0.1f64.ln()).abs() < 1e-6);

        // Entropy below the target increases alpha
        let log_pi = Tensor::from_slice(&[3f32, 4.0]).view([2, 1]);
        let loss = ent_coef.update(&log_pi);
        assert!(loss < 0.0);
        let log_alpha_ = ent_coef.log_alpha().double_value(&[0]);
        assert!(log_alpha_ > log_alpha);
        assert_eq!(ent_coef.target_entropy(), -2.0);
        assert!((ent_coef.alpha().double_value(&[0]) - log_alpha_.exp()).abs() < 1e-6);
        Ok(())
    }
}
