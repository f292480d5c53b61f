//! Latent transition models.
use super::TransitionModelType;
use crate::{
    mlp::{Mlp, Mlp2, MlpConfig},
    model::{ModelBase, Network, SubModel},
};
use tch::{nn, nn::VarStore, Device, Kind, Tensor};

const LAYER_WIDTH: i64 = 512;
const ENSEMBLE_SIZE: usize = 5;
const MIN_SIGMA: f64 = 1e-4;
const MAX_SIGMA: f64 = 1e1;

/// Diagonal Gaussian over the next latent.
///
/// The standard deviation is a sigmoid rescaled into `[min_sigma, max_sigma]`.
pub struct ProbabilisticTransition {
    net: Mlp2,
    min_sigma: f64,
    max_sigma: f64,
}

impl SubModel for ProbabilisticTransition {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        Self {
            net: Mlp2::build(var_store, config),
            min_sigma: MIN_SIGMA,
            max_sigma: MAX_SIGMA,
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        Self {
            net: self.net.clone_with_var_store(var_store),
            min_sigma: self.min_sigma,
            max_sigma: self.max_sigma,
        }
    }

    fn forward(&self, x: &Self::Input) -> Self::Output {
        let (mu, sigma) = self.net.forward(x);
        let sigma = self.min_sigma + (self.max_sigma - self.min_sigma) * sigma.sigmoid();
        (mu, sigma)
    }
}

fn sample_gaussian(mu: Tensor, sigma: Tensor) -> Tensor {
    let eps = sigma.randn_like();
    mu + sigma * eps
}

/// Predicts the latent of the next observation from a latent and an action.
///
/// Every variant takes `latent ⊕ action` and returns `(mean, sigma)`; the
/// deterministic one has no sigma.
pub enum TransitionModel {
    /// Linear, layer norm, ReLU and linear to the mean.
    Deterministic(Network<Mlp>),

    /// Same trunk with mean and sigma heads.
    Probabilistic(Network<ProbabilisticTransition>),

    /// Independent probabilistic members.
    Ensemble(Vec<Network<ProbabilisticTransition>>),
}

impl TransitionModel {
    /// Constructs the transition model.
    pub fn build(
        model_type: TransitionModelType,
        feature_dim: i64,
        action_dim: i64,
        device: Device,
    ) -> Self {
        let config = MlpConfig::new(
            feature_dim + action_dim,
            vec![LAYER_WIDTH],
            feature_dim,
            false,
        )
        .layer_norm(true);

        match model_type {
            TransitionModelType::Deterministic => {
                Self::Deterministic(Network::build(config, device))
            }
            TransitionModelType::Probabilistic => {
                Self::Probabilistic(Network::build(config, device))
            }
            TransitionModelType::Ensemble => Self::Ensemble(
                (0..ENSEMBLE_SIZE)
                    .map(|_| Network::build(config.clone(), device))
                    .collect(),
            ),
        }
    }

    /// Returns the predicted mean and, if modelled, sigma of the next latent.
    ///
    /// For the ensemble, outputs of the members are stacked on a new leading
    /// axis.
    pub fn forward(&self, x: &Tensor) -> (Tensor, Option<Tensor>) {
        match self {
            Self::Deterministic(net) => (net.forward(x), None),
            Self::Probabilistic(net) => {
                let (mu, sigma) = net.forward(x);
                (mu, Some(sigma))
            }
            Self::Ensemble(nets) => {
                let (mus, sigmas): (Vec<_>, Vec<_>) = nets.iter().map(|net| net.forward(x)).unzip();
                (Tensor::stack(&mus, 0), Some(Tensor::stack(&sigmas, 0)))
            }
        }
    }

    /// Samples a next latent.
    ///
    /// The deterministic model returns its mean. The ensemble samples from
    /// a member chosen uniformly at random.
    pub fn sample_prediction(&self, x: &Tensor) -> Tensor {
        match self {
            Self::Deterministic(net) => net.forward(x),
            Self::Probabilistic(net) => {
                let (mu, sigma) = net.forward(x);
                sample_gaussian(mu, sigma)
            }
            Self::Ensemble(nets) => {
                let (mu, sigma) = nets[fastrand::usize(..nets.len())].forward(x);
                sample_gaussian(mu, sigma)
            }
        }
    }

    /// [`VarStore`]s holding the parameters of the model.
    pub fn var_stores(&self) -> Vec<&VarStore> {
        match self {
            Self::Deterministic(net) => vec![net.get_var_store()],
            Self::Probabilistic(net) => vec![net.get_var_store()],
            Self::Ensemble(nets) => nets.iter().map(|net| net.get_var_store()).collect(),
        }
    }
}

/// Negative log-likelihood of `target` under the predicted Gaussian, up to a constant.
///
/// `mean(0.5 * ((mu - target) / sigma)^2 + ln(sigma))`, where a missing sigma is
/// taken as ones.
pub fn transition_loss(mu: &Tensor, sigma: Option<&Tensor>, target: &Tensor) -> Tensor {
    let sigma = match sigma {
        Some(sigma) => sigma.shallow_clone(),
        None => mu.ones_like(),
    };
    let diff = (mu - target.detach()) / &sigma;
    (0.5f64 * diff.pow_tensor_scalar(2) + sigma.log()).mean(Kind::Float)
}
