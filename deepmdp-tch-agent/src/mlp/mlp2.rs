use super::{mlp, MlpConfig};
use crate::model::SubModel;
use tch::{nn, nn::Module, Device, Tensor};

/// Multilayer perceptron that outputs two tensors of the same size.
///
/// Both heads are linear on top of a shared trunk; post-processing of
/// the outputs is left to the caller.
pub struct Mlp2 {
    config: MlpConfig,
    device: Device,
    head1: nn::Linear,
    head2: nn::Linear,
    seq: nn::Sequential,
}

impl SubModel for Mlp2 {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn forward(&self, input: &Self::Input) -> Self::Output {
        let x = self.seq.forward(&input.to(self.device));
        (x.apply(&self.head1), x.apply(&self.head2))
    }

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        let seq = mlp("ln", var_store, &config);
        let in_dim = *config.units.last().unwrap_or(&config.in_dim);
        let p = &(var_store.root() / "mlp");

        let head1 = nn::linear(p / "head1", in_dim, config.out_dim, Default::default());
        let head2 = nn::linear(p / "head2", in_dim, config.out_dim, Default::default());

        Self {
            config,
            device: var_store.device(),
            head1,
            head2,
            seq,
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        Self::build(var_store, self.config.clone())
    }
}
