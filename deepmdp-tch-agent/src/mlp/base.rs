use super::{mlp, MlpConfig};
use crate::model::SubModel;
use tch::{nn, nn::Module, Device, Tensor};

/// Multilayer perceptron with ReLU activation function.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    seq: nn::Sequential,
}

impl Mlp {
    fn create_net(var_store: &nn::VarStore, config: &MlpConfig) -> nn::Sequential {
        let p = &(var_store.root() / "mlp");
        let in_dim = *config.units.last().unwrap_or(&config.in_dim);
        let mut seq = mlp("ln", var_store, config).add(nn::linear(
            p / format!("ln{}", config.units.len()),
            in_dim,
            config.out_dim,
            Default::default(),
        ));

        if config.activation_out {
            seq = seq.add_fn(|x| x.relu());
        }

        seq
    }

    /// Applies the network to the concatenation of `input1` and `input2`
    /// along the last axis.
    pub fn forward_cat(&self, input1: &Tensor, input2: &Tensor) -> Tensor {
        let input = Tensor::cat(&[input1.to(self.device), input2.to(self.device)], -1);
        self.seq.forward(&input)
    }
}

impl SubModel for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, x: &Self::Input) -> Tensor {
        self.seq.forward(&x.to(self.device))
    }

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        let device = var_store.device();
        let seq = Self::create_net(var_store, &config);

        Self {
            config,
            device,
            seq,
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        Self::build(var_store, self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBase, Network};

    #[test]
    fn test_mlp_shapes_and_names() {
        let config = MlpConfig::new(5, vec![8, 8], 3, false).layer_norm(true);
        let net = Network::<Mlp>::build(config, Device::Cpu);
        let y = net.forward(&Tensor::zeros(&[4, 5], tch::kind::FLOAT_CPU));
        assert_eq!(y.size(), vec![4, 3]);

        let vars = net.get_var_store().variables();
        assert!(vars.contains_key("mlp.ln0.weight"));
        assert!(vars.contains_key("mlp.norm1.weight"));
        assert!(vars.contains_key("mlp.ln2.bias"));
        assert!(!vars.contains_key("mlp.norm2.weight"));
    }

    #[test]
    fn test_forward_cat() {
        let net = Network::<Mlp>::build(MlpConfig::new(5, vec![4], 1, false), Device::Cpu);
        let x = Tensor::ones(&[2, 3], tch::kind::FLOAT_CPU);
        let a = Tensor::ones(&[2, 2], tch::kind::FLOAT_CPU);
        let y1 = net.model().forward_cat(&x, &a);
        let y2 = net.forward(&Tensor::ones(&[2, 5], tch::kind::FLOAT_CPU));
        assert!(y1.allclose(&y2, 1e-6, 1e-6, false));
    }
}
