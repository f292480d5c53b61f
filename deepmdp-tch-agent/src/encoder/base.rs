use super::{conv_out_dim, EncoderConfig, EncoderType};
use crate::model::SubModel;
use tch::{nn, nn::Module, Device, Kind, Tensor};

/// Convolutional encoder of images.
///
/// `obs / 255` goes through `num_layers` 3x3 convolutions with ReLU (the
/// first one with `stride`, the others with stride 1), then a linear layer,
/// layer normalization and `tanh`.
pub struct PixelEncoder {
    config: EncoderConfig,
    device: Device,
    convs: Vec<nn::Conv2D>,
    fc: nn::Linear,
    ln: nn::LayerNorm,
}

impl PixelEncoder {
    fn build(var_store: &nn::VarStore, config: EncoderConfig) -> Self {
        let p = &var_store.root();
        let in_channels = config.obs_shape[0];
        let n = config.num_filters;

        let convs = (0..config.num_layers)
            .map(|i| {
                let (c, stride) = if i == 0 {
                    (in_channels, config.stride)
                } else {
                    (n, 1)
                };
                let conv_config = nn::ConvConfig {
                    stride,
                    ..Default::default()
                };
                nn::conv2d(p / "convs" / i, c, n, 3, conv_config)
            })
            .collect();

        let out = conv_out_dim(config.obs_shape[1], config.num_layers, config.stride);
        let fc = nn::linear(p / "fc", n * out * out, config.feature_dim, Default::default());
        let ln = nn::layer_norm(p / "ln", vec![config.feature_dim], Default::default());

        Self {
            config,
            device: var_store.device(),
            convs,
            fc,
            ln,
        }
    }

    fn forward_conv(&self, obs: &Tensor) -> Tensor {
        let mut h = obs.to(self.device).to_kind(Kind::Float) / 255.0;
        for conv in self.convs.iter() {
            h = h.apply(conv).relu();
        }
        h.flatten(1, -1)
    }

    fn encode(&self, obs: &Tensor, detach: bool) -> Tensor {
        let h = self.forward_conv(obs);
        let h = if detach { h.detach() } else { h };
        self.ln.forward(&h.apply(&self.fc)).tanh()
    }
}

/// Encoder of observations.
pub enum Encoder {
    /// Convolutional encoder.
    Pixel(PixelEncoder),

    /// Identity map on vector observations.
    Identity {
        /// Config.
        config: EncoderConfig,

        /// Device to which the observations are moved.
        device: Device,
    },
}

impl Encoder {
    /// Encodes a batch of observations.
    ///
    /// If `detach` is `true`, no gradient flows into the convolutional
    /// layers. The linear and normalization layers on top of them still
    /// receive gradients.
    pub fn encode(&self, obs: &Tensor, detach: bool) -> Tensor {
        match self {
            Self::Pixel(enc) => enc.encode(obs, detach),
            Self::Identity { device, .. } => obs.to(*device).to_kind(Kind::Float),
        }
    }

    /// Dimension of the latent vector.
    pub fn feature_dim(&self) -> i64 {
        self.config().out_dim()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EncoderConfig {
        match self {
            Self::Pixel(enc) => &enc.config,
            Self::Identity { config, .. } => config,
        }
    }
}

impl SubModel for Encoder {
    type Config = EncoderConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        match config.encoder_type {
            EncoderType::Pixel => Self::Pixel(PixelEncoder::build(var_store, config)),
            EncoderType::Identity => Self::Identity {
                config,
                device: var_store.device(),
            },
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        Self::build(var_store, self.config().clone())
    }

    fn forward(&self, obs: &Self::Input) -> Self::Output {
        self.encode(obs, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBase, Network};

    fn pixel_config() -> EncoderConfig {
        EncoderConfig {
            encoder_type: EncoderType::Pixel,
            obs_shape: vec![6, 20, 20],
            feature_dim: 50,
            num_layers: 4,
            num_filters: 8,
            stride: 2,
        }
    }

    #[test]
    fn test_pixel_encoder() {
        let enc = Network::<Encoder>::build(pixel_config(), Device::Cpu);
        let obs = Tensor::randint(256, &[3, 6, 20, 20], tch::kind::FLOAT_CPU);
        let h = enc.forward(&obs);
        assert_eq!(h.size(), vec![3, 50]);
        assert!(h.abs().max().double_value(&[]) <= 1.0);
        assert_eq!(enc.model().feature_dim(), 50);

        let vars = enc.get_var_store().variables();
        assert_eq!(vars.keys().filter(|k| k.starts_with("convs.")).count(), 8);
        assert!(vars.contains_key("fc.weight"));
        assert!(vars.contains_key("ln.weight"));
    }

    #[test]
    fn test_detach_blocks_conv_gradients() {
        let enc = Network::<Encoder>::build(pixel_config(), Device::Cpu);
        let obs = Tensor::randint(256, &[2, 6, 20, 20], tch::kind::FLOAT_CPU);
        enc.model().encode(&obs, true).sum(Kind::Float).backward();

        let vars = enc.get_var_store().variables();
        assert!(!vars["convs.0.weight"].grad().defined());
        assert!(vars["fc.weight"].grad().defined());
    }

    #[test]
    fn test_identity_encoder() {
        let config = EncoderConfig {
            encoder_type: EncoderType::Identity,
            obs_shape: vec![4],
            ..pixel_config()
        };
        let enc = Network::<Encoder>::build(config, Device::Cpu);
        let obs = Tensor::from_slice(&[1f32, 2., 3., 4.]).view([1, 4]);
        assert!(enc.forward(&obs).equal(&obs));
        assert_eq!(enc.model().feature_dim(), 4);
        assert!(enc.get_var_store().variables().is_empty());
    }
}
