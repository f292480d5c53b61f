//! Observation decoder.
use crate::{encoder::conv_out_dim, model::SubModel};
use tch::{nn, Device, Kind, Tensor};

/// Random (semi-)orthogonal matrix of shape `[rows, cols]` scaled by `gain`.
fn orthogonal(rows: i64, cols: i64, gain: f64, device: Device) -> Tensor {
    let (n, m) = if rows < cols { (cols, rows) } else { (rows, cols) };
    let (q, r) = Tensor::linalg_qr(&Tensor::randn([n, m], (Kind::Float, device)), "reduced");
    let q = q * r.diagonal(0, 0, 1).sign().unsqueeze(0);
    let q = if rows < cols { q.tr() } else { q };
    q * gain
}

/// Orthogonal linear weights and delta-orthogonal transposed convolutions
/// with ReLU gain. All biases are zero.
fn weight_init(fc: &mut nn::Linear, deconvs: &mut [nn::ConvTranspose2D], device: Device) {
    tch::no_grad(|| {
        let size = fc.ws.size();
        fc.ws.copy_(&orthogonal(size[0], size[1], 1.0, device));
        if let Some(bs) = &mut fc.bs {
            let _ = bs.zero_();
        }

        let gain = 2f64.sqrt();
        for deconv in deconvs.iter_mut() {
            let size = deconv.ws.size();
            let mid = size[2] / 2;
            let _ = deconv.ws.zero_();
            let mut center = deconv.ws.select(2, mid).select(2, mid);
            center.copy_(&orthogonal(size[0], size[1], gain, device));
            if let Some(bs) = &mut deconv.bs {
                let _ = bs.zero_();
            }
        }
    });
}

/// Configuration of [`PixelDecoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDecoderConfig {
    /// Shape `[C, H, W]` of the observations; images are square.
    pub obs_shape: Vec<i64>,

    /// Channels of the decoded image.
    pub out_channels: i64,

    pub feature_dim: i64,
    pub num_layers: i64,
    pub num_filters: i64,
    pub stride: i64,
}

/// Mirror of the pixel encoder with transposed convolutions.
///
/// The latent goes through a linear layer with ReLU, is reshaped into
/// feature maps of the encoder's output size, then through `num_layers - 1`
/// stride-1 transposed convolutions with ReLU and a final one with `stride`
/// back to the observation size.
pub struct PixelDecoder {
    config: PixelDecoderConfig,
    device: Device,
    init_size: i64,
    fc: nn::Linear,
    deconvs: Vec<nn::ConvTranspose2D>,
}

impl PixelDecoder {
    /// Returns the config.
    pub fn config(&self) -> &PixelDecoderConfig {
        &self.config
    }
}

impl SubModel for PixelDecoder {
    type Config = PixelDecoderConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        let p = &var_store.root();
        let n = config.num_filters;
        let size = config.obs_shape[1];
        let init_size = conv_out_dim(size, config.num_layers, config.stride);
        let mut fc = nn::linear(
            p / "fc",
            config.feature_dim,
            n * init_size * init_size,
            Default::default(),
        );

        let mut deconvs: Vec<_> = (0..config.num_layers - 1)
            .map(|i| nn::conv_transpose2d(p / "deconvs" / i, n, n, 3, Default::default()))
            .collect();
        let last = nn::ConvTransposeConfig {
            stride: config.stride,
            output_padding: (size - 3) % config.stride,
            ..Default::default()
        };
        deconvs.push(nn::conv_transpose2d(
            p / "deconvs" / (config.num_layers - 1),
            n,
            config.out_channels,
            3,
            last,
        ));
        weight_init(&mut fc, &mut deconvs, var_store.device());

        Self {
            config,
            device: var_store.device(),
            init_size,
            fc,
            deconvs,
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        Self::build(var_store, self.config.clone())
    }

    fn forward(&self, h: &Self::Input) -> Self::Output {
        let n = self.config.num_filters;
        let mut x = h
            .to(self.device)
            .apply(&self.fc)
            .relu()
            .view([-1, n, self.init_size, self.init_size]);
        let last = self.deconvs.len() - 1;
        for (i, deconv) in self.deconvs.iter().enumerate() {
            x = x.apply(deconv);
            if i < last {
                x = x.relu();
            }
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelBase, Network};

    fn decode(size: i64, stride: i64) -> Vec<i64> {
        let config = PixelDecoderConfig {
            obs_shape: vec![9, size, size],
            out_channels: 3,
            feature_dim: 50,
            num_layers: 4,
            num_filters: 8,
            stride,
        };
        let decoder = Network::<PixelDecoder>::build(config, Device::Cpu);
        let h = Tensor::randn(&[2, 50], tch::kind::FLOAT_CPU);
        decoder.forward(&h).size()
    }

    #[test]
    fn test_orthogonal_initialization() {
        let config = PixelDecoderConfig {
            obs_shape: vec![3, 20, 20],
            out_channels: 3,
            feature_dim: 16,
            num_layers: 2,
            num_filters: 8,
            stride: 2,
        };
        let decoder = Network::<PixelDecoder>::build(config, Device::Cpu);
        let vars = decoder.get_var_store().variables();

        let w = &vars["fc.weight"];
        let eye = Tensor::eye(16, tch::kind::FLOAT_CPU);
        assert!(w.tr().matmul(w).allclose(&eye, 1e-4, 1e-4, false));
        assert_eq!(vars["fc.bias"].abs().max().double_value(&[]), 0.0);

        // Only the center tap of a transposed convolution is non-zero
        let w = &vars["deconvs.0.weight"];
        assert_eq!(w.size(), vec![8, 8, 3, 3]);
        let center = w.select(2, 1).select(2, 1);
        let eye = Tensor::eye(8, tch::kind::FLOAT_CPU) * 2.0;
        assert!(center.matmul(&center.tr()).allclose(&eye, 1e-4, 1e-4, false));
        let off_center = w.abs().sum(Kind::Float) - center.abs().sum(Kind::Float);
        assert!(off_center.double_value(&[]).abs() < 1e-6);

        let w = &vars["deconvs.1.weight"];
        let center = w.select(2, 1).select(2, 1);
        assert_eq!(center.size(), vec![8, 3]);
        let eye = Tensor::eye(3, tch::kind::FLOAT_CPU) * 2.0;
        assert!(center.tr().matmul(&center).allclose(&eye, 1e-4, 1e-4, false));
        assert_eq!(vars["deconvs.1.bias"].abs().max().double_value(&[]), 0.0);
    }

    #[test]
    fn test_decoded_shape_matches_observation() {
        assert_eq!(decode(84, 2), vec![2, 3, 84, 84]);
        assert_eq!(decode(20, 2), vec![2, 3, 20, 20]);
        assert_eq!(decode(21, 2), vec![2, 3, 21, 21]);
        assert_eq!(decode(20, 1), vec![2, 3, 20, 20]);
    }
}
