use anyhow::Result;
use deepmdp_core::DeepMdpError;
use serde::{Deserialize, Serialize};

/// Kind of the encoder.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum EncoderType {
    /// Convolutional encoder for images of shape `[C, H, W]`.
    #[default]
    Pixel,

    /// Passes vector observations of shape `[D]` through unchanged.
    Identity,
}

/// Height (and width) of the feature maps after the convolutional stack.
///
/// The first layer has the given stride; the others have stride 1. All
/// kernels are 3x3 without padding.
pub fn conv_out_dim(size: i64, num_layers: i64, stride: i64) -> i64 {
    (size - 3) / stride + 1 - 2 * (num_layers - 1)
}

/// Configuration of [`Encoder`](super::Encoder).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EncoderConfig {
    pub encoder_type: EncoderType,
    pub obs_shape: Vec<i64>,
    pub feature_dim: i64,
    pub num_layers: i64,
    pub num_filters: i64,
    pub stride: i64,
}

impl EncoderConfig {
    /// Checks that the observation shape can be processed.
    pub fn check(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(DeepMdpError::InvalidGeometry(msg).into()) };

        match self.encoder_type {
            EncoderType::Identity => {
                if self.obs_shape.len() != 1 {
                    return invalid(format!(
                        "identity encoder expects 1-d observations, got {:?}",
                        self.obs_shape
                    ));
                }
            }
            EncoderType::Pixel => {
                if self.obs_shape.len() != 3 {
                    return invalid(format!(
                        "pixel encoder expects observations of shape [C, H, W], got {:?}",
                        self.obs_shape
                    ));
                }
                if self.obs_shape[1] != self.obs_shape[2] {
                    return invalid(format!(
                        "pixel encoder expects square images, got {:?}",
                        self.obs_shape
                    ));
                }
                if self.num_layers < 1 || self.stride < 1 || self.feature_dim < 1 {
                    return invalid(format!(
                        "num_layers, stride and feature_dim must be positive, got {}, {}, {}",
                        self.num_layers, self.stride, self.feature_dim
                    ));
                }
                let out = conv_out_dim(self.obs_shape[1], self.num_layers, self.stride);
                if self.obs_shape[1] < 3 || out < 1 {
                    return invalid(format!(
                        "{} conv layers with stride {} do not fit images of size {}",
                        self.num_layers, self.stride, self.obs_shape[1]
                    ));
                }
            }
        }

        Ok(())
    }

    /// Dimension of the latent vector.
    pub fn out_dim(&self) -> i64 {
        match self.encoder_type {
            EncoderType::Pixel => self.feature_dim,
            EncoderType::Identity => self.obs_shape[0],
        }
    }
}
