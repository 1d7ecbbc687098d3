//! Stack of 1×1 convolutions used as a feature extractor

use super::FeatureExtractor;
use crate::autograd::{channel_mix, relu, Context};
use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frozen network of per-pixel channel mixing layers, each followed by ReLU
///
/// Every layer's activation is reported as a feature map, so layer `l` of
/// [`FeatureExtractor::extract_features`] has the channel count of layer `l`.
#[derive(Debug, Clone)]
pub struct PointwiseNet {
    layers: Vec<(Tensor, Tensor)>,
}

impl PointwiseNet {
    /// Build from explicit (C_out, C_in) weights and (C_out,) biases
    pub fn new(layers: Vec<(Array2<f32>, Array1<f32>)>) -> Result<Self> {
        for (i, (weight, bias)) in layers.iter().enumerate() {
            if weight.nrows() != bias.len() {
                return Err(Error::LengthMismatch {
                    what: "layer bias",
                    expected: weight.nrows(),
                    got: bias.len(),
                });
            }
            if let Some((next, _)) = layers.get(i + 1) {
                if next.ncols() != weight.nrows() {
                    return Err(Error::ShapeMismatch {
                        expected: vec![next.nrows(), weight.nrows()],
                        got: next.shape().to_vec(),
                    });
                }
            }
        }

        Ok(Self {
            layers: layers
                .into_iter()
                .map(|(w, b)| (Tensor::new(w.into_dyn(), false), Tensor::new(b.into_dyn(), false)))
                .collect(),
        })
    }

    /// Build with uniform random weights in ±1/√C_in
    ///
    /// `channels[0]` is the input channel count; every following entry adds
    /// one layer with that many output channels.
    pub fn random(channels: &[usize], seed: u64) -> Result<Self> {
        if channels.len() < 2 {
            return Err(Error::InvalidParameter(format!(
                "need at least input and one layer channel count, got {channels:?}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let layers = channels
            .windows(2)
            .map(|pair| {
                let (c_in, c_out) = (pair[0], pair[1]);
                let bound = 1.0 / (c_in.max(1) as f32).sqrt();
                let weight =
                    Array2::from_shape_fn((c_out, c_in), |_| rng.random_range(-bound..=bound));
                let bias = Array1::from_shape_fn(c_out, |_| rng.random_range(-bound..=bound));
                (weight, bias)
            })
            .collect();
        Self::new(layers)
    }

    /// Number of layers (and feature maps produced)
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl FeatureExtractor for PointwiseNet {
    fn extract_features(&self, images: &Tensor, _ctx: &Context) -> Result<Vec<Tensor>> {
        let mut features = Vec::with_capacity(self.layers.len());
        let mut current = images.clone();
        for (weight, bias) in &self.layers {
            current = relu(&channel_mix(&current, weight, bias)?);
            features.push(current.clone());
        }
        Ok(features)
    }
}
