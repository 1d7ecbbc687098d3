//! Flatten + dense classifier

use super::Classifier;
use crate::autograd::{linear, Context};
use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::{Array1, Array2};

/// Frozen linear classifier: scores = flatten(x) · Wᵗ + b
///
/// Weights never require grad, so gradient computations through this model
/// only ever reach the input images.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weight: Tensor,
    bias: Tensor,
}

impl LinearClassifier {
    /// Create a classifier from a (num_classes, features) weight matrix and
    /// a (num_classes,) bias
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weight.nrows() != bias.len() {
            return Err(Error::LengthMismatch {
                what: "classifier bias",
                expected: weight.nrows(),
                got: bias.len(),
            });
        }
        Ok(Self {
            weight: Tensor::new(weight.into_dyn(), false),
            bias: Tensor::new(bias.into_dyn(), false),
        })
    }

    /// Number of input features expected after flattening
    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }
}

impl Classifier for LinearClassifier {
    fn num_classes(&self) -> usize {
        self.weight.shape()[0]
    }

    fn forward(&self, images: &Tensor, _ctx: &Context) -> Result<Tensor> {
        linear(images, &self.weight, &self.bias)
    }
}
