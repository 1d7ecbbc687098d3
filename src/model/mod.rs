//! Differentiable models used as frozen collaborators
//!
//! The visualization and style routines only see a model through the
//! [`Classifier`] and [`FeatureExtractor`] traits. Forward passes build an
//! autograd graph over the input; gradients are obtained with
//! [`crate::autograd::backward`] and cleared with [`crate::Tensor::zero_grad`].

mod linear;
mod pointwise;
mod traits;

pub use linear::LinearClassifier;
pub use pointwise::PointwiseNet;
pub use traits::{argmax_rows, Classifier, FeatureExtractor};
