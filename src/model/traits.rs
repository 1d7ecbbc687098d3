//! Model capability traits

use crate::autograd::Context;
use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::{Axis, Ix2};

/// Image classifier mapping an (N, C, H, W) batch to (N, num_classes) scores
pub trait Classifier {
    /// Number of classes scored per image
    fn num_classes(&self) -> usize;

    /// Forward pass
    ///
    /// The returned scores must be differentiable with respect to `images`
    /// whenever `images` requires grad. Model parameters stay frozen.
    fn forward(&self, images: &Tensor, ctx: &Context) -> Result<Tensor>;
}

/// Network run in feature-extraction mode
pub trait FeatureExtractor {
    /// Ordered per-layer feature maps, each (N, C_l, H_l, W_l)
    fn extract_features(&self, images: &Tensor, ctx: &Context) -> Result<Vec<Tensor>>;
}

/// Index of the highest score in every row of an (N, K) score matrix
///
/// Ties resolve to the lowest index.
pub fn argmax_rows(scores: &Tensor) -> Result<Vec<usize>> {
    let matrix = scores
        .data()
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| Error::RankMismatch {
            what: "class scores",
            expected: 2,
            got: scores.shape().to_vec(),
        })?;

    Ok(matrix
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, best_score), (i, &s)| {
                    if s > best_score {
                        (i, s)
                    } else {
                        (best, best_score)
                    }
                })
                .0
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_rows() {
        let scores =
            Tensor::from_shape_vec(&[2, 3], vec![0.1, 0.9, 0.3, 2.0, -1.0, 2.0], false).unwrap();
        assert_eq!(argmax_rows(&scores).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_argmax_rows_rejects_vectors() {
        let scores = Tensor::from_vec(vec![1.0, 2.0], false);
        assert!(argmax_rows(&scores).is_err());
    }
}
