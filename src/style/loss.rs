//! Neural style transfer loss terms
//!
//! Each function returns a 0-dimensional tensor that stays differentiable
//! with respect to any input that requires grad, so the terms can be summed
//! and backpropagated as one objective.

use crate::autograd::{add, gram, scale, square, sub, sum, total_variation};
use crate::error::{Error, Result};
use crate::Tensor;

/// `content_weight * Σ (current - target)²`
///
/// Both feature maps must have the same shape.
pub fn content_loss(content_weight: f32, current: &Tensor, target: &Tensor) -> Result<Tensor> {
    let diff = sub(current, target)?;
    Ok(scale(&sum(&square(&diff)), content_weight))
}

/// Gram matrix of (N, C, H, W) features, shaped (N, C, C)
///
/// With `normalize` the product is divided by H·W·C.
pub fn gram_matrix(features: &Tensor, normalize: bool) -> Result<Tensor> {
    gram(features, normalize)
}

/// Weighted sum over layers of `Σ (gram(feats[layer]) - target)²`
///
/// `style_layers[i]` indexes into `feats`, and `style_targets[i]` is the
/// normalized Gram matrix the layer should match with weight
/// `style_weights[i]`. Empty layer lists give a loss of zero.
pub fn style_loss(
    feats: &[Tensor],
    style_layers: &[usize],
    style_targets: &[Tensor],
    style_weights: &[f32],
) -> Result<Tensor> {
    if style_targets.len() != style_layers.len() {
        return Err(Error::LengthMismatch {
            what: "style targets",
            expected: style_layers.len(),
            got: style_targets.len(),
        });
    }
    if style_weights.len() != style_layers.len() {
        return Err(Error::LengthMismatch {
            what: "style weights",
            expected: style_layers.len(),
            got: style_weights.len(),
        });
    }

    let mut total: Option<Tensor> = None;
    for ((&layer, target), &weight) in style_layers.iter().zip(style_targets).zip(style_weights) {
        let features = feats.get(layer).ok_or(Error::LayerOutOfRange {
            layer,
            available: feats.len(),
        })?;
        let current = gram(features, true)?;
        let term = scale(&sum(&square(&sub(&current, target)?)), weight);
        total = Some(match total {
            Some(acc) => add(&acc, &term)?,
            None => term,
        });
    }

    Ok(total.unwrap_or_else(|| Tensor::scalar(0.0, false)))
}

/// `tv_weight * (Σ horizontal² + Σ vertical²)` over neighbouring pixels
pub fn tv_loss(img: &Tensor, tv_weight: f32) -> Result<Tensor> {
    Ok(scale(&total_variation(img)?, tv_weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_abs_diff_eq;
    use ndarray::{ArrayD, IxDyn};
    use proptest::prelude::*;

    fn image(shape: &[usize], values: impl Fn(usize) -> f32, requires_grad: bool) -> Tensor {
        let len = shape.iter().product();
        Tensor::from_shape_vec(shape, (0..len).map(values).collect(), requires_grad).unwrap()
    }

    #[test]
    fn test_content_loss_value_and_gradient() {
        let current = Tensor::from_shape_vec(&[1, 1, 1, 3], vec![1.0, 2.0, 3.0], true).unwrap();
        let target = Tensor::from_shape_vec(&[1, 1, 1, 3], vec![0.0, 2.0, 5.0], false).unwrap();

        let mut loss = content_loss(0.5, &current, &target).unwrap();
        assert_abs_diff_eq!(loss.value().unwrap(), 0.5 * (1.0 + 0.0 + 4.0));

        backward(&mut loss, None).unwrap();
        let grad = current.grad().unwrap();
        assert_eq!(grad.as_slice().unwrap(), &[1.0, 0.0, -2.0]);
    }

    #[test]
    fn test_content_loss_shape_mismatch() {
        let a = Tensor::zeros(&[1, 2, 2, 2], false);
        let b = Tensor::zeros(&[1, 2, 2, 3], false);
        assert!(matches!(
            content_loss(1.0, &a, &b),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_gram_matrix_known_values() {
        // Channels [1, 2] and [3, 4] over a 1x2 map
        let features = Tensor::from_shape_vec(&[1, 2, 1, 2], vec![1.0, 2.0, 3.0, 4.0], false).unwrap();

        let raw = gram_matrix(&features, false).unwrap();
        let normalized = gram_matrix(&features, true).unwrap();

        assert_eq!(raw.shape(), &[1, 2, 2]);
        assert_abs_diff_eq!(raw.data()[[0, 0, 0]], 5.0);
        assert_abs_diff_eq!(raw.data()[[0, 0, 1]], 11.0);
        assert_abs_diff_eq!(raw.data()[[0, 1, 1]], 25.0);
        assert_abs_diff_eq!(normalized.data()[[0, 0, 1]], 11.0 / 4.0);
    }

    #[test]
    fn test_style_loss_matches_manual_sum() {
        let feats = vec![
            image(&[1, 2, 2, 2], |i| i as f32 * 0.1, false),
            image(&[1, 3, 1, 2], |i| 1.0 - i as f32 * 0.2, false),
        ];
        let targets = vec![
            Tensor::zeros(&[1, 3, 3], false),
            Tensor::zeros(&[1, 2, 2], false),
        ];

        let loss = style_loss(&feats, &[1, 0], &targets, &[2.0, 3.0]).unwrap();

        let sq = |t: &Tensor| t.data().mapv(|v| v * v).sum();
        let expected = 2.0 * sq(&gram_matrix(&feats[1], true).unwrap())
            + 3.0 * sq(&gram_matrix(&feats[0], true).unwrap());
        assert_abs_diff_eq!(loss.value().unwrap(), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_style_loss_gradient_matches_finite_difference() {
        let features = image(&[1, 2, 2, 2], |i| (i as f32 * 0.7).sin(), true);
        let target = Tensor::new(ArrayD::from_elem(IxDyn(&[1, 2, 2]), 0.1), false);

        let mut loss = style_loss(
            std::slice::from_ref(&features),
            &[0],
            std::slice::from_ref(&target),
            &[4.0],
        )
        .unwrap();
        backward(&mut loss, None).unwrap();
        let analytic = features.grad().unwrap();

        let eps = 1e-2;
        for idx in 0..features.len() {
            let eval = |delta: f32| {
                let mut data = features.data().clone();
                *data.iter_mut().nth(idx).unwrap() += delta;
                let probe = Tensor::new(data, false);
                style_loss(&[probe], &[0], std::slice::from_ref(&target), &[4.0])
                    .unwrap()
                    .value()
                    .unwrap()
            };
            let numeric = (eval(eps) - eval(-eps)) / (2.0 * eps);
            let got = *analytic.iter().nth(idx).unwrap();
            assert_abs_diff_eq!(got, numeric, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_style_loss_empty_is_zero() {
        let loss = style_loss(&[], &[], &[], &[]).unwrap();
        assert_eq!(loss.value(), Some(0.0));
    }

    #[test]
    fn test_style_loss_validation() {
        let feats = vec![Tensor::zeros(&[1, 2, 2, 2], false)];
        let target = vec![Tensor::zeros(&[1, 2, 2], false)];

        assert!(matches!(
            style_loss(&feats, &[0], &target, &[1.0, 2.0]),
            Err(Error::LengthMismatch { what: "style weights", .. })
        ));
        assert!(matches!(
            style_loss(&feats, &[0, 0], &target, &[1.0, 2.0]),
            Err(Error::LengthMismatch { what: "style targets", .. })
        ));
        assert!(matches!(
            style_loss(&feats, &[3], &target, &[1.0]),
            Err(Error::LayerOutOfRange { layer: 3, available: 1 })
        ));
        let wrong_target = vec![Tensor::zeros(&[1, 3, 3], false)];
        assert!(matches!(
            style_loss(&feats, &[0], &wrong_target, &[1.0]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_tv_loss_known_value() {
        // [[0, 1], [3, 5]]: horizontal 1² + 2², vertical 3² + 4²
        let img = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![0.0, 1.0, 3.0, 5.0], false).unwrap();

        let loss = tv_loss(&img, 0.5).unwrap();
        assert_abs_diff_eq!(loss.value().unwrap(), 0.5 * 30.0);
    }

    #[test]
    fn test_tv_loss_zero_width_image() {
        let img = Tensor::zeros(&[1, 3, 4, 0], false);
        let loss = tv_loss(&img, 1.0).unwrap();
        assert_abs_diff_eq!(loss.value().unwrap(), 0.0);
    }

    #[test]
    fn test_gram_matrix_normalize_rejects_empty_map() {
        let features = Tensor::zeros(&[1, 0, 2, 2], false);
        assert!(matches!(
            gram_matrix(&features, true),
            Err(Error::InvalidParameter(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_content_loss_of_identical_features_is_zero(
            values in proptest::collection::vec(-10.0f32..10.0, 12),
            weight in 0.0f32..100.0,
        ) {
            let f = Tensor::from_shape_vec(&[1, 3, 2, 2], values, false).unwrap();
            prop_assert_eq!(content_loss(weight, &f, &f).unwrap().value(), Some(0.0));
        }

        #[test]
        fn prop_content_loss_grows_with_distance(
            values in proptest::collection::vec(-5.0f32..5.0, 8),
            near in 0.0f32..1.0,
            extra in 0.01f32..1.0,
        ) {
            let target = Tensor::from_shape_vec(&[1, 2, 2, 2], values.clone(), false).unwrap();
            let shifted = |d: f32| {
                let data = values.iter().map(|v| v + d).collect();
                Tensor::from_shape_vec(&[1, 2, 2, 2], data, false).unwrap()
            };
            let close = content_loss(1.0, &shifted(near), &target).unwrap().value().unwrap();
            let far = content_loss(1.0, &shifted(near + extra), &target).unwrap().value().unwrap();
            prop_assert!(far >= close);
        }

        #[test]
        fn prop_gram_normalization_and_symmetry(
            values in proptest::collection::vec(-3.0f32..3.0, 2 * 3 * 2 * 4),
        ) {
            let f = Tensor::from_shape_vec(&[2, 3, 2, 4], values, false).unwrap();
            let raw = gram_matrix(&f, false).unwrap();
            let normalized = gram_matrix(&f, true).unwrap();
            prop_assert_eq!(normalized.shape(), &[2, 3, 3]);

            let norm = (2 * 4 * 3) as f32;
            for n in 0..2 {
                for i in 0..3 {
                    for j in 0..3 {
                        let g = normalized.data()[[n, i, j]];
                        prop_assert!((g - normalized.data()[[n, j, i]]).abs() < 1e-4);
                        prop_assert!((g - raw.data()[[n, i, j]] / norm).abs() < 1e-4);
                    }
                }
            }
        }

        #[test]
        fn prop_tv_loss_zero_weight_or_constant_image(
            values in proptest::collection::vec(-1.0f32..1.0, 12),
            fill in -5.0f32..5.0,
            weight in 0.1f32..10.0,
        ) {
            let img = Tensor::from_shape_vec(&[1, 3, 2, 2], values, false).unwrap();
            prop_assert_eq!(tv_loss(&img, 0.0).unwrap().value(), Some(0.0));

            let constant = Tensor::new(ArrayD::from_elem(IxDyn(&[1, 3, 4, 5]), fill), false);
            prop_assert_eq!(tv_loss(&constant, weight).unwrap().value(), Some(0.0));
        }
    }
}
