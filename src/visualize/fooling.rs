//! Fooling images via normalized gradient ascent

use crate::autograd::{backward, select_scores, Context};
use crate::config::FoolingConfig;
use crate::error::{Error, Result};
use crate::model::{argmax_rows, Classifier};
use crate::Tensor;

/// Result of a fooling image search
#[derive(Debug, Clone)]
pub struct FoolingOutcome {
    /// Final image, detached from any gradient history
    pub image: Tensor,

    /// Number of ascent updates applied to the image
    pub iterations: usize,

    /// Whether the classifier predicts the target class for `image`
    pub fooled: bool,
}

/// Perturbs a single image until a classifier assigns it a chosen class
///
/// Each update moves the image by `learning_rate` along the L2-normalized
/// gradient of the target score. The search stops as soon as the arg-max
/// class equals the target, or after `max_iterations` updates.
#[derive(Debug, Clone, Default)]
pub struct FoolingSearch {
    config: FoolingConfig,
}

impl FoolingSearch {
    /// Create a search with the given step length and update budget
    ///
    /// The values are checked when the search runs.
    pub fn new(learning_rate: f32, max_iterations: usize) -> Self {
        Self {
            config: FoolingConfig {
                learning_rate,
                max_iterations,
            },
        }
    }

    /// Create a search from a validated configuration section
    pub fn from_config(config: &FoolingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn learning_rate(&self) -> f32 {
        self.config.learning_rate
    }

    pub fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }

    /// Run the search on `x` (1, C, H, W) toward class `target_y`
    ///
    /// `x` itself is never modified. Running out of iterations is not an
    /// error: the best-effort image comes back with `fooled == false`.
    /// A non-positive or non-finite learning rate, or a zero budget, fails
    /// with [`Error::Validation`] before the model is called.
    pub fn run<M: Classifier + ?Sized>(
        &self,
        x: &Tensor,
        target_y: usize,
        model: &M,
    ) -> Result<FoolingOutcome> {
        self.config.validate()?;
        let (n, _, _, _) = x.image_dims("fooling image")?;
        if n != 1 {
            return Err(Error::InvalidParameter(format!(
                "fooling search works on a single image, got a batch of {n}"
            )));
        }
        let num_classes = model.num_classes();
        if target_y >= num_classes {
            return Err(Error::LabelOutOfRange {
                label: target_y,
                num_classes,
            });
        }

        let ctx = Context::inference();
        let mut image = Tensor::new(x.data().clone(), true);
        let mut iterations = 0;
        let mut fooled = false;

        while iterations <= self.config.max_iterations {
            let scores = model.forward(&image, &ctx)?;
            let predicted = argmax_rows(&scores)?.first().copied();
            if predicted == Some(target_y) {
                fooled = true;
                break;
            }
            if iterations == self.config.max_iterations {
                break;
            }

            let mut target_score = select_scores(&scores, &[target_y])?;
            backward(&mut target_score, None)?;
            let grad = image.grad().ok_or_else(|| {
                Error::BackwardFailed("target score does not depend on the image".to_string())
            })?;
            image.zero_grad();

            let norm = grad.iter().map(|g| g * g).sum::<f32>().sqrt();
            if !norm.is_normal() {
                tracing::warn!(
                    iteration = iterations,
                    norm,
                    "target score gradient vanished, stopping fooling search"
                );
                break;
            }

            image
                .data_mut()
                .scaled_add(self.config.learning_rate / norm, &grad);
            iterations += 1;
            tracing::debug!(iteration = iterations, ?predicted, target = target_y, "fooling step");
        }

        if fooled {
            tracing::info!(iterations, target = target_y, "fooled the classifier");
        } else {
            tracing::warn!(
                iterations,
                target = target_y,
                "fooling search ended without reaching the target class"
            );
        }

        Ok(FoolingOutcome {
            image: image.detach(),
            iterations,
            fooled,
        })
    }
}

/// Generate a fooling image with the default step length and budget
///
/// Shorthand for `FoolingSearch::default().run(x, target_y, model)` that
/// returns only the image.
pub fn make_fooling_image<M: Classifier + ?Sized>(
    x: &Tensor,
    target_y: usize,
    model: &M,
) -> Result<Tensor> {
    Ok(FoolingSearch::default().run(x, target_y, model)?.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::linear;
    use crate::model::LinearClassifier;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array1, Array2};
    use std::cell::Cell;

    /// Linear scores whose bias flips to the target class on the k-th call
    struct FlipAfter {
        weight: Tensor,
        before: Tensor,
        after: Tensor,
        flip_at: usize,
        calls: Cell<usize>,
    }

    impl FlipAfter {
        fn new(features: usize, target: usize, flip_at: usize) -> Self {
            let mut before = Array1::zeros(3);
            before[0] = 10.0;
            let mut after = Array1::zeros(3);
            after[target] = 10.0;
            Self {
                weight: Tensor::new(Array2::from_elem((3, features), 0.1).into_dyn(), false),
                before: Tensor::new(before.into_dyn(), false),
                after: Tensor::new(after.into_dyn(), false),
                flip_at,
                calls: Cell::new(0),
            }
        }
    }

    impl Classifier for FlipAfter {
        fn num_classes(&self) -> usize {
            3
        }

        fn forward(&self, images: &Tensor, ctx: &Context) -> Result<Tensor> {
            assert!(!ctx.is_training());
            let call = self.calls.get() + 1;
            self.calls.set(call);
            let bias = if call >= self.flip_at { &self.after } else { &self.before };
            linear(images, &self.weight, bias)
        }
    }

    #[test]
    fn test_already_fooled_returns_input_unchanged() {
        let model = FlipAfter::new(4, 2, 1);
        let x = Tensor::from_shape_vec(&[1, 1, 2, 2], vec![0.1, -0.2, 0.3, 0.4], false).unwrap();

        let outcome = FoolingSearch::default().run(&x, 2, &model).unwrap();

        assert!(outcome.fooled);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.image.data(), x.data());
        assert!(!outcome.image.requires_grad());
        assert_eq!(model.calls.get(), 1);
    }

    #[test]
    fn test_stops_on_the_call_that_flips() {
        let model = FlipAfter::new(4, 1, 7);
        let x = Tensor::zeros(&[1, 1, 2, 2], false);

        let outcome = FoolingSearch::default().run(&x, 1, &model).unwrap();

        assert!(outcome.fooled);
        assert_eq!(model.calls.get(), 7);
        assert_eq!(outcome.iterations, 6);
    }

    #[test]
    fn test_each_update_has_learning_rate_length() {
        // Never fooled: class 0 bias dominates and the gradient is constant
        let model = FlipAfter::new(4, 1, usize::MAX);
        let x = Tensor::zeros(&[1, 1, 2, 2], false);

        let outcome = FoolingSearch::new(0.5, 3).run(&x, 1, &model).unwrap();

        assert!(!outcome.fooled);
        assert_eq!(outcome.iterations, 3);
        let distance = outcome.image.data().iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_abs_diff_eq!(distance, 1.5, epsilon = 1e-5);
        // One forward per update plus the final check
        assert_eq!(model.calls.get(), 4);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let model = FlipAfter::new(4, 1, 5);
        let x = Tensor::ones(&[1, 1, 2, 2], true);

        let image = make_fooling_image(&x, 1, &model).unwrap();

        assert!(x.data().iter().all(|&v| v == 1.0));
        assert!(x.grad().is_none());
        assert_ne!(image.data(), x.data());
    }

    #[test]
    fn test_real_linear_model_is_fooled() {
        let model = LinearClassifier::new(
            arr2(&[[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]),
            arr1(&[1.0, 0.0]),
        )
        .unwrap();
        let x = Tensor::zeros(&[1, 1, 2, 2], false);

        let outcome = FoolingSearch::new(0.25, 100).run(&x, 1, &model).unwrap();

        assert!(outcome.fooled);
        let scores = model.forward(&outcome.image, &Context::inference()).unwrap();
        assert_eq!(argmax_rows(&scores).unwrap(), vec![1]);
    }

    #[test]
    fn test_zero_gradient_stops_early() {
        let model = LinearClassifier::new(Array2::zeros((2, 4)), arr1(&[1.0, 0.0])).unwrap();
        let x = Tensor::zeros(&[1, 1, 2, 2], false);

        let outcome = FoolingSearch::default().run(&x, 1, &model).unwrap();

        assert!(!outcome.fooled);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_rejects_batches_and_bad_targets() {
        let model = FlipAfter::new(4, 1, 1);

        let batch = Tensor::zeros(&[2, 1, 2, 2], false);
        assert!(matches!(
            FoolingSearch::default().run(&batch, 1, &model),
            Err(Error::InvalidParameter(_))
        ));

        let x = Tensor::zeros(&[1, 1, 2, 2], false);
        assert!(matches!(
            FoolingSearch::default().run(&x, 3, &model),
            Err(Error::LabelOutOfRange { label: 3, num_classes: 3 })
        ));
    }

    #[test]
    fn test_run_rejects_invalid_step_settings() {
        let model = FlipAfter::new(4, 1, 1);
        let x = Tensor::zeros(&[1, 1, 2, 2], false);

        for search in [
            FoolingSearch::new(f32::NAN, 10),
            FoolingSearch::new(-1.0, 10),
            FoolingSearch::new(0.5, 0),
        ] {
            assert!(matches!(
                search.run(&x, 1, &model),
                Err(Error::Validation(_))
            ));
        }
        assert_eq!(model.calls.get(), 0);
    }

    #[test]
    fn test_from_config_validates() {
        let config = FoolingConfig {
            learning_rate: 0.0,
            max_iterations: 10,
        };
        assert!(matches!(
            FoolingSearch::from_config(&config),
            Err(Error::Validation(_))
        ));
    }
}
