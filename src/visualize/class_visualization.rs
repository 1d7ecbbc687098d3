//! Class visualization by regularized gradient ascent

use crate::autograd::{backward, scale, select_scores, square, sub, sum, Context};
use crate::config::ClassVisualizationConfig;
use crate::error::{Error, Result};
use crate::model::Classifier;
use crate::Tensor;
use ndarray::{concatenate, ArrayD, Axis, Slice};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One ascent step on `score(target_y) - l2_reg * ‖img‖²`
///
/// `img` is (1, C, H, W). Returns `img + learning_rate * ∇`, detached from
/// any gradient history. The update itself is a plain numeric write.
pub fn class_visualization_step<M: Classifier + ?Sized>(
    model: &M,
    target_y: usize,
    l2_reg: f32,
    learning_rate: f32,
    img: &Tensor,
) -> Result<Tensor> {
    let (n, _, _, _) = img.image_dims("class visualization image")?;
    if n != 1 {
        return Err(Error::InvalidParameter(format!(
            "class visualization works on a single image, got a batch of {n}"
        )));
    }
    if !l2_reg.is_finite() || l2_reg < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "l2_reg must be a non-negative number, got {l2_reg}"
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
    let image = Tensor::new(img.data().clone(), true);

    let scores = model.forward(&image, &ctx)?;
    let score = sum(&select_scores(&scores, &[target_y])?);
    let penalty = scale(&sum(&square(&image)), l2_reg);
    let mut objective = sub(&score, &penalty)?;
    backward(&mut objective, None)?;

    let grad = image.grad().ok_or_else(|| {
        Error::BackwardFailed("objective does not depend on the image".to_string())
    })?;

    let mut updated = image.detach();
    updated.data_mut().scaled_add(learning_rate, &grad);
    Ok(updated)
}

/// Roll `array` by `shift` positions along `axis`, wrapping around
fn roll(array: &ArrayD<f32>, shift: isize, axis: Axis) -> Result<ArrayD<f32>> {
    let len = array.len_of(axis);
    if len == 0 {
        return Ok(array.clone());
    }
    let split = len - shift.rem_euclid(len as isize) as usize;
    if split == len {
        return Ok(array.clone());
    }
    let tail = array.slice_axis(axis, Slice::from(split..));
    let head = array.slice_axis(axis, Slice::from(..split));
    Ok(concatenate(axis, &[tail, head])?)
}

/// Repeats [`class_visualization_step`] with random jitter and clamping
#[derive(Debug, Clone)]
pub struct ClassVisualizer {
    config: ClassVisualizationConfig,
}

impl ClassVisualizer {
    /// Create a visualizer from a configuration section
    pub fn new(config: ClassVisualizationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassVisualizationConfig {
        &self.config
    }

    /// Run the ascent starting from `init`
    ///
    /// Every iteration rolls the image by a random offset in
    /// `0..=max_jitter` along both spatial axes, takes one step, rolls it
    /// back and clamps pixels when a range is configured.
    pub fn run<M: Classifier + ?Sized>(
        &self,
        model: &M,
        target_y: usize,
        init: &Tensor,
    ) -> Result<Tensor> {
        init.image_dims("class visualization image")?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut image = init.detach();

        for iteration in 0..self.config.num_iterations {
            let ox = rng.random_range(0..=self.config.max_jitter) as isize;
            let oy = rng.random_range(0..=self.config.max_jitter) as isize;

            let jittered = roll(&roll(image.data(), ox, Axis(3))?, oy, Axis(2))?;
            let stepped = class_visualization_step(
                model,
                target_y,
                self.config.l2_reg,
                self.config.learning_rate,
                &Tensor::new(jittered, false),
            )?;
            let mut data = roll(&roll(stepped.data(), -oy, Axis(2))?, -ox, Axis(3))?;

            if let Some([low, high]) = self.config.clamp {
                data.mapv_inplace(|v| v.clamp(low, high));
            }
            image = Tensor::new(data, false);

            tracing::debug!(iteration, ox, oy, "class visualization step");
        }

        tracing::info!(
            iterations = self.config.num_iterations,
            target = target_y,
            "class visualization finished"
        );
        Ok(image)
    }
}
