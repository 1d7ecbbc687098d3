//! Configuration validation

use super::schema::{ClassVisualizationConfig, FoolingConfig, RunSpec, StyleTransferConfig};

/// Validation error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid learning rate for {0}: {1} (must be finite and > 0.0)")]
    InvalidLearningRate(&'static str, f32),

    #[error("Invalid iteration count for {0}: must be > 0")]
    InvalidIterations(&'static str),

    #[error("Invalid L2 regularization: {0} (must be finite and >= 0.0)")]
    InvalidRegularization(f32),

    #[error("Invalid clamp range: [{0}, {1}] (low must be below high)")]
    InvalidClampRange(f32, f32),

    #[error("Invalid weight for {0}: {1} (must be finite and >= 0.0)")]
    InvalidWeight(&'static str, f32),

    #[error("Style layers and weights differ in length: {layers} layers, {weights} weights")]
    StyleLengthMismatch { layers: usize, weights: usize },

    #[error("Invalid pixel clamp: {0} (must be finite and > 0.0)")]
    InvalidPixelClamp(f32),
}

fn check_lr(what: &'static str, lr: f32) -> Result<(), ValidationError> {
    if !lr.is_finite() || lr <= 0.0 {
        return Err(ValidationError::InvalidLearningRate(what, lr));
    }
    Ok(())
}

fn check_weight(what: &'static str, weight: f32) -> Result<(), ValidationError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ValidationError::InvalidWeight(what, weight));
    }
    Ok(())
}

impl FoolingConfig {
    /// Check numeric ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_lr("fooling", self.learning_rate)?;
        if self.max_iterations == 0 {
            return Err(ValidationError::InvalidIterations("fooling"));
        }
        Ok(())
    }
}

impl ClassVisualizationConfig {
    /// Check numeric ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_lr("class visualization", self.learning_rate)?;
        if self.num_iterations == 0 {
            return Err(ValidationError::InvalidIterations("class visualization"));
        }
        if !self.l2_reg.is_finite() || self.l2_reg < 0.0 {
            return Err(ValidationError::InvalidRegularization(self.l2_reg));
        }
        if let Some([low, high]) = self.clamp {
            if !(low < high) {
                return Err(ValidationError::InvalidClampRange(low, high));
            }
        }
        Ok(())
    }
}

impl StyleTransferConfig {
    /// Check numeric ranges and that every style layer has a weight
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.style_layers.len() != self.style_weights.len() {
            return Err(ValidationError::StyleLengthMismatch {
                layers: self.style_layers.len(),
                weights: self.style_weights.len(),
            });
        }
        check_weight("content", self.content_weight)?;
        check_weight("total variation", self.tv_weight)?;
        for &weight in &self.style_weights {
            check_weight("style", weight)?;
        }
        check_lr("style transfer", self.initial_lr)?;
        check_lr("style transfer (decayed)", self.decayed_lr)?;
        if self.num_iterations == 0 {
            return Err(ValidationError::InvalidIterations("style transfer"));
        }
        if !self.pixel_clamp.is_finite() || self.pixel_clamp <= 0.0 {
            return Err(ValidationError::InvalidPixelClamp(self.pixel_clamp));
        }
        Ok(())
    }
}

/// Validate a run specification
///
/// Checks every section; layer indices are checked later against the
/// feature extractor actually used.
pub fn validate_config(spec: &RunSpec) -> Result<(), ValidationError> {
    spec.fooling.validate()?;
    spec.class_visualization.validate()?;
    if let Some(style) = &spec.style_transfer {
        style.validate()?;
    }
    Ok(())
}
