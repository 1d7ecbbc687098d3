//! Optimizer trait

use crate::error::Result;
use crate::Tensor;

/// Trait for optimization algorithms over image tensors
pub trait Optimizer {
    /// Perform a single descent step using each parameter's gradient
    ///
    /// Parameters without a gradient are left untouched.
    fn step(&mut self, params: &mut [Tensor]) -> Result<()>;

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
