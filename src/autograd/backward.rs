//! Backward operation trait

use super::Tensor;
use crate::error::Result;

/// Trait for backward pass operations
pub trait BackwardOp {
    /// Push the result gradient into the inputs of this operation
    ///
    /// Implementations must not recurse into their inputs; the engine
    /// visits every operation exactly once in reverse topological order.
    fn backward(&self) -> Result<()>;

    /// Inputs this operation was computed from
    fn inputs(&self) -> Vec<Tensor>;
}
