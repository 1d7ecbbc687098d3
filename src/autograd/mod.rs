//! Tape-based autograd engine
//!
//! Provides reverse-mode automatic differentiation over n-dimensional
//! `ndarray` tensors. Forward operations record a backward op on their
//! result; [`backward`] orders the recorded graph and replays it once.

mod backward;
mod context;
mod ops;
mod tensor;


pub use backward::BackwardOp;
pub use context::Context;
pub use ops::*;
pub use tensor::{GradCell, Tensor};

use crate::error::{Error, Result};
use ndarray::ArrayD;
use std::collections::HashSet;
use std::rc::Rc;

/// Perform backward pass on a tensor
///
/// `grad_output` weights the elements of `tensor`; when omitted every
/// element is weighted by one, which sums the per-element gradients.
pub fn backward(tensor: &mut Tensor, grad_output: Option<ArrayD<f32>>) -> Result<()> {
    if !tensor.requires_grad() {
        return Err(Error::BackwardFailed(
            "tensor does not require grad".to_string(),
        ));
    }

    match grad_output {
        Some(grad) => {
            if grad.shape() != tensor.shape() {
                return Err(Error::ShapeMismatch {
                    expected: tensor.shape().to_vec(),
                    got: grad.shape().to_vec(),
                });
            }
            tensor.set_grad(grad);
        }
        None => tensor.set_grad(ArrayD::ones(tensor.data().raw_dim())),
    }

    for op in topological_order(tensor).iter().rev() {
        op.backward()?;
    }
    Ok(())
}

/// Post-order of the ops reachable from `root` (inputs before consumers)
fn topological_order(root: &Tensor) -> Vec<Rc<dyn BackwardOp>> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(root, &mut visited, &mut order);
    order
}

fn visit(tensor: &Tensor, visited: &mut HashSet<usize>, order: &mut Vec<Rc<dyn BackwardOp>>) {
    if !visited.insert(tensor.node_id()) {
        return;
    }
    if let Some(op) = tensor.backward_op() {
        for input in op.inputs() {
            visit(&input, visited, order);
        }
        order.push(op);
    }
}
