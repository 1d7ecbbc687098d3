//! Autograd operations with backward passes

use super::{BackwardOp, GradCell, Tensor};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, Array3, Array4, ArrayD, Axis, Ix1, Ix2, Ix3, IxDyn, Slice};
use std::rc::Rc;

fn ensure_same_shape(a: &Tensor, b: &Tensor) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        });
    }
    Ok(())
}

fn as_matrix(a: &ArrayD<f32>, rows: usize, cols: usize) -> Result<Array2<f32>> {
    Ok(a.to_shape((rows, cols))?.into_owned())
}

fn as_vector(a: &ArrayD<f32>) -> Result<Array1<f32>> {
    Ok(a.view().into_dimensionality::<Ix1>()?.to_owned())
}

/// Flatten an NCHW array into one row per pixel: (N*H*W, C)
fn nchw_to_rows(a: &ArrayD<f32>) -> Result<Array2<f32>> {
    let (n, c, h, w) = match *a.shape() {
        [n, c, h, w] => (n, c, h, w),
        _ => {
            return Err(Error::RankMismatch {
                what: "channel rows",
                expected: 4,
                got: a.shape().to_vec(),
            })
        }
    };
    let nhwc = a.view().permuted_axes(IxDyn(&[0, 2, 3, 1]));
    Ok(nhwc
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((n * h * w, c))?)
}

/// Inverse of [`nchw_to_rows`]
fn rows_to_nchw(rows: Array2<f32>, n: usize, h: usize, w: usize) -> Result<ArrayD<f32>> {
    let c = rows.ncols();
    let nhwc: Array4<f32> = rows.into_shape_with_order((n, h, w, c))?;
    Ok(nhwc
        .permuted_axes([0, 3, 1, 2])
        .as_standard_layout()
        .into_owned()
        .into_dyn())
}

/// Add two tensors of the same shape
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    ensure_same_shape(a, b)?;
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Subtract `b` from `a` element-wise
pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    ensure_same_shape(a, b)?;
    let data = a.data() - b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SubBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct SubBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SubBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.mapv(|g| -g));
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * factor
                self.a.accumulate_grad(grad * self.factor);
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Square every element
pub fn square(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x * x);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SquareBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SquareBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SquareBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * 2a
                let grad_a = grad * &self.a.data().mapv(|x| 2.0 * x);
                self.a.accumulate_grad(grad_a);
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Sum all elements into a 0-dimensional tensor
pub fn sum(a: &Tensor) -> Tensor {
    let data = ArrayD::from_elem(IxDyn(&[]), a.data().sum());
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂sum * 1 (broadcast)
                let grad_a = ArrayD::from_elem(self.a.data().raw_dim(), grad.sum());
                self.a.accumulate_grad(grad_a);
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let grad_a = grad * &self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad_a);
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Pick one score per row of an (N, K) score matrix
///
/// Returns an (N,) tensor with `scores[i, labels[i]]`.
pub fn select_scores(scores: &Tensor, labels: &[usize]) -> Result<Tensor> {
    let matrix = scores.data().view().into_dimensionality::<Ix2>().map_err(|_| {
        Error::RankMismatch {
            what: "class scores",
            expected: 2,
            got: scores.shape().to_vec(),
        }
    })?;
    let (n, k) = matrix.dim();
    if labels.len() != n {
        return Err(Error::LengthMismatch {
            what: "labels",
            expected: n,
            got: labels.len(),
        });
    }
    if let Some(&label) = labels.iter().find(|&&label| label >= k) {
        return Err(Error::LabelOutOfRange {
            label,
            num_classes: k,
        });
    }

    let data: Array1<f32> = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| matrix[[i, label]])
        .collect();
    let requires_grad = scores.requires_grad();

    let mut result = Tensor::new(data.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SelectScoresBackward {
            scores: scores.clone(),
            labels: labels.to_vec(),
            num_classes: k,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct SelectScoresBackward {
    scores: Tensor,
    labels: Vec<usize>,
    num_classes: usize,
    result_grad: GradCell,
}

impl BackwardOp for SelectScoresBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.scores.requires_grad() {
                // Scatter each row's gradient back to its selected column
                let mut grad_scores = Array2::zeros((self.labels.len(), self.num_classes));
                for ((i, &label), &g) in self.labels.iter().enumerate().zip(grad.iter()) {
                    grad_scores[[i, label]] = g;
                }
                self.scores.accumulate_grad(grad_scores.into_dyn());
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.scores.clone()]
    }
}

/// Dense layer over flattened inputs
///
/// `x` is (N, ...) and is flattened to (N, D); `weight` is (K, D) and
/// `bias` is (K,). Output is (N, K) = x·Wᵗ + b.
pub fn linear(x: &Tensor, weight: &Tensor, bias: &Tensor) -> Result<Tensor> {
    let n = *x.shape().first().ok_or_else(|| Error::RankMismatch {
        what: "linear input",
        expected: 2,
        got: x.shape().to_vec(),
    })?;
    let d: usize = x.shape()[1..].iter().product();
    let k = *weight.shape().first().unwrap_or(&0);
    if weight.shape() != [k, d] {
        return Err(Error::ShapeMismatch {
            expected: vec![k, d],
            got: weight.shape().to_vec(),
        });
    }
    if bias.shape() != [k] {
        return Err(Error::ShapeMismatch {
            expected: vec![k],
            got: bias.shape().to_vec(),
        });
    }

    let x_matrix = as_matrix(x.data(), n, d)?;
    let w_matrix = as_matrix(weight.data(), k, d)?;
    let mut out = x_matrix.dot(&w_matrix.t());
    out += &as_vector(bias.data())?;

    let requires_grad = x.requires_grad() || weight.requires_grad() || bias.requires_grad();
    let mut result = Tensor::new(out.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(LinearBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.clone(),
            x_matrix,
            w_matrix,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct LinearBackward {
    x: Tensor,
    weight: Tensor,
    bias: Tensor,
    x_matrix: Array2<f32>,
    w_matrix: Array2<f32>,
    result_grad: GradCell,
}

impl BackwardOp for LinearBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let (n, k) = (self.x_matrix.nrows(), self.w_matrix.nrows());
            let grad_out = as_matrix(grad, n, k)?;

            // ∂L/∂x = ∂L/∂out @ W
            if self.x.requires_grad() {
                let grad_x = grad_out
                    .dot(&self.w_matrix)
                    .into_shape_with_order(IxDyn(self.x.shape()))?;
                self.x.accumulate_grad(grad_x);
            }
            // ∂L/∂W = ∂L/∂outᵗ @ x
            if self.weight.requires_grad() {
                self.weight
                    .accumulate_grad(grad_out.t().dot(&self.x_matrix).into_dyn());
            }
            if self.bias.requires_grad() {
                self.bias.accumulate_grad(grad_out.sum_axis(Axis(0)).into_dyn());
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x.clone(), self.weight.clone(), self.bias.clone()]
    }
}

/// 1×1 convolution: mixes channels independently at every pixel
///
/// `x` is (N, C_in, H, W), `weight` is (C_out, C_in), `bias` is (C_out,).
pub fn channel_mix(x: &Tensor, weight: &Tensor, bias: &Tensor) -> Result<Tensor> {
    let (n, c_in, h, w) = x.image_dims("channel_mix input")?;
    let c_out = *weight.shape().first().unwrap_or(&0);
    if weight.shape() != [c_out, c_in] {
        return Err(Error::ShapeMismatch {
            expected: vec![c_out, c_in],
            got: weight.shape().to_vec(),
        });
    }
    if bias.shape() != [c_out] {
        return Err(Error::ShapeMismatch {
            expected: vec![c_out],
            got: bias.shape().to_vec(),
        });
    }

    let rows = nchw_to_rows(x.data())?;
    let w_matrix = as_matrix(weight.data(), c_out, c_in)?;
    let mut out_rows = rows.dot(&w_matrix.t());
    out_rows += &as_vector(bias.data())?;
    let data = rows_to_nchw(out_rows, n, h, w)?;

    let requires_grad = x.requires_grad() || weight.requires_grad() || bias.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ChannelMixBackward {
            x: x.clone(),
            weight: weight.clone(),
            bias: bias.clone(),
            rows,
            w_matrix,
            spatial: (n, h, w),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct ChannelMixBackward {
    x: Tensor,
    weight: Tensor,
    bias: Tensor,
    rows: Array2<f32>,
    w_matrix: Array2<f32>,
    spatial: (usize, usize, usize),
    result_grad: GradCell,
}

impl BackwardOp for ChannelMixBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let (n, h, w) = self.spatial;
            let grad_rows = nchw_to_rows(grad)?;

            if self.x.requires_grad() {
                let grad_x = rows_to_nchw(grad_rows.dot(&self.w_matrix), n, h, w)?;
                self.x.accumulate_grad(grad_x);
            }
            if self.weight.requires_grad() {
                self.weight
                    .accumulate_grad(grad_rows.t().dot(&self.rows).into_dyn());
            }
            if self.bias.requires_grad() {
                self.bias
                    .accumulate_grad(grad_rows.sum_axis(Axis(0)).into_dyn());
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x.clone(), self.weight.clone(), self.bias.clone()]
    }
}

/// Batched Gram matrix of an (N, C, H, W) feature map
///
/// Each sample is flattened to F ∈ (C, H·W) and G = F·Fᵗ, giving (N, C, C).
/// With `normalize` every entry is divided by H·W·C.
pub fn gram(features: &Tensor, normalize: bool) -> Result<Tensor> {
    let (n, c, h, w) = features.image_dims("gram features")?;
    let hw = h * w;
    if normalize && hw * c == 0 {
        return Err(Error::InvalidParameter(format!(
            "cannot normalize the Gram matrix of an empty feature map ({c} channels, {h}x{w})"
        )));
    }
    let norm = if normalize { (hw * c) as f32 } else { 1.0 };

    let mut flattened = Vec::with_capacity(n);
    let mut out = Array3::<f32>::zeros((n, c, c));
    for (i, sample) in features.data().axis_iter(Axis(0)).enumerate() {
        let f = sample.to_shape((c, hw))?.into_owned();
        out.index_axis_mut(Axis(0), i)
            .assign(&(f.dot(&f.t()) / norm));
        flattened.push(f);
    }

    let requires_grad = features.requires_grad();
    let mut result = Tensor::new(out.into_dyn(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(GramBackward {
            features: features.clone(),
            flattened,
            norm,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

struct GramBackward {
    features: Tensor,
    flattened: Vec<Array2<f32>>,
    norm: f32,
    result_grad: GradCell,
}

impl BackwardOp for GramBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.features.requires_grad() {
                let (n, c, h, w) = self.features.image_dims("gram features")?;
                let grad_gram = grad.view().into_dimensionality::<Ix3>()?;
                let mut grad_features = Array4::<f32>::zeros((n, c, h, w));

                // ∂L/∂F = (∂L/∂G + ∂L/∂Gᵗ) @ F / norm
                for (i, f) in self.flattened.iter().enumerate() {
                    let g = grad_gram.index_axis(Axis(0), i);
                    let symmetric = &g + &g.t();
                    let grad_f = (symmetric.dot(f) / self.norm).into_shape_with_order((c, h, w))?;
                    grad_features.index_axis_mut(Axis(0), i).assign(&grad_f);
                }
                self.features.accumulate_grad(grad_features.into_dyn());
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.features.clone()]
    }
}

/// Sum of squared differences between neighbouring pixels
///
/// Works on whole shifted views of the (N, C, H, W) input: horizontal
/// neighbours along W plus vertical neighbours along H.
pub fn total_variation(img: &Tensor) -> Result<Tensor> {
    img.image_dims("total variation input")?;
    let x = img.data();
    let diff_w = neighbour_diff(x, Axis(3));
    let diff_h = neighbour_diff(x, Axis(2));
    let value = [&diff_w, &diff_h]
        .into_iter()
        .flatten()
        .map(|d| d.mapv(|v| v * v).sum())
        .sum::<f32>();

    let requires_grad = img.requires_grad();
    let mut result = Tensor::new(ArrayD::from_elem(IxDyn(&[]), value), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(TotalVariationBackward {
            img: img.clone(),
            diff_w,
            diff_h,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    Ok(result)
}

/// x[j+1] - x[j] along `axis`, or `None` when the axis is empty
fn neighbour_diff(x: &ArrayD<f32>, axis: Axis) -> Option<ArrayD<f32>> {
    if x.len_of(axis) == 0 {
        return None;
    }
    let head = x.slice_axis(axis, Slice::new(0, Some(-1), 1));
    let tail = x.slice_axis(axis, Slice::new(1, None, 1));
    Some(&tail - &head)
}

struct TotalVariationBackward {
    img: Tensor,
    diff_w: Option<ArrayD<f32>>,
    diff_h: Option<ArrayD<f32>>,
    result_grad: GradCell,
}

impl BackwardOp for TotalVariationBackward {
    fn backward(&self) -> Result<()> {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.img.requires_grad() {
                let head = Slice::new(0, Some(-1), 1);
                let tail = Slice::new(1, None, 1);
                let two_g = 2.0 * grad.sum();

                // d = x[j+1] - x[j] contributes +2d to x[j+1] and -2d to x[j]
                let mut grad_img = ArrayD::<f32>::zeros(self.img.data().raw_dim());
                for (axis, diff) in [(Axis(3), &self.diff_w), (Axis(2), &self.diff_h)] {
                    let Some(diff) = diff else {
                        continue;
                    };
                    grad_img.slice_axis_mut(axis, tail).scaled_add(two_g, diff);
                    grad_img.slice_axis_mut(axis, head).scaled_add(-two_g, diff);
                }
                self.img.accumulate_grad(grad_img);
            }
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.img.clone()]
    }
}
