//! Class saliency maps

use crate::autograd::{backward, select_scores, Context};
use crate::error::{Error, Result};
use crate::model::Classifier;
use crate::Tensor;
use ndarray::{Array3, ArrayD, Axis, Ix3, IxDyn};

/// Compute a class saliency map for images `x` and labels `y`
///
/// The correct-class scores of the batch are backpropagated with an
/// all-ones weighting of length N, so each image receives the gradient of
/// its own score. The result is `max_c |∂score/∂x[n, c, h, w]|` with shape
/// (N, H, W).
///
/// # Example
///
/// ```
/// use netvis::model::LinearClassifier;
/// use netvis::visualize::compute_saliency_maps;
/// use netvis::Tensor;
/// use ndarray::{arr1, Array2};
///
/// let model = LinearClassifier::new(Array2::from_elem((2, 12), 0.5), arr1(&[0.0, 0.0])).unwrap();
/// let x = Tensor::zeros(&[1, 3, 2, 2], false);
///
/// let saliency = compute_saliency_maps(&x, &[1], &model).unwrap();
/// assert_eq!(saliency.shape(), &[1, 2, 2]);
/// ```
pub fn compute_saliency_maps<M: Classifier + ?Sized>(
    x: &Tensor,
    y: &[usize],
    model: &M,
) -> Result<Array3<f32>> {
    let (n, _, h, w) = x.image_dims("saliency images")?;
    if y.len() != n {
        return Err(Error::LengthMismatch {
            what: "saliency labels",
            expected: n,
            got: y.len(),
        });
    }

    let ctx = Context::inference();
    let images = Tensor::new(x.data().clone(), true);

    let scores = model.forward(&images, &ctx)?;
    let mut correct = select_scores(&scores, y)?;
    backward(&mut correct, Some(ArrayD::ones(IxDyn(&[n]))))?;

    let grad = images.grad().ok_or_else(|| {
        Error::BackwardFailed("classifier scores do not depend on the images".to_string())
    })?;

    let saliency = grad
        .mapv(f32::abs)
        .fold_axis(Axis(1), 0.0f32, |&max, &g| max.max(g))
        .into_dimensionality::<Ix3>()?;
    debug_assert_eq!(saliency.dim(), (n, h, w));

    tracing::debug!(batch = n, height = h, width = w, "computed saliency maps");
    Ok(saliency)
}
