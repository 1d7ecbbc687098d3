//! Neural style transfer
//!
//! The loss terms are plain functions over feature tensors; [`StyleTransfer`]
//! combines them into an optimization loop over a [`FeatureExtractor`].
//!
//! [`FeatureExtractor`]: crate::model::FeatureExtractor

mod loss;
mod transfer;

pub use loss::{content_loss, gram_matrix, style_loss, tv_loss};
pub use transfer::{StyleTransfer, StyleTransferOutcome};
