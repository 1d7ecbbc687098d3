//! # Netvis: Gradient-Based Network Visualization
//!
//! Netvis treats a frozen image classifier as a differentiable black box and
//! uses input gradients to explain and exploit it.
//!
//! ## Architecture
//!
//! - **autograd**: Tape-based automatic differentiation over `ndarray` tensors
//! - **model**: `Classifier` / `FeatureExtractor` traits and small frozen networks
//! - **visualize**: Saliency maps, fooling images, class visualization
//! - **style**: Content, Gram/style and total variation losses plus a style transfer loop
//! - **optim**: Adam and a step-decay learning rate schedule
//! - **config**: Declarative YAML/JSON run parameters
//!
//! ## Example
//!
//! ```
//! use netvis::model::LinearClassifier;
//! use netvis::visualize::FoolingSearch;
//! use netvis::Tensor;
//! use ndarray::{arr1, arr2};
//!
//! let model = LinearClassifier::new(
//!     arr2(&[[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]),
//!     arr1(&[1.0, 0.0]),
//! )?;
//! let image = Tensor::zeros(&[1, 1, 2, 2], false);
//!
//! let outcome = FoolingSearch::new(0.5, 10).run(&image, 1, &model)?;
//! assert!(outcome.fooled);
//! # Ok::<(), netvis::Error>(())
//! ```

pub mod autograd;
pub mod config;
pub mod model;
pub mod optim;
pub mod style;
pub mod visualize;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Context, Tensor};
pub use error::{Error, Result};
pub use style::{content_loss, gram_matrix, style_loss, tv_loss};
pub use visualize::{class_visualization_step, compute_saliency_maps, make_fooling_image};
