//! Gradient-based visualizations of a frozen classifier
//!
//! - [`compute_saliency_maps`]: per-pixel importance of the correct class score
//! - [`FoolingSearch`]: perturb an image until it is classified as a chosen class
//! - [`class_visualization_step`] and [`ClassVisualizer`]: synthesize an image
//!   that maximizes a class score

mod class_visualization;
mod fooling;
mod saliency;

pub use class_visualization::{class_visualization_step, ClassVisualizer};
pub use fooling::{make_fooling_image, FoolingOutcome, FoolingSearch};
pub use saliency::compute_saliency_maps;
