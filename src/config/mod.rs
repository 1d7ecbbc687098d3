//! Declarative YAML/JSON configuration
//!
//! Run parameters for the iterative routines can be kept in a file:
//!
//! ```yaml
//! fooling:
//!   learning_rate: 1.0
//!   max_iterations: 100
//!
//! class_visualization:
//!   num_iterations: 100
//!   learning_rate: 25
//!   l2_reg: 0.001
//!   max_jitter: 16
//!
//! style_transfer:
//!   content_layer: 3
//!   content_weight: 0.05
//!   style_layers: [1, 4, 6, 7]
//!   style_weights: [20000, 500, 12, 1]
//!   tv_weight: 0.05
//! ```

mod load;
mod schema;
mod validate;



pub use load::{load_config, parse_config, ConfigFormat};
pub use schema::{ClassVisualizationConfig, FoolingConfig, RunSpec, StyleTransferConfig};
pub use validate::{validate_config, ValidationError};
