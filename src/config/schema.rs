//! YAML/JSON schema definitions for visualization runs

use serde::{Deserialize, Serialize};

/// Complete run specification
///
/// Every section is optional in the file; missing sections take their
/// defaults, except style transfer which is only present when configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Fooling image search parameters
    #[serde(default)]
    pub fooling: FoolingConfig,

    /// Class visualization driver parameters
    #[serde(default)]
    pub class_visualization: ClassVisualizationConfig,

    /// Optional style transfer configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_transfer: Option<StyleTransferConfig>,
}

/// Normalized gradient ascent toward a target class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoolingConfig {
    /// Step length applied to the L2-normalized gradient
    #[serde(default = "default_fooling_lr")]
    pub learning_rate: f32,

    /// Maximum number of ascent updates
    #[serde(default = "default_fooling_iterations")]
    pub max_iterations: usize,
}

impl Default for FoolingConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_fooling_lr(),
            max_iterations: default_fooling_iterations(),
        }
    }
}

/// Repeated regularized ascent with jitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassVisualizationConfig {
    /// Number of ascent steps
    #[serde(default = "default_class_iterations")]
    pub num_iterations: usize,

    /// Step size of each ascent update
    #[serde(default = "default_class_lr")]
    pub learning_rate: f32,

    /// Strength of the L2 penalty on pixel values
    #[serde(default = "default_l2_reg")]
    pub l2_reg: f32,

    /// Largest random roll (in pixels) applied before each step
    #[serde(default = "default_max_jitter")]
    pub max_jitter: usize,

    /// Optional `[low, high]` pixel range enforced after each step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clamp: Option<[f32; 2]>,

    /// Seed for the jitter offsets
    #[serde(default)]
    pub seed: u64,
}

impl Default for ClassVisualizationConfig {
    fn default() -> Self {
        Self {
            num_iterations: default_class_iterations(),
            learning_rate: default_class_lr(),
            l2_reg: default_l2_reg(),
            max_jitter: default_max_jitter(),
            clamp: None,
            seed: 0,
        }
    }
}

/// Style transfer objective and optimisation schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleTransferConfig {
    /// Feature layer compared against the content image
    pub content_layer: usize,

    /// Weight of the content loss
    pub content_weight: f32,

    /// Feature layers compared against the style image's Gram matrices
    pub style_layers: Vec<usize>,

    /// One weight per style layer
    pub style_weights: Vec<f32>,

    /// Weight of the total variation loss
    pub tv_weight: f32,

    /// Number of Adam steps on the image
    #[serde(default = "default_style_iterations")]
    pub num_iterations: usize,

    /// Learning rate before decay
    #[serde(default = "default_initial_lr")]
    pub initial_lr: f32,

    /// Learning rate after decay
    #[serde(default = "default_decayed_lr")]
    pub decayed_lr: f32,

    /// Iteration at which the learning rate switches to `decayed_lr`
    #[serde(default = "default_decay_lr_at")]
    pub decay_lr_at: usize,

    /// Pixels are clamped to `[-pixel_clamp, pixel_clamp]` early on
    #[serde(default = "default_pixel_clamp")]
    pub pixel_clamp: f32,

    /// Clamping is applied for iterations `< clamp_until`
    #[serde(default = "default_clamp_until")]
    pub clamp_until: usize,

    /// Start from uniform noise instead of the content image
    #[serde(default)]
    pub init_random: bool,

    /// Seed for the noise initialisation
    #[serde(default)]
    pub seed: u64,
}

impl StyleTransferConfig {
    /// Config with the default schedule for the given objective
    pub fn new(
        content_layer: usize,
        content_weight: f32,
        style_layers: Vec<usize>,
        style_weights: Vec<f32>,
        tv_weight: f32,
    ) -> Self {
        Self {
            content_layer,
            content_weight,
            style_layers,
            style_weights,
            tv_weight,
            num_iterations: default_style_iterations(),
            initial_lr: default_initial_lr(),
            decayed_lr: default_decayed_lr(),
            decay_lr_at: default_decay_lr_at(),
            pixel_clamp: default_pixel_clamp(),
            clamp_until: default_clamp_until(),
            init_random: false,
            seed: 0,
        }
    }
}

fn default_fooling_lr() -> f32 {
    1.0
}

fn default_fooling_iterations() -> usize {
    100
}

fn default_class_iterations() -> usize {
    100
}

fn default_class_lr() -> f32 {
    25.0
}

fn default_l2_reg() -> f32 {
    1e-3
}

fn default_max_jitter() -> usize {
    16
}

fn default_style_iterations() -> usize {
    200
}

fn default_initial_lr() -> f32 {
    3.0
}

fn default_decayed_lr() -> f32 {
    0.1
}

fn default_decay_lr_at() -> usize {
    180
}

fn default_pixel_clamp() -> f32 {
    1.5
}

fn default_clamp_until() -> usize {
    190
}
