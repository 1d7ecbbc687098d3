//! Style transfer optimization loop

use super::loss::{content_loss, gram_matrix, style_loss, tv_loss};
use crate::autograd::{add, backward, Context};
use crate::config::StyleTransferConfig;
use crate::error::{Error, Result};
use crate::model::FeatureExtractor;
use crate::optim::{Adam, LRScheduler, Optimizer, StepDecayLR};
use crate::Tensor;
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthesized image and the objective recorded at every iteration
#[derive(Debug, Clone)]
pub struct StyleTransferOutcome {
    pub image: Tensor,
    pub losses: Vec<f32>,
}

/// Optimizes an image to keep the content of one image and the style of another
#[derive(Debug, Clone)]
pub struct StyleTransfer {
    config: StyleTransferConfig,
}

fn layer_features<'a>(feats: &'a [Tensor], layer: usize) -> Result<&'a Tensor> {
    feats.get(layer).ok_or(Error::LayerOutOfRange {
        layer,
        available: feats.len(),
    })
}

impl StyleTransfer {
    /// Create a driver from a configuration section
    pub fn new(config: StyleTransferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StyleTransferConfig {
        &self.config
    }

    /// Run the optimization
    ///
    /// Targets are computed once from the content and style images and held
    /// fixed. The image starts as a copy of `content_image`, or as seeded
    /// uniform noise in `[0, 1)` when `init_random` is set.
    pub fn run<E: FeatureExtractor + ?Sized>(
        &self,
        extractor: &E,
        content_image: &Tensor,
        style_image: &Tensor,
    ) -> Result<StyleTransferOutcome> {
        let cfg = &self.config;
        content_image.image_dims("content image")?;
        style_image.image_dims("style image")?;

        let ctx = Context::inference();

        let content_feats = extractor.extract_features(&content_image.detach(), &ctx)?;
        let content_target = layer_features(&content_feats, cfg.content_layer)?.detach();

        let style_feats = extractor.extract_features(&style_image.detach(), &ctx)?;
        let style_targets = cfg
            .style_layers
            .iter()
            .map(|&layer| Ok(gram_matrix(layer_features(&style_feats, layer)?, true)?.detach()))
            .collect::<Result<Vec<_>>>()?;

        let init = if cfg.init_random {
            let mut rng = StdRng::seed_from_u64(cfg.seed);
            ArrayD::from_shape_fn(content_image.data().raw_dim(), |_| rng.random_range(0.0..1.0))
        } else {
            content_image.data().clone()
        };
        let mut params = vec![Tensor::new(init, true)];

        let mut optimizer = Adam::default_params(cfg.initial_lr);
        let mut scheduler = StepDecayLR::new(cfg.initial_lr, cfg.decayed_lr, cfg.decay_lr_at);
        let mut losses = Vec::with_capacity(cfg.num_iterations);

        for iteration in 0..cfg.num_iterations {
            if iteration < cfg.clamp_until {
                let bound = cfg.pixel_clamp;
                params[0]
                    .data_mut()
                    .mapv_inplace(|v| v.clamp(-bound, bound));
            }
            scheduler.apply(&mut optimizer);
            optimizer.zero_grad(&mut params);

            let feats = extractor.extract_features(&params[0], &ctx)?;
            let content = content_loss(
                cfg.content_weight,
                layer_features(&feats, cfg.content_layer)?,
                &content_target,
            )?;
            let style = style_loss(&feats, &cfg.style_layers, &style_targets, &cfg.style_weights)?;
            let tv = tv_loss(&params[0], cfg.tv_weight)?;

            let mut loss = add(&add(&content, &style)?, &tv)?;
            backward(&mut loss, None)?;
            optimizer.step(&mut params)?;
            scheduler.step();

            let value = loss.value().unwrap_or(f32::NAN);
            losses.push(value);
            tracing::debug!(
                iteration,
                loss = value,
                content = content.value(),
                style = style.value(),
                tv = tv.value(),
                lr = optimizer.lr(),
                "style transfer step"
            );
        }

        tracing::info!(
            iterations = cfg.num_iterations,
            final_loss = losses.last().copied(),
            "style transfer finished"
        );

        Ok(StyleTransferOutcome {
            image: params[0].detach(),
            losses,
        })
    }
}
