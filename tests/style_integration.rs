//! Integration tests for the style transfer losses and driver.

use approx::assert_abs_diff_eq;
use ndarray::{ArrayD, IxDyn};
use netvis::autograd::{add, backward, Context};
use netvis::config::{parse_config, ConfigFormat, StyleTransferConfig};
use netvis::model::{FeatureExtractor, PointwiseNet};
use netvis::style::{StyleTransfer, StyleTransferOutcome};
use netvis::{content_loss, gram_matrix, style_loss, tv_loss, Error, Tensor};

fn pattern(shape: &[usize], freq: f32) -> Tensor {
    Tensor::new(
        ArrayD::from_shape_fn(IxDyn(shape), |idx| {
            (freq * (idx[1] as f32 + 2.0 * idx[2] as f32 + 3.0 * idx[3] as f32)).sin()
        }),
        false,
    )
}

#[test]
fn test_combined_objective_backpropagates_to_image() {
    let net = PointwiseNet::random(&[3, 5, 4], 21).unwrap();
    let ctx = Context::inference();
    let content = pattern(&[1, 3, 4, 4], 0.4);
    let style = pattern(&[1, 3, 4, 4], 1.3);

    let content_target = net.extract_features(&content, &ctx).unwrap()[1].detach();
    let style_feats = net.extract_features(&style, &ctx).unwrap();
    let style_targets = vec![
        gram_matrix(&style_feats[0], true).unwrap().detach(),
        gram_matrix(&style_feats[1], true).unwrap().detach(),
    ];

    let img = Tensor::new(pattern(&[1, 3, 4, 4], 0.9).data().clone(), true);
    let feats = net.extract_features(&img, &ctx).unwrap();
    let c = content_loss(0.5, &feats[1], &content_target).unwrap();
    let s = style_loss(&feats, &[0, 1], &style_targets, &[10.0, 1.0]).unwrap();
    let t = tv_loss(&img, 0.1).unwrap();
    let mut total = add(&add(&c, &s).unwrap(), &t).unwrap();

    let expected = c.value().unwrap() + s.value().unwrap() + t.value().unwrap();
    assert_abs_diff_eq!(total.value().unwrap(), expected, epsilon = 1e-5);

    backward(&mut total, None).unwrap();
    let grad = img.grad().unwrap();
    assert_eq!(grad.shape(), img.shape());
    assert!(grad.iter().any(|g| g.abs() > 0.0));
}

#[test]
fn test_feature_map_shared_between_terms_gets_all_contributions() {
    let features = Tensor::new(pattern(&[1, 2, 2, 2], 0.7).data().clone(), true);
    let target_gram = Tensor::zeros(&[1, 2, 2], false);
    let target_content = Tensor::zeros(&[1, 2, 2, 2], false);

    let feats = [features.clone()];
    let mut total = add(
        &content_loss(1.0, &features, &target_content).unwrap(),
        &style_loss(&feats, &[0], std::slice::from_ref(&target_gram), &[1.0]).unwrap(),
    )
    .unwrap();
    backward(&mut total, None).unwrap();
    let combined = features.grad().unwrap();

    let separate = |build: &dyn Fn(&Tensor) -> Tensor| {
        let f = Tensor::new(features.data().clone(), true);
        let mut loss = build(&f);
        backward(&mut loss, None).unwrap();
        f.grad().unwrap()
    };
    let from_content = separate(&|f: &Tensor| content_loss(1.0, f, &target_content).unwrap());
    let from_style = separate(&|f: &Tensor| {
        style_loss(std::slice::from_ref(f), &[0], std::slice::from_ref(&target_gram), &[1.0])
            .unwrap()
    });

    for ((c, a), b) in combined.iter().zip(from_content.iter()).zip(from_style.iter()) {
        assert_abs_diff_eq!(*c, a + b, epsilon = 1e-5);
    }
}

#[test]
fn test_style_transfer_from_config_file_text() {
    let yaml = r#"
style_transfer:
  content_layer: 1
  content_weight: 0.5
  style_layers: [0, 1]
  style_weights: [50, 5]
  tv_weight: 0.01
  num_iterations: 20
  initial_lr: 0.05
  decayed_lr: 0.01
  decay_lr_at: 15
  clamp_until: 18
  init_random: true
  seed: 4
"#;
    let spec = parse_config(yaml, ConfigFormat::Yaml).unwrap();
    let config = spec.style_transfer.unwrap();
    let net = PointwiseNet::random(&[3, 4, 4], 9).unwrap();

    let StyleTransferOutcome { image, losses } = StyleTransfer::new(config)
        .unwrap()
        .run(&net, &pattern(&[1, 3, 4, 4], 0.4), &pattern(&[1, 3, 4, 4], 1.3))
        .unwrap();

    assert_eq!(losses.len(), 20);
    assert!(losses.iter().all(|l| l.is_finite() && *l >= 0.0));
    assert!(losses[19] < losses[0]);
    assert_eq!(image.shape(), &[1, 3, 4, 4]);
}

#[test]
fn test_style_transfer_rejects_non_image_inputs() {
    let net = PointwiseNet::random(&[3, 4], 0).unwrap();
    let config = StyleTransferConfig::new(0, 1.0, vec![0], vec![1.0], 0.0);

    let result = StyleTransfer::new(config)
        .unwrap()
        .run(&net, &Tensor::zeros(&[3, 4, 4], false), &pattern(&[1, 3, 4, 4], 1.0));
    assert!(matches!(result, Err(Error::RankMismatch { .. })));
}
