//! Pixel-wise softmax cross-entropy and the Adam optimizer used for training.

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, Optimizer};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

/// Adam epsilon matching the classic `1e-8` default.
pub const ADAM_EPSILON: f32 = 1e-8;

/// Flattened logits/labels and the scalar loss built from a class score map.
#[derive(Debug, Clone)]
pub struct Optimized<B: Backend> {
    /// `[pixels, num_classes]`, pixel order `(batch, y, x)`.
    pub logits: Tensor<B, 2>,
    pub labels: Tensor<B, 2>,
    /// Mean cross-entropy over all pixels, shape `[1]`.
    pub loss: Tensor<B, 1>,
}

/// `[B, C, H, W]` -> `[B * H * W, C]`, one row per pixel.
pub fn flatten_pixels<B: Backend>(map: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, classes, height, width] = map.dims();
    map.permute([0, 2, 3, 1])
        .reshape([batch * height * width, classes])
}

/// Mean softmax cross-entropy between raw `logits` and one-hot (or soft) `labels`.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (labels * log_probs).sum_dim(1).neg().mean()
}

/// Flattens the decoder output and label map and builds the training loss.
pub fn optimize<B: Backend>(
    output: Tensor<B, 4>,
    labels: Tensor<B, 4>,
    num_classes: usize,
) -> anyhow::Result<Optimized<B>> {
    let out_dims = output.dims();
    let label_dims = labels.dims();
    if out_dims[1] != num_classes {
        anyhow::bail!(
            "decoder produced {} class channels, expected {num_classes}",
            out_dims[1]
        );
    }
    if out_dims != label_dims {
        anyhow::bail!("label map {label_dims:?} does not match class score map {out_dims:?}");
    }

    let logits = flatten_pixels(output);
    let labels = flatten_pixels(labels);
    let loss = cross_entropy(logits.clone(), labels.clone());
    Ok(Optimized {
        logits,
        labels,
        loss,
    })
}

/// Adam with no weight decay, clipping or class weighting.
pub fn build_optimizer<B, M>() -> impl Optimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    AdamConfig::new().with_epsilon(ADAM_EPSILON).init()
}

/// Reads a single-element tensor back to the host.
pub fn scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f32 {
    tensor
        .into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(f32::NAN)
}
