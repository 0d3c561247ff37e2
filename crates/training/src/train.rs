//! Epoch x batch training loop.

use anyhow::Context;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use models::{FcnVgg16, DECODER_SCALE};
use road_dataset::BatchSource;

use crate::loss::{optimize, scalar, Optimized};

/// Probability of keeping fc6/fc7 activations during training.
pub const KEEP_PROB: f64 = 0.8;

/// Fixed Adam learning rate.
pub const LEARNING_RATE: f64 = 1e-4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub epochs: usize,
    pub steps: usize,
    /// Loss of every gradient step, in order.
    pub losses: Vec<f32>,
}

impl TrainReport {
    pub fn final_loss(&self) -> Option<f32> {
        self.losses.last().copied()
    }

    pub fn mean_loss(&self) -> Option<f32> {
        if self.losses.is_empty() {
            None
        } else {
            Some(self.losses.iter().sum::<f32>() / self.losses.len() as f32)
        }
    }
}

/// One forward/backward/update step. Returns the updated model and the loss.
pub fn train_step<B, O>(
    model: FcnVgg16<B>,
    optim: &mut O,
    images: Tensor<B, 4>,
    labels: Tensor<B, 4>,
    num_classes: usize,
    learning_rate: f64,
) -> anyhow::Result<(FcnVgg16<B>, f32)>
where
    B: AutodiffBackend,
    O: Optimizer<FcnVgg16<B>, B>,
{
    let [_, _, height, width] = images.dims();
    if height % DECODER_SCALE != 0 || width % DECODER_SCALE != 0 {
        anyhow::bail!("image size {height}x{width} is not a multiple of {DECODER_SCALE}");
    }

    let output = model.forward(images);
    let Optimized { loss, .. } = optimize(output, labels, num_classes)?;
    let loss_value = scalar(loss.clone().detach());
    let grads = GradientsParams::from_grads(loss.backward(), &model);
    let model = optim.step(learning_rate, model, grads);
    Ok((model, loss_value))
}

/// Trains for `epochs` full passes over `source`, one gradient step per batch.
///
/// Any failure (unreadable batch, shape mismatch) aborts training.
pub fn train_nn<B, S, O>(
    mut model: FcnVgg16<B>,
    optim: &mut O,
    source: &S,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    device: &B::Device,
) -> anyhow::Result<(FcnVgg16<B>, TrainReport)>
where
    B: AutodiffBackend,
    S: BatchSource + ?Sized,
    O: Optimizer<FcnVgg16<B>, B>,
{
    let num_classes = source.num_classes();
    let mut report = TrainReport {
        epochs,
        ..Default::default()
    };

    for epoch in 0..epochs {
        for batch in source.batches(batch_size) {
            let batch = batch.with_context(|| {
                format!("failed to load batch {} of epoch {}", report.steps + 1, epoch + 1)
            })?;
            let (images, labels) = batch.to_tensors::<B>(device);
            let (next, loss) =
                train_step(model, optim, images, labels, num_classes, learning_rate)?;
            model = next;

            report.steps += 1;
            report.losses.push(loss);
            log::info!(
                "epoch {} of {}; step {}; loss {:.6}",
                epoch + 1,
                epochs,
                report.steps,
                loss
            );
        }
    }

    Ok((model, report))
}
