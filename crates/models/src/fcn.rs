//! Encoder + decoder assembled into a single trainable module.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::decoder::{FcnDecoder, FcnDecoderConfig};
use crate::vgg::Vgg16;

#[derive(Module, Debug)]
pub struct FcnVgg16<B: Backend> {
    pub backbone: Vgg16<B>,
    pub decoder: FcnDecoder<B>,
}

impl<B: Backend> FcnVgg16<B> {
    /// Attaches a freshly initialised decoder to a (usually pretrained) backbone.
    pub fn new(backbone: Vgg16<B>, decoder: FcnDecoderConfig, device: &B::Device) -> Self {
        Self {
            backbone,
            decoder: FcnDecoder::new(decoder, device),
        }
    }

    /// Raw per-pixel class scores `[B, num_classes, H, W]` for images `[B, 3, H, W]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.decoder.forward(self.backbone.forward(images))
    }

    pub fn keep_prob(&self) -> f64 {
        self.backbone.keep_prob()
    }
}
