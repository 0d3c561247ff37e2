//! FCN-8s decoder: 1x1 score layers, transposed-conv upsampling, additive skips.
//!
//! Every transposed convolution maps a spatial extent `n` to exactly
//! `n * stride`. Skip tensors are added as-is; no cropping is applied.

use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::bilinear::bilinear_weights;
use crate::vgg::{Vgg16Config, VggFeatures};

/// `(kernel, stride)` of the three upsampling stages, deepest first.
pub const UPSAMPLE_STAGES: [(usize, usize); 3] = [(4, 2), (4, 2), (16, 8)];

/// Total upsampling factor of the decoder.
pub const DECODER_SCALE: usize = 32;

/// How transposed-convolution weights are seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsampleInit {
    /// Bilinear interpolation kernel on the channel diagonal, zero bias.
    #[default]
    Bilinear,
    /// Burn's default initializer.
    Random,
}

#[derive(Debug, Clone)]
pub struct FcnDecoderConfig {
    pub num_classes: usize,
    pub layer3_channels: usize,
    pub layer4_channels: usize,
    pub layer7_channels: usize,
    pub upsample_init: UpsampleInit,
}

impl FcnDecoderConfig {
    pub fn for_backbone(backbone: &Vgg16Config, num_classes: usize) -> Self {
        Self {
            num_classes,
            layer3_channels: backbone.layer3_channels(),
            layer4_channels: backbone.layer4_channels(),
            layer7_channels: backbone.layer7_channels(),
            upsample_init: UpsampleInit::default(),
        }
    }
}

/// Symmetric padding and output padding that make a transposed convolution
/// produce exactly `input * stride` samples.
pub fn same_transpose_padding(kernel: usize, stride: usize) -> (usize, usize) {
    if kernel >= stride {
        let excess = kernel - stride;
        let padding = excess.div_ceil(2);
        (padding, 2 * padding - excess)
    } else {
        (0, stride - kernel)
    }
}

/// Output extent of a transposed convolution (dilation 1). Empty input maps
/// to empty output.
pub fn transpose_output_size(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    padding_out: usize,
) -> usize {
    if input == 0 {
        return 0;
    }
    ((input - 1) * stride + kernel + padding_out).saturating_sub(2 * padding)
}

fn score_layer<B: Backend>(
    in_channels: usize,
    num_classes: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, num_classes], [1, 1])
        .with_stride([1, 1])
        .with_padding(PaddingConfig2d::Valid)
        .init(device)
}

fn upsample_layer<B: Backend>(
    channels: usize,
    kernel: usize,
    stride: usize,
    init: UpsampleInit,
    device: &B::Device,
) -> ConvTranspose2d<B> {
    let (padding, padding_out) = same_transpose_padding(kernel, stride);
    let mut layer = ConvTranspose2dConfig::new([channels, channels], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding([padding, padding])
        .with_padding_out([padding_out, padding_out])
        .init(device);

    if init == UpsampleInit::Bilinear {
        let kernel = bilinear_weights([kernel, kernel, channels, channels], stride);
        layer.weight =
            Param::from_tensor(Tensor::from_data(kernel.to_conv_transpose_data(), device));
        if layer.bias.is_some() {
            layer.bias = Some(Param::from_tensor(Tensor::zeros([channels], device)));
        }
    }
    layer
}

#[derive(Module, Debug)]
pub struct FcnDecoder<B: Backend> {
    score7: Conv2d<B>,
    score4: Conv2d<B>,
    score3: Conv2d<B>,
    upsample7: ConvTranspose2d<B>,
    upsample47: ConvTranspose2d<B>,
    upsample347: ConvTranspose2d<B>,
}

impl<B: Backend> FcnDecoder<B> {
    pub fn new(cfg: FcnDecoderConfig, device: &B::Device) -> Self {
        let n = cfg.num_classes;
        let [(k1, s1), (k2, s2), (k3, s3)] = UPSAMPLE_STAGES;
        Self {
            score7: score_layer(cfg.layer7_channels, n, device),
            score4: score_layer(cfg.layer4_channels, n, device),
            score3: score_layer(cfg.layer3_channels, n, device),
            upsample7: upsample_layer(n, k1, s1, cfg.upsample_init, device),
            upsample47: upsample_layer(n, k2, s2, cfg.upsample_init, device),
            upsample347: upsample_layer(n, k3, s3, cfg.upsample_init, device),
        }
    }

    /// Raw class scores `[B, num_classes, 32 * h7, 32 * w7]`.
    pub fn forward(&self, features: VggFeatures<B>) -> Tensor<B, 4> {
        let VggFeatures {
            layer3_out,
            layer4_out,
            layer7_out,
        } = features;

        let x = self.upsample7.forward(self.score7.forward(layer7_out));
        let x = x + self.score4.forward(layer4_out);
        let x = self.upsample47.forward(x);
        let x = x + self.score3.forward(layer3_out);
        self.upsample347.forward(x)
    }

    /// Transposed-conv weights of the three stages, deepest first.
    pub fn upsample_weights(&self) -> [Tensor<B, 4>; 3] {
        [
            self.upsample7.weight.val(),
            self.upsample47.weight.val(),
            self.upsample347.weight.val(),
        ]
    }
}
