//! VGG16 encoder with the three taps the FCN decoder fuses.
//!
//! Shapes (NCHW):
//! - Input images: `[B, 3, H, W]`
//! - `layer3_out`: `[B, C3, H/8, W/8]` (pool3)
//! - `layer4_out`: `[B, C4, H/16, W/16]` (pool4)
//! - `layer7_out`: `[B, FC, H/32, W/32]` (fc7, convolutionalised)

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, PaddingConfig2d};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the serialized backbone record inside the VGG directory.
pub const VGG_RECORD_FILE: &str = "vgg16.bin";

/// Number of 3x3 convolutions in each of the five VGG16 blocks.
const BLOCK_DEPTHS: [usize; 5] = [2, 2, 3, 3, 3];

#[derive(Debug, Error)]
pub enum BackboneError {
    #[error("pretrained backbone artifact missing: {path}")]
    MissingArtifact { path: PathBuf },
    #[error("failed to load backbone record {path}: {reason}")]
    Record { path: PathBuf, reason: String },
    #[error("invalid backbone config: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct Vgg16Config {
    pub in_channels: usize,
    /// Output channels of the five convolution blocks.
    pub block_channels: [usize; 5],
    /// Width of the convolutionalised fc6/fc7 layers.
    pub fc_channels: usize,
    /// Spatial size of the fc6 convolution. Must be odd for same padding.
    pub fc6_kernel: usize,
    /// Probability of keeping an activation in the fc6/fc7 dropout layers.
    pub keep_prob: f64,
}

impl Default for Vgg16Config {
    fn default() -> Self {
        Self {
            in_channels: 3,
            block_channels: [64, 128, 256, 512, 512],
            fc_channels: 4096,
            fc6_kernel: 7,
            keep_prob: 0.8,
        }
    }
}

impl Vgg16Config {
    pub fn validate(&self) -> Result<(), BackboneError> {
        if self.fc6_kernel % 2 == 0 {
            return Err(BackboneError::Config(format!(
                "fc6_kernel must be odd, got {}",
                self.fc6_kernel
            )));
        }
        if self.in_channels == 0 || self.fc_channels == 0 || self.block_channels.contains(&0) {
            return Err(BackboneError::Config("channel widths must be non-zero".into()));
        }
        Ok(())
    }

    pub fn layer3_channels(&self) -> usize {
        self.block_channels[2]
    }

    pub fn layer4_channels(&self) -> usize {
        self.block_channels[3]
    }

    pub fn layer7_channels(&self) -> usize {
        self.fc_channels
    }
}

/// Feature maps tapped from the encoder.
#[derive(Debug, Clone)]
pub struct VggFeatures<B: Backend> {
    pub layer3_out: Tensor<B, 4>,
    pub layer4_out: Tensor<B, 4>,
    pub layer7_out: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> VggBlock<B> {
    fn new(in_channels: usize, out_channels: usize, depth: usize, device: &B::Device) -> Self {
        let mut convs = Vec::with_capacity(depth);
        let mut channels = in_channels;
        for _ in 0..depth {
            convs.push(
                Conv2dConfig::new([channels, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device),
            );
            channels = out_channels;
        }
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self { convs, pool }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }
        self.pool.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct Vgg16<B: Backend> {
    block1: VggBlock<B>,
    block2: VggBlock<B>,
    block3: VggBlock<B>,
    block4: VggBlock<B>,
    block5: VggBlock<B>,
    fc6: Conv2d<B>,
    fc7: Conv2d<B>,
    dropout: Dropout,
    keep_prob: Ignored<f64>,
}

impl<B: Backend> Vgg16<B> {
    /// Builds a randomly initialised encoder. `cfg` is expected to pass
    /// [`Vgg16Config::validate`]; an even `fc6_kernel` panics in burn.
    pub fn new(cfg: Vgg16Config, device: &B::Device) -> Self {
        let [c1, c2, c3, c4, c5] = cfg.block_channels;
        let [d1, d2, d3, d4, d5] = BLOCK_DEPTHS;
        let block1 = VggBlock::new(cfg.in_channels, c1, d1, device);
        let block2 = VggBlock::new(c1, c2, d2, device);
        let block3 = VggBlock::new(c2, c3, d3, device);
        let block4 = VggBlock::new(c3, c4, d4, device);
        let block5 = VggBlock::new(c4, c5, d5, device);
        let fc6 = Conv2dConfig::new([c5, cfg.fc_channels], [cfg.fc6_kernel; 2])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let fc7 = Conv2dConfig::new([cfg.fc_channels, cfg.fc_channels], [1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let keep_prob = cfg.keep_prob.clamp(0.0, 1.0);
        Self {
            block1,
            block2,
            block3,
            block4,
            block5,
            fc6,
            fc7,
            dropout: DropoutConfig::new(1.0 - keep_prob).init(),
            keep_prob: Ignored(keep_prob),
        }
    }

    pub fn keep_prob(&self) -> f64 {
        self.keep_prob.0
    }

    /// Runs the encoder. Dropout is only active on autodiff backends.
    pub fn forward(&self, images: Tensor<B, 4>) -> VggFeatures<B> {
        let x = self.block2.forward(self.block1.forward(images));
        let layer3_out = self.block3.forward(x);
        let layer4_out = self.block4.forward(layer3_out.clone());
        let x = self.block5.forward(layer4_out.clone());
        let x = self.dropout.forward(relu(self.fc6.forward(x)));
        let layer7_out = self.dropout.forward(relu(self.fc7.forward(x)));

        VggFeatures {
            layer3_out,
            layer4_out,
            layer7_out,
        }
    }
}

/// Path of the backbone record inside `vgg_dir`.
pub fn vgg_record_path(vgg_dir: &Path) -> PathBuf {
    vgg_dir.join(VGG_RECORD_FILE)
}

/// Loads pretrained VGG16 weights from `vgg_dir`.
///
/// The directory must contain [`VGG_RECORD_FILE`], a full-precision
/// `BinFileRecorder` record whose layout matches `cfg`.
pub fn load_vgg<B: Backend>(
    vgg_dir: &Path,
    cfg: Vgg16Config,
    device: &B::Device,
) -> Result<Vgg16<B>, BackboneError> {
    cfg.validate()?;
    if !vgg_dir.is_dir() {
        return Err(BackboneError::MissingArtifact {
            path: vgg_dir.to_path_buf(),
        });
    }
    let record_path = vgg_record_path(vgg_dir);
    if !record_path.is_file() {
        return Err(BackboneError::MissingArtifact { path: record_path });
    }

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model = Vgg16::<B>::new(cfg, device)
        .load_file(record_path.clone(), &recorder, device)
        .map_err(|e| BackboneError::Record {
            path: record_path.clone(),
            reason: e.to_string(),
        })?;
    log::info!("loaded VGG16 backbone from {}", record_path.display());
    Ok(model)
}
