use anyhow::Context;
use clap::{Parser, ValueEnum};
use models::{load_vgg, FcnDecoderConfig, FcnVgg16, Vgg16Config, DECODER_SCALE};
use road_dataset::{check_kitti_dataset, BatchSource, KittiBatches, ROAD_CLASSES};
use std::path::PathBuf;

use crate::loss::build_optimizer;
use crate::train::{train_nn, TrainReport, KEEP_PROB, LEARNING_RATE};
use crate::TrainBackend;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "train",
    about = "Train an FCN-8s road segmenter on a pretrained VGG16 backbone"
)]
pub struct TrainArgs {
    /// Data root containing `vgg/` and `data_road/training/`.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,
    /// Pretrained backbone directory (defaults to `<data_dir>/vgg`).
    #[arg(long)]
    pub vgg_dir: Option<PathBuf>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Number of epochs.
    #[arg(long, default_value_t = 20)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,
    /// Number of segmentation classes. KITTI road masks encode exactly 2
    /// (background and road).
    #[arg(long, default_value_t = 2)]
    pub num_classes: usize,
    /// Training image height (multiple of 32).
    #[arg(long, default_value_t = 160)]
    pub image_height: u32,
    /// Training image width (multiple of 32).
    #[arg(long, default_value_t = 576)]
    pub image_width: u32,
    /// Optional shuffle seed for deterministic batch order.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    pub fn vgg_dir(&self) -> PathBuf {
        self.vgg_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("vgg"))
    }

    pub fn training_dir(&self) -> PathBuf {
        self.data_dir.join("data_road").join("training")
    }

    pub fn image_shape(&self) -> (u32, u32) {
        (self.image_height, self.image_width)
    }
}

/// What the startup environment check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub gpu: bool,
}

/// Logs the compiled backend and warns when training will run without a GPU.
pub fn check_environment() -> EnvironmentReport {
    let gpu = cfg!(feature = "backend-wgpu");
    log::info!(
        "{} {} (burn backend: {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        if gpu { "wgpu" } else { "ndarray" }
    );
    if !gpu {
        log::warn!("No GPU found. Rebuild with --features backend-wgpu to train on a GPU.");
    }
    EnvironmentReport { gpu }
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            log::warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

pub fn validate_args(args: &TrainArgs) -> anyhow::Result<()> {
    let scale = DECODER_SCALE as u32;
    if args.image_height == 0
        || args.image_width == 0
        || args.image_height % scale != 0
        || args.image_width % scale != 0
    {
        anyhow::bail!(
            "image shape {}x{} must be a non-zero multiple of {scale}",
            args.image_height,
            args.image_width
        );
    }
    if args.batch_size == 0 {
        anyhow::bail!("batch size must be at least 1");
    }
    if args.num_classes != ROAD_CLASSES {
        anyhow::bail!(
            "KITTI road masks encode {ROAD_CLASSES} classes, got --num-classes {}",
            args.num_classes
        );
    }
    Ok(())
}

type ADBackend = burn::backend::Autodiff<TrainBackend>;

/// Checks the environment and artifacts, builds the network and trains it.
pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainReport> {
    validate_backend_choice(args.backend)?;
    validate_args(&args)?;
    check_environment();

    let training_dir = args.training_dir();
    let summary = check_kitti_dataset(&training_dir).with_context(|| {
        format!(
            "KITTI road data missing or incomplete at {}",
            training_dir.display()
        )
    })?;
    log::info!(
        "found {} training images under {}",
        summary.images,
        summary.training_dir.display()
    );

    let source = KittiBatches::new(&training_dir, args.image_shape(), args.seed)?;

    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let backbone_cfg = Vgg16Config {
        keep_prob: KEEP_PROB,
        ..Default::default()
    };
    let vgg_dir = args.vgg_dir();
    let backbone = load_vgg::<ADBackend>(&vgg_dir, backbone_cfg.clone(), &device)
        .with_context(|| format!("failed to load pretrained VGG16 from {}", vgg_dir.display()))?;
    let model = FcnVgg16::new(
        backbone,
        FcnDecoderConfig::for_backbone(&backbone_cfg, source.num_classes()),
        &device,
    );
    let mut optim = build_optimizer::<ADBackend, FcnVgg16<ADBackend>>();

    let (_model, report) = train_nn(
        model,
        &mut optim,
        &source,
        args.epochs,
        args.batch_size,
        LEARNING_RATE,
        &device,
    )?;
    log::info!(
        "training finished: {} epochs, {} steps, final loss {:.6}",
        report.epochs,
        report.steps,
        report.final_loss().unwrap_or(f32::NAN)
    );
    Ok(report)
}
