#![recursion_limit = "256"]

pub mod loss;
pub mod train;
pub mod util;

pub use loss::{build_optimizer, cross_entropy, flatten_pixels, optimize, scalar, Optimized};
pub use models::{FcnDecoderConfig, FcnVgg16, Vgg16, Vgg16Config};
pub use train::{train_nn, train_step, TrainReport, KEEP_PROB, LEARNING_RATE};
pub use util::{
    check_environment, run_train, validate_args, BackendKind, EnvironmentReport, TrainArgs,
};
/// Backend alias for training (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
