//! Burn modules for FCN-8s road segmentation.
//!
//! - `Vgg16`: pretrained encoder exposing pool3, pool4 and fc7 feature maps.
//! - `FcnDecoder`: skip-fusion decoder producing per-pixel class scores.
//! - `bilinear_weights`: fixed kernels used to seed the decoder's upsampling.
//!
//! These are plain Burn modules; loss, optimisation and data handling live in
//! the `training` and `road_dataset` crates.

pub mod bilinear;
pub mod decoder;
pub mod fcn;
pub mod vgg;

pub use bilinear::{bilinear_centre, bilinear_weights, BilinearKernel};
pub use decoder::{
    same_transpose_padding, transpose_output_size, FcnDecoder, FcnDecoderConfig, UpsampleInit,
    DECODER_SCALE, UPSAMPLE_STAGES,
};
pub use fcn::FcnVgg16;
pub use vgg::{
    load_vgg, vgg_record_path, BackboneError, Vgg16, Vgg16Config, VggFeatures, VGG_RECORD_FILE,
};

pub mod prelude {
    pub use super::{
        bilinear_weights, load_vgg, FcnDecoder, FcnDecoderConfig, FcnVgg16, UpsampleInit, Vgg16,
        Vgg16Config, VggFeatures,
    };
}
