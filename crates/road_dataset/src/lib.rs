//! KITTI road dataset loading and Burn-compatible batching.
//!
//! This crate provides:
//! - Indexing of image / road-mask pairs and an up-front artifact check
//! - One-hot label encoding of road masks
//! - A replayable `BatchSource` consumed once per training epoch

pub mod batch;
pub mod kitti;
pub mod types;

pub use batch::{load_pair, BatchSource, KittiBatches, BACKGROUND_COLOR, ROAD_CLASSES};
pub use kitti::{
    check_kitti_dataset, image_name_for_label, index_kitti, IMAGE_SUBDIR, LABEL_SUBDIR,
};
pub use types::*;
