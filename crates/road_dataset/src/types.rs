//! Core types and error definitions for road_dataset.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, RoadDatasetError>;

#[derive(Debug, Error)]
pub enum RoadDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("required dataset directory missing: {path}")]
    MissingDir { path: PathBuf },
    #[error("no training images found under {path}")]
    Empty { path: PathBuf },
    #[error("no road ground truth for image {image}")]
    MissingLabel { image: PathBuf },
    #[error("batch shape mismatch: {msg}")]
    Shape { msg: String },
    #[error("{0}")]
    Other(String),
}

/// An image with its road ground-truth mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image: PathBuf,
    pub label: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSummary {
    pub training_dir: PathBuf,
    pub images: usize,
    pub road_labels: usize,
    /// Ground-truth files that are not road masks (e.g. lane masks).
    pub ignored_labels: usize,
}

/// Host-side batch of images and one-hot label maps.
///
/// Images are `[B, 3, H, W]` in `[0, 1]`; labels are `[B, C, H, W]` one-hot.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationBatch {
    images: Vec<f32>,
    labels: Vec<f32>,
    batch: usize,
    height: usize,
    width: usize,
    num_classes: usize,
}

impl SegmentationBatch {
    pub fn new(
        images: Vec<f32>,
        labels: Vec<f32>,
        batch: usize,
        height: usize,
        width: usize,
        num_classes: usize,
    ) -> DatasetResult<Self> {
        if batch == 0 {
            return Err(RoadDatasetError::Shape {
                msg: "empty batch".to_string(),
            });
        }
        let pixels = batch * height * width;
        if images.len() != pixels * 3 {
            return Err(RoadDatasetError::Shape {
                msg: format!(
                    "image buffer has {} values, expected {} for {batch}x3x{height}x{width}",
                    images.len(),
                    pixels * 3
                ),
            });
        }
        if labels.len() != pixels * num_classes {
            return Err(RoadDatasetError::Shape {
                msg: format!(
                    "label buffer has {} values, expected {} for {batch}x{num_classes}x{height}x{width}",
                    labels.len(),
                    pixels * num_classes
                ),
            });
        }
        Ok(Self {
            images,
            labels,
            batch,
            height,
            width,
            num_classes,
        })
    }

    pub fn len(&self) -> usize {
        self.batch
    }

    pub fn is_empty(&self) -> bool {
        self.batch == 0
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn image_dims(&self) -> [usize; 4] {
        [self.batch, 3, self.height, self.width]
    }

    pub fn label_dims(&self) -> [usize; 4] {
        [self.batch, self.num_classes, self.height, self.width]
    }

    pub fn images(&self) -> &[f32] {
        &self.images
    }

    pub fn labels(&self) -> &[f32] {
        &self.labels
    }

    /// Uploads the batch as `(images, labels)` tensors.
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(self.images.clone(), self.image_dims()),
            device,
        );
        let labels = Tensor::<B, 4>::from_data(
            TensorData::new(self.labels.clone(), self.label_dims()),
            device,
        );
        (images, labels)
    }
}
