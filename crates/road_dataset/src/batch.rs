//! Epoch-restartable batch iteration over KITTI road samples.

use crate::kitti::index_kitti;
use crate::types::{DatasetResult, RoadDatasetError, SamplePair, SegmentationBatch};
use image::imageops::{self, FilterType};
use image::Rgb;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::cell::Cell;
use std::path::Path;

/// Road vs. background.
pub const ROAD_CLASSES: usize = 2;

/// Ground-truth colour marking non-road pixels.
pub const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// A finite, lazily evaluated sequence of batches that can be replayed.
///
/// Each call to [`BatchSource::batches`] covers the data set once.
pub trait BatchSource {
    fn num_classes(&self) -> usize;

    fn batches(
        &self,
        batch_size: usize,
    ) -> Box<dyn Iterator<Item = DatasetResult<SegmentationBatch>> + '_>;
}

/// Batch source reading KITTI road images and masks from disk.
pub struct KittiBatches {
    pairs: Vec<SamplePair>,
    height: u32,
    width: u32,
    seed: Option<u64>,
    passes: Cell<u64>,
}

impl KittiBatches {
    /// Indexes `training_dir`; images are resized to `(height, width)`.
    pub fn new(
        training_dir: &Path,
        image_shape: (u32, u32),
        seed: Option<u64>,
    ) -> DatasetResult<Self> {
        let pairs = index_kitti(training_dir)?;
        Self::from_pairs(pairs, image_shape, seed)
    }

    pub fn from_pairs(
        pairs: Vec<SamplePair>,
        image_shape: (u32, u32),
        seed: Option<u64>,
    ) -> DatasetResult<Self> {
        let (height, width) = image_shape;
        if height == 0 || width == 0 {
            return Err(RoadDatasetError::Other(format!(
                "image shape must be non-zero, got {height}x{width}"
            )));
        }
        Ok(Self {
            pairs,
            height,
            width,
            seed,
            passes: Cell::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn shuffled(&self) -> Vec<SamplePair> {
        let pass = self.passes.get();
        self.passes.set(pass + 1);
        let mut rng = match self.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(pass)),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        let mut pairs = self.pairs.clone();
        pairs.shuffle(&mut rng);
        pairs
    }

    fn load_batch(&self, slice: &[SamplePair]) -> DatasetResult<SegmentationBatch> {
        let (height, width) = (self.height, self.width);
        let loaded = slice
            .par_iter()
            .map(|pair| load_pair(pair, height, width))
            .collect::<DatasetResult<Vec<_>>>()?;

        let pixels = pixel_count(height, width);
        let mut images = Vec::with_capacity(slice.len() * pixels * 3);
        let mut labels = Vec::with_capacity(slice.len() * pixels * ROAD_CLASSES);
        for (image, label) in loaded {
            images.extend_from_slice(&image);
            labels.extend_from_slice(&label);
        }
        SegmentationBatch::new(
            images,
            labels,
            slice.len(),
            height as usize,
            width as usize,
            ROAD_CLASSES,
        )
    }
}

impl BatchSource for KittiBatches {
    fn num_classes(&self) -> usize {
        ROAD_CLASSES
    }

    fn batches(
        &self,
        batch_size: usize,
    ) -> Box<dyn Iterator<Item = DatasetResult<SegmentationBatch>> + '_> {
        let order = self.shuffled();
        let batch_size = batch_size.max(1);
        let chunks: Vec<Vec<SamplePair>> = order.chunks(batch_size).map(<[_]>::to_vec).collect();
        Box::new(chunks.into_iter().map(move |chunk| self.load_batch(&chunk)))
    }
}

/// Loads one pair as CHW image values in `[0, 1]` and a one-hot `[2, H, W]` mask.
fn pixel_count(height: u32, width: u32) -> usize {
    height as usize * width as usize
}

pub fn load_pair(
    pair: &SamplePair,
    height: u32,
    width: u32,
) -> DatasetResult<(Vec<f32>, Vec<f32>)> {
    let image = image::open(&pair.image)
        .map_err(|source| RoadDatasetError::Image {
            path: pair.image.clone(),
            source,
        })?
        .to_rgb8();
    let label = image::open(&pair.label)
        .map_err(|source| RoadDatasetError::Image {
            path: pair.label.clone(),
            source,
        })?
        .to_rgb8();

    let image = imageops::resize(&image, width, height, FilterType::Triangle);
    // Nearest keeps mask colours exact.
    let label = imageops::resize(&label, width, height, FilterType::Nearest);

    let pixels = pixel_count(height, width);
    let mut image_chw = vec![0.0f32; pixels * 3];
    for (i, p) in image.pixels().enumerate() {
        for c in 0..3 {
            image_chw[c * pixels + i] = p[c] as f32 / 255.0;
        }
    }

    let mut label_chw = vec![0.0f32; pixels * ROAD_CLASSES];
    for (i, p) in label.pixels().enumerate() {
        if *p == BACKGROUND_COLOR {
            label_chw[i] = 1.0;
        } else {
            label_chw[pixels + i] = 1.0;
        }
    }
    Ok((image_chw, label_chw))
}
