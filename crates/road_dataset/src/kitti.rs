//! Indexing and sanity checks for the KITTI road training split.
//!
//! Layout under the training directory:
//! - `image_2/um_000000.png`
//! - `gt_image_2/um_road_000000.png` (road mask; `*_lane_*` masks are ignored)

use crate::types::{DatasetResult, DatasetSummary, RoadDatasetError, SamplePair};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const IMAGE_SUBDIR: &str = "image_2";
pub const LABEL_SUBDIR: &str = "gt_image_2";
const ROAD_MARKER: &str = "_road_";

fn list_pngs(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RoadDatasetError::MissingDir {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|source| RoadDatasetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RoadDatasetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Image file name a road mask belongs to (`um_road_000000.png` -> `um_000000.png`).
pub fn image_name_for_label(label_name: &str) -> Option<String> {
    label_name
        .contains(ROAD_MARKER)
        .then(|| label_name.replacen(ROAD_MARKER, "_", 1))
}

fn index_with_summary(training_dir: &Path) -> DatasetResult<(Vec<SamplePair>, DatasetSummary)> {
    let images = list_pngs(&training_dir.join(IMAGE_SUBDIR))?;
    let labels = list_pngs(&training_dir.join(LABEL_SUBDIR))?;

    let mut ignored_labels = 0usize;
    let mut road_labels: HashMap<String, PathBuf> = HashMap::new();
    for label in labels {
        let key = label
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(image_name_for_label);
        match key {
            Some(key) => {
                road_labels.insert(key, label);
            }
            None => ignored_labels += 1,
        }
    }

    if images.is_empty() {
        return Err(RoadDatasetError::Empty {
            path: training_dir.join(IMAGE_SUBDIR),
        });
    }

    let mut pairs = Vec::with_capacity(images.len());
    for image in images {
        let name = image
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let label = road_labels
            .remove(&name)
            .ok_or_else(|| RoadDatasetError::MissingLabel {
                image: image.clone(),
            })?;
        pairs.push(SamplePair { image, label });
    }
    if !road_labels.is_empty() {
        log::warn!(
            "{} road masks under {} have no matching image",
            road_labels.len(),
            training_dir.join(LABEL_SUBDIR).display()
        );
    }

    let summary = DatasetSummary {
        training_dir: training_dir.to_path_buf(),
        images: pairs.len(),
        road_labels: pairs.len(),
        ignored_labels,
    };
    log::debug!(
        "indexed {} image/road pairs under {} ({} non-road masks ignored)",
        summary.images,
        training_dir.display(),
        summary.ignored_labels
    );
    Ok((pairs, summary))
}

/// Pairs every training image with its road mask, sorted by image path.
pub fn index_kitti(training_dir: &Path) -> DatasetResult<Vec<SamplePair>> {
    index_with_summary(training_dir).map(|(pairs, _)| pairs)
}

/// Fails unless the training split is present and every image has a road mask.
pub fn check_kitti_dataset(training_dir: &Path) -> DatasetResult<DatasetSummary> {
    index_with_summary(training_dir).map(|(_, summary)| summary)
}
