use burn::backend::ndarray::NdArray;
use image::{Rgb, RgbImage};
use road_dataset::{
    check_kitti_dataset, BatchSource, KittiBatches, RoadDatasetError, IMAGE_SUBDIR, LABEL_SUBDIR,
    ROAD_CLASSES,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const ROAD: Rgb<u8> = Rgb([255, 0, 255]);
const BACKGROUND: Rgb<u8> = Rgb([255, 0, 0]);

/// Writes `count` synthetic 8x4 frames whose masks mark the left half as background.
fn synthetic_split(root: &Path, count: usize) -> anyhow::Result<()> {
    let images = root.join(IMAGE_SUBDIR);
    let labels = root.join(LABEL_SUBDIR);
    fs::create_dir_all(&images)?;
    fs::create_dir_all(&labels)?;
    for i in 0..count {
        let shade = (i * 40) as u8;
        RgbImage::from_pixel(8, 4, Rgb([shade, 128, 255]))
            .save(images.join(format!("um_{i:06}.png")))?;
        let mask = RgbImage::from_fn(8, 4, |x, _| if x < 4 { BACKGROUND } else { ROAD });
        mask.save(labels.join(format!("um_road_{i:06}.png")))?;
        // Lane masks share the directory and must be skipped.
        mask.save(labels.join(format!("um_lane_{i:06}.png")))?;
    }
    Ok(())
}

#[test]
fn check_reports_pairs_and_ignored_masks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_split(tmp.path(), 3)?;
    let summary = check_kitti_dataset(tmp.path())?;
    assert_eq!(summary.images, 3);
    assert_eq!(summary.road_labels, 3);
    assert_eq!(summary.ignored_labels, 3);
    Ok(())
}

#[test]
fn check_fails_without_training_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let err = check_kitti_dataset(tmp.path()).unwrap_err();
    assert!(matches!(err, RoadDatasetError::MissingDir { .. }));
}

#[test]
fn check_fails_on_empty_split() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join(IMAGE_SUBDIR)).unwrap();
    fs::create_dir_all(tmp.path().join(LABEL_SUBDIR)).unwrap();
    let err = check_kitti_dataset(tmp.path()).unwrap_err();
    assert!(matches!(err, RoadDatasetError::Empty { .. }));
}

#[test]
fn check_fails_when_mask_missing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_split(tmp.path(), 2)?;
    fs::remove_file(tmp.path().join(LABEL_SUBDIR).join("um_road_000001.png"))?;
    let err = check_kitti_dataset(tmp.path()).unwrap_err();
    match err {
        RoadDatasetError::MissingLabel { image } => {
            assert!(image.ends_with("um_000001.png"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn batches_encode_one_hot_masks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_split(tmp.path(), 1)?;
    let source = KittiBatches::new(tmp.path(), (4, 8), Some(7))?;
    let batches: Vec<_> = source.batches(4).collect::<Result<_, _>>()?;
    assert_eq!(batches.len(), 1);

    let batch = &batches[0];
    assert_eq!(batch.image_dims(), [1, 3, 4, 8]);
    assert_eq!(batch.label_dims(), [1, ROAD_CLASSES, 4, 8]);

    let pixels = 4 * 8;
    let labels = batch.labels();
    for y in 0..4 {
        for x in 0..8 {
            let i = y * 8 + x;
            let (bg, road) = (labels[i], labels[pixels + i]);
            assert_eq!(bg + road, 1.0);
            assert_eq!(road, if x < 4 { 0.0 } else { 1.0 });
        }
    }
    // Blue channel is saturated in every synthetic frame.
    assert!(batch.images()[2 * pixels..].iter().all(|v| (*v - 1.0).abs() < 1e-6));
    Ok(())
}

#[test]
fn every_pass_covers_the_split_once() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_split(tmp.path(), 5)?;
    let source = KittiBatches::new(tmp.path(), (4, 8), Some(1))?;
    assert_eq!(source.len(), 5);

    for _epoch in 0..2 {
        let mut sizes = Vec::new();
        let mut reds = HashSet::new();
        for batch in source.batches(2) {
            let batch = batch?;
            sizes.push(batch.len());
            let per_image = 3 * 4 * 8;
            for b in 0..batch.len() {
                let red = batch.images()[b * per_image];
                reds.insert((red * 255.0).round() as u32);
            }
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(reds.len(), 5);
    }
    Ok(())
}

#[test]
fn batches_resize_and_upload() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    synthetic_split(tmp.path(), 2)?;
    let source = KittiBatches::new(tmp.path(), (8, 16), None)?;
    let batch = source.batches(2).next().expect("one batch")?;
    let device = Default::default();
    let (images, labels) = batch.to_tensors::<NdArray<f32>>(&device);
    assert_eq!(images.dims(), [2, 3, 8, 16]);
    assert_eq!(labels.dims(), [2, 2, 8, 16]);
    let total: f32 = labels.sum().into_data().to_vec::<f32>().unwrap()[0];
    assert_eq!(total, (2 * 8 * 16) as f32);
    Ok(())
}
