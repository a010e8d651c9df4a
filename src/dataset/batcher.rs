//! Burn `Dataset` and `Batcher` implementations for waste images.
//!
//! Images are decoded and resized once up front (the corpus fits in memory
//! comfortably) and stored as flattened CHW float buffers; ImageNet mean/std
//! normalization is applied at batch-assembly time.

use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};

use crate::dataset::loader::ImageSample;
use crate::utils::error::{Result, WasteNetError};

/// ImageNet channel means, the conventional normalization statistics
pub const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
pub const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A decoded image ready for batching
#[derive(Clone, Debug)]
pub struct WasteItem {
    /// Flattened CHW float data in [0, 1], length `3 * size * size`
    pub image: Vec<f32>,
    /// Label index
    pub label: usize,
    /// Source path, kept for the per-sample prediction table
    pub path: String,
}

impl WasteItem {
    /// Decode an image file, resize to `size`×`size`, convert to CHW floats.
    pub fn from_path(path: &PathBuf, label: usize, size: usize) -> Result<Self> {
        let img = ImageReader::open(path)
            .map_err(|e| WasteNetError::ImageLoad(path.clone(), e.to_string()))?
            .decode()
            .map_err(|e| WasteNetError::ImageLoad(path.clone(), e.to_string()))?
            .resize_exact(size as u32, size as u32, FilterType::Triangle)
            .to_rgb8();

        let mut image = vec![0.0f32; 3 * size * size];
        for y in 0..size {
            for x in 0..size {
                let pixel = img.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    image[c * size * size + y * size + x] = pixel[c] as f32 / 255.0;
                }
            }
        }

        Ok(Self {
            image,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Build an item from already-decoded data (used by tests and TTA views)
    pub fn from_data(image: Vec<f32>, label: usize, path: String) -> Self {
        Self { image, label, path }
    }
}

/// In-memory dataset of decoded items
#[derive(Debug, Clone)]
pub struct WasteTensorDataset {
    items: Vec<WasteItem>,
    image_size: usize,
}

impl WasteTensorDataset {
    /// Decode every sample eagerly, with a progress bar on the console.
    pub fn load(samples: &[ImageSample], image_size: usize) -> Result<Self> {
        let bar = ProgressBar::new(samples.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .expect("valid progress template")
                .progress_chars("=> "),
        );
        bar.set_message("decoding images");

        let mut items = Vec::with_capacity(samples.len());
        for sample in samples {
            items.push(WasteItem::from_path(&sample.path, sample.label, image_size)?);
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(Self { items, image_size })
    }

    /// Build a dataset from pre-decoded items (synthetic data in tests)
    pub fn from_items(items: Vec<WasteItem>, image_size: usize) -> Self {
        Self { items, image_size }
    }

    /// Edge length of every item
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Highest label + 1
    pub fn num_classes(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.label)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0)
    }
}

impl Dataset<WasteItem> for WasteTensorDataset {
    fn get(&self, index: usize) -> Option<WasteItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of normalized images and integer targets
#[derive(Clone, Debug)]
pub struct WasteBatch<B: Backend> {
    /// Images with shape `[batch, 3, size, size]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch]`
    pub targets: Tensor<B, 1, Int>,
}

/// Assembles normalized batches from decoded items
#[derive(Clone, Debug)]
pub struct WasteBatcher {
    image_size: usize,
}

impl WasteBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, WasteItem, WasteBatch<B>> for WasteBatcher {
    fn batch(&self, items: Vec<WasteItem>, device: &B::Device) -> WasteBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let mean = Tensor::<B, 4>::from_floats(
            TensorData::new(NORM_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_floats(
            TensorData::new(NORM_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        WasteBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn item(label: usize, fill: f32, size: usize) -> WasteItem {
        WasteItem::from_data(vec![fill; 3 * size * size], label, format!("{}.jpg", label))
    }

    #[test]
    fn test_dataset_len_and_get() {
        let dataset = WasteTensorDataset::from_items(vec![item(0, 0.1, 8), item(1, 0.2, 8)], 8);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.num_classes(), 2);
        assert_eq!(dataset.get(1).unwrap().label, 1);
        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let batcher = WasteBatcher::new(8);
        let batch: WasteBatch<TestBackend> =
            batcher.batch(vec![item(0, 0.5, 8), item(1, 0.5, 8), item(2, 0.5, 8)], &device);

        assert_eq!(batch.images.dims(), [3, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [3]);
    }

    #[test]
    fn test_batch_normalization_applied() {
        let device = Default::default();
        let batcher = WasteBatcher::new(4);
        let batch: WasteBatch<TestBackend> = batcher.batch(vec![item(0, 0.485, 4)], &device);

        // Red channel filled with the red-channel mean normalizes to zero.
        let data: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        assert!(data[0].abs() < 1e-5);
    }
}
