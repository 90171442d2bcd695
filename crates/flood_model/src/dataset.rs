//! Dataset and batching for Burn training.

use burn::prelude::*;

use crate::bundle::DatasetBundle;

/// A single labeled image in the flood dataset.
#[derive(Debug, Clone)]
pub struct FloodItem {
    /// Flat HWC pixel values in `[0, 1]`.
    pub pixels: Vec<f32>,
    /// Label: 0 for dry, 1 for flooded.
    pub label: u8,
}

/// In-memory dataset over the images of a bundle.
#[derive(Debug, Clone)]
pub struct FloodDataset {
    items: Vec<FloodItem>,
    img_size: usize,
}

impl FloodDataset {
    /// Creates a dataset from a loaded bundle.
    #[must_use]
    pub fn from_bundle(bundle: &DatasetBundle) -> Self {
        let items = (0..bundle.len())
            .filter_map(|i| {
                Some(FloodItem {
                    pixels: bundle.image(i)?.to_vec(),
                    label: *bundle.labels().get(i)?,
                })
            })
            .collect();

        Self {
            items,
            img_size: bundle.img_size(),
        }
    }

    /// Image resolution (side length) of the dataset.
    #[must_use]
    pub const fn img_size(&self) -> usize {
        self.img_size
    }
}

impl burn::data::dataset::Dataset<FloodItem> for FloodDataset {
    fn get(&self, index: usize) -> Option<FloodItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A batch of training data.
#[derive(Debug, Clone)]
pub struct FloodBatch<B: Backend> {
    /// Image tensor of shape `[batch_size, 3, img_size, img_size]`.
    pub images: Tensor<B, 4>,
    /// Label tensor of shape `[batch_size]`.
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for creating training batches.
#[derive(Debug, Clone)]
pub struct FloodBatcher<B: Backend> {
    img_size: usize,
    device: B::Device,
}

impl<B: Backend> FloodBatcher<B> {
    /// Creates a new batcher for the given resolution and device.
    #[must_use]
    pub const fn new(img_size: usize, device: B::Device) -> Self {
        Self { img_size, device }
    }

    /// Creates a batch from a vector of items.
    pub fn batch(&self, items: Vec<FloodItem>) -> FloodBatch<B> {
        let images = items
            .iter()
            .map(|item| {
                TensorData::new(item.pixels.clone(), [self.img_size, self.img_size, 3])
                    .convert::<B::FloatElem>()
            })
            .map(|data| Tensor::<B, 3>::from_data(data, &self.device))
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data(
                    [i64::from(item.label).elem::<B::IntElem>()],
                    &self.device,
                )
            })
            .collect();

        // [batch_size, channels, height, width]
        let images = Tensor::stack(images, 0).permute([0, 3, 1, 2]);
        let targets = Tensor::cat(targets, 0);

        FloodBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::data::dataset::Dataset;

    use super::*;

    type TestBackend = NdArray;

    const IMG_SIZE: usize = 8;

    fn item(value: f32, label: u8) -> FloodItem {
        FloodItem {
            pixels: vec![value; IMG_SIZE * IMG_SIZE * 3],
            label,
        }
    }

    #[test]
    fn dataset_from_bundle() {
        let mut bundle = DatasetBundle::new(IMG_SIZE);
        bundle
            .push(&vec![0.1; IMG_SIZE * IMG_SIZE * 3], 0)
            .expect("push");
        bundle
            .push(&vec![0.9; IMG_SIZE * IMG_SIZE * 3], 1)
            .expect("push");

        let dataset = FloodDataset::from_bundle(&bundle);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.img_size(), IMG_SIZE);
        assert_eq!(dataset.get(1).map(|i| i.label), Some(1));
        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn batcher_produces_channel_first_tensors() {
        let device = burn::backend::ndarray::NdArrayDevice::default();
        let batcher = FloodBatcher::<TestBackend>::new(IMG_SIZE, device);

        let batch = batcher.batch(vec![item(0.0, 0), item(1.0, 1)]);

        assert_eq!(batch.images.dims(), [2, 3, IMG_SIZE, IMG_SIZE]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets: Vec<i64> = batch.targets.into_data().to_vec().expect("targets");
        assert_eq!(targets, vec![0, 1]);
    }
}
