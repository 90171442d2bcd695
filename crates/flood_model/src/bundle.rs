//! On-disk dataset bundle handed from the dataset builder to the trainer.
//!
//! The bundle is a single binary file: a small header, one label byte per
//! image, then the raw `f32` pixel block. Reading validates the header and
//! the exact payload size so truncated or foreign files fail loudly
//! instead of producing garbage tensors.

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use bytemuck::{cast_slice, try_cast_vec};
use tracing::debug;

/// File magic identifying a dataset bundle.
const MAGIC: [u8; 4] = *b"FLDB";

/// Current bundle format version.
const VERSION: u32 = 1;

/// Header size in bytes: magic + version + count + img_size.
const HEADER_LEN: usize = 16;

/// An ordered, index-aligned collection of normalized images and labels.
///
/// Labels are `0` for "dry" (`seca`) and `1` for "flooded" (`alagada`).
/// Images are flat `img_size * img_size * 3` HWC vectors with values in
/// `[0, 1]`, stored back to back in traversal order.
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    img_size: usize,
    images: Vec<f32>,
    labels: Vec<u8>,
}

impl DatasetBundle {
    /// Creates an empty bundle for the given image resolution.
    #[must_use]
    pub const fn new(img_size: usize) -> Self {
        Self {
            img_size,
            images: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Number of `f32` values per stored image.
    #[must_use]
    pub const fn pixels_per_image(&self) -> usize {
        self.img_size * self.img_size * 3
    }

    /// Appends one preprocessed image with its label.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel count does not match the bundle
    /// resolution or the label is not binary.
    pub fn push(&mut self, pixels: &[f32], label: u8) -> anyhow::Result<()> {
        if pixels.len() != self.pixels_per_image() {
            anyhow::bail!(
                "Image has {} values, expected {} for {}x{}x3",
                pixels.len(),
                self.pixels_per_image(),
                self.img_size,
                self.img_size
            );
        }
        if label > 1 {
            anyhow::bail!("Label must be 0 (seca) or 1 (alagada), got {label}");
        }

        self.images.extend_from_slice(pixels);
        self.labels.push(label);
        Ok(())
    }

    /// Number of images in the bundle.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the bundle holds no images.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Image resolution (side length) of the bundle.
    #[must_use]
    pub const fn img_size(&self) -> usize {
        self.img_size
    }

    /// Pixel data of the image at `index`, if present.
    #[must_use]
    pub fn image(&self, index: usize) -> Option<&[f32]> {
        let ppi = self.pixels_per_image();
        self.images.get(index * ppi..(index + 1) * ppi)
    }

    /// All labels, in traversal order.
    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Counts of (dry, flooded) labels.
    #[must_use]
    pub fn label_counts(&self) -> (usize, usize) {
        let flooded = self.labels.iter().filter(|&&l| l == 1).count();
        (self.labels.len() - flooded, flooded)
    }

    /// Writes the bundle to a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path)?;
        file.write_all(&MAGIC)?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&(self.len() as u32).to_le_bytes())?;
        file.write_all(&(self.img_size as u32).to_le_bytes())?;
        file.write_all(&self.labels)?;
        file.write_all(cast_slice(&self.images))?;
        file.flush()?;

        debug!(
            path = %path.display(),
            images = self.len(),
            img_size = self.img_size,
            "Wrote dataset bundle"
        );
        Ok(())
    }

    /// Reads a bundle back from disk, validating header and payload size.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, wrong magic or version, or a
    /// payload whose size does not match the header.
    pub fn read_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path)?;

        if bytes.len() < HEADER_LEN {
            anyhow::bail!("Bundle file '{}' is too short", path.display());
        }
        if bytes[0..4] != MAGIC {
            anyhow::bail!("File '{}' is not a dataset bundle", path.display());
        }

        let version = u32::from_le_bytes(bytes[4..8].try_into()?);
        if version != VERSION {
            anyhow::bail!("Unsupported bundle version {version} (expected {VERSION})");
        }

        let count = u32::from_le_bytes(bytes[8..12].try_into()?) as usize;
        let img_size = u32::from_le_bytes(bytes[12..16].try_into()?) as usize;
        let ppi = img_size * img_size * 3;

        let expected = HEADER_LEN + count + count * ppi * size_of::<f32>();
        if bytes.len() != expected {
            anyhow::bail!(
                "Bundle file '{}' has wrong size: expected {expected} bytes, found {}",
                path.display(),
                bytes.len()
            );
        }

        let labels = bytes[HEADER_LEN..HEADER_LEN + count].to_vec();
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            anyhow::bail!("Bundle contains invalid label {bad}");
        }

        let pixel_bytes = bytes[HEADER_LEN + count..].to_vec();
        let images = match try_cast_vec::<u8, f32>(pixel_bytes) {
            Ok(values) => values,
            // Vec allocation was not f32-aligned; copy chunk by chunk.
            Err((_, bytes)) => bytes
                .chunks_exact(4)
                .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        };

        Ok(Self {
            img_size,
            images,
            labels,
        })
    }

    /// Splits the bundle into train and test partitions, stratified by
    /// label, deterministically for a fixed `seed`.
    ///
    /// Each label pool is shuffled independently and `test_ratio` of it
    /// (rounded) goes to the test partition.
    #[must_use]
    pub fn split_stratified(&self, test_ratio: f32, seed: u64) -> (Self, Self) {
        let mut train = Self::new(self.img_size);
        let mut test = Self::new(self.img_size);

        for label in 0..=1u8 {
            let mut pool: Vec<usize> = self
                .labels
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l == label)
                .map(|(i, _)| i)
                .collect();

            shuffle_indices(&mut pool, seed.wrapping_add(u64::from(label)));

            let test_count = (pool.len() as f32 * test_ratio).round() as usize;
            for (position, &index) in pool.iter().enumerate() {
                let target = if position < test_count {
                    &mut test
                } else {
                    &mut train
                };
                // Indices come from the label scan, push cannot fail.
                if let Some(pixels) = self.image(index) {
                    let _ = target.push(pixels, label);
                }
            }
        }

        (train, test)
    }
}

/// Shuffles indices using a simple LCG-based shuffle.
pub(crate) fn shuffle_indices(indices: &mut [usize], seed: u64) {
    // Simple Fisher-Yates shuffle with LCG random
    let mut rng_state = seed.wrapping_add(12345);

    for i in (1..indices.len()).rev() {
        // LCG: state = (a * state + c) mod m
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = ((rng_state >> 33) as usize) % (i + 1);
        indices.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMG_SIZE: usize = 4;

    fn filled_image(value: f32) -> Vec<f32> {
        vec![value; IMG_SIZE * IMG_SIZE * 3]
    }

    fn sample_bundle(dry: usize, flooded: usize) -> DatasetBundle {
        let mut bundle = DatasetBundle::new(IMG_SIZE);
        for i in 0..dry {
            bundle
                .push(&filled_image(i as f32 * 0.01), 0)
                .expect("push dry");
        }
        for i in 0..flooded {
            bundle
                .push(&filled_image(0.5 + i as f32 * 0.01), 1)
                .expect("push flooded");
        }
        bundle
    }

    #[test]
    fn preserves_traversal_order_and_counts() {
        let bundle = sample_bundle(3, 2);

        assert_eq!(bundle.len(), 5);
        assert_eq!(bundle.labels(), &[0, 0, 0, 1, 1]);
        assert_eq!(bundle.label_counts(), (3, 2));
    }

    #[test]
    fn rejects_wrong_pixel_count_and_labels() {
        let mut bundle = DatasetBundle::new(IMG_SIZE);
        assert!(bundle.push(&[0.0; 3], 0).is_err());
        assert!(bundle.push(&filled_image(0.1), 2).is_err());
        assert!(bundle.is_empty());
    }

    #[test]
    fn roundtrips_through_file() {
        let bundle = sample_bundle(3, 2);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dataset_processado.bin");

        bundle.write_file(&path).expect("write bundle");
        let restored = DatasetBundle::read_file(&path).expect("read bundle");

        assert_eq!(restored.len(), 5);
        assert_eq!(restored.img_size(), IMG_SIZE);
        assert_eq!(restored.labels(), bundle.labels());
        assert_eq!(restored.image(4), bundle.image(4));
    }

    #[test]
    fn truncated_file_is_an_error() {
        let bundle = sample_bundle(2, 2);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("truncado.bin");

        bundle.write_file(&path).expect("write bundle");
        let bytes = fs::read(&path).expect("read bytes");
        fs::write(&path, &bytes[..bytes.len() - 7]).expect("truncate");

        assert!(DatasetBundle::read_file(&path).is_err());
    }

    #[test]
    fn foreign_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("outro.bin");
        fs::write(&path, b"definitely not a bundle").expect("write");

        assert!(DatasetBundle::read_file(&path).is_err());
    }

    #[test]
    fn stratified_split_preserves_label_balance() {
        let bundle = sample_bundle(10, 10);
        let (train, test) = bundle.split_stratified(0.2, 42);

        assert_eq!(train.len(), 16);
        assert_eq!(test.len(), 4);
        assert_eq!(train.label_counts(), (8, 8));
        assert_eq!(test.label_counts(), (2, 2));
    }

    #[test]
    fn stratified_split_is_deterministic() {
        let bundle = sample_bundle(8, 6);
        let (train_a, test_a) = bundle.split_stratified(0.25, 42);
        let (train_b, test_b) = bundle.split_stratified(0.25, 42);

        assert_eq!(train_a.labels(), train_b.labels());
        assert_eq!(test_a.labels(), test_b.labels());
        assert_eq!(train_a.image(0), train_b.image(0));
    }

    #[test]
    fn shuffle_preserves_elements() {
        let mut indices: Vec<usize> = (0..10).collect();
        let original = indices.clone();

        shuffle_indices(&mut indices, 42);

        assert_ne!(indices, original, "Shuffle should change order");
        indices.sort_unstable();
        assert_eq!(indices, original, "Shuffle should preserve elements");
    }
}
