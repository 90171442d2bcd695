//! ML model crate for the flood classifier.
//!
//! This crate uses the Burn deep learning framework to define, train,
//! and run inference with a small convolutional network that predicts
//! the probability of a satellite image showing a flooded area.

use std::fmt;
use std::path::{Path, PathBuf};

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use burn::tensor::activation::sigmoid;
use tracing::warn;

pub mod bundle;
pub mod dataset;
pub mod training;

pub use bundle::DatasetBundle;
pub use dataset::{FloodBatch, FloodBatcher, FloodDataset, FloodItem};
pub use training::{TrainingConfig, TrainingOutput, train};

/// Decision threshold on the sigmoid output. Confidence strictly above this
/// value means "flooded"; exactly at the boundary resolves to "dry".
pub const FLOOD_THRESHOLD: f32 = 0.5;

/// Configuration for the flood classification model.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Side length of the square input images. Must be divisible by 8
    /// (three halving pool stages).
    #[config(default = 128)]
    pub img_size: usize,
    /// Number of hidden units in the dense layer after flattening.
    #[config(default = 64)]
    pub hidden_size: usize,
    /// Dropout rate applied before the output layer.
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl ModelConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FloodModel<B> {
        let reduced = self.img_size / 8;
        FloodModel {
            // Input: [batch_size, 3, img_size, img_size]
            conv1: Conv2dConfig::new([3, 32], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(), // -> img_size / 2
            conv2: Conv2dConfig::new([32, 64], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(), // -> img_size / 4
            conv3: Conv2dConfig::new([64, 64], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool3: MaxPool2dConfig::new([2, 2]).init(), // -> img_size / 8
            fc1: LinearConfig::new(64 * reduced * reduced, self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(self.hidden_size, 1).init(device),
            relu: Relu::new(),
        }
    }
}

/// The flood classification model.
///
/// Three convolution + max-pooling stages of increasing filter depth,
/// a dense hidden layer with dropout, and a single sigmoid output that
/// reads as the probability of "flooded".
#[derive(Module, Debug)]
pub struct FloodModel<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    conv3: Conv2d<B>,
    pool3: MaxPool2d,
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
    relu: Relu,
}

impl<B: Backend> FloodModel<B> {
    /// Forward pass through the network.
    ///
    /// # Shapes
    ///   - Input: `[batch_size, 3, img_size, img_size]`
    ///   - Output: `[batch_size, 1]`, sigmoid probabilities in `[0, 1]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images); // [batch_size, 32, s, s]
        let x = self.relu.forward(x);
        let x = self.pool1.forward(x); // [batch_size, 32, s/2, s/2]

        let x = self.conv2.forward(x); // [batch_size, 64, s/2, s/2]
        let x = self.relu.forward(x);
        let x = self.pool2.forward(x); // [batch_size, 64, s/4, s/4]

        let x = self.conv3.forward(x); // [batch_size, 64, s/4, s/4]
        let x = self.relu.forward(x);
        let x = self.pool3.forward(x); // [batch_size, 64, s/8, s/8]

        let x = x.flatten::<2>(1, 3); // [batch_size, 64 * (s/8)^2]
        let x = self.fc1.forward(x); // [batch_size, hidden_size]
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);
        let x = self.fc2.forward(x); // [batch_size, 1]

        sigmoid(x)
    }
}

/// Predicted status of an analyzed area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodStatus {
    Flooded,
    Dry,
}

impl FloodStatus {
    /// Classifies a raw sigmoid confidence.
    ///
    /// Exactly [`FLOOD_THRESHOLD`] resolves to [`FloodStatus::Dry`].
    #[must_use]
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > FLOOD_THRESHOLD {
            Self::Flooded
        } else {
            Self::Dry
        }
    }

    /// Human-readable status label, as recorded in the alert log.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Flooded => "Área Alagada",
            Self::Dry => "Área Seca",
        }
    }
}

impl fmt::Display for FloodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Runs a forward pass on a single prepared image.
///
/// `pixels` must come from `preprocessing::prepare_image` with the same
/// `img_size` the model was trained with (flat HWC layout, `[0, 1]` values).
///
/// # Returns
///
/// The raw sigmoid output, interpreted as the probability of "flooded".
pub fn predict<B: Backend<FloatElem = f32>>(
    model: &FloodModel<B>,
    pixels: &[f32],
    img_size: usize,
    device: &B::Device,
) -> f32 {
    let data = TensorData::new(pixels.to_vec(), [img_size, img_size, 3]).convert::<B::FloatElem>();
    let input = Tensor::<B, 3>::from_data(data, device)
        .permute([2, 0, 1]) // [3, img_size, img_size]
        .unsqueeze::<4>(); // [1, 3, img_size, img_size]

    model.forward(input).into_scalar()
}

/// Saves the trained model and its config sidecar to disk.
///
/// The recorder writes `<path>.mpk`; the model configuration is stored next
/// to it as `<path>.config.json` so inference can rebuild the topology.
///
/// # Errors
///
/// Returns an error if either file cannot be written.
pub fn save_checkpoint<B: Backend>(
    model: &FloodModel<B>,
    config: &ModelConfig,
    path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    config
        .save(sidecar_path(path))
        .map_err(|e| anyhow::anyhow!("Failed to save model config sidecar: {e}"))?;

    model
        .clone()
        .save_file(path.to_path_buf(), &CompactRecorder::new())
        .map_err(|e| anyhow::anyhow!("Failed to save model checkpoint: {e}"))?;

    Ok(())
}

/// Loads a model checkpoint and its configuration from disk.
///
/// # Errors
///
/// Returns an error if the checkpoint file is missing or cannot be read.
/// A missing config sidecar is tolerated: the default topology is assumed.
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> anyhow::Result<(FloodModel<B>, ModelConfig)> {
    let record_path = PathBuf::from(format!("{}.mpk", path.display()));
    if !record_path.is_file() {
        anyhow::bail!(
            "Modelo não encontrado em '{}'. Execute o comando 'train' primeiro.",
            record_path.display()
        );
    }

    let config_path = sidecar_path(path);
    let config = if Path::new(&config_path).is_file() {
        ModelConfig::load(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load model config sidecar: {e}"))?
    } else {
        warn!(path = %config_path, "Model config sidecar missing, assuming default topology");
        ModelConfig::new()
    };

    let record = CompactRecorder::new()
        .load(path.to_path_buf(), device)
        .map_err(|e| anyhow::anyhow!("Failed to load model checkpoint: {e}"))?;

    Ok((config.init(device).load_record(record), config))
}

/// Path of the config sidecar written next to the checkpoint.
fn sidecar_path(path: &Path) -> String {
    format!("{}.config.json", path.display())
}
