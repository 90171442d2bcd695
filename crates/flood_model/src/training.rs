//! Training logic for the flood classification model.

use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::nn::loss::{BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use tracing::info;

use crate::bundle::shuffle_indices;
use crate::dataset::{FloodBatcher, FloodDataset};
use crate::{FloodModel, FloodStatus, ModelConfig};

/// Configuration for training the model.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Model architecture configuration.
    pub model: ModelConfig,
    /// Number of full passes over the training set.
    #[config(default = 15)]
    pub epochs: usize,
    /// Batch size for training.
    #[config(default = 32)]
    pub batch_size: usize,
    /// Learning rate for the Adam optimizer.
    #[config(default = 1.0e-4)]
    pub learning_rate: f64,
    /// Fraction of the bundle held out as the test partition.
    #[config(default = 0.2)]
    pub test_ratio: f32,
    /// Seed for shuffling and the stratified split.
    #[config(default = 42)]
    pub seed: u64,
}

/// Output from training.
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    /// Final training loss.
    pub final_train_loss: f32,
    /// Final validation loss (if validation data was used).
    pub final_valid_loss: Option<f32>,
    /// Final validation accuracy in `[0, 1]` (if validation data was used).
    pub valid_accuracy: Option<f32>,
    /// Number of epochs completed.
    pub epochs_completed: usize,
}

/// Trains the model on the provided data.
///
/// A plain mini-batch loop: shuffle, batch, forward, binary cross-entropy
/// on the sigmoid outputs, backward, Adam step. Runs for the configured
/// number of epochs; the validation partition is evaluated after every
/// epoch but never stops training early.
///
/// # Errors
///
/// Returns an error if the training dataset is empty.
pub fn train<B: AutodiffBackend>(
    model: &mut FloodModel<B>,
    train_dataset: &FloodDataset,
    valid_dataset: Option<&FloodDataset>,
    config: &TrainingConfig,
    device: &B::Device,
) -> anyhow::Result<TrainingOutput> {
    if train_dataset.is_empty() {
        return Err(anyhow::anyhow!("No training data provided"));
    }

    B::seed(device, config.seed);

    let img_size = train_dataset.img_size();
    let batcher = FloodBatcher::<B>::new(img_size, device.clone());
    let valid_batcher = FloodBatcher::<B::InnerBackend>::new(img_size, device.clone());
    let loss_fn = BinaryCrossEntropyLossConfig::new().init(device);
    let valid_loss_fn = BinaryCrossEntropyLossConfig::new().init(device);

    let mut optimizer = AdamConfig::new().init();

    let mut final_train_loss = 0.0;
    let mut final_valid_loss: Option<f32> = None;
    let mut valid_accuracy: Option<f32> = None;

    for epoch in 0..config.epochs {
        let mut epoch_loss = 0.0;
        let mut batch_count = 0;

        let num_samples = train_dataset.len();
        let mut indices: Vec<usize> = (0..num_samples).collect();

        // Reshuffle every epoch, seeded so runs are reproducible.
        shuffle_indices(&mut indices, config.seed.wrapping_add(epoch as u64));

        for batch_start in (0..num_samples).step_by(config.batch_size) {
            let batch_end = (batch_start + config.batch_size).min(num_samples);
            let Some(batch_indices) = indices.get(batch_start..batch_end) else {
                continue;
            };

            let items: Vec<_> = batch_indices
                .iter()
                .filter_map(|&i| train_dataset.get(i))
                .collect();

            if items.is_empty() {
                continue;
            }

            let batch = batcher.batch(items);
            let batch_size = batch.targets.dims()[0];

            // Forward pass
            let probabilities = model.forward(batch.images);
            let targets_2d = batch.targets.reshape([batch_size, 1]);
            let loss = loss_fn.forward(probabilities, targets_2d);

            epoch_loss += f64::from(scalar_value(&loss));
            batch_count += 1;

            // Backward pass
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, model);

            // Update weights
            *model = optimizer.step(config.learning_rate, model.clone(), grads);
        }

        final_train_loss = if batch_count > 0 {
            (epoch_loss / f64::from(batch_count)) as f32
        } else {
            0.0
        };

        // Validation on the held-out partition
        if let Some(valid_ds) = valid_dataset {
            let (loss, accuracy) = evaluate(
                &model.valid(),
                valid_ds,
                &valid_batcher,
                &valid_loss_fn,
                config.batch_size,
            );
            final_valid_loss = Some(loss);
            valid_accuracy = Some(accuracy);
        }

        info!(
            epoch = epoch + 1,
            train_loss = final_train_loss,
            valid_loss = final_valid_loss,
            valid_accuracy,
            "Epoch complete"
        );
    }

    Ok(TrainingOutput {
        final_train_loss,
        final_valid_loss,
        valid_accuracy,
        epochs_completed: config.epochs,
    })
}

/// Computes loss and accuracy of a model over a dataset.
///
/// Accuracy uses the same threshold rule as inference: a probability
/// strictly above 0.5 counts as "flooded".
pub fn evaluate<B: Backend>(
    model: &FloodModel<B>,
    dataset: &FloodDataset,
    batcher: &FloodBatcher<B>,
    loss_fn: &BinaryCrossEntropyLoss<B>,
    batch_size: usize,
) -> (f32, f32) {
    let num_samples = dataset.len();
    if num_samples == 0 {
        return (0.0, 0.0);
    }

    let mut total_loss = 0.0;
    let mut batch_count = 0;
    let mut correct = 0usize;

    for batch_start in (0..num_samples).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(num_samples);

        let items: Vec<_> = (batch_start..batch_end)
            .filter_map(|i| dataset.get(i))
            .collect();

        if items.is_empty() {
            continue;
        }

        let labels: Vec<u8> = items.iter().map(|item| item.label).collect();
        let batch = batcher.batch(items);
        let n = batch.targets.dims()[0];

        let probabilities = model.forward(batch.images);
        let targets_2d = batch.targets.reshape([n, 1]);
        let loss = loss_fn.forward(probabilities.clone(), targets_2d);

        total_loss += f64::from(scalar_value(&loss));
        batch_count += 1;

        let predicted: Vec<f32> = probabilities
            .into_data()
            .to_vec()
            .unwrap_or_else(|_| vec![0.0; n]);

        correct += predicted
            .iter()
            .zip(&labels)
            .filter(|&(&confidence, &label)| {
                let predicted_label =
                    u8::from(FloodStatus::from_confidence(confidence) == FloodStatus::Flooded);
                predicted_label == label
            })
            .count();
    }

    let loss = if batch_count > 0 {
        (total_loss / f64::from(batch_count)) as f32
    } else {
        0.0
    };
    let accuracy = correct as f32 / num_samples as f32;

    (loss, accuracy)
}

/// Extracts a scalar loss value from a one-element tensor.
fn scalar_value<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> f32 {
    tensor
        .clone()
        .into_data()
        .to_vec()
        .unwrap_or_else(|_| vec![0.0])
        .first()
        .copied()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};

    use super::*;
    use crate::DatasetBundle;

    type TestBackend = Autodiff<NdArray>;

    const IMG_SIZE: usize = 16;

    fn synthetic_dataset(dry: usize, flooded: usize) -> FloodDataset {
        let mut bundle = DatasetBundle::new(IMG_SIZE);
        let ppi = bundle.pixels_per_image();
        for i in 0..dry {
            bundle
                .push(&vec![0.1 + i as f32 * 0.01, 0.1, 0.1].repeat(ppi / 3), 0)
                .expect("push dry");
        }
        for i in 0..flooded {
            bundle
                .push(&vec![0.9 - i as f32 * 0.01, 0.9, 0.9].repeat(ppi / 3), 1)
                .expect("push flooded");
        }
        FloodDataset::from_bundle(&bundle)
    }

    #[test]
    fn training_runs_to_completion() {
        let device = NdArrayDevice::default();
        let model_config = ModelConfig::new().with_img_size(IMG_SIZE);
        let mut model: FloodModel<TestBackend> = model_config.init(&device);

        let train_ds = synthetic_dataset(6, 6);
        let valid_ds = synthetic_dataset(2, 2);

        let config = TrainingConfig::new(model_config)
            .with_epochs(2)
            .with_batch_size(4);

        let output = train(&mut model, &train_ds, Some(&valid_ds), &config, &device)
            .expect("training should succeed");

        assert_eq!(output.epochs_completed, 2);
        assert!(output.final_train_loss.is_finite());
        let accuracy = output.valid_accuracy.expect("validation ran");
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let device = NdArrayDevice::default();
        let model_config = ModelConfig::new().with_img_size(IMG_SIZE);
        let mut model: FloodModel<TestBackend> = model_config.init(&device);

        let empty = FloodDataset::from_bundle(&DatasetBundle::new(IMG_SIZE));
        let config = TrainingConfig::new(model_config).with_epochs(1);

        assert!(train(&mut model, &empty, None, &config, &device).is_err());
    }

    #[test]
    fn evaluate_reports_finite_loss_and_bounded_accuracy() {
        let device = NdArrayDevice::default();
        let model_config = ModelConfig::new().with_img_size(IMG_SIZE);
        let model: FloodModel<NdArray> = model_config.init(&device);

        let dataset = synthetic_dataset(3, 3);
        let batcher = FloodBatcher::new(IMG_SIZE, device);
        let loss_fn = BinaryCrossEntropyLossConfig::new().init(&NdArrayDevice::default());

        let (loss, accuracy) = evaluate(&model, &dataset, &batcher, &loss_fn, 4);
        assert!(loss.is_finite());
        assert!((0.0..=1.0).contains(&accuracy));
    }
}
