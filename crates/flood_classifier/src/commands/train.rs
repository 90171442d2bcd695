//! Train command - fits the convolutional classifier on a dataset bundle.

use std::path::Path;

use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use flood_model::{
    DatasetBundle, FloodDataset, ModelConfig, TrainingConfig, save_checkpoint, train,
};
use tracing::info;

use super::init_device;

type TrainBackend = Autodiff<NdArray>;

/// Runs the train command.
///
/// # Errors
///
/// Returns an error if the bundle cannot be read, holds no images, or
/// training / checkpointing fails.
pub fn run(
    bundle_path: &Path,
    model_path: &Path,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
) -> Result<()> {
    info!(bundle = %bundle_path.display(), "Carregando o dataset pré-processado");

    let bundle = DatasetBundle::read_file(bundle_path)
        .with_context(|| format!("Falha ao carregar o bundle '{}'", bundle_path.display()))?;

    if bundle.is_empty() {
        anyhow::bail!("O bundle '{}' não contém imagens", bundle_path.display());
    }

    let (dry, flooded) = bundle.label_counts();
    info!(
        total = bundle.len(),
        seca = dry,
        alagada = flooded,
        img_size = bundle.img_size(),
        "Dataset carregado"
    );

    let model_config = ModelConfig::new().with_img_size(bundle.img_size());
    let config = TrainingConfig::new(model_config)
        .with_epochs(epochs)
        .with_batch_size(batch_size)
        .with_learning_rate(learning_rate);

    // Stratified split keeps the label balance in both partitions.
    let (train_bundle, test_bundle) = bundle.split_stratified(config.test_ratio, config.seed);
    info!(
        train = train_bundle.len(),
        test = test_bundle.len(),
        "Dados divididos em treino e teste"
    );

    let train_dataset = FloodDataset::from_bundle(&train_bundle);
    let valid_dataset =
        (!test_bundle.is_empty()).then(|| FloodDataset::from_bundle(&test_bundle));

    let device = init_device();
    let mut model = config.model.init::<TrainBackend>(&device);

    info!(epochs, batch_size, learning_rate, "Iniciando o treinamento");
    let output = train(
        &mut model,
        &train_dataset,
        valid_dataset.as_ref(),
        &config,
        &device,
    )?;

    info!(
        final_train_loss = output.final_train_loss,
        epochs = output.epochs_completed,
        "Treinamento concluído"
    );
    if let Some(accuracy) = output.valid_accuracy {
        info!(
            "Acurácia do modelo no conjunto de teste: {:.2}%",
            accuracy * 100.0
        );
    }

    save_checkpoint(&model.valid(), &config.model, model_path)?;
    info!(model = %model_path.display(), "Modelo treinado salvo");

    Ok(())
}
