use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Context;

/// Global configuration instance, lazily initialized.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::from_env().expect("Failed to create config"));

/// Application configuration loaded from environment variables.
///
/// Every variable is optional; the defaults match the conventional file
/// layout of the workflow (dataset folder next to the binary, artifacts in
/// the working directory).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding the `seca` and `alagada` class folders.
    pub dataset_dir: PathBuf,

    /// Path of the serialized dataset bundle handed to the trainer.
    pub bundle_path: PathBuf,

    /// Base path of the trained model checkpoint (extension added by the
    /// recorder).
    pub model_path: PathBuf,

    /// Path of the CSV alert log appended to by the inference loop.
    pub log_path: PathBuf,

    /// Side length every image is resized to before training or inference.
    pub image_size: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `FLOOD_DATASET_DIR`: labeled image root (default: `dataset_kinshasa`)
    /// - `FLOOD_BUNDLE_PATH`: dataset bundle file (default: `dataset_processado.bin`)
    /// - `FLOOD_MODEL_PATH`: model checkpoint base path (default: `modelo_classificador_enchentes`)
    /// - `FLOOD_LOG_PATH`: alert log file (default: `alert_log.csv`)
    /// - `FLOOD_IMAGE_SIZE`: image side length in pixels (default: `128`)
    ///
    /// # Errors
    ///
    /// Returns an error if `FLOOD_IMAGE_SIZE` is set but not a valid number.
    fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let dataset_dir = env_path("FLOOD_DATASET_DIR", "dataset_kinshasa");
        let bundle_path = env_path("FLOOD_BUNDLE_PATH", "dataset_processado.bin");
        let model_path = env_path("FLOOD_MODEL_PATH", "modelo_classificador_enchentes");
        let log_path = env_path("FLOOD_LOG_PATH", "alert_log.csv");

        let image_size = match std::env::var("FLOOD_IMAGE_SIZE") {
            Ok(raw) => raw
                .parse()
                .context("FLOOD_IMAGE_SIZE is not a valid number")?,
            Err(_) => 128,
        };

        Ok(Self {
            dataset_dir,
            bundle_path,
            model_path,
            log_path,
            image_size,
        })
    }
}

/// Reads a path from the environment, falling back to a default.
fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var).map_or_else(|_| PathBuf::from(default), PathBuf::from)
}
