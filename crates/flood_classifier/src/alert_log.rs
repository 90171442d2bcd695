//! Append-only CSV log of analyzed images.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use flood_model::FloodStatus;

/// Column header of the alert log.
const HEADER: [&str; 4] = [
    "Timestamp",
    "Imagem_Analisada",
    "Status_Previsto",
    "Confianca_Alagada",
];

/// Timestamp format of log rows.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The CSV alert log the inference loop appends to.
///
/// Rows are never mutated or deleted; the file is opened, appended and
/// closed on every single write.
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates the CSV file with its header row if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn ensure_header(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends one prediction row, timestamped with the current local time.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn append(&self, image_name: &str, status: FloodStatus, confidence: f32) -> Result<()> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.append_row(&timestamp, image_name, status, confidence)
    }

    fn append_row(
        &self,
        timestamp: &str,
        image_name: &str,
        status: FloodStatus,
        confidence: f32,
    ) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let confidence_pct = format!("{:.2}%", confidence * 100.0);
        writer.write_record([timestamp, image_name, status.label(), confidence_pct.as_str()])?;
        writer.flush()?;
        Ok(())
    }
}
