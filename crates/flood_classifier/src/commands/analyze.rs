//! Analyze command - interactive prediction loop over user-supplied images.
//!
//! Loads the trained model once, then alternates between exactly two
//! states: awaiting an image path on stdin, or terminated (exit keyword or
//! closed stdin). Every successful prediction is appended to the alert log;
//! preprocessing failures are reported and skipped without logging.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use burn::backend::NdArray;
use flood_model::{FloodStatus, load_checkpoint, predict};
use preprocessing::prepare_image;
use tracing::info;

use super::init_device;
use crate::alert_log::AlertLog;

type Backend = NdArray;

/// Keyword (case-insensitive) that terminates the loop.
const EXIT_KEYWORD: &str = "sair";

/// Runs the analyze command.
///
/// # Errors
///
/// Returns an error if the model cannot be loaded or the alert log cannot
/// be written. Per-image failures are recoverable and never abort the loop.
pub fn run(model_path: &Path, log_path: &Path) -> Result<()> {
    println!(
        "Carregando o modelo treinado '{}'...",
        model_path.display()
    );

    let device = init_device();
    let (model, model_config) = load_checkpoint::<Backend>(model_path, &device)
        .context("Não foi possível carregar o modelo. Verifique se o arquivo existe")?;
    println!("Modelo carregado com sucesso!");

    let log = AlertLog::new(log_path.to_path_buf());
    log.ensure_header()?;
    info!(log = %log_path.display(), "Log de eventos configurado");

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        println!();
        println!("{}", "=".repeat(50));
        print!("Digite o caminho da imagem de satélite para analisar (ou '{EXIT_KEYWORD}'): ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // stdin closed
            break;
        }

        let input = line.trim();
        if input.eq_ignore_ascii_case(EXIT_KEYWORD) {
            break;
        }

        let image_path = Path::new(input);
        match prepare_image(image_path, model_config.img_size) {
            Err(e) => println!("ERRO: {e}"),
            Ok(pixels) => {
                let confidence = predict(&model, &pixels, model_config.img_size, &device);
                let status = FloodStatus::from_confidence(confidence);
                let image_name = image_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(input);

                println!();
                println!("--- Resultado da Análise ---");
                println!("Imagem: {image_name}");
                println!("Status Previsto: {status}");
                println!("Confiança (de ser alagada): {:.2}%", confidence * 100.0);

                log.append(image_name, status, confidence)?;
                println!("Resultado salvo no log.");
            }
        }
    }

    println!();
    println!("Análise encerrada.");

    Ok(())
}
