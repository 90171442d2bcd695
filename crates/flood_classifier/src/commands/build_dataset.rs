//! Build-dataset command - preprocesses labeled image folders into a bundle.

use std::path::Path;

use anyhow::Result;
use config::CONFIG;
use flood_model::DatasetBundle;
use preprocessing::{is_image_file, prepare_image};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Class folders and their numeric labels, in traversal order.
const CLASSES: [(&str, u8); 2] = [("seca", 0), ("alagada", 1)];

/// Runs the build-dataset command.
///
/// # Errors
///
/// Returns an error if no valid image is found or the bundle cannot be
/// written.
pub fn run(dataset_dir: &Path, output: &Path) -> Result<()> {
    let img_size = CONFIG.image_size;
    info!(
        dataset_dir = %dataset_dir.display(),
        img_size,
        "Iniciando o pré-processamento das imagens"
    );

    let bundle = build_bundle(dataset_dir, img_size)?;

    let (dry, flooded) = bundle.label_counts();
    info!(
        total = bundle.len(),
        seca = dry,
        alagada = flooded,
        "Pré-processamento concluído"
    );

    bundle.write_file(output)?;
    info!(output = %output.display(), "Dataset salvo com sucesso");

    Ok(())
}

/// Walks the class folders and assembles the dataset bundle.
///
/// Folders are visited in label order (`seca` then `alagada`) and files in
/// sorted name order, so rebuilding from the same folder is stable. Images
/// that cannot be prepared are reported and skipped; traversal continues.
///
/// # Errors
///
/// Returns an error if no image at all could be processed.
pub fn build_bundle(dataset_dir: &Path, img_size: usize) -> Result<DatasetBundle> {
    let mut bundle = DatasetBundle::new(img_size);

    for (class_name, label) in CLASSES {
        let class_dir = dataset_dir.join(class_name);
        if !class_dir.is_dir() {
            warn!(dir = %class_dir.display(), "Pasta da classe não encontrada, pulando");
            continue;
        }

        info!(class = class_name, "Processando imagens da pasta");
        let mut processed = 0usize;
        let mut skipped = 0usize;

        for entry in WalkDir::new(&class_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .flatten()
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_image_file(path) {
                continue;
            }

            match prepare_image(path, img_size) {
                Ok(pixels) => {
                    bundle.push(&pixels, label)?;
                    processed += 1;
                }
                Err(e) => {
                    warn!(
                        image = %path.display(),
                        error = %e,
                        "Erro ao processar a imagem, pulando"
                    );
                    skipped += 1;
                }
            }
        }

        info!(class = class_name, processed, skipped, "Classe concluída");
    }

    if bundle.is_empty() {
        anyhow::bail!(
            "Nenhuma imagem válida encontrada em '{}'",
            dataset_dir.display()
        );
    }

    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::{Rgb, RgbImage};

    use super::*;

    fn write_test_image(dir: &Path, name: &str, shade: u8) {
        let img = RgbImage::from_pixel(40, 30, Rgb([shade, shade, 200]));
        img.save(dir.join(name)).expect("test image should save");
    }

    fn fixture_dataset(root: &Path, dry: usize, flooded: usize) -> PathBuf {
        let seca = root.join("seca");
        let alagada = root.join("alagada");
        std::fs::create_dir_all(&seca).expect("mkdir seca");
        std::fs::create_dir_all(&alagada).expect("mkdir alagada");

        for i in 0..dry {
            write_test_image(&seca, &format!("seca_{i}.png"), 200);
        }
        for i in 0..flooded {
            write_test_image(&alagada, &format!("alagada_{i}.png"), 40);
        }
        root.to_path_buf()
    }

    #[test]
    fn builds_bundle_in_traversal_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fixture_dataset(dir.path(), 3, 2);

        let bundle = build_bundle(&root, 32).expect("fixture should build");

        assert_eq!(bundle.len(), 5);
        assert_eq!(bundle.labels(), &[0, 0, 0, 1, 1]);
        assert_eq!(bundle.label_counts(), (3, 2));
    }

    #[test]
    fn skips_unreadable_images_and_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fixture_dataset(dir.path(), 2, 1);
        std::fs::write(root.join("seca").join("corrompida.jpg"), b"not an image")
            .expect("write corrupt fixture");

        let bundle = build_bundle(&root, 32).expect("corrupt image must not abort the build");

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.label_counts(), (2, 1));
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(build_bundle(dir.path(), 32).is_err());
    }
}
