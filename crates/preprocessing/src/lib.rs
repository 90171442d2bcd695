//! Shared image preprocessing for the flood classifier.
//!
//! The dataset builder and the inference loop must feed the model pixels
//! prepared in exactly the same way, so both go through [`prepare_image`]:
//! decode, force RGB, resize to a square, normalize to `[0, 1]`.

use std::path::Path;

use image::imageops::FilterType;
use thiserror::Error;

/// Number of color channels every prepared image carries.
pub const CHANNELS: usize = 3;

/// Errors produced while preparing an image for the model.
///
/// Callers need to tell a missing file apart from a file that exists but
/// cannot be decoded; everything else is folded into the decode case.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Arquivo não encontrado em '{0}'")]
    NotFound(String),
    #[error("Não foi possível decodificar a imagem '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Loads, resizes and normalizes a single image for the model.
///
/// The result is a flat `img_size * img_size * 3` vector of `f32` pixel
/// values in `[0, 1]`, laid out height-major (HWC). Tensor conversion is
/// left to the caller so this crate stays backend-agnostic.
///
/// # Errors
///
/// Returns [`PreprocessError::NotFound`] if `path` does not point to an
/// existing file, and [`PreprocessError::Decode`] for any decode failure.
pub fn prepare_image(path: &Path, img_size: usize) -> Result<Vec<f32>, PreprocessError> {
    if !path.is_file() {
        return Err(PreprocessError::NotFound(path.display().to_string()));
    }

    let img = image::open(path)
        .map_err(|source| PreprocessError::Decode {
            path: path.display().to_string(),
            source,
        })?
        .to_rgb8();

    let img = image::imageops::resize(&img, img_size as u32, img_size as u32, FilterType::Lanczos3);

    let mut pixels = Vec::with_capacity(img_size * img_size * CHANNELS);
    for pixel in img.pixels() {
        pixels.push(f32::from(pixel[0]) / 255.0);
        pixels.push(f32::from(pixel[1]) / 255.0);
        pixels.push(f32::from(pixel[2]) / 255.0);
    }

    Ok(pixels)
}

/// Returns true if the file name carries a supported image extension.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ["jpg", "jpeg", "png", "bmp"].contains(&ext.to_lowercase().as_str())
        })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::{Rgb, RgbImage};

    use super::*;

    fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let path = dir.join(name);
        img.save(&path).expect("test image should save");
        path
    }

    #[test]
    fn prepares_fixed_resolution_normalized_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_test_image(dir.path(), "scene.png", 300, 200);

        let pixels = prepare_image(&path, 128).expect("valid image should prepare");

        assert_eq!(pixels.len(), 128 * 128 * CHANNELS);
        assert!(pixels.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn small_images_are_upscaled_to_target_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_test_image(dir.path(), "tiny.png", 16, 16);

        let pixels = prepare_image(&path, 64).expect("valid image should prepare");
        assert_eq!(pixels.len(), 64 * 64 * CHANNELS);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nao_existe.png");

        let err = prepare_image(&path, 128).expect_err("missing file must fail");
        assert!(matches!(err, PreprocessError::NotFound(_)));
    }

    #[test]
    fn non_image_file_reports_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fake.jpg");
        std::fs::write(&path, b"this is not a jpeg").expect("write fixture");

        let err = prepare_image(&path, 128).expect_err("garbage must fail to decode");
        assert!(matches!(err, PreprocessError::Decode { .. }));
    }

    #[test]
    fn image_extension_filter() {
        assert!(is_image_file(Path::new("a/b/c.JPG")));
        assert!(is_image_file(Path::new("c.png")));
        assert!(!is_image_file(Path::new("c.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }
}
