//! Turns an image file into the normalized single-channel tensor the model expects.

use image::{GrayImage, ImageReader, imageops::FilterType};
use ndarray::{Array3, Array4, Axis};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to read the image. Please ensure the file is a valid image. ({})", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read the image. Please ensure the file is a valid image. ({})", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decode any supported image as 8-bit grayscale, sniffing the format from content.
pub fn load_grayscale(path: impl AsRef<Path>) -> Result<GrayImage, PreprocessError> {
    let path = path.as_ref();
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| PreprocessError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let img = reader.decode().map_err(|source| PreprocessError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Grayscale, resize to `width`x`height`, scale to [0,1], add a channel axis.
///
/// The result has shape `(height, width, 1)`.
pub fn preprocess_image(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
) -> Result<Array3<f32>, PreprocessError> {
    let gray = load_grayscale(path)?;
    Ok(to_tensor(&gray, width, height))
}

/// In-memory half of [`preprocess_image`].
pub fn to_tensor(gray: &GrayImage, width: u32, height: u32) -> Array3<f32> {
    let resized = image::imageops::resize(gray, width, height, FilterType::Triangle);
    let mut tensor = Array3::<f32>::zeros((height as usize, width as usize, 1));
    for (x, y, pixel) in resized.enumerate_pixels() {
        tensor[[y as usize, x as usize, 0]] = normalize_intensity(pixel.0[0]);
    }
    tracing::debug!(
        "preprocessed {}x{} -> {:?}",
        gray.width(),
        gray.height(),
        tensor.shape()
    );
    tensor
}

/// Prepend a batch axis of size 1: `(h, w, 1)` becomes `(1, h, w, 1)`.
pub fn add_batch_dimension(tensor: Array3<f32>) -> Array4<f32> {
    tensor.insert_axis(Axis(0))
}

fn normalize_intensity(value: u8) -> f32 {
    value as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Luma, Rgb, RgbImage};
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[rstest]
    #[case(1, 1)]
    #[case(64, 300)]
    #[case(128, 128)]
    #[case(517, 243)]
    fn any_input_size_yields_configured_shape(
        #[case] w: u32,
        #[case] h: u32,
    ) -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("in.png");
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 7 + y * 13) % 256) as u8])).save(&path)?;

        let tensor = preprocess_image(&path, 128, 128)?;
        assert_eq!(tensor.shape(), &[128, 128, 1]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn color_jpeg_is_converted_to_single_channel() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("color.jpg");
        RgbImage::from_fn(90, 40, |x, _| Rgb([x as u8 * 2, 30, 200])).save(&path)?;

        let tensor = preprocess_image(&path, 128, 128)?;
        assert_eq!(tensor.shape(), &[128, 128, 1]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        Ok(())
    }

    #[test]
    fn non_square_target_puts_height_first() {
        let gray = GrayImage::from_pixel(10, 10, Luma([0]));
        let tensor = to_tensor(&gray, 32, 16);
        assert_eq!(tensor.shape(), &[16, 32, 1]);
    }

    #[test]
    fn intensities_scale_to_unit_range() {
        let white = GrayImage::from_pixel(20, 20, Luma([255]));
        let black = GrayImage::from_pixel(20, 20, Luma([0]));
        let mid = GrayImage::from_pixel(20, 20, Luma([51]));

        // One grey level of slack for resampling round-off.
        let step = 1.0 / 255.0;
        for &v in to_tensor(&white, 8, 8).iter() {
            assert_relative_eq!(v, 1.0, epsilon = step);
        }
        for &v in to_tensor(&black, 8, 8).iter() {
            assert_relative_eq!(v, 0.0, epsilon = step);
        }
        for &v in to_tensor(&mid, 8, 8).iter() {
            assert_relative_eq!(v, 0.2, epsilon = step);
        }
    }

    #[test]
    fn batch_dimension_is_prepended() {
        let batch = add_batch_dimension(Array3::<f32>::zeros((128, 128, 1)));
        assert_eq!(batch.shape(), &[1, 128, 128, 1]);
    }

    #[test]
    fn undecodable_file_is_an_input_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("fake.png");
        fs::write(&path, b"this is not an image")?;

        let err = preprocess_image(&path, 128, 128).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode { .. }));
        assert!(err.to_string().starts_with("Failed to read the image."));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = preprocess_image("/no/such/fingerprint.png", 128, 128).unwrap_err();
        assert!(matches!(err, PreprocessError::Open { .. }));
    }
}
