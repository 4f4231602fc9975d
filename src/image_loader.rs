use std::fs;
use std::path::Path;

use image::{imageops::FilterType, DynamicImage, ImageError, ImageOutputFormat};
use thiserror::Error;

use crate::types::PixelImage;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] ImageError),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Failed to save image: {0}")]
    Save(String),
}

pub fn load_image(path: &str) -> Result<DynamicImage, ImageLoadError> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(ImageLoadError::NotFound(path.display().to_string()));
    }
    Ok(image::open(path)?)
}

/// Loads an image from disk and converts it to the RGBA pixel grid every
/// comparison operates on.
pub fn load_rgba(path: &str) -> Result<PixelImage, ImageLoadError> {
    Ok(load_image(path)?.to_rgba8())
}

/// Decodes encoded bytes (PNG, JPEG, ...) as returned by screenshot capture.
pub fn decode_rgba(bytes: &[u8]) -> Result<PixelImage, ImageLoadError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub fn encode_png(img: &PixelImage) -> Result<Vec<u8>, ImageLoadError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| ImageLoadError::Save(e.to_string()))?;
    Ok(buf.into_inner())
}

pub fn save_png(img: &PixelImage, output_path: &str) -> Result<(), ImageLoadError> {
    let out_path = Path::new(output_path);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ImageLoadError::Save(e.to_string()))?;
        }
    }
    img.save_with_format(out_path, image::ImageFormat::Png)
        .map_err(|e| ImageLoadError::Save(e.to_string()))
}

pub fn resize_to_match(img: &PixelImage, target_width: u32, target_height: u32) -> PixelImage {
    image::imageops::resize(img, target_width, target_height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_image("/nonexistent/path/image.png");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ImageLoadError::NotFound(_)));
    }

    #[test]
    fn test_resize_to_match() {
        let img = RgbaImage::new(200, 100);
        let result = resize_to_match(&img, 50, 50);
        assert_eq!(result.dimensions(), (50, 50));
    }

    #[test]
    fn encoded_png_decodes_to_same_pixels() {
        let img = RgbaImage::from_pixel(6, 4, Rgba([12, 200, 40, 255]));
        let bytes = encode_png(&img).expect("encode");
        let decoded = decode_rgba(&bytes).expect("decode");
        assert_eq!(decoded.dimensions(), (6, 4));
        assert_eq!(decoded.get_pixel(3, 2), &Rgba([12, 200, 40, 255]));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode_rgba(b"definitely not an image");
        assert!(matches!(result, Err(ImageLoadError::Decode(_))));
    }

    #[test]
    fn save_png_creates_parent_directories() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("nested/dir/diff.png");
        let img = RgbaImage::from_pixel(10, 5, Rgba([255, 0, 0, 255]));
        save_png(&img, out.to_str().unwrap()).expect("save");
        assert!(out.exists());
        let loaded = load_rgba(out.to_str().unwrap()).expect("reload");
        assert_eq!(loaded.dimensions(), (10, 5));
    }
}
