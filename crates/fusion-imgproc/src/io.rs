//! Image file I/O.
//!
//! - `load_gray` / `load_rgb`: decode PNG/JPEG into owned buffers.
//! - `save_image`: encode by file extension, creating parent directories.
//! - `list_images`: calibration image discovery, sorted by file name.
//!
//! All failures surface as [`FusionError::Acquisition`] carrying the path.

use fusion_core::FusionError;
use image::{GrayImage, ImageBuffer, Pixel, PixelWithColorType, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn load_gray(path: &Path) -> Result<GrayImage, FusionError> {
    image::open(path)
        .map(|img| img.into_luma8())
        .map_err(|e| FusionError::acquisition(path, e))
}

pub fn load_rgb(path: &Path) -> Result<RgbImage, FusionError> {
    image::open(path)
        .map(|img| img.into_rgb8())
        .map_err(|e| FusionError::acquisition(path, e))
}

/// Save an 8-bit image; the format follows the extension (`.jpg`, `.png`).
pub fn save_image<P>(image: &ImageBuffer<P, Vec<u8>>, path: &Path) -> Result<(), FusionError>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType,
{
    ensure_parent_dir(path)?;
    image
        .save(path)
        .map_err(|e| FusionError::acquisition(path, e))
}

/// Image files (`jpg`, `jpeg`, `png`, case-insensitive) directly inside `dir`,
/// sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, FusionError> {
    let entries = fs::read_dir(dir).map_err(|e| FusionError::acquisition(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| FusionError::acquisition(dir, e))?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), FusionError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FusionError::acquisition(parent, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let img = GrayImage::from_pixel(4, 4, Luma([7]));
        for name in ["b.png", "a.PNG", "c.jpg"] {
            save_image(&img, &dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let names: Vec<_> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.png", "c.jpg"]);
    }

    #[test]
    fn missing_file_is_an_acquisition_error() {
        let err = load_gray(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, FusionError::Acquisition { .. }));
    }

    #[test]
    fn png_roundtrip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/img.png");
        let img = GrayImage::from_fn(5, 3, |x, y| Luma([(x * 40 + y) as u8]));
        save_image(&img, &path).unwrap();
        assert_eq!(load_gray(&path).unwrap(), img);
    }
}
