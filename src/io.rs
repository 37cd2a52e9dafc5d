// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Saving annotated images.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{DetectError, Result};

/// Output file stem: the file name up to its first `.`.
///
/// `IMG_1.v2.jpg` becomes `IMG_1`, so two sources sharing that prefix
/// overwrite each other's output.
#[must_use]
pub fn output_stem(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Writes annotated images into one directory as PNG.
#[derive(Debug, Clone)]
pub struct SaveResults {
    save_dir: PathBuf,
}

impl SaveResults {
    /// Create the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::IoError`] if the directory can't be created.
    pub fn new<P: Into<PathBuf>>(save_dir: P) -> Result<Self> {
        let save_dir = save_dir.into();
        std::fs::create_dir_all(&save_dir).map_err(|e| {
            DetectError::IoError(format!(
                "Failed to create directory {}: {e}",
                save_dir.display()
            ))
        })?;
        Ok(Self { save_dir })
    }

    /// Output directory.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Where the annotated version of `source` is written.
    #[must_use]
    pub fn target_for(&self, source: &Path) -> PathBuf {
        self.save_dir.join(format!("{}.png", output_stem(source)))
    }

    /// Save the annotated version of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ImageError`] if encoding or writing fails.
    pub fn save(&self, source: &Path, annotated: &RgbImage) -> Result<PathBuf> {
        let save_path = self.target_for(source);
        annotated
            .save_with_format(&save_path, image::ImageFormat::Png)
            .map_err(|e| {
                DetectError::ImageError(format!("Failed to save {}: {e}", save_path.display()))
            })?;
        Ok(save_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_stem_stops_at_first_dot() {
        assert_eq!(output_stem(Path::new("val/IMG_1.v2.jpg")), "IMG_1");
        assert_eq!(output_stem(Path::new("val/plain.jpg")), "plain");
        assert_eq!(output_stem(Path::new("val/noext")), "noext");
    }

    #[test]
    fn test_save_png() {
        let dir = std::env::temp_dir().join(format!("retail-yolo-io-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let saver = SaveResults::new(&dir).unwrap();

        let image = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        let path = saver.save(Path::new("images/a.b.jpg"), &image).unwrap();
        assert_eq!(path, dir.join("a.png"));

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded, image);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
