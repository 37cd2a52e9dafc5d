// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the detection demo.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for demo operations.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Main error type for the detection demo.
#[derive(Debug)]
pub enum DetectError {
    /// Network failure while fetching an asset.
    DownloadError(String),
    /// Dataset archive could not be extracted.
    ArchiveError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Missing or malformed Darknet model definition.
    ModelDefinitionError(String),
    /// Error loading the checkpoint into a runtime session.
    ModelLoadError(String),
    /// Checkpoint shapes disagree with the model definition.
    IncompatibleCheckpoint(String),
    /// Error during the forward pass.
    InferenceError(String),
    /// Error decoding or encoding images.
    ImageError(String),
    /// Error while drawing detections.
    AnnotationError(String),
    /// More distinct classes in one image than palette colors.
    PaletteExhausted {
        /// Distinct classes found in the image.
        classes: usize,
        /// Colors available in the palette.
        palette: usize,
    },
    /// Visualizer error.
    VisualizerError(String),
    /// The output directory holds nothing to present.
    NothingToShow(PathBuf),
    /// IO error with context.
    IoError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloadError(msg) => write!(f, "Download error: {msg}"),
            Self::ArchiveError(msg) => write!(f, "Archive error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::ModelDefinitionError(msg) => write!(f, "Model definition error: {msg}"),
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::IncompatibleCheckpoint(msg) => write!(f, "Incompatible checkpoint: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::AnnotationError(msg) => write!(f, "Annotation error: {msg}"),
            Self::PaletteExhausted { classes, palette } => write!(
                f,
                "Palette exhausted: {classes} distinct classes but only {palette} colors"
            ),
            Self::VisualizerError(msg) => write!(f, "Visualizer error: {msg}"),
            Self::NothingToShow(dir) => {
                write!(f, "Nothing to show: no files in '{}'", dir.display())
            }
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DetectError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<zip::result::ZipError> for DetectError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::ArchiveError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectError::ModelLoadError("test".to_string());
        assert_eq!(err.to_string(), "Model load error: test");

        let err = DetectError::PaletteExhausted {
            classes: 21,
            palette: 20,
        };
        assert_eq!(
            err.to_string(),
            "Palette exhausted: 21 distinct classes but only 20 colors"
        );

        let err = DetectError::NothingToShow(PathBuf::from("output"));
        assert_eq!(err.to_string(), "Nothing to show: no files in 'output'");
    }

    #[test]
    fn test_io_source_is_preserved() {
        use std::error::Error;

        let err = DetectError::from(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
        assert!(DetectError::ConfigError("x".to_string()).source().is_none());
    }
}
