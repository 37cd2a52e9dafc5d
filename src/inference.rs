// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration.
//!
//! [`InferenceConfig`] groups the knobs shared by the batch iterator, the
//! runtime session and the NMS stage: thresholds, batch geometry and
//! thread counts.

use crate::error::{DetectError, Result};

/// Configuration for a detection run.
///
/// # Example
///
/// ```rust
/// use retail_yolo_demo::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_confidence(0.5)
///     .with_iou(0.45)
///     .with_batch_size(4)
///     .with_imgsz(416);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Minimum objectness for a prediction row to enter NMS.
    pub confidence_threshold: f32,
    /// IoU above which a same-class box is merged into the current head box.
    pub iou_threshold: f32,
    /// Images per forward pass.
    pub batch_size: usize,
    /// Decode workers for the batch iterator. `0` decodes on the calling thread.
    pub num_workers: usize,
    /// Side of the square network input.
    pub imgsz: usize,
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose the optimal number.
    pub num_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            iou_threshold: 0.4,
            batch_size: 1,
            num_workers: 0,
            imgsz: 416,
            num_threads: 0,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the objectness threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Rows with objectness below this value are dropped.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the IoU threshold for Non-Maximum Suppression (NMS).
    ///
    /// # Arguments
    ///
    /// * `threshold` - Overlap above which two same-class boxes are merged.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the number of images per forward pass.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of decode workers.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    /// Set the square network input size.
    #[must_use]
    pub const fn with_imgsz(mut self, size: usize) -> Self {
        self.imgsz = size;
        self
    }

    /// Set the number of threads for inference.
    ///
    /// # Arguments
    ///
    /// * `threads` - The number of intra-op threads. Set to `0` for auto-configuration.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Reject settings that cannot produce a batch.
    ///
    /// Thresholds outside `[0, 1]` are only reported; they still flow through
    /// to NMS unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ConfigError`] when `batch_size` or `imgsz` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DetectError::ConfigError(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.imgsz == 0 {
            return Err(DetectError::ConfigError(
                "img_size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("conf_thres", self.confidence_threshold),
            ("nms_thres", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                crate::warn!("{name}={value} is outside [0, 1]");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = InferenceConfig::default();
        assert!((config.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.num_workers, 0);
        assert_eq!(config.imgsz, 416);
    }

    #[test]
    fn test_config_builder() {
        let config = InferenceConfig::new()
            .with_confidence(0.5)
            .with_iou(0.6)
            .with_batch_size(8)
            .with_workers(2)
            .with_imgsz(320)
            .with_threads(4);

        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.imgsz, 320);
        assert_eq!(config.num_threads, 4);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let err = InferenceConfig::new().with_batch_size(0).validate();
        assert!(matches!(err, Err(DetectError::ConfigError(_))));

        let err = InferenceConfig::new().with_imgsz(0).validate();
        assert!(matches!(err, Err(DetectError::ConfigError(_))));
    }

    #[test]
    fn test_validate_allows_out_of_range_thresholds() {
        let config = InferenceConfig::new().with_confidence(1.5).with_iou(-0.1);
        assert!(config.validate().is_ok());
    }
}
