// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detection results produced by the inference loop.
//!
//! A [`Detection`] mirrors one row of the post-NMS output, an [`ImageRecord`]
//! pairs an image path with its (possibly absent) detections.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::format_timedelta;

/// A single detected object.
///
/// Coordinates are in network-input pixels until passed through
/// [`rescale_boxes`](crate::postprocessing::rescale_boxes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
    /// Objectness multiplied by the best class confidence.
    pub conf: f32,
    /// Best class confidence.
    pub cls_conf: f32,
    /// Index of the best class.
    pub cls_pred: usize,
}

impl Detection {
    /// Create a detection from corner coordinates and scores.
    #[must_use]
    pub const fn new(xyxy: [f32; 4], conf: f32, cls_conf: f32, cls_pred: usize) -> Self {
        Self {
            x1: xyxy[0],
            y1: xyxy[1],
            x2: xyxy[2],
            y2: xyxy[3],
            conf,
            cls_conf,
            cls_pred,
        }
    }

    /// Corner coordinates `[x1, y1, x2, y2]`.
    #[must_use]
    pub const fn xyxy(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// One image and whatever survived confidence filtering and NMS.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Source image path.
    pub path: PathBuf,
    /// `None` when nothing survived filtering.
    pub detections: Option<Vec<Detection>>,
}

impl ImageRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, detections: Option<Vec<Detection>>) -> Self {
        Self {
            path: path.into(),
            detections,
        }
    }

    /// Source image path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of detections (0 for `None`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.as_ref().map_or(0, Vec::len)
    }

    /// True when the record has no detections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted, deduplicated class indices present in the record.
    #[must_use]
    pub fn unique_classes(&self) -> Vec<usize> {
        let mut classes: Vec<usize> = self
            .detections
            .iter()
            .flatten()
            .map(|d| d.cls_pred)
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

/// Wall-clock timing of one inference batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTiming {
    /// Zero-based batch index.
    pub batch_index: usize,
    /// Number of images in the batch.
    pub batch_len: usize,
    /// Time since the previous batch finished (forward pass plus NMS plus loading).
    pub elapsed: Duration,
}

impl fmt::Display for BatchTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\t+ Batch {}, Inference Time: {}",
            self.batch_index,
            format_timedelta(self.elapsed)
        )
    }
}
