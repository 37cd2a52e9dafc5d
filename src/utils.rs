// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Utility functions shared by the post-processing and reporting stages.

use std::time::Duration;

/// Calculate `IoU` (Intersection over Union) between two corner boxes.
///
/// Widths and heights are pixel-inclusive (`x2 - x1 + 1`), so two identical
/// boxes always score 1.0 and touching boxes share one pixel column.
///
/// # Arguments
///
/// * `box1` - First bounding box [x1, y1, x2, y2]
/// * `box2` - Second bounding box [x1, y1, x2, y2]
///
/// # Returns
///
/// `IoU` value between 0.0 and 1.0
#[must_use]
pub fn bbox_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1 + 1.0).max(0.0) * (y2 - y1 + 1.0).max(0.0);

    let area1 = (box1[2] - box1[0] + 1.0) * (box1[3] - box1[1] + 1.0);
    let area2 = (box2[2] - box2[0] + 1.0) * (box2[3] - box2[1] + 1.0);

    intersection / (area1 + area2 - intersection + 1e-16)
}

/// Convert a center box `[cx, cy, w, h]` to corners `[x1, y1, x2, y2]`.
#[must_use]
pub fn xywh_to_xyxy(xywh: [f32; 4]) -> [f32; 4] {
    let [cx, cy, w, h] = xywh;
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// Format a duration the way a Python `timedelta` prints (`H:MM:SS.ffffff`).
#[must_use]
pub fn format_timedelta(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    let micros = duration.subsec_micros();

    if micros == 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{hours}:{mins:02}:{secs:02}.{micros:06}")
    }
}
