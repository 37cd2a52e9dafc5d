// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing for raw detector output.
//!
//! The network emits one `(cx, cy, w, h, objectness, class scores...)` row
//! per anchor. [`non_max_suppression`] turns those rows into merged
//! [`Detection`]s per image and [`rescale_boxes`] maps them from the padded
//! square input back onto the original image.

#![allow(clippy::cast_precision_loss)]

use ndarray::{ArrayView1, ArrayView3, s};

use crate::error::{DetectError, Result};
use crate::results::Detection;
use crate::utils::{bbox_iou, xywh_to_xyxy};

/// Confidence filtering and merging NMS over a `(batch, rows, 5 + classes)` tensor.
///
/// For each image:
/// 1. rows with objectness below `conf_thres` are dropped;
/// 2. each survivor is scored as objectness × best class confidence and
///    sorted by that score, highest first;
/// 3. the head box absorbs every remaining box of its class whose IoU with
///    it exceeds `nms_thres`, itself included, and is replaced by the
///    confidence-weighted mean of the absorbed boxes;
/// 4. step 3 repeats on what is left.
///
/// # Arguments
///
/// * `prediction` - Raw network output.
/// * `conf_thres` - Objectness threshold.
/// * `nms_thres` - IoU threshold for merging.
///
/// # Returns
///
/// One entry per image, `None` when nothing survived.
///
/// # Errors
///
/// Returns [`DetectError::InferenceError`] if rows are too short to hold a
/// box, objectness and at least one class score.
pub fn non_max_suppression(
    prediction: ArrayView3<'_, f32>,
    conf_thres: f32,
    nms_thres: f32,
) -> Result<Vec<Option<Vec<Detection>>>> {
    let features = prediction.shape()[2];
    if features < 6 {
        return Err(DetectError::InferenceError(format!(
            "Prediction rows have {features} values, expected at least 6"
        )));
    }

    Ok(prediction
        .outer_iter()
        .map(|image_pred| {
            let candidates: Vec<Detection> = image_pred
                .outer_iter()
                .filter(|row| row[4] >= conf_thres)
                .map(candidate_from_row)
                .collect();
            let kept = merge_overlapping(candidates, nms_thres);
            if kept.is_empty() { None } else { Some(kept) }
        })
        .collect())
}

/// Build a detection from one raw row.
fn candidate_from_row(row: ArrayView1<'_, f32>) -> Detection {
    let xyxy = xywh_to_xyxy([row[0], row[1], row[2], row[3]]);
    let objectness = row[4];

    // first maximum wins on ties; NaN never beats a number
    let (cls_pred, cls_conf) = row
        .slice(s![5..])
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, score)| {
            if score > best.1 { (i, score) } else { best }
        });
    let cls_conf = if cls_conf.is_finite() { cls_conf } else { 0.0 };

    Detection::new(xyxy, objectness * cls_conf, cls_conf, cls_pred)
}

/// Greedy merge over candidates; returns kept boxes in score order.
fn merge_overlapping(mut candidates: Vec<Detection>, nms_thres: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.conf.total_cmp(&a.conf));

    let mut keep = Vec::new();
    while let Some(head) = candidates.first().copied() {
        let head_box = head.xyxy();
        let absorbed: Vec<bool> = candidates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                i == 0 || (d.cls_pred == head.cls_pred && bbox_iou(&head_box, &d.xyxy()) > nms_thres)
            })
            .collect();

        let mut weighted = [0.0f32; 4];
        let mut weight_sum = 0.0f32;
        for (d, _) in candidates.iter().zip(&absorbed).filter(|(_, a)| **a) {
            for (acc, v) in weighted.iter_mut().zip(d.xyxy()) {
                *acc += d.conf * v;
            }
            weight_sum += d.conf;
        }
        let merged = if weight_sum > 0.0 {
            weighted.map(|v| v / weight_sum)
        } else {
            head_box
        };

        keep.push(Detection::new(merged, head.conf, head.cls_conf, head.cls_pred));

        let mut flags = absorbed.into_iter();
        candidates.retain(|_| !flags.next().unwrap_or(false));
    }
    keep
}

/// Map boxes from the padded `current_dim × current_dim` input back to the
/// original image.
///
/// # Arguments
///
/// * `detections` - Boxes in network-input pixels.
/// * `current_dim` - Side of the square network input.
/// * `original_shape` - Original image `(height, width)`.
///
/// # Returns
///
/// Rescaled copies of `detections`; scores and classes are unchanged.
#[must_use]
pub fn rescale_boxes(
    detections: &[Detection],
    current_dim: usize,
    original_shape: (u32, u32),
) -> Vec<Detection> {
    let (orig_h, orig_w) = (original_shape.0 as f32, original_shape.1 as f32);
    let current = current_dim as f32;
    let ratio = current / orig_h.max(orig_w);

    let pad_x = (orig_h - orig_w).max(0.0) * ratio;
    let pad_y = (orig_w - orig_h).max(0.0) * ratio;
    let unpad_w = current - pad_x;
    let unpad_h = current - pad_y;
    let off_x = (pad_x / 2.0).floor();
    let off_y = (pad_y / 2.0).floor();

    detections
        .iter()
        .map(|d| Detection {
            x1: (d.x1 - off_x) / unpad_w * orig_w,
            y1: (d.y1 - off_y) / unpad_h * orig_h,
            x2: (d.x2 - off_x) / unpad_w * orig_w,
            y2: (d.y2 - off_y) / unpad_h * orig_h,
            ..*d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// Build a `(1, rows, 5 + classes)` prediction.
    fn prediction(rows: &[[f32; 7]]) -> Array3<f32> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Array3::from_shape_vec((1, rows.len(), 7), flat).unwrap()
    }

    #[test]
    fn test_single_detection_survives() {
        let pred = prediction(&[[100.0, 100.0, 40.0, 40.0, 0.9, 1.0, 0.0]]);
        let out = non_max_suppression(pred.view(), 0.6, 0.4).unwrap();
        let dets = out[0].as_ref().unwrap();
        assert_eq!(dets.len(), 1);
        for (a, b) in dets[0].xyxy().iter().zip([80.0, 80.0, 120.0, 120.0]) {
            assert!((a - b).abs() < 1e-3);
        }
        assert!((dets[0].conf - 0.9).abs() < 1e-6);
        assert_eq!(dets[0].cls_pred, 0);
    }

    #[test]
    fn test_low_objectness_yields_none() {
        let pred = prediction(&[[10.0, 10.0, 4.0, 4.0, 0.3, 1.0, 0.0]]);
        let out = non_max_suppression(pred.view(), 0.6, 0.4).unwrap();
        assert_eq!(out, vec![None]);
    }

    #[test]
    fn test_overlapping_same_class_merged() {
        // IoU above 0.9 between the two boxes
        let pred = prediction(&[
            [100.0, 100.0, 100.0, 100.0, 0.7, 1.0, 0.0],
            [102.0, 100.0, 100.0, 100.0, 0.65, 1.0, 0.0],
        ]);
        let out = non_max_suppression(pred.view(), 0.6, 0.4).unwrap();
        let dets = out[0].as_ref().unwrap();
        assert_eq!(dets.len(), 1);
        assert!((dets[0].conf - 0.7).abs() < 1e-6);
        // weighted mean sits between the two boxes, nearer the stronger one
        assert!(dets[0].x1 > 50.0 && dets[0].x1 < 51.0);
        assert!(dets[0].x1 < 50.0 + 2.0 * 0.65 / 1.35 + 1e-3);
    }

    #[test]
    fn test_different_classes_not_merged() {
        let pred = prediction(&[
            [100.0, 100.0, 100.0, 100.0, 0.9, 1.0, 0.0],
            [100.0, 100.0, 100.0, 100.0, 0.8, 0.0, 1.0],
        ]);
        let out = non_max_suppression(pred.view(), 0.5, 0.4).unwrap();
        let dets = out[0].as_ref().unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].cls_pred, 0);
        assert_eq!(dets[1].cls_pred, 1);
    }

    #[test]
    fn test_nms_threshold_of_one_still_terminates() {
        let pred = prediction(&[
            [10.0, 10.0, 4.0, 4.0, 0.9, 1.0, 0.0],
            [10.0, 10.0, 4.0, 4.0, 0.8, 1.0, 0.0],
        ]);
        let out = non_max_suppression(pred.view(), 0.5, 1.0).unwrap();
        assert_eq!(out[0].as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_output_sorted_by_score() {
        let pred = prediction(&[
            [10.0, 10.0, 4.0, 4.0, 0.7, 1.0, 0.0],
            [200.0, 200.0, 4.0, 4.0, 0.95, 1.0, 0.0],
        ]);
        let out = non_max_suppression(pred.view(), 0.5, 0.4).unwrap();
        let dets = out[0].as_ref().unwrap();
        assert!(dets[0].conf >= dets[1].conf);
        assert!((dets[0].x1 - 198.0).abs() < 1e-3);
    }

    #[test]
    fn test_short_rows_rejected() {
        let pred = Array3::<f32>::zeros((1, 3, 5));
        assert!(non_max_suppression(pred.view(), 0.5, 0.4).is_err());
    }

    #[test]
    fn test_rescale_identity_for_square_original() {
        let d = Detection::new([10.0, 20.0, 300.0, 400.0], 0.9, 0.9, 0);
        let out = rescale_boxes(&[d], 416, (416, 416));
        for (a, b) in out[0].xyxy().iter().zip(d.xyxy()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_rescale_wide_original() {
        // 832x416 original: vertical padding of 104 px at 416 input
        let d = Detection::new([0.0, 104.0, 416.0, 312.0], 0.9, 0.9, 0);
        let out = rescale_boxes(&[d], 416, (416, 832));
        let expected = [0.0, 0.0, 832.0, 416.0];
        for (a, b) in out[0].xyxy().iter().zip(expected) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_rescale_tall_original() {
        // 416x832 original: horizontal padding of 104 px at 416 input
        let d = Detection::new([104.0, 0.0, 312.0, 416.0], 0.9, 0.9, 0);
        let out = rescale_boxes(&[d], 416, (832, 416));
        let expected = [0.0, 0.0, 416.0, 832.0];
        for (a, b) in out[0].xyxy().iter().zip(expected) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }
}
