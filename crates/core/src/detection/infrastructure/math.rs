//! Shared math utilities for detection infrastructure.
//!
//! Provides greedy non-maximum suppression and vector normalisation used by
//! the detector and the embedder.

use crate::shared::bounding_box::BoundingBox;

/// Greedy NMS: visit boxes by descending score, keep a box unless it overlaps
/// an already-kept box by more than `iou_thresh`.
///
/// Returns indices of kept boxes in descending score order.
pub fn nms(boxes: &[BoundingBox], scores: &[f32], iou_thresh: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    for idx in order {
        if keep
            .iter()
            .all(|&kept| boxes[kept].iou(&boxes[idx]) <= iou_thresh)
        {
            keep.push(idx);
        }
    }
    keep
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
