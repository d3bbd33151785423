//! 5-point face landmarks and their alignment to the canonical ArcFace layout.
//!
//! Point order: left eye, right eye, nose tip, left mouth corner, right mouth
//! corner (from the viewer's perspective).

use crate::shared::affine::AffineMatrix;
use crate::shared::constants::{ARCFACE_INPUT_SIZE, ARCFACE_TEMPLATE};

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    /// Divides every point by `factor`; used to undo a detector resize.
    pub fn unscale(&self, factor: f64) -> Self {
        Self::new(self.points.map(|(x, y)| (x / factor, y / factor)))
    }

    /// Similarity transform mapping these landmarks onto the ArcFace template
    /// for a square crop of `crop_size` pixels.
    ///
    /// Sizes divisible by 112 scale the template; any other size keeps the
    /// 112 layout scaled by `size / 128` and shifts it right by `8 * ratio`,
    /// which is how 128-pixel swap crops are framed.
    pub fn alignment(&self, crop_size: u32) -> Option<AffineMatrix> {
        let (ratio, diff_x) = if crop_size % ARCFACE_INPUT_SIZE == 0 {
            (crop_size as f64 / ARCFACE_INPUT_SIZE as f64, 0.0)
        } else {
            let ratio = crop_size as f64 / 128.0;
            (ratio, 8.0 * ratio)
        };
        let template = ARCFACE_TEMPLATE.map(|(x, y)| (x * ratio + diff_x, y * ratio));
        AffineMatrix::estimate_similarity(&self.points, &template)
    }
}
