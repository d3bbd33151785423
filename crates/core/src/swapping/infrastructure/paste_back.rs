//! Compositing of a swapped face crop back into the full target image.
//!
//! The crop is warped through the inverse alignment together with a white
//! coverage mask. The mask is thresholded, eroded and feathered with a
//! Gaussian so the seam fades into the surrounding pixels, then used as the
//! per-pixel alpha. Only the rectangle the crop lands on (plus the feather
//! margin) is touched.

use crate::shared::affine::{coverage_bilinear, sample_bilinear, AffineMatrix};
use crate::shared::frame::Frame;
use crate::swapping::infrastructure::gaussian::{blur_plane, erode_plane};

/// Warped mask values above this (0-255 scale) count as fully covered.
const MASK_THRESHOLD: f32 = 20.0;

/// Kernel sizes derived from the extent of the warped mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatherKernels {
    pub erode: usize,
    pub blur: usize,
}

impl FeatherKernels {
    /// `mask_size` is `sqrt(h * w)` of the covered region's extent.
    pub fn for_mask_size(mask_size: usize) -> Self {
        let erode = (mask_size / 10).max(10);
        let blur = 2 * (mask_size / 20).max(5) + 1;
        Self { erode, blur }
    }
}

/// Integer pixel rectangle, end-exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Region {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Region {
    fn width(&self) -> usize {
        self.x1 - self.x0
    }

    fn height(&self) -> usize {
        self.y1 - self.y0
    }

    fn expand(&self, margin: usize, width: usize, height: usize) -> Self {
        Self {
            x0: self.x0.saturating_sub(margin),
            y0: self.y0.saturating_sub(margin),
            x1: (self.x1 + margin).min(width),
            y1: (self.y1 + margin).min(height),
        }
    }
}

/// Blend `crop` into `target`.
///
/// `alignment` maps target coordinates into crop coordinates (the same
/// transform used to cut the crop). Returns `None` if it is singular.
/// A crop that lands entirely outside the target leaves it unchanged.
pub fn paste_back(target: &Frame, crop: &Frame, alignment: &AffineMatrix) -> Option<Frame> {
    let inverse = alignment.invert()?;
    let (tw, th) = (target.width() as usize, target.height() as usize);

    let Some(bounds) = mapped_bounds(&inverse, crop, tw, th) else {
        return Some(target.clone());
    };

    let coverage = CoverageMask::build(&bounds, crop, alignment);
    let Some(extent) = coverage.extent() else {
        return Some(target.clone());
    };
    let mask_size = ((extent.0 * extent.1) as f64).sqrt() as usize;
    let kernels = FeatherKernels::for_mask_size(mask_size);

    let region = bounds.expand(kernels.blur, tw, th);
    let (rw, rh) = (region.width(), region.height());
    let mut mask = vec![0.0f32; rw * rh];
    let (dx, dy) = (bounds.x0 - region.x0, bounds.y0 - region.y0);
    for (y, row) in coverage.cells.chunks_exact(bounds.width()).enumerate() {
        let start = (y + dy) * rw + dx;
        for (out, &covered) in mask[start..start + row.len()].iter_mut().zip(row) {
            if covered {
                *out = 1.0;
            }
        }
    }
    erode_plane(&mut mask, rw, rh, kernels.erode);
    blur_plane(&mut mask, rw, rh, kernels.blur);

    let mut output = target.clone();
    let channels = target.channels() as usize;
    let data = output.data_mut();
    for y in 0..rh {
        for x in 0..rw {
            let alpha = mask[y * rw + x].clamp(0.0, 1.0);
            if alpha <= 0.0 {
                continue;
            }
            let (tx, ty) = (region.x0 + x, region.y0 + y);
            let (cx, cy) = alignment.apply(tx as f64, ty as f64);
            let fake = sample_bilinear(crop, cx, cy);
            let offset = (ty * tw + tx) * channels;
            for c in 0..channels.min(3) {
                let fake = fake[c].round().clamp(0.0, 255.0);
                let original = data[offset + c] as f32;
                let blended = alpha * fake + (1.0 - alpha) * original;
                data[offset + c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Some(output)
}

/// Bounding rectangle of the crop's corners mapped into the target, padded
/// by one pixel for bilinear spill and clamped to the target.
fn mapped_bounds(inverse: &AffineMatrix, crop: &Frame, width: usize, height: usize) -> Option<Region> {
    let (cw, ch) = (crop.width() as f64, crop.height() as f64);
    let corners = [(0.0, 0.0), (cw, 0.0), (0.0, ch), (cw, ch)].map(|(x, y)| inverse.apply(x, y));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor() - 1.0;
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor() - 1.0;
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil() + 1.0;
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil() + 1.0;

    let x0 = min_x.max(0.0) as usize;
    let y0 = min_y.max(0.0) as usize;
    let x1 = (max_x.max(0.0) as usize).min(width);
    let y1 = (max_y.max(0.0) as usize).min(height);
    (x0 < x1 && y0 < y1).then_some(Region { x0, y0, x1, y1 })
}

/// Thresholded warp of a white crop-sized square over `bounds`.
struct CoverageMask {
    bounds: Region,
    cells: Vec<bool>,
}

impl CoverageMask {
    fn build(bounds: &Region, crop: &Frame, alignment: &AffineMatrix) -> Self {
        let mut cells = Vec::with_capacity(bounds.width() * bounds.height());
        for y in bounds.y0..bounds.y1 {
            for x in bounds.x0..bounds.x1 {
                let (cx, cy) = alignment.apply(x as f64, y as f64);
                cells.push(
                    coverage_bilinear(crop.width(), crop.height(), cx, cy) * 255.0 > MASK_THRESHOLD,
                );
            }
        }
        Self {
            bounds: *bounds,
            cells,
        }
    }

    /// `(height, width)` spans (max index minus min index) of covered cells.
    fn extent(&self) -> Option<(usize, usize)> {
        let width = self.bounds.width();
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut any = false;
        for (i, &covered) in self.cells.iter().enumerate() {
            if !covered {
                continue;
            }
            let (x, y) = (i % width, i / width);
            any = true;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        any.then(|| (max_y - min_y, max_x - min_x))
    }
}
