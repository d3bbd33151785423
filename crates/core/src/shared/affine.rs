//! 2×3 affine transforms: similarity estimation from point pairs, inversion,
//! and bilinear warping of RGB frames.
//!
//! Conventions follow OpenCV's `warpAffine`: the matrix maps source pixel
//! coordinates to destination pixel coordinates, sampling uses the inverse,
//! and pixels sampled outside the source read as zero.

use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineMatrix(pub [[f64; 3]; 2]);

impl AffineMatrix {
    pub fn identity() -> Self {
        Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    /// Least-squares similarity (rotation, uniform scale, translation) that
    /// maps `src` onto `dst`. Reflections are never produced.
    ///
    /// Returns `None` when the source points are all coincident.
    pub fn estimate_similarity(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Self> {
        let n = src.len().min(dst.len());
        if n == 0 {
            return None;
        }
        let nf = n as f64;
        let (smx, smy) = src[..n]
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        let (dmx, dmy) = dst[..n]
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        let (smx, smy, dmx, dmy) = (smx / nf, smy / nf, dmx / nf, dmy / nf);

        let mut norm = 0.0;
        let mut dot = 0.0;
        let mut cross = 0.0;
        for i in 0..n {
            let (sx, sy) = (src[i].0 - smx, src[i].1 - smy);
            let (dx, dy) = (dst[i].0 - dmx, dst[i].1 - dmy);
            norm += sx * sx + sy * sy;
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
        }
        if norm <= f64::EPSILON {
            return None;
        }

        let a = dot / norm;
        let b = cross / norm;
        let tx = dmx - (a * smx - b * smy);
        let ty = dmy - (b * smx + a * smy);
        Some(Self([[a, -b, tx], [b, a, ty]]))
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.0;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    /// Inverse transform, or `None` if the linear part is singular.
    pub fn invert(&self) -> Option<Self> {
        let m = &self.0;
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        if det.abs() <= f64::EPSILON {
            return None;
        }
        let a = m[1][1] / det;
        let b = -m[0][1] / det;
        let c = -m[1][0] / det;
        let d = m[0][0] / det;
        let tx = -(a * m[0][2] + b * m[1][2]);
        let ty = -(c * m[0][2] + d * m[1][2]);
        Some(Self([[a, b, tx], [c, d, ty]]))
    }

    /// Uniform scale factor of a similarity transform.
    pub fn scale(&self) -> f64 {
        let m = &self.0;
        (m[0][0] * m[0][0] + m[1][0] * m[1][0]).sqrt()
    }
}

/// Bilinear sample of an RGB frame at a fractional coordinate.
///
/// Neighbours outside the frame contribute zero, so samples straddling the
/// border fade toward black like OpenCV's constant border.
pub fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> [f32; 3] {
    let w = frame.width() as i64;
    let h = frame.height() as i64;
    let channels = frame.channels() as usize;
    let data = frame.data();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let mut out = [0.0f32; 3];
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    for (tx, ty, weight) in taps {
        if weight == 0.0 || tx < 0 || ty < 0 || tx >= w || ty >= h {
            continue;
        }
        let offset = (ty as usize * w as usize + tx as usize) * channels;
        for (c, acc) in out.iter_mut().enumerate() {
            *acc += data[offset + c.min(channels - 1)] as f32 * weight;
        }
    }
    out
}

/// Coverage in `[0, 1]` of a bilinear sample at `(x, y)` over a `w`×`h`
/// plane of ones; equivalent to warping an all-white image.
pub fn coverage_bilinear(w: u32, h: u32, x: f64, y: f64) -> f32 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;
    let inside = |px: i64, py: i64| px >= 0 && py >= 0 && px < w as i64 && py < h as i64;

    let mut total = 0.0;
    if inside(x0, y0) {
        total += (1.0 - fx) * (1.0 - fy);
    }
    if inside(x0 + 1, y0) {
        total += fx * (1.0 - fy);
    }
    if inside(x0, y0 + 1) {
        total += (1.0 - fx) * fy;
    }
    if inside(x0 + 1, y0 + 1) {
        total += fx * fy;
    }
    total
}

/// Warp `src` into a new `out_w`×`out_h` RGB frame using `matrix`
/// (source → destination).
pub fn warp_affine(src: &Frame, matrix: &AffineMatrix, out_w: u32, out_h: u32) -> Option<Frame> {
    let inverse = matrix.invert()?;
    let mut out = Frame::blank(out_w, out_h);
    let row_len = out_w as usize * 3;
    let data = out.data_mut();
    for y in 0..out_h as usize {
        for x in 0..out_w as usize {
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            let px = sample_bilinear(src, sx, sy);
            let offset = y * row_len + x * 3;
            for c in 0..3 {
                data[offset + c] = px[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Some(out)
}
