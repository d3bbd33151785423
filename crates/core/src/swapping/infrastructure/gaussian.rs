/// Kernels up to this size are convolved directly; larger ones use a box
/// cascade with the same sigma.
const MAX_DIRECT_KERNEL: usize = 31;
const BOX_PASSES: usize = 3;

/// Sigma OpenCV derives for a kernel when the caller passes `sigma = 0`.
pub fn opencv_sigma(kernel_size: usize) -> f64 {
    0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Precompute a normalised 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1.
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = opencv_sigma(kernel_size);
    let half = (kernel_size / 2) as f64;
    let mut kernel_f64: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel_f64.iter().sum();
    for v in &mut kernel_f64 {
        *v /= sum;
    }
    kernel_f64.iter().map(|&v| v as f32).collect()
}

/// Separable Gaussian blur of a single-channel float plane, in place.
///
/// Edge samples are clamped to the nearest valid pixel. Cost per pixel is
/// bounded for any kernel size: past [`MAX_DIRECT_KERNEL`] the Gaussian is
/// approximated by three running-sum box passes.
pub fn blur_plane(plane: &mut [f32], width: usize, height: usize, kernel_size: usize) {
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    let mut scratch = Vec::new();
    if kernel_size <= MAX_DIRECT_KERNEL {
        let kernel = gaussian_kernel_1d(kernel_size);
        filter_rows_then_columns(plane, width, height, |line| {
            scratch.clear();
            scratch.extend_from_slice(line);
            convolve_line(&scratch, line, &kernel);
        });
    } else {
        let widths = box_widths(opencv_sigma(kernel_size), BOX_PASSES);
        filter_rows_then_columns(plane, width, height, |line| {
            for &box_width in &widths {
                scratch.clear();
                scratch.extend_from_slice(line);
                box_blur_line(&scratch, line, box_width / 2);
            }
        });
    }
}

/// Morphological erosion with a `k`×`k` square of ones, in place.
///
/// The anchor sits at `k / 2` like OpenCV's default; samples outside the
/// plane are ignored rather than treated as zero. Constant cost per pixel
/// regardless of `k`.
pub fn erode_plane(plane: &mut [f32], width: usize, height: usize, k: usize) {
    if k <= 1 || width == 0 || height == 0 {
        return;
    }
    let before = k / 2;
    let after = k - 1 - before;
    let mut sliding = SlidingMin::default();
    filter_rows_then_columns(plane, width, height, |line| {
        sliding.apply(line, before, after);
    });
}

/// Run `filter` over every row, then over every column of the result.
fn filter_rows_then_columns(
    plane: &mut [f32],
    width: usize,
    height: usize,
    mut filter: impl FnMut(&mut [f32]),
) {
    for row in plane.chunks_exact_mut(width) {
        filter(row);
    }
    let mut column = vec![0.0f32; height];
    for x in 0..width {
        for (y, v) in column.iter_mut().enumerate() {
            *v = plane[y * width + x];
        }
        filter(column.as_mut_slice());
        for (y, &v) in column.iter().enumerate() {
            plane[y * width + x] = v;
        }
    }
}

fn convolve_line(src: &[f32], dst: &mut [f32], kernel: &[f32]) {
    let last = src.len() as isize - 1;
    let half = (kernel.len() / 2) as isize;
    for (x, out) in dst.iter_mut().enumerate() {
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| src[(x as isize + k as isize - half).clamp(0, last) as usize] * w)
            .sum();
    }
}

/// Odd box widths whose cascade matches a Gaussian of `sigma`.
fn box_widths(sigma: f64, passes: usize) -> Vec<usize> {
    let n = passes as f64;
    let ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();
    let mut lower = (ideal.floor() as usize).max(1);
    if lower % 2 == 0 {
        lower -= 1;
    }
    let l = lower as f64;
    let lower_count = ((12.0 * sigma * sigma - n * l * l - 4.0 * n * l - 3.0 * n) / (-4.0 * l - 4.0))
        .round()
        .clamp(0.0, n) as usize;
    (0..passes)
        .map(|i| if i < lower_count { lower } else { lower + 2 })
        .collect()
}

/// Mean over `[x - radius, x + radius]` with clamped edges, via a running sum.
fn box_blur_line(src: &[f32], dst: &mut [f32], radius: usize) {
    let last = src.len() as isize - 1;
    let at = |i: isize| src[i.clamp(0, last) as usize] as f64;
    let r = radius as isize;
    let scale = 1.0 / (2 * radius + 1) as f64;
    let mut sum: f64 = (-r..=r).map(at).sum();
    for (x, out) in dst.iter_mut().enumerate() {
        *out = (sum * scale) as f32;
        let x = x as isize;
        sum += at(x + r + 1) - at(x - r);
    }
}

/// Sliding-window minimum in the van Herk / Gil-Werman form: per-block
/// prefix and suffix minima answer any window with one comparison.
#[derive(Default)]
struct SlidingMin {
    padded: Vec<f32>,
    prefix: Vec<f32>,
    suffix: Vec<f32>,
}

impl SlidingMin {
    /// Replace each sample with the minimum over `[i - before, i + after]`.
    fn apply(&mut self, line: &mut [f32], before: usize, after: usize) {
        let k = before + after + 1;
        self.padded.clear();
        self.padded.resize(before, f32::INFINITY);
        self.padded.extend_from_slice(line);
        self.padded.resize(line.len() + k - 1, f32::INFINITY);
        let len = self.padded.len();

        self.prefix.clear();
        self.prefix.extend_from_slice(&self.padded);
        for j in 1..len {
            if j % k != 0 {
                self.prefix[j] = self.prefix[j].min(self.prefix[j - 1]);
            }
        }
        self.suffix.clear();
        self.suffix.extend_from_slice(&self.padded);
        for j in (0..len - 1).rev() {
            if (j + 1) % k != 0 {
                self.suffix[j] = self.suffix[j].min(self.suffix[j + 1]);
            }
        }

        for (i, out) in line.iter_mut().enumerate() {
            *out = self.suffix[i].min(self.prefix[i + k - 1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::time::{Duration, Instant};

    fn naive_erode(plane: &[f32], width: usize, height: usize, k: usize) -> Vec<f32> {
        let before = (k / 2) as isize;
        let after = (k - 1 - k / 2) as isize;
        (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as isize, (i / width) as isize);
                let mut m = f32::INFINITY;
                for sy in (y - before).max(0)..=(y + after).min(height as isize - 1) {
                    for sx in (x - before).max(0)..=(x + after).min(width as isize - 1) {
                        m = m.min(plane[sy as usize * width + sx as usize]);
                    }
                }
                m
            })
            .collect()
    }

    fn step_row(width: usize) -> Vec<f32> {
        (0..width).map(|x| if x < width / 2 { 0.0 } else { 1.0 }).collect()
    }

    #[test]
    fn test_opencv_sigma_matches_reference() {
        // OpenCV: ksize 11 → sigma 2.0
        assert_relative_eq!(opencv_sigma(11), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_kernel_sums_to_one() {
        let k = gaussian_kernel_1d(7);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_kernel_is_symmetric() {
        let k = gaussian_kernel_1d(7);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-6);
        }
    }

    #[rstest]
    #[case(5)]
    #[case(81)]
    fn test_blur_uniform_plane_unchanged(#[case] kernel_size: usize) {
        let mut plane = vec![0.5f32; 40 * 30];
        blur_plane(&mut plane, 40, 30, kernel_size);
        assert!(plane.iter().all(|&v| (v - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_blur_spreads_impulse() {
        let mut plane = vec![0.0f32; 9 * 9];
        plane[4 * 9 + 4] = 1.0;
        blur_plane(&mut plane, 9, 9, 5);
        assert!(plane[4 * 9 + 4] < 1.0);
        assert!(plane[4 * 9 + 5] > 0.0);
        let total: f32 = plane.iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_kernel_size_1_is_identity() {
        let mut plane: Vec<f32> = (0..25).map(|v| v as f32).collect();
        let original = plane.clone();
        blur_plane(&mut plane, 5, 5, 1);
        assert_eq!(plane, original);
    }

    #[test]
    fn test_box_widths_are_odd_and_match_variance() {
        let sigma = opencv_sigma(201);
        let widths = box_widths(sigma, BOX_PASSES);
        assert_eq!(widths.len(), 3);
        assert!(widths.iter().all(|w| w % 2 == 1));
        // Each box of width w contributes (w² - 1) / 12 to the variance
        let variance: f64 = widths.iter().map(|&w| ((w * w - 1) as f64) / 12.0).sum();
        assert_relative_eq!(variance.sqrt(), sigma, max_relative = 0.05);
    }

    #[test]
    fn test_large_kernel_blur_tracks_exact_gaussian() {
        let width = 400;
        let kernel_size = 101;
        let mut approx_row = step_row(width);
        blur_plane(&mut approx_row, width, 1, kernel_size);

        let original = step_row(width);
        let mut exact_row = vec![0.0; width];
        convolve_line(&original, &mut exact_row, &gaussian_kernel_1d(kernel_size));

        let worst = approx_row
            .iter()
            .zip(&exact_row)
            .map(|(a, e)| (a - e).abs())
            .fold(0.0f32, f32::max);
        assert!(worst < 0.03, "max deviation {worst}");
        assert!(approx_row[width / 2 - 30] > 0.0 && approx_row[width / 2 + 30] < 1.0);
    }

    #[test]
    fn test_erode_shrinks_square() {
        // 5x5 block of ones inside a 9x9 plane
        let mut plane = vec![0.0f32; 81];
        for y in 2..7 {
            for x in 2..7 {
                plane[y * 9 + x] = 1.0;
            }
        }
        erode_plane(&mut plane, 9, 9, 3);
        let ones: Vec<(usize, usize)> = (0..81)
            .filter(|&i| plane[i] == 1.0)
            .map(|i| (i % 9, i / 9))
            .collect();
        assert_eq!(ones.len(), 9);
        assert!(ones.iter().all(|&(x, y)| (3..6).contains(&x) && (3..6).contains(&y)));
    }

    #[test]
    fn test_erode_ignores_outside_samples() {
        let mut plane = vec![1.0f32; 16];
        erode_plane(&mut plane, 4, 4, 3);
        assert!(plane.iter().all(|&v| v == 1.0));
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(4)]
    #[case(7)]
    #[case(30)]
    fn test_erode_matches_brute_force(#[case] k: usize) {
        let (width, height) = (23, 17);
        let plane: Vec<f32> = (0..width * height)
            .map(|i| ((i * 37 + i / 5) % 11) as f32)
            .collect();
        let expected = naive_erode(&plane, width, height, k);
        let mut actual = plane.clone();
        erode_plane(&mut actual, width, height, k);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_large_kernels_cost_is_independent_of_size() {
        let (width, height) = (2000, 2000);
        let mut plane = vec![0.0f32; width * height];
        for y in 300..1700 {
            plane[y * width + 300..y * width + 1700].fill(1.0);
        }

        let started = Instant::now();
        erode_plane(&mut plane, width, height, 400);
        blur_plane(&mut plane, width, height, 401);
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
        assert!(plane[1000 * width + 1000] > 0.99);
        assert!(plane[10 * width + 10] < 1e-3);
    }
}
