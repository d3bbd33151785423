/// SCRFD face detector using ONNX Runtime via `ort`.
///
/// Handles resize-into-canvas preprocessing, anchor decoding for every
/// feature stride, NMS, and mapping back to original frame coordinates.
/// Produces faces without embeddings; see `FaceAnalyzer` for identities.
use std::path::Path;

use ort::session::Session;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::infrastructure::execution_provider::{load_session, ExecutionBackend};
use crate::detection::infrastructure::math::nms;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// NMS IoU threshold used by the reference SCRFD post-processing.
const NMS_IOU_THRESH: f32 = 0.4;

const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;

/// Output layout of an SCRFD export, derived from its output count.
#[derive(Clone, Debug, PartialEq)]
struct OutputLayout {
    strides: Vec<u32>,
    anchors_per_cell: usize,
}

impl OutputLayout {
    /// SCRFD exports group outputs as `[scores.., boxes.., keypoints..]`,
    /// one tensor per stride in each group.
    fn from_output_count(count: usize) -> Result<Self, String> {
        match count {
            9 => Ok(Self {
                strides: vec![8, 16, 32],
                anchors_per_cell: 2,
            }),
            15 => Ok(Self {
                strides: vec![8, 16, 32, 64, 128],
                anchors_per_cell: 1,
            }),
            6 | 10 => Err("detector model has no landmark outputs; alignment needs 5 keypoints".into()),
            other => Err(format!("unsupported SCRFD output count: {other}")),
        }
    }
}

pub struct ScrfdDetector {
    session: Session,
    layout: OutputLayout,
    input_size: u32,
    threshold: f32,
}

impl ScrfdDetector {
    /// Load an SCRFD ONNX model.
    ///
    /// `input_size` is used when the model's spatial input dimensions are
    /// dynamic, which is the case for the bundled `det_10g` export.
    pub fn new(
        model_path: &Path,
        backend: ExecutionBackend,
        input_size: u32,
        threshold: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path, backend)?;
        let layout = OutputLayout::from_output_count(session.outputs().len())?;

        // NCHW: [1, 3, H, W]; dynamic dims are reported as -1
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(input_size);

        Ok(Self {
            session,
            layout,
            input_size,
            threshold,
        })
    }

    /// Detect faces, ordered by descending score.
    pub fn locate(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let (input_tensor, scale) = resize_to_canvas(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let levels = self.layout.strides.len();
        if outputs.len() < levels * 3 {
            return Err(format!(
                "SCRFD produced {} outputs, expected {}",
                outputs.len(),
                levels * 3
            )
            .into());
        }

        let mut candidates = Vec::new();
        for (idx, &stride) in self.layout.strides.iter().enumerate() {
            let scores = flatten(&outputs[idx])?;
            let boxes = flatten(&outputs[idx + levels])?;
            let keypoints = flatten(&outputs[idx + levels * 2])?;
            candidates.extend(decode_level(
                &LevelOutputs {
                    scores: &scores,
                    boxes: &boxes,
                    keypoints: &keypoints,
                },
                stride,
                self.input_size,
                self.layout.anchors_per_cell,
                self.threshold,
            ));
        }

        Ok(finalize(candidates, scale))
    }
}

fn flatten(value: &ort::value::DynValue) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let array = value.try_extract_array::<f32>()?;
    Ok(array.iter().copied().collect())
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize a frame preserving aspect ratio into the top-left corner of a
/// `size`×`size` black canvas, then normalise to an NCHW float tensor.
///
/// Returns `(tensor, scale)` where `scale` maps original → canvas pixels.
fn resize_to_canvas(frame: &Frame, size: u32) -> (ndarray::Array4<f32>, f32) {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let (new_w, new_h) = if fh / fw > 1.0 {
        (((size as f32) * fw / fh) as u32, size)
    } else {
        (size, ((size as f32) * fh / fw) as u32)
    };
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));
    let scale = new_h as f32 / fh;

    let pad = (0.0 - INPUT_MEAN) / INPUT_STD;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, size as usize, size as usize), pad);

    let resized = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .map(|img| image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle));
    if let Some(resized) = resized {
        for (x, y, px) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (px[c] as f32 - INPUT_MEAN) / INPUT_STD;
            }
        }
    }

    (tensor, scale)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct LevelOutputs<'a> {
    /// One score per anchor.
    scores: &'a [f32],
    /// Four distances (left, top, right, bottom) per anchor, in stride units.
    boxes: &'a [f32],
    /// Ten offsets (x, y for five landmarks) per anchor, in stride units.
    keypoints: &'a [f32],
}

struct Candidate {
    bbox: BoundingBox,
    score: f32,
    landmarks: [(f64, f64); 5],
}

/// Anchor centers in canvas pixels, row-major, each repeated
/// `anchors_per_cell` times consecutively.
fn anchor_centers(input_size: u32, stride: u32, anchors_per_cell: usize) -> Vec<(f32, f32)> {
    let cells = (input_size / stride) as usize;
    let mut centers = Vec::with_capacity(cells * cells * anchors_per_cell);
    for y in 0..cells {
        for x in 0..cells {
            let center = ((x as u32 * stride) as f32, (y as u32 * stride) as f32);
            for _ in 0..anchors_per_cell {
                centers.push(center);
            }
        }
    }
    centers
}

fn decode_level(
    level: &LevelOutputs<'_>,
    stride: u32,
    input_size: u32,
    anchors_per_cell: usize,
    threshold: f32,
) -> Vec<Candidate> {
    let s = stride as f32;
    anchor_centers(input_size, stride, anchors_per_cell)
        .into_iter()
        .enumerate()
        .filter_map(|(i, (cx, cy))| {
            let score = *level.scores.get(i)?;
            if score < threshold {
                return None;
            }
            let d = level.boxes.get(i * 4..i * 4 + 4)?;
            let k = level.keypoints.get(i * 10..i * 10 + 10)?;
            let bbox = BoundingBox::new(
                cx - d[0] * s,
                cy - d[1] * s,
                cx + d[2] * s,
                cy + d[3] * s,
            );
            let mut landmarks = [(0.0f64, 0.0f64); 5];
            for (p, point) in landmarks.iter_mut().enumerate() {
                *point = (
                    (cx + k[p * 2] * s) as f64,
                    (cy + k[p * 2 + 1] * s) as f64,
                );
            }
            Some(Candidate {
                bbox,
                score,
                landmarks,
            })
        })
        .collect()
}

/// Suppress overlaps, undo the canvas scale, and order by score.
fn finalize(candidates: Vec<Candidate>, scale: f32) -> Vec<DetectedFace> {
    let boxes: Vec<BoundingBox> = candidates.iter().map(|c| c.bbox).collect();
    let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
    nms(&boxes, &scores, NMS_IOU_THRESH)
        .into_iter()
        .map(|i| {
            let c = &candidates[i];
            DetectedFace {
                bbox: c.bbox.unscale(scale),
                score: c.score,
                landmarks: FaceLandmarks::new(c.landmarks).unscale(scale as f64),
                embedding: Vec::new(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
