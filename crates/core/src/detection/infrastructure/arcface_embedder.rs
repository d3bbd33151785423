/// ArcFace identity embedder using ONNX Runtime.
///
/// Aligns each face to the canonical 112×112 crop from its five landmarks and
/// returns an L2-normalised embedding. The swap model consumes this
/// embedding as the donor identity.
use std::path::Path;

use ort::session::Session;

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::infrastructure::execution_provider::{load_session, ExecutionBackend};
use crate::detection::infrastructure::math::l2_normalize;
use crate::shared::affine::warp_affine;
use crate::shared::constants::ARCFACE_INPUT_SIZE;
use crate::shared::frame::Frame;

const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEmbedder {
    session: Session,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path, backend: ExecutionBackend) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path, backend)?,
        })
    }

    pub fn embed(
        &mut self,
        frame: &Frame,
        landmarks: &FaceLandmarks,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let crop = align_crop(frame, landmarks)?;
        let input_value = ort::value::Tensor::from_array(preprocess(&crop))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;

        let mut embedding: Vec<f32> = embedding_array.iter().copied().collect();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

fn align_crop(frame: &Frame, landmarks: &FaceLandmarks) -> Result<Frame, Box<dyn std::error::Error>> {
    let matrix = landmarks
        .alignment(ARCFACE_INPUT_SIZE)
        .ok_or("Degenerate landmarks, cannot align face")?;
    warp_affine(frame, &matrix, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE)
        .ok_or_else(|| "Alignment transform is not invertible".into())
}

/// Normalise an aligned RGB crop into an NCHW tensor.
fn preprocess(crop: &Frame) -> ndarray::Array4<f32> {
    let size = crop.width() as usize;
    let pixels = crop.as_ndarray();
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, crop.height() as usize, size));
    for ((y, x, c), &v) in pixels.indexed_iter() {
        tensor[[0, c, y, x]] = (v as f32 - NORM_MEAN) / NORM_STD;
    }
    tensor
}
