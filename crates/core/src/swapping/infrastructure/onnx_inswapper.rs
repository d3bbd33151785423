/// InSwapper identity-transfer model using ONNX Runtime.
///
/// The target face is aligned to a 128×128 crop, the donor's ArcFace
/// embedding is projected through the model's `emap` matrix, and the
/// generated crop is feathered back into the full target image.
use std::path::Path;

use ndarray::{Array2, Array4};
use ort::session::Session;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::infrastructure::execution_provider::{load_session, ExecutionBackend};
use crate::detection::infrastructure::math::l2_normalize;
use crate::shared::affine::warp_affine;
use crate::shared::frame::Frame;
use crate::swapping::domain::face_swapper::FaceSwapper;
use crate::swapping::infrastructure::onnx_initializer::read_last_initializer;
use crate::swapping::infrastructure::paste_back::paste_back;

const DEFAULT_INPUT_SIZE: u32 = 128;

pub struct InSwapper {
    session: Session,
    emap: Array2<f32>,
    input_size: u32,
}

impl InSwapper {
    pub fn new(model_path: &Path, backend: ExecutionBackend) -> Result<Self, Box<dyn std::error::Error>> {
        let emap = load_emap(model_path)?;
        let session = load_session(model_path, backend)?;

        // NCHW: [1, 3, H, W]
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
            .unwrap_or(DEFAULT_INPUT_SIZE);
        if session.inputs().len() < 2 {
            return Err("swap model must take target and source inputs".into());
        }

        log::debug!("InSwapper input {input_size}px, latent {}", emap.ncols());
        Ok(Self {
            session,
            emap,
            input_size,
        })
    }
}

impl FaceSwapper for InSwapper {
    fn swap(
        &mut self,
        target: &Frame,
        target_face: &DetectedFace,
        source_face: &DetectedFace,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let latent = project_embedding(&source_face.embedding, &self.emap)?;

        let alignment = target_face
            .landmarks
            .alignment(self.input_size)
            .ok_or("Degenerate target landmarks, cannot align face")?;
        let crop = warp_affine(target, &alignment, self.input_size, self.input_size)
            .ok_or("Alignment transform is not invertible")?;

        let target_value = ort::value::Tensor::from_array(to_unit_tensor(&crop))?;
        let latent_value = ort::value::Tensor::from_array(latent)?;
        let outputs = self.session.run(ort::inputs![target_value, latent_value])?;
        let generated = outputs[0].try_extract_array::<f32>()?;

        let shape = generated.shape();
        if shape.len() != 4 || shape[1] != 3 {
            return Err(format!("unexpected swap output shape {shape:?}").into());
        }
        let (h, w) = (shape[2], shape[3]);
        let mut data = Vec::with_capacity(h * w * 3);
        for y in 0..h {
            for x in 0..w {
                for c in 0..3 {
                    data.push((generated[[0, c, y, x]] * 255.0).clamp(0.0, 255.0) as u8);
                }
            }
        }
        let swapped_crop = Frame::new(data, w as u32, h as u32, 3);

        paste_back(target, &swapped_crop, &alignment).ok_or_else(|| "Alignment transform is not invertible".into())
    }
}

fn load_emap(model_path: &Path) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
    let tensor = read_last_initializer(model_path)?;
    match tensor.dims.as_slice() {
        &[rows, cols] if rows > 0 && cols > 0 => {
            Ok(Array2::from_shape_vec((rows as usize, cols as usize), tensor.data)?)
        }
        dims => Err(format!("swap model initializer '{}' is not a matrix: {dims:?}", tensor.name).into()),
    }
}

/// Map a normalised identity embedding into the swap model's latent space:
/// `normalize(embedding · emap)`, shaped `[1, D]`.
pub fn project_embedding(embedding: &[f32], emap: &Array2<f32>) -> Result<Array2<f32>, String> {
    if embedding.len() != emap.nrows() {
        return Err(format!(
            "embedding has {} values, swap model expects {}",
            embedding.len(),
            emap.nrows()
        ));
    }
    let mut latent = ndarray::ArrayView1::from(embedding).dot(emap).to_vec();
    l2_normalize(&mut latent);
    let cols = latent.len();
    Array2::from_shape_vec((1, cols), latent).map_err(|e| e.to_string())
}

/// RGB crop → NCHW tensor scaled to `[0, 1]`.
fn to_unit_tensor(crop: &Frame) -> Array4<f32> {
    let pixels = crop.as_ndarray();
    let mut tensor = Array4::<f32>::zeros((1, 3, crop.height() as usize, crop.width() as usize));
    for ((y, x, c), &v) in pixels.indexed_iter() {
        if c < 3 {
            tensor[[0, c, y, x]] = v as f32 / 255.0;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_project_identity_emap_keeps_direction() {
        let emap = Array2::<f32>::eye(3);
        let latent = project_embedding(&[3.0, 0.0, 4.0], &emap).unwrap();
        assert_eq!(latent.shape(), &[1, 3]);
        assert_relative_eq!(latent[[0, 0]], 0.6, epsilon = 1e-6);
        assert_relative_eq!(latent[[0, 2]], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_project_uses_row_vector_product() {
        // [1, 0] · [[0, 2], [1, 0]] = [0, 2]
        let emap = array![[0.0f32, 2.0], [1.0, 0.0]];
        let latent = project_embedding(&[1.0, 0.0], &emap).unwrap();
        assert_relative_eq!(latent[[0, 0]], 0.0);
        assert_relative_eq!(latent[[0, 1]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_project_rejects_length_mismatch() {
        let emap = Array2::<f32>::eye(4);
        let err = project_embedding(&[1.0, 0.0], &emap).unwrap_err();
        assert!(err.contains("expects 4"));
    }

    #[test]
    fn test_project_empty_embedding_rejected() {
        let emap = Array2::<f32>::eye(512);
        assert!(project_embedding(&[], &emap).is_err());
    }

    #[test]
    fn test_unit_tensor_layout() {
        let mut crop = Frame::blank(4, 2);
        crop.as_ndarray_mut()[[1, 3, 2]] = 255;
        let tensor = to_unit_tensor(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_relative_eq!(tensor[[0, 2, 1, 3]], 1.0);
        assert_relative_eq!(tensor[[0, 0, 1, 3]], 0.0);
    }
}
