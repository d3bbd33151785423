use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;

/// One face found in an image: where it is, how confident the detector was,
/// its five landmarks, and an L2-normalised identity embedding.
///
/// The embedding is empty when the detector does not compute identities.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub score: f32,
    pub landmarks: FaceLandmarks,
    pub embedding: Vec<f32>,
}

impl DetectedFace {
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}
