use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::Frame;

/// Domain interface for identity transfer.
///
/// Replaces the identity of `target_face` inside `target` with the identity
/// carried by `source_face.embedding`, returning a new frame of the same
/// dimensions. Pixels far from the target face are left untouched.
pub trait FaceSwapper: Send {
    fn swap(
        &mut self,
        target: &Frame,
        target_face: &DetectedFace,
        source_face: &DetectedFace,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
