use faceswap_core::pipeline::target_face_policy::TargetFacePolicy;

use crate::gallery::ReferenceGallery;
use crate::uploads::UploadStore;
use crate::worker::WorkerHandle;

/// Service context shared by every handler.
pub struct AppState {
    pub worker: WorkerHandle,
    pub uploads: UploadStore,
    pub gallery: ReferenceGallery,
    pub policy: TargetFacePolicy,
    pub content_type: &'static str,
}
