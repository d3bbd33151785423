//! Face analysis bundle: SCRFD localisation followed by ArcFace embedding.

use std::fs;
use std::path::{Path, PathBuf};

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::arcface_embedder::ArcFaceEmbedder;
use crate::detection::infrastructure::execution_provider::ExecutionBackend;
use crate::detection::infrastructure::onnx_scrfd_detector::ScrfdDetector;
use crate::shared::frame::Frame;

/// Recogniser file names, most preferred first.
const RECOGNIZER_MODELS: &[&str] = &["w600k_r50.onnx", "w600k_mbf.onnx", "glintr100.onnx"];

/// Model files found in an unpacked analysis bundle directory.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelBundle {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
}

impl ModelBundle {
    /// Pick the `det_*.onnx` detector and a known ArcFace recogniser.
    pub fn locate(dir: &Path) -> Result<Self, String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .map_err(|e| format!("cannot read model bundle {}: {e}", dir.display()))?
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.ends_with(".onnx"))
            .collect();
        names.sort();

        let detector = names
            .iter()
            .find(|n| n.starts_with("det_"))
            .ok_or_else(|| format!("no det_*.onnx detector in {}", dir.display()))?;
        let recognizer = RECOGNIZER_MODELS
            .iter()
            .find(|candidate| names.iter().any(|n| n == *candidate))
            .ok_or_else(|| format!("no ArcFace recogniser in {}", dir.display()))?;

        Ok(Self {
            detector: dir.join(detector),
            recognizer: dir.join(recognizer),
        })
    }
}

/// [`FaceDetector`] that returns faces with identity embeddings attached.
pub struct FaceAnalyzer {
    detector: ScrfdDetector,
    embedder: ArcFaceEmbedder,
}

impl FaceAnalyzer {
    pub fn new(detector: ScrfdDetector, embedder: ArcFaceEmbedder) -> Self {
        Self { detector, embedder }
    }

    pub fn load(
        bundle: &ModelBundle,
        backend: ExecutionBackend,
        detection_size: u32,
        threshold: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = ScrfdDetector::new(&bundle.detector, backend, detection_size, threshold)?;
        let embedder = ArcFaceEmbedder::new(&bundle.recognizer, backend)?;
        Ok(Self::new(detector, embedder))
    }
}

impl FaceDetector for FaceAnalyzer {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        let mut faces = self.detector.locate(frame)?;
        for face in &mut faces {
            face.embedding = self.embedder.embed(frame, &face.landmarks)?;
        }
        log::debug!("Analyzed {} face(s)", faces.len());
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"onnx").unwrap();
    }

    #[test]
    fn test_locate_buffalo_l_layout() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "1k3d68.onnx",
            "2d106det.onnx",
            "det_10g.onnx",
            "genderage.onnx",
            "w600k_r50.onnx",
        ] {
            touch(tmp.path(), name);
        }
        let bundle = ModelBundle::locate(tmp.path()).unwrap();
        assert_eq!(bundle.detector, tmp.path().join("det_10g.onnx"));
        assert_eq!(bundle.recognizer, tmp.path().join("w600k_r50.onnx"));
    }

    #[test]
    fn test_locate_prefers_listed_recognizer_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "det_500m.onnx");
        touch(tmp.path(), "glintr100.onnx");
        touch(tmp.path(), "w600k_mbf.onnx");
        let bundle = ModelBundle::locate(tmp.path()).unwrap();
        assert_eq!(bundle.recognizer, tmp.path().join("w600k_mbf.onnx"));
    }

    #[test]
    fn test_locate_missing_detector() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "w600k_r50.onnx");
        let err = ModelBundle::locate(tmp.path()).unwrap_err();
        assert!(err.contains("det_"));
    }

    #[test]
    fn test_locate_missing_recognizer() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "det_10g.onnx");
        let err = ModelBundle::locate(tmp.path()).unwrap_err();
        assert!(err.contains("recogniser"));
    }

    #[test]
    fn test_locate_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(ModelBundle::locate(&tmp.path().join("absent")).is_err());
    }
}
