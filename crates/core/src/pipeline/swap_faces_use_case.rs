use std::time::Instant;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::FaceDetector;
use crate::imaging::domain::image_decoder::ImageDecoder;
use crate::imaging::domain::image_encoder::ImageEncoder;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::swap_error::{ImageSide, SwapError};
use crate::pipeline::target_face_policy::TargetFacePolicy;
use crate::shared::frame::Frame;
use crate::swapping::domain::face_swapper::FaceSwapper;

/// Face swap pipeline: decode → detect → swap → encode.
///
/// The donor is always the primary source face. Target faces are chosen by
/// the configured [`TargetFacePolicy`]; with several, each swap's output
/// becomes the next swap's target.
pub struct SwapFacesUseCase {
    decoder: Box<dyn ImageDecoder>,
    encoder: Box<dyn ImageEncoder>,
    detector: Box<dyn FaceDetector>,
    swapper: Box<dyn FaceSwapper>,
    policy: TargetFacePolicy,
    logger: Box<dyn PipelineLogger>,
}

impl SwapFacesUseCase {
    pub fn new(
        decoder: Box<dyn ImageDecoder>,
        encoder: Box<dyn ImageEncoder>,
        detector: Box<dyn FaceDetector>,
        swapper: Box<dyn FaceSwapper>,
        policy: TargetFacePolicy,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            decoder,
            encoder,
            detector,
            swapper,
            policy,
            logger,
        }
    }

    pub fn policy(&self) -> TargetFacePolicy {
        self.policy
    }

    pub fn content_type(&self) -> &'static str {
        self.encoder.content_type()
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    /// Swap the primary face of `source` onto `target` and return the
    /// encoded result.
    pub fn execute(&mut self, source: &[u8], target: &[u8]) -> Result<Vec<u8>, SwapError> {
        let started = Instant::now();
        let source_frame = self.decode(source, ImageSide::Source)?;
        let target_frame = self.decode(target, ImageSide::Target)?;
        self.logger
            .timing("decode", started.elapsed().as_secs_f64() * 1000.0);

        let result = self.swap_frames(&source_frame, &target_frame)?;

        let encode_start = Instant::now();
        let bytes = self
            .encoder
            .encode(&result)
            .map_err(|e| SwapError::inference("encode", e))?;
        self.logger
            .timing("encode", encode_start.elapsed().as_secs_f64() * 1000.0);
        self.logger
            .timing("total", started.elapsed().as_secs_f64() * 1000.0);
        Ok(bytes)
    }

    /// Detection and swapping on already-decoded frames.
    ///
    /// Fails before the swapper is invoked if either frame has no face.
    pub fn swap_frames(&mut self, source: &Frame, target: &Frame) -> Result<Frame, SwapError> {
        let detect_start = Instant::now();
        let source_faces = self.detect(source, ImageSide::Source)?;
        let target_faces = self.detect(target, ImageSide::Target)?;
        self.logger
            .timing("detect", detect_start.elapsed().as_secs_f64() * 1000.0);

        let donor = &source_faces[0];
        if !donor.has_embedding() {
            return Err(SwapError::inference(
                "detect",
                "source face has no identity embedding",
            ));
        }

        let selected = self.policy.select(&target_faces);
        self.logger.metric("target_faces", target_faces.len() as f64);
        self.logger.metric("swapped_faces", selected.len() as f64);

        let swap_start = Instant::now();
        let mut current = target.clone();
        for target_face in selected {
            current = self
                .swapper
                .swap(&current, target_face, donor)
                .map_err(|e| SwapError::inference("swap", e))?;
        }
        self.logger
            .timing("swap", swap_start.elapsed().as_secs_f64() * 1000.0);

        Ok(current)
    }

    fn decode(&self, bytes: &[u8], side: ImageSide) -> Result<Frame, SwapError> {
        self.decoder
            .decode(bytes)
            .map_err(|e| SwapError::InvalidImage {
                side,
                reason: e.to_string(),
            })
    }

    fn detect(&mut self, frame: &Frame, side: ImageSide) -> Result<Vec<DetectedFace>, SwapError> {
        let faces = self
            .detector
            .detect(frame)
            .map_err(|e| SwapError::inference("detect", e))?;
        if faces.is_empty() {
            return Err(SwapError::NoFaceDetected { side });
        }
        log::debug!("{} face(s) in {side} image", faces.len());
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::bounding_box::BoundingBox;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    /// Decodes `[w, h, fill]` into a solid frame; anything else fails.
    struct StubDecoder;

    impl ImageDecoder for StubDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
            match bytes {
                &[w, h, fill] => Ok(Frame::new(
                    vec![fill; w as usize * h as usize * 3],
                    w as u32,
                    h as u32,
                    3,
                )),
                _ => Err("not a stub image".into()),
            }
        }
    }

    /// Emits `[w, h, first byte]`.
    struct StubEncoder;

    impl ImageEncoder for StubEncoder {
        fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            Ok(vec![frame.width() as u8, frame.height() as u8, frame.data()[0]])
        }

        fn content_type(&self) -> &'static str {
            "application/x-stub"
        }
    }

    /// Reports one face per 10 units of the first pixel's red value.
    struct StubDetector {
        calls: Arc<Mutex<usize>>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
            *self.calls.lock().unwrap() += 1;
            let count = frame.data()[0] / 10;
            Ok((0..count).map(|i| face(i as f32)).collect())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
            Err("session lost".into())
        }
    }

    /// Adds one to every byte and records the target face offsets it saw.
    struct RecordingSwapper {
        calls: Arc<Mutex<Vec<f32>>>,
    }

    impl FaceSwapper for RecordingSwapper {
        fn swap(
            &mut self,
            target: &Frame,
            target_face: &DetectedFace,
            source_face: &DetectedFace,
        ) -> Result<Frame, Box<dyn std::error::Error>> {
            assert!(source_face.has_embedding());
            self.calls.lock().unwrap().push(target_face.bbox.x1);
            let data = target.data().iter().map(|v| v.saturating_add(1)).collect();
            Ok(Frame::new(data, target.width(), target.height(), 3))
        }
    }

    struct FailingSwapper;

    impl FaceSwapper for FailingSwapper {
        fn swap(
            &mut self,
            _target: &Frame,
            _target_face: &DetectedFace,
            _source_face: &DetectedFace,
        ) -> Result<Frame, Box<dyn std::error::Error>> {
            Err("generator failed".into())
        }
    }

    // --- Helpers ---

    fn face(offset: f32) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox::new(offset, 0.0, offset + 10.0, 10.0),
            score: 0.9 - offset * 0.01,
            landmarks: FaceLandmarks::new([(f64::from(offset), 0.0); 5]),
            embedding: vec![1.0, 0.0],
        }
    }

    struct Harness {
        use_case: SwapFacesUseCase,
        detect_calls: Arc<Mutex<usize>>,
        swap_calls: Arc<Mutex<Vec<f32>>>,
    }

    fn harness(policy: TargetFacePolicy) -> Harness {
        let detect_calls = Arc::new(Mutex::new(0));
        let swap_calls = Arc::new(Mutex::new(Vec::new()));
        let use_case = SwapFacesUseCase::new(
            Box::new(StubDecoder),
            Box::new(StubEncoder),
            Box::new(StubDetector {
                calls: detect_calls.clone(),
            }),
            Box::new(RecordingSwapper {
                calls: swap_calls.clone(),
            }),
            policy,
            Box::new(NullPipelineLogger),
        );
        Harness {
            use_case,
            detect_calls,
            swap_calls,
        }
    }

    // --- Tests ---

    #[test]
    fn test_single_face_each_swaps_once() {
        let mut h = harness(TargetFacePolicy::SingleTargetFace);
        let out = h.use_case.execute(&[8, 6, 10], &[20, 12, 10]).unwrap();
        assert_eq!(out, vec![20, 12, 11]);
        assert_eq!(*h.swap_calls.lock().unwrap(), vec![0.0]);
    }

    #[test]
    fn test_single_policy_uses_primary_target_face_only() {
        let mut h = harness(TargetFacePolicy::SingleTargetFace);
        h.use_case.execute(&[4, 4, 10], &[4, 4, 30]).unwrap();
        assert_eq!(*h.swap_calls.lock().unwrap(), vec![0.0]);
    }

    #[test]
    fn test_all_policy_swaps_every_target_face_in_order() {
        let mut h = harness(TargetFacePolicy::AllTargetFaces);
        let out = h.use_case.execute(&[4, 4, 10], &[30, 20, 30]).unwrap();
        assert_eq!(*h.swap_calls.lock().unwrap(), vec![0.0, 1.0, 2.0]);
        // Each swap threads the previous output: 30 + 3
        assert_eq!(out, vec![30, 20, 33]);
    }

    #[test]
    fn test_output_dimensions_preserved() {
        let mut h = harness(TargetFacePolicy::AllTargetFaces);
        let source = Frame::new(vec![10; 5 * 5 * 3], 5, 5, 3);
        let target = Frame::new(vec![20; 17 * 9 * 3], 17, 9, 3);
        let out = h.use_case.swap_frames(&source, &target).unwrap();
        assert_eq!(out.dimensions(), (17, 9));
    }

    #[test]
    fn test_no_source_face_skips_swap() {
        let mut h = harness(TargetFacePolicy::SingleTargetFace);
        let err = h.use_case.execute(&[4, 4, 0], &[4, 4, 10]).unwrap_err();
        assert!(matches!(
            err,
            SwapError::NoFaceDetected {
                side: ImageSide::Source
            }
        ));
        assert!(h.swap_calls.lock().unwrap().is_empty());
        // Target detection is skipped once the source has no face
        assert_eq!(*h.detect_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_no_target_face_skips_swap() {
        let mut h = harness(TargetFacePolicy::AllTargetFaces);
        let err = h.use_case.execute(&[4, 4, 10], &[4, 4, 5]).unwrap_err();
        assert!(matches!(
            err,
            SwapError::NoFaceDetected {
                side: ImageSide::Target
            }
        ));
        assert!(h.swap_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_source_is_invalid_image() {
        let mut h = harness(TargetFacePolicy::SingleTargetFace);
        let err = h.use_case.execute(b"garbage", &[4, 4, 10]).unwrap_err();
        assert!(matches!(
            err,
            SwapError::InvalidImage {
                side: ImageSide::Source,
                ..
            }
        ));
        assert_eq!(*h.detect_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_undecodable_target_is_invalid_image() {
        let mut h = harness(TargetFacePolicy::SingleTargetFace);
        let err = h.use_case.execute(&[4, 4, 10], b"").unwrap_err();
        assert!(matches!(
            err,
            SwapError::InvalidImage {
                side: ImageSide::Target,
                ..
            }
        ));
    }

    #[test]
    fn test_detector_failure_is_inference_error() {
        let mut uc = SwapFacesUseCase::new(
            Box::new(StubDecoder),
            Box::new(StubEncoder),
            Box::new(FailingDetector),
            Box::new(FailingSwapper),
            TargetFacePolicy::SingleTargetFace,
            Box::new(NullPipelineLogger),
        );
        let err = uc.execute(&[4, 4, 10], &[4, 4, 10]).unwrap_err();
        assert!(matches!(err, SwapError::Inference { stage: "detect", .. }));
    }

    #[test]
    fn test_swapper_failure_is_inference_error() {
        let mut uc = SwapFacesUseCase::new(
            Box::new(StubDecoder),
            Box::new(StubEncoder),
            Box::new(StubDetector {
                calls: Arc::new(Mutex::new(0)),
            }),
            Box::new(FailingSwapper),
            TargetFacePolicy::SingleTargetFace,
            Box::new(NullPipelineLogger),
        );
        let err = uc.execute(&[4, 4, 10], &[4, 4, 10]).unwrap_err();
        assert!(matches!(err, SwapError::Inference { stage: "swap", .. }));
    }

    #[test]
    fn test_repeated_requests_are_identical() {
        let mut h = harness(TargetFacePolicy::AllTargetFaces);
        let first = h.use_case.execute(&[4, 4, 10], &[6, 6, 20]).unwrap();
        let second = h.use_case.execute(&[4, 4, 10], &[6, 6, 20]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exposes_encoder_content_type_and_policy() {
        let h = harness(TargetFacePolicy::AllTargetFaces);
        assert_eq!(h.use_case.content_type(), "application/x-stub");
        assert_eq!(h.use_case.policy(), TargetFacePolicy::AllTargetFaces);
    }
}
