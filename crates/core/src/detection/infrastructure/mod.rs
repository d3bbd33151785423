pub mod arcface_embedder;
pub mod execution_provider;
pub mod face_analyzer;
pub mod math;
pub mod onnx_scrfd_detector;
