pub mod gaussian;
pub mod onnx_initializer;
pub mod onnx_inswapper;
pub mod paste_back;
