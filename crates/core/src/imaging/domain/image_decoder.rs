use crate::shared::frame::Frame;

/// Domain interface for turning uploaded bytes into an RGB frame.
///
/// The container format is sniffed from the bytes, never from a file name
/// or declared content type.
pub trait ImageDecoder: Send {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>>;
}
