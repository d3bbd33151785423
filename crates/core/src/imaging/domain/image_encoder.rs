use crate::shared::frame::Frame;

/// Domain interface for serialising a result frame.
pub trait ImageEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// MIME type of the bytes produced by [`ImageEncoder::encode`].
    fn content_type(&self) -> &'static str;
}
