use std::io::Cursor;

use crate::imaging::domain::image_decoder::ImageDecoder;
use crate::shared::frame::Frame;

/// Decodes any container the `image` crate recognises into packed RGB.
///
/// Alpha is dropped and grayscale is expanded. The crate's default decoder
/// limits apply, so oversized images fail instead of exhausting memory.
pub struct RgbImageDecoder;

impl RgbImageDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RgbImageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for RgbImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
        if bytes.is_empty() {
            return Err("empty image payload".into());
        }
        let img = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?
            .to_rgb8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err("image has zero width or height".into());
        }
        Ok(Frame::new(img.into_raw(), width, height, 3))
    }
}
