use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::imaging::domain::image_encoder::ImageEncoder;
use crate::shared::constants::{DEFAULT_JPEG_QUALITY, JPEG_CONTENT_TYPE};
use crate::shared::frame::Frame;

/// Baseline JPEG encoder for RGB frames.
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    /// `quality` is clamped to the encoder's valid `1..=100` range.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
        }
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality).encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    fn content_type(&self) -> &'static str {
        JPEG_CONTENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        Frame::new(data, width, height, 3)
    }

    #[test]
    fn test_output_is_jpeg_with_same_dimensions() {
        let bytes = JpegFrameEncoder::default().encode(&gradient(40, 30)).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(JpegFrameEncoder::default().content_type(), "image/jpeg");
    }

    #[rstest]
    #[case(0, 1)]
    #[case(90, 90)]
    #[case(255, 100)]
    fn test_quality_clamped(#[case] requested: u8, #[case] expected: u8) {
        assert_eq!(JpegFrameEncoder::new(requested).quality, expected);
    }

    #[test]
    fn test_higher_quality_is_larger() {
        let frame = gradient(64, 64);
        let low = JpegFrameEncoder::new(10).encode(&frame).unwrap();
        let high = JpegFrameEncoder::new(100).encode(&frame).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn test_rejects_non_rgb() {
        let frame = Frame::new(vec![0; 16], 2, 2, 4);
        assert!(JpegFrameEncoder::default().encode(&frame).is_err());
    }
}
