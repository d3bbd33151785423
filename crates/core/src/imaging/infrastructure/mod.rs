pub mod jpeg_frame_encoder;
pub mod rgb_image_decoder;
