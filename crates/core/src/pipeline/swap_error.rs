use std::fmt;

use thiserror::Error;

/// Which uploaded image an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSide {
    Source,
    Target,
}

impl fmt::Display for ImageSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageSide::Source => "source",
            ImageSide::Target => "target",
        })
    }
}

/// Request-scoped failures of the swap pipeline.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("invalid {side} image data: {reason}")]
    InvalidImage { side: ImageSide, reason: String },

    #[error("Face not detected in {side} image")]
    NoFaceDetected { side: ImageSide },

    #[error("{stage} failed: {reason}")]
    Inference { stage: &'static str, reason: String },
}

impl SwapError {
    pub(crate) fn inference(stage: &'static str, err: impl fmt::Display) -> Self {
        SwapError::Inference {
            stage,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_face_message_names_side() {
        let err = SwapError::NoFaceDetected {
            side: ImageSide::Target,
        };
        assert_eq!(err.to_string(), "Face not detected in target image");
    }

    #[test]
    fn test_inference_message_carries_stage() {
        let err = SwapError::inference("swap", "session exploded");
        assert_eq!(err.to_string(), "swap failed: session exploded");
    }
}
