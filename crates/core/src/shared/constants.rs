/// Face-analysis bundle used when none is configured.
pub const DEFAULT_DETECTOR_MODEL: &str = "buffalo_l";
/// Bundle archives are fetched from `{base}/{identifier}.zip`.
pub const DETECTOR_BUNDLE_BASE_URL: &str =
    "https://github.com/deepinsight/insightface/releases/download/v0.7";

pub const SWAP_MODEL_NAME: &str = "inswapper_128.onnx";
pub const SWAP_MODEL_URL: &str =
    "https://huggingface.co/ezioruan/inswapper_128.onnx/resolve/main/inswapper_128.onnx";

/// Square input resolution of the SCRFD detector.
pub const DEFAULT_DETECTION_SIZE: u32 = 640;
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.5;

/// Canonical five-point landmark layout of a 112×112 ArcFace crop:
/// left eye, right eye, nose tip, left mouth corner, right mouth corner.
pub const ARCFACE_TEMPLATE: [(f64, f64); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];
pub const ARCFACE_INPUT_SIZE: u32 = 112;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
