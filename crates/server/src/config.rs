use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use faceswap_core::detection::infrastructure::execution_provider::ExecutionBackend;
use faceswap_core::pipeline::target_face_policy::TargetFacePolicy;
use faceswap_core::shared::constants::{
    DEFAULT_DETECTION_SIZE, DEFAULT_DETECTION_THRESHOLD, DEFAULT_DETECTOR_MODEL,
    DEFAULT_JPEG_QUALITY, DETECTOR_BUNDLE_BASE_URL, SWAP_MODEL_NAME, SWAP_MODEL_URL,
};
use faceswap_core::shared::model_resolver::{default_model_dir, ModelResolveError};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const MIN_UPLOAD_BYTES: usize = 1024;

/// HTTP service that swaps the face in one image onto the face in another.
#[derive(Parser, Debug, Clone)]
#[command(name = "faceswap-server", version)]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "FACESWAP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "FACESWAP_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding cached model files (default: platform cache dir).
    #[arg(long, env = "FACESWAP_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Face analysis bundle name (SCRFD detector + ArcFace recogniser).
    #[arg(long, env = "FACESWAP_DETECTOR_MODEL", default_value = DEFAULT_DETECTOR_MODEL)]
    pub detector_model: String,

    /// Base URL the analysis bundle archive is fetched from.
    #[arg(long, env = "FACESWAP_DETECTOR_BUNDLE_URL", default_value = DETECTOR_BUNDLE_BASE_URL)]
    pub detector_bundle_url: String,

    /// Square detector input resolution in pixels.
    #[arg(long, env = "FACESWAP_DETECTION_SIZE", default_value_t = DEFAULT_DETECTION_SIZE)]
    pub detection_size: u32,

    /// Minimum detection score (0.0-1.0).
    #[arg(long, env = "FACESWAP_DETECTION_THRESHOLD", default_value_t = DEFAULT_DETECTION_THRESHOLD)]
    pub detection_threshold: f32,

    /// Swap model file (default: <model-dir>/inswapper_128.onnx).
    #[arg(long, env = "FACESWAP_SWAP_MODEL_PATH")]
    pub swap_model_path: Option<PathBuf>,

    /// Where to fetch the swap model from when it is missing.
    #[arg(long, env = "FACESWAP_SWAP_MODEL_URL", default_value = SWAP_MODEL_URL)]
    pub swap_model_url: String,

    /// Which target faces to swap: single-target-face or all-target-faces.
    #[arg(long, env = "FACESWAP_POLICY", default_value_t = TargetFacePolicy::default())]
    pub policy: TargetFacePolicy,

    /// ONNX Runtime execution provider: cpu, cuda, coreml, directml.
    #[arg(long, env = "FACESWAP_PROVIDER", default_value_t = ExecutionBackend::default())]
    pub provider: ExecutionBackend,

    /// Directory uploads are staged in.
    #[arg(long, env = "FACESWAP_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Directory of named target images for /faceswap_with_list.
    #[arg(long, env = "FACESWAP_GALLERY_DIR", default_value = "celebrities")]
    pub gallery_dir: PathBuf,

    /// Keep staged uploads and results instead of deleting them.
    #[arg(long, env = "FACESWAP_KEEP_UPLOADS")]
    pub keep_uploads: bool,

    /// JPEG quality of responses (1-100).
    #[arg(long, env = "FACESWAP_JPEG_QUALITY", default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Requests allowed to wait for the inference worker before 503.
    #[arg(long, env = "FACESWAP_QUEUE_DEPTH", default_value_t = 8)]
    pub queue_depth: usize,

    /// Seconds a request may wait for its result before 504.
    #[arg(long, env = "FACESWAP_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    #[arg(long, env = "FACESWAP_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Reject out-of-range values before any model is touched.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(format!(
                "Detection threshold must be between 0.0 and 1.0, got {}",
                self.detection_threshold
            )
            .into());
        }
        if self.detection_size == 0 || self.detection_size % 32 != 0 {
            return Err(format!(
                "Detection size must be a positive multiple of 32, got {}",
                self.detection_size
            )
            .into());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )
            .into());
        }
        if self.queue_depth == 0 {
            return Err("Queue depth must be at least 1".into());
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be at least 1 second".into());
        }
        if self.max_upload_bytes < MIN_UPLOAD_BYTES {
            return Err(format!(
                "Max upload size must be at least {MIN_UPLOAD_BYTES} bytes, got {}",
                self.max_upload_bytes
            )
            .into());
        }
        if self.detector_model.is_empty()
            || self.detector_model.contains(['/', '\\'])
            || self.detector_model == ".."
        {
            return Err(format!(
                "Detector model must be a bundle name, got '{}'",
                self.detector_model
            )
            .into());
        }
        self.bind_address()?;
        Ok(())
    }

    pub fn bind_address(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let ip: std::net::IpAddr = host
            .parse()
            .map_err(|_| format!("Host must be an IP address, got '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resolved_model_dir(&self) -> Result<PathBuf, ModelResolveError> {
        match &self.model_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_model_dir(),
        }
    }

    pub fn resolved_swap_model_path(&self, model_dir: &Path) -> PathBuf {
        self.swap_model_path
            .clone()
            .unwrap_or_else(|| model_dir.join(SWAP_MODEL_NAME))
    }
}
