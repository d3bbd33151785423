use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use faceswap_core::detection::infrastructure::face_analyzer::{FaceAnalyzer, ModelBundle};
use faceswap_core::imaging::infrastructure::jpeg_frame_encoder::JpegFrameEncoder;
use faceswap_core::imaging::infrastructure::rgb_image_decoder::RgbImageDecoder;
use faceswap_core::pipeline::pipeline_logger::LogPipelineLogger;
use faceswap_core::pipeline::swap_faces_use_case::SwapFacesUseCase;
use faceswap_core::shared::model_resolver::{ensure_bundle, ensure_file, ModelResolveError, ProgressFn};
use faceswap_core::swapping::infrastructure::onnx_inswapper::InSwapper;

use crate::config::ServerConfig;

/// Failures that stop the service before it starts listening.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelResolveError),
    #[error("invalid model bundle: {0}")]
    InvalidBundle(String),
    #[error("failed to load {what}: {reason}")]
    ModelLoad { what: &'static str, reason: String },
}

/// Resolve every model artifact, fetching missing ones, and assemble the
/// swap pipeline. Blocks until all sessions are loaded.
pub fn build_use_case(config: &ServerConfig) -> Result<SwapFacesUseCase, StartupError> {
    let model_dir = config.resolved_model_dir()?;

    log::info!("Resolving face analysis bundle: {}", config.detector_model);
    let bundle_dir = ensure_bundle(
        &model_dir,
        &config.detector_model,
        &config.detector_bundle_url,
        Some(download_progress("face analysis bundle")),
    )?;
    let bundle = ModelBundle::locate(&bundle_dir).map_err(StartupError::InvalidBundle)?;

    let swap_path = config.resolved_swap_model_path(&model_dir);
    log::info!("Resolving swap model: {}", swap_path.display());
    ensure_file(
        &swap_path,
        &config.swap_model_url,
        Some(download_progress("swap model")),
    )?;

    let detector = FaceAnalyzer::load(
        &bundle,
        config.provider,
        config.detection_size,
        config.detection_threshold,
    )
    .map_err(|e| StartupError::ModelLoad {
        what: "face analysis models",
        reason: e.to_string(),
    })?;
    let swapper = InSwapper::new(&swap_path, config.provider).map_err(|e| StartupError::ModelLoad {
        what: "swap model",
        reason: e.to_string(),
    })?;

    Ok(SwapFacesUseCase::new(
        Box::new(RgbImageDecoder::new()),
        Box::new(JpegFrameEncoder::new(config.jpeg_quality)),
        Box::new(detector),
        Box::new(swapper),
        config.policy,
        Box::new(LogPipelineLogger::new()),
    ))
}

/// Logs download progress in 10% steps (or every 10 MiB without a length).
fn download_progress(label: &'static str) -> ProgressFn {
    const STEP_BYTES: u64 = 10 * 1024 * 1024;
    let last_step = AtomicU64::new(0);
    Box::new(move |downloaded, total| {
        let step = if total > 0 {
            downloaded * 10 / total
        } else {
            downloaded / STEP_BYTES
        };
        if last_step.swap(step, Ordering::Relaxed) != step {
            if total > 0 {
                log::info!("Downloading {label}... {}%", step * 10);
            } else {
                log::info!("Downloading {label}... {downloaded} bytes");
            }
        }
    })
}
