use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("model archive {0} contains no .onnx files")]
    EmptyBundle(PathBuf),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Ensure a single model file exists at `path`, downloading it from `url`
/// only when it is missing. An existing file is never re-fetched.
pub fn ensure_file(
    path: &Path,
    url: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if path.is_file() {
        log::debug!("Model present at {}", path.display());
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    log::info!("Downloading {url} to {}", path.display());
    download(url, path, progress)?;
    Ok(path.to_path_buf())
}

/// Ensure the model bundle `identifier` is unpacked under `model_dir`.
///
/// Resolution order:
/// 1. `{model_dir}/{identifier}/` already holding at least one `.onnx` file
/// 2. `{model_dir}/{identifier}.zip` left from an earlier download
/// 3. Download `{base_url}/{identifier}.zip`, then extract
pub fn ensure_bundle(
    model_dir: &Path,
    identifier: &str,
    base_url: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let bundle_dir = model_dir.join(identifier);
    if contains_onnx(&bundle_dir) {
        log::debug!("Model bundle present at {}", bundle_dir.display());
        return Ok(bundle_dir);
    }

    create_dir(model_dir)?;
    let archive = model_dir.join(format!("{identifier}.zip"));
    if !archive.is_file() {
        let url = format!("{}/{identifier}.zip", base_url.trim_end_matches('/'));
        log::info!("Downloading model bundle {url}");
        download(&url, &archive, progress)?;
    }

    let extracted = extract_bundle(&archive, &bundle_dir)?;
    log::info!(
        "Extracted {extracted} model file(s) into {}",
        bundle_dir.display()
    );
    let _ = fs::remove_file(&archive);
    Ok(bundle_dir)
}

/// Unpack every `.onnx` entry of a zip archive into `dest`, flattening any
/// directory prefix. Extraction goes through a `.part` directory that is
/// renamed into place, so a crash never leaves a half-populated bundle.
pub fn extract_bundle(archive_path: &Path, dest: &Path) -> Result<usize, ModelResolveError> {
    let archive_err = |source| ModelResolveError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };
    let file = fs::File::open(archive_path).map_err(|e| ModelResolveError::Write {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(archive_err)?;

    let staging = dest.with_extension("part");
    let _ = fs::remove_dir_all(&staging);
    create_dir(&staging)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_err)?;
        if entry.is_dir() {
            continue;
        }
        let Some(file_name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_owned()))
        else {
            continue;
        };
        if Path::new(&file_name).extension().and_then(|e| e.to_str()) != Some("onnx") {
            continue;
        }

        let out_path = staging.join(&file_name);
        let write_err = |e| ModelResolveError::Write {
            path: out_path.clone(),
            source: e,
        };
        let mut out = fs::File::create(&out_path).map_err(write_err)?;
        std::io::copy(&mut entry, &mut out).map_err(write_err)?;
        extracted += 1;
    }

    if extracted == 0 {
        let _ = fs::remove_dir_all(&staging);
        return Err(ModelResolveError::EmptyBundle(archive_path.to_path_buf()));
    }

    let _ = fs::remove_dir_all(dest);
    fs::rename(&staging, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    Ok(extracted)
}

/// Platform-specific default model directory.
///
/// - macOS: `~/Library/Application Support/FaceSwap/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceSwap/models/` or `~/.cache/FaceSwap/models/`
/// - Windows: `%LOCALAPPDATA%/FaceSwap/models/`
pub fn default_model_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceSwap").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceSwap").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn contains_onnx(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|e| {
                e.path().extension().and_then(|ext| ext.to_str()) == Some("onnx")
            })
        })
        .unwrap_or(false)
}

fn create_dir(path: &Path) -> Result<(), ModelResolveError> {
    fs::create_dir_all(path).map_err(|e| ModelResolveError::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    // Clean up .part file on any error
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    // Swap models are a few hundred MB; stream instead of buffering.
    let mut reader = response;
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
