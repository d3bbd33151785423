use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// Which ONNX Runtime execution provider backs model sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionBackend {
    #[default]
    Cpu,
    Cuda,
    CoreMl,
    DirectMl,
}

impl ExecutionBackend {
    pub const ALL: &[ExecutionBackend] = &[
        ExecutionBackend::Cpu,
        ExecutionBackend::Cuda,
        ExecutionBackend::CoreMl,
        ExecutionBackend::DirectMl,
    ];

    /// Providers to register, in priority order.
    ///
    /// ONNX Runtime falls back to CPU if an accelerator is unavailable, so an
    /// empty list means plain CPU execution.
    pub fn execution_providers(self) -> Vec<ExecutionProviderDispatch> {
        match self {
            ExecutionBackend::Cpu => vec![],
            ExecutionBackend::Cuda => {
                vec![ort::execution_providers::CUDAExecutionProvider::default().build()]
            }
            ExecutionBackend::CoreMl => {
                vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
            }
            ExecutionBackend::DirectMl => {
                vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
            }
        }
    }
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionBackend::Cpu => "cpu",
            ExecutionBackend::Cuda => "cuda",
            ExecutionBackend::CoreMl => "coreml",
            ExecutionBackend::DirectMl => "directml",
        };
        f.write_str(name)
    }
}

impl FromStr for ExecutionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutionBackend::Cpu),
            "cuda" | "gpu" => Ok(ExecutionBackend::Cuda),
            "coreml" => Ok(ExecutionBackend::CoreMl),
            "directml" | "dml" => Ok(ExecutionBackend::DirectMl),
            other => Err(format!(
                "unknown execution provider '{other}', expected one of: cpu, cuda, coreml, directml"
            )),
        }
    }
}

/// Open an ONNX model with full graph optimisation on the given backend.
pub fn load_session(
    model_path: &Path,
    backend: ExecutionBackend,
) -> Result<Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(backend.execution_providers())?
        .commit_from_file(model_path)?;
    log::info!(
        "Loaded {} on {backend}",
        model_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    );
    Ok(session)
}
