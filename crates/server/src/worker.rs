//! Single inference thread that exclusively owns the swap pipeline.
//!
//! ONNX sessions are not shared between requests: handlers submit jobs over
//! a bounded channel and await a oneshot reply. A full channel is reported
//! as busy immediately, and a reply that does not arrive within the request
//! timeout is reported as timed out. Jobs whose requester already gave up
//! are skipped rather than run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use axum::body::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::oneshot;

use faceswap_core::pipeline::swap_faces_use_case::SwapFacesUseCase;

use crate::error::ApiError;

type JobOutcome = Result<Vec<u8>, ApiError>;

struct SwapJob {
    source: Bytes,
    target: Bytes,
    reply: oneshot::Sender<JobOutcome>,
}

/// Cloneable submission side of the inference worker.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: Sender<SwapJob>,
    timeout: Duration,
}

impl WorkerHandle {
    /// Queue a swap and wait for its encoded result.
    pub async fn submit(&self, source: Bytes, target: Bytes) -> JobOutcome {
        let (reply, outcome) = oneshot::channel();
        match self.sender.try_send(SwapJob {
            source,
            target,
            reply,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(ApiError::Busy),
            Err(TrySendError::Disconnected(_)) => {
                return Err(ApiError::Internal("inference worker has stopped".into()))
            }
        }

        match tokio::time::timeout(self.timeout, outcome).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApiError::Internal(
                "inference worker dropped the job".into(),
            )),
            Err(_) => Err(ApiError::Timeout),
        }
    }

    /// Jobs waiting to be picked up.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(0)
    }
}

/// Start the worker thread. It exits once every [`WorkerHandle`] is dropped.
pub fn spawn(
    use_case: SwapFacesUseCase,
    queue_depth: usize,
    timeout: Duration,
) -> std::io::Result<(WorkerHandle, JoinHandle<()>)> {
    let (sender, receiver) = bounded(queue_depth.max(1));
    let thread = thread::Builder::new()
        .name("inference-worker".into())
        .spawn(move || run(use_case, receiver))?;
    Ok((WorkerHandle { sender, timeout }, thread))
}

fn run(mut use_case: SwapFacesUseCase, receiver: Receiver<SwapJob>) {
    log::info!("Inference worker ready (policy: {})", use_case.policy());
    for job in receiver.iter() {
        if job.reply.is_closed() {
            log::warn!("Skipping swap job abandoned by its requester");
            continue;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            use_case.execute(&job.source, &job.target)
        }));
        let outcome = match outcome {
            Ok(result) => result.map_err(ApiError::from),
            Err(payload) => Err(ApiError::Internal(format!(
                "inference panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        if job.reply.send(outcome).is_err() {
            log::warn!("Requester went away before the swap finished");
        }
    }
    use_case.logger().summary();
    log::info!("Inference worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
