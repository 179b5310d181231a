//! Concurrent detection across cameras.
//!
//! Every camera is processed as one job on a bounded [`WorkerPool`]. A job creates its own
//! detector, runs it over all of the camera's frames with [`run_sequence`], and reports the
//! outcome tagged with the camera serial on a completion channel. Completions arrive in whatever
//! order the jobs finish; the collected results are keyed by serial, so the order does not affect
//! the outcome.

use std::{
    any::Any,
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use thiserror::Error;

use crate::detection::{DetectorConfig, DetectorFactory};
use crate::pool::WorkerPool;
use crate::sequence::{run_sequence, CameraOutput};
use crate::source::ImageSource;
use crate::timer::Progress;

/// Default number of cameras processed at the same time.
pub const DEFAULT_WORKERS: usize = 8;

/// What to do when a camera job fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Finish the remaining cameras and report the failed ones in [`CameraResults::failed`].
    #[default]
    Isolate,
    /// Stop at the first failure. Cameras that have not started yet are skipped.
    Abort,
}

/// A camera whose detection job failed as a whole.
#[derive(Debug, Error)]
#[error("camera '{serial}' failed: {error:#}")]
pub struct CameraFailure {
    pub serial: String,
    pub error: anyhow::Error,
}

/// The outcome of [`CameraOrchestrator::run`].
#[derive(Debug, Default)]
pub struct CameraResults {
    /// Outputs of all successful cameras, keyed by serial.
    pub outputs: BTreeMap<String, CameraOutput>,
    /// Cameras whose job failed, in the order the failures were reported.
    pub failed: Vec<CameraFailure>,
}

/// Runs one detection job per camera on a bounded set of worker threads.
#[derive(Debug, Clone)]
pub struct CameraOrchestrator {
    workers: usize,
    policy: FailurePolicy,
}

impl Default for CameraOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraOrchestrator {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            policy: FailurePolicy::default(),
        }
    }

    /// Sets the maximum number of cameras processed concurrently.
    pub fn workers(self, workers: usize) -> Self {
        Self { workers, ..self }
    }

    pub fn failure_policy(self, policy: FailurePolicy) -> Self {
        Self { policy, ..self }
    }

    /// Runs detection for every camera of `source`.
    ///
    /// Each camera gets a detector from `factory`, created on the worker thread that processes the
    /// camera. Errors and panics inside a camera job are turned into [`CameraFailure`]s and handled
    /// according to the [`FailurePolicy`]. With [`FailurePolicy::Abort`], the first failure is
    /// returned as the error (it can be downcast to [`CameraFailure`]).
    pub fn run<S, F>(
        &self,
        source: Arc<S>,
        factory: Arc<F>,
        config: &DetectorConfig,
    ) -> anyhow::Result<CameraResults>
    where
        S: ImageSource + ?Sized + 'static,
        F: DetectorFactory + 'static,
    {
        let serials = source.serials().to_vec();
        let workers = self.workers.min(serials.len()).max(1);
        log::info!(
            "detecting hands in {} cameras using {workers} workers",
            serials.len()
        );

        let (done_tx, done_rx) = crossbeam::channel::unbounded();
        let config = config.clone();
        let pool = WorkerPool::builder()
            .name("camera")
            .workers(workers)
            .spawn(move |serial: String| {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    run_camera(&*source, &*factory, &config, &serial)
                }))
                .unwrap_or_else(|payload| {
                    Err(anyhow!("camera job panicked: {}", panic_message(&*payload)))
                });
                // The receiver is gone if collection was aborted.
                done_tx.send((serial, result)).ok();
            })
            .context("failed to spawn camera workers")?;

        for serial in &serials {
            pool.submit(serial.clone());
        }

        let mut progress = Progress::new("detection", serials.len());
        let mut results = CameraResults::default();
        for _ in 0..serials.len() {
            let (serial, result) = done_rx
                .recv()
                .context("camera workers exited before reporting all cameras")?;
            match result {
                Ok(output) => {
                    log::debug!("{serial}: {}", output.stats);
                    results.outputs.insert(serial.clone(), output);
                }
                Err(error) => {
                    log::error!("camera '{serial}' failed: {error:#}");
                    let failure = CameraFailure {
                        serial: serial.clone(),
                        error,
                    };
                    if self.policy == FailurePolicy::Abort {
                        let skipped = pool.discard_queued();
                        if skipped != 0 {
                            log::warn!("aborting; skipping {skipped} cameras that did not start");
                        }
                        return Err(failure.into());
                    }
                    results.failed.push(failure);
                }
            }
            progress.tick(&serial);
        }
        progress.finish();
        pool.join();

        Ok(results)
    }
}

fn run_camera<S, F>(
    source: &S,
    factory: &F,
    config: &DetectorConfig,
    serial: &str,
) -> anyhow::Result<CameraOutput>
where
    S: ImageSource + ?Sized,
    F: DetectorFactory,
{
    log::trace!("starting camera '{serial}'");
    let mut detector = factory
        .create(config, serial)
        .with_context(|| format!("failed to create detector for camera '{serial}'"))?;
    run_sequence(&mut detector, source.num_frames(), |frame| {
        source.image(serial, frame)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string payload>"
    }
}
