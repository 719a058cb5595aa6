//! Background playback.
//!
//! Gait loops block for as long as the robot moves, so callers that must stay
//! responsive hand them to a [`BackgroundRunner`]. Only one worker runs per
//! runner; stopping is done through the engine's group stop.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::engine::{GaitEngine, RunRequest, RunSummary};
use crate::error::{EngineError, Result};
use crate::sink::ServoSink;

type Worker = JoinHandle<Result<RunSummary>>;

pub struct BackgroundRunner<S: ServoSink + 'static> {
    engine: Arc<GaitEngine<S>>,
    worker: Mutex<Option<Worker>>,
}

impl<S: ServoSink + 'static> BackgroundRunner<S> {
    pub fn new(engine: Arc<GaitEngine<S>>) -> Self {
        Self {
            engine,
            worker: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<GaitEngine<S>> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|w| !w.is_finished())
    }

    /// Spawn a worker thread running `req`. Fails with [`EngineError::Busy`]
    /// while the previous worker is still alive.
    pub fn start(&self, req: RunRequest) -> Result<()> {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            warn!(action = %req.action, "background run rejected: worker already running");
            return Err(EngineError::Busy);
        }
        if let Some(previous) = worker.take() {
            if let Err(e) = join_worker(previous) {
                warn!(error = %e, "previous background run ended with error");
            }
        }

        let engine = Arc::clone(&self.engine);
        let name = format!("action-{}", req.action);
        info!(action = %req.action, times = req.times, "background run: spawning worker");
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || engine.run_action_group(&req))?;
        *worker = Some(handle);
        Ok(())
    }

    /// Request a group stop; the worker finishes any owed end transition.
    pub fn stop(&self) {
        self.engine.stop_action_group();
    }

    /// Wait for the current worker. `None` when nothing was started.
    pub fn join(&self) -> Option<Result<RunSummary>> {
        let worker = self.lock_worker().take()?;
        Some(join_worker(worker))
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn join_worker(worker: Worker) -> Result<RunSummary> {
    worker.join().map_err(|panic| {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        EngineError::Worker(msg)
    })?
}
