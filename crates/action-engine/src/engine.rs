//! Gait continuity controller.
//!
//! [`GaitEngine`] owns everything one robot's playback needs: the sequence
//! store, the executor, the stop signals and the gait state. Repeated
//! locomotion requests are stitched into one continuous gait:
//!
//! ```text
//! Idle ──start transition + cycle──▶ Started(family) ──cycle──▶ Started(family)
//!   ▲                                     │
//!   └──────────── end transition ─────────┘  (discrete action, stop, or with_stand)
//! ```
//!
//! Each call runs a decision loop that counts `times` down once per iteration
//! before branching. `times == 0` loops until [`GaitEngine::stop_action_group`]
//! is called; a negative remainder is the closing iteration.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::executor::{CancelToken, FlagGuard, PlaybackExecutor};
use crate::gait::{self, GaitFamily, GaitState};
use crate::sink::ServoSink;
use crate::store::SequenceStore;
use crate::types::{LockOverrides, PlayOutcome};

// ---------------------------------------------------------------------------
// StopHandle
// ---------------------------------------------------------------------------

/// Cloneable stop signals for an engine, usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    cancel: CancelToken,
    stop_group: Arc<AtomicBool>,
}

impl StopHandle {
    /// Abort the sequence currently streaming at its next frame boundary.
    pub fn stop_action(&self) {
        self.cancel.cancel();
    }

    /// End the gait loop at its next iteration, after any owed end transition.
    pub fn stop_action_group(&self) {
        self.stop_group.store(true, Ordering::SeqCst);
    }

    pub fn group_stop_requested(&self) -> bool {
        self.stop_group.load(Ordering::SeqCst)
    }

    fn consume_group_stop(&self) {
        self.stop_group.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// RunRequest / RunSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub action: String,
    /// Repetitions; 0 repeats until a group stop.
    pub times: u32,
    /// Close a locomotion run with its family's end transition.
    pub with_stand: bool,
    pub overrides: LockOverrides,
    /// Action-group directory for this call; the engine root when `None`.
    pub path: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            times: 1,
            with_stand: false,
            overrides: LockOverrides::new(),
            path: None,
        }
    }

    pub fn times(mut self, times: u32) -> Self {
        self.times = times;
        self
    }

    pub fn with_stand(mut self, with_stand: bool) -> Self {
        self.with_stand = with_stand;
        self
    }

    pub fn overrides(mut self, overrides: LockOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRecord {
    pub action: String,
    pub outcome: PlayOutcome,
}

#[derive(Debug)]
pub struct PlayFailure {
    pub action: String,
    pub error: EngineError,
}

/// What one `run_action_group` call did. Per-iteration failures are collected
/// here rather than ending the loop.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub plays: Vec<PlayRecord>,
    pub failures: Vec<PlayFailure>,
    /// The loop ended on a group stop.
    pub stopped: bool,
}

impl RunSummary {
    pub fn played(&self) -> Vec<&str> {
        self.plays.iter().map(|p| p.action.as_str()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Err` with the first failure, if any iteration failed.
    pub fn into_result(mut self) -> Result<RunSummary> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.remove(0).error)
        }
    }
}

// ---------------------------------------------------------------------------
// GaitEngine
// ---------------------------------------------------------------------------

/// How one named play inside the loop ended.
enum Step {
    Played,
    Missing,
    Busy,
    Failed,
}

struct Run<'a> {
    overrides: &'a LockOverrides,
    root: &'a Path,
    summary: RunSummary,
}

pub struct GaitEngine<S> {
    sink: S,
    store: SequenceStore,
    executor: PlaybackExecutor,
    root: PathBuf,
    signals: StopHandle,
    state: Mutex<GaitState>,
    /// Held by whichever public call owns the executor, loop or direct play.
    claim: AtomicBool,
    /// Held only while a decision loop runs.
    session: AtomicBool,
}

impl<S: ServoSink> GaitEngine<S> {
    pub fn new(sink: S, config: &EngineConfig) -> Self {
        let signals = StopHandle::default();
        Self {
            sink,
            store: SequenceStore::from_config(config),
            executor: PlaybackExecutor::with_cancel(signals.cancel.clone()),
            root: config.resolve_root(),
            signals,
            state: Mutex::new(GaitState::idle()),
            claim: AtomicBool::new(false),
            session: AtomicBool::new(false),
        }
    }

    /// Engine reading action groups from `root`.
    pub fn with_root(sink: S, root: impl Into<PathBuf>) -> Self {
        Self::new(sink, &EngineConfig::with_root(root))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn store(&self) -> &SequenceStore {
        &self.store
    }

    pub fn action_root(&self) -> &Path {
        &self.root
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.signals.clone()
    }

    pub fn stop_action(&self) {
        self.signals.stop_action();
    }

    pub fn stop_action_group(&self) {
        self.signals.stop_action_group();
    }

    pub fn gait_state(&self) -> GaitState {
        self.with_state(|s| *s)
    }

    /// True while a sequence is streaming to the sink.
    pub fn is_playing(&self) -> bool {
        self.executor.is_playing()
    }

    /// True while a `run_action_group` decision loop is active.
    pub fn is_group_running(&self) -> bool {
        self.session.load(Ordering::Acquire)
    }

    /// Play one action group once, with no gait bookkeeping.
    ///
    /// Fails with [`EngineError::Busy`] while a decision loop or another
    /// direct play owns the engine, so a loop never loses the executor between
    /// two of its own plays.
    pub fn play_action(
        &self,
        name: &str,
        overrides: &LockOverrides,
        path: Option<&Path>,
    ) -> Result<PlayOutcome> {
        let Some(_claim) = FlagGuard::acquire(&self.claim) else {
            warn!(action = %name, "play_action rejected: engine busy");
            return Err(EngineError::Busy);
        };
        let root = path.unwrap_or(self.root.as_path());
        self.play_once(name, overrides, root)
    }

    /// Run `req.action` with gait stitching.
    ///
    /// Fails with [`EngineError::Busy`], leaving every flag and the gait state
    /// untouched, while another loop or a direct play owns the engine.
    /// Failures inside the loop are logged, recorded in the summary, and the
    /// loop moves on to its next decision.
    pub fn run_action_group(&self, req: &RunRequest) -> Result<RunSummary> {
        let Some(_claim) = FlagGuard::acquire(&self.claim) else {
            warn!(action = %req.action, "run_action_group rejected: playback busy");
            return Err(EngineError::Busy);
        };
        let Some(_session) = FlagGuard::acquire(&self.session) else {
            warn!(action = %req.action, "run_action_group rejected: loop already running");
            return Err(EngineError::Busy);
        };

        let root = req.path.as_deref().unwrap_or(self.root.as_path());
        let family = GaitFamily::of(&req.action);
        let forever = req.times == 0;
        let mut remaining = i64::from(req.times);
        let mut run = Run {
            overrides: &req.overrides,
            root,
            summary: RunSummary::default(),
        };

        info!(
            action = %req.action,
            times = req.times,
            with_stand = req.with_stand,
            family = family.map(GaitFamily::as_str).unwrap_or("discrete"),
            "run_action_group: start"
        );

        loop {
            if !forever {
                remaining -= 1;
            }
            let exhausted = remaining < 0;
            let stop = self.signals.group_stop_requested();

            let step = match family {
                Some(family) if !stop => {
                    if exhausted {
                        if req.with_stand {
                            self.close_gait(&mut run);
                        }
                        break;
                    }
                    self.locomotion_step(&mut run, &req.action, family)
                }
                _ => {
                    self.close_gait(&mut run);
                    if stop {
                        self.signals.consume_group_stop();
                        run.summary.stopped = true;
                        info!(action = %req.action, "run_action_group: stopped");
                        break;
                    }
                    if exhausted {
                        break;
                    }
                    self.play_recorded(&mut run, &req.action)
                }
            };

            if forever && matches!(step, Step::Missing) {
                warn!(action = %req.action, "action group missing; ending unbounded loop");
                self.close_gait(&mut run);
                break;
            }
        }

        info!(
            action = %req.action,
            plays = run.summary.plays.len(),
            failures = run.summary.failures.len(),
            stopped = run.summary.stopped,
            "run_action_group: done"
        );
        Ok(run.summary)
    }

    /// One non-final iteration for a locomotion primitive.
    fn locomotion_step(&self, run: &mut Run<'_>, action: &str, family: GaitFamily) -> Step {
        match self.gait_state().family() {
            Some(current) if current == family => return self.play_recorded(run, action),
            Some(current) => {
                debug!(from = %current, to = %family, "gait family switch");
                if !self.close_gait(run) {
                    return Step::Busy;
                }
            }
            None => {}
        }

        let Some(start) = gait::start_transition(action) else {
            return self.play_recorded(run, action);
        };
        match self.play_recorded(run, start) {
            Step::Played => {
                self.with_state(|s| *s = GaitState::started(family));
                debug!(family = %family, "gait started");
                self.play_recorded(run, action)
            }
            other => other,
        }
    }

    /// Flush any owed end transition and return the gait to idle. Returns
    /// false, leaving the gait untouched, when the end could not be played
    /// because the executor was busy.
    fn close_gait(&self, run: &mut Run<'_>) -> bool {
        if !self.flush_end(run) {
            return false;
        }
        self.reset_state();
        true
    }

    /// Play the end transition owed by the current gait, if any. A busy
    /// executor keeps the end owed; any other outcome settles it.
    fn flush_end(&self, run: &mut Run<'_>) -> bool {
        let Some(end) = self.gait_state().owed_end() else {
            return true;
        };
        debug!(end, "flushing end transition");
        if let Step::Busy = self.play_recorded(run, end) {
            warn!(end, "end transition deferred: executor busy");
            return false;
        }
        self.with_state(|s| s.pending_end = false);
        true
    }

    fn play_recorded(&self, run: &mut Run<'_>, name: &str) -> Step {
        match self.play_once(name, run.overrides, run.root) {
            Ok(outcome) => {
                run.summary.plays.push(PlayRecord {
                    action: name.to_string(),
                    outcome,
                });
                Step::Played
            }
            Err(error) => {
                warn!(action = %name, error = %error, "action group failed");
                let step = match error {
                    EngineError::NotFound { .. } => Step::Missing,
                    EngineError::Busy => Step::Busy,
                    _ => Step::Failed,
                };
                run.summary.failures.push(PlayFailure {
                    action: name.to_string(),
                    error,
                });
                step
            }
        }
    }

    fn play_once(&self, name: &str, overrides: &LockOverrides, root: &Path) -> Result<PlayOutcome> {
        let group = self.store.load(name, root)?;
        debug!(action = %name, frames = group.frames.len(), "playing action group");
        self.executor.play(&group, overrides, &self.sink)
    }

    fn reset_state(&self) {
        self.with_state(GaitState::reset);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut GaitState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}
