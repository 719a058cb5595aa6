//! Frame-paced playback of a single action group.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{EngineError, Result};
use crate::sink::ServoSink;
use crate::types::{ActionGroup, LockOverrides, PlayOutcome};

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative stop flag. Setting it never blocks; the player polls it at
/// frame boundaries and consumes it when observed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// FlagGuard
// ---------------------------------------------------------------------------

/// Holds an exclusivity flag for its lifetime and clears it on drop, whatever
/// path the holder exits through.
pub(crate) struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// PlaybackExecutor
// ---------------------------------------------------------------------------

/// Streams one action group at a time to a [`ServoSink`].
#[derive(Debug, Default)]
pub struct PlaybackExecutor {
    playing: AtomicBool,
    cancel: CancelToken,
}

impl PlaybackExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor sharing an existing cancel token.
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            playing: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// True while a `play` call is streaming.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn hold(&self) -> Option<FlagGuard<'_>> {
        FlagGuard::acquire(&self.playing)
    }

    /// Play `group` frame by frame.
    ///
    /// Every target of a frame is sent before the frame's duration is slept.
    /// The cancel token is checked at each frame boundary, including after the
    /// last frame; a pending cancel is consumed and reported as
    /// [`PlayOutcome::Cancelled`]. Fails with [`EngineError::Busy`] without
    /// sending anything when another call is streaming.
    pub fn play<S: ServoSink + ?Sized>(
        &self,
        group: &ActionGroup,
        overrides: &LockOverrides,
        sink: &S,
    ) -> Result<PlayOutcome> {
        let Some(_guard) = FlagGuard::acquire(&self.playing) else {
            warn!(action = %group.name, "play rejected: playback busy");
            return Err(EngineError::Busy);
        };

        for (index, frame) in group.frames.iter().enumerate() {
            if self.cancel.take() {
                warn!(action = %group.name, frame = index, "playback cancelled");
                return Ok(PlayOutcome::Cancelled);
            }
            for target in &frame.targets {
                let position = overrides.apply(target);
                sink.set_servo_target(target.servo, position, frame.duration_ms)
                    .map_err(|source| {
                        error!(
                            action = %group.name,
                            frame = index,
                            servo = %target.servo,
                            error = %source,
                            "servo transport failure"
                        );
                        EngineError::TransportFailure {
                            servo: target.servo,
                            source,
                        }
                    })?;
            }
            std::thread::sleep(Duration::from_millis(u64::from(frame.duration_ms)));
        }

        if self.cancel.take() {
            warn!(action = %group.name, "playback cancelled at end of sequence");
            return Ok(PlayOutcome::Cancelled);
        }
        debug!(action = %group.name, frames = group.frames.len(), "playback completed");
        Ok(PlayOutcome::Completed)
    }
}
