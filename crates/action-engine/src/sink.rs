//! Servo command sink.
//!
//! The engine never talks to a bus or a board directly. Everything it streams
//! goes through [`ServoSink`], which the embedding application implements on
//! top of its transport. The transport owns rate limiting and I/O timeouts; a
//! call that never returns stalls playback.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::types::ServoId;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Accepts one position command per servo per frame.
pub trait ServoSink: Send + Sync {
    fn set_servo_target(
        &self,
        servo: ServoId,
        position: i32,
        duration_ms: u32,
    ) -> Result<(), TransportError>;
}

impl<S: ServoSink + ?Sized> ServoSink for Arc<S> {
    fn set_servo_target(
        &self,
        servo: ServoId,
        position: i32,
        duration_ms: u32,
    ) -> Result<(), TransportError> {
        (**self).set_servo_target(servo, position, duration_ms)
    }
}

impl<S: ServoSink + ?Sized> ServoSink for &S {
    fn set_servo_target(
        &self,
        servo: ServoId,
        position: i32,
        duration_ms: u32,
    ) -> Result<(), TransportError> {
        (**self).set_servo_target(servo, position, duration_ms)
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    pub servo: ServoId,
    pub position: i32,
    pub duration_ms: u32,
}

/// In-memory sink that keeps every command it receives. Used for dry runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<ServoCommand>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<ServoCommand> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ServoCommand>> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ServoSink for RecordingSink {
    fn set_servo_target(
        &self,
        servo: ServoId,
        position: i32,
        duration_ms: u32,
    ) -> Result<(), TransportError> {
        self.lock().push(ServoCommand {
            servo,
            position,
            duration_ms,
        });
        Ok(())
    }
}
