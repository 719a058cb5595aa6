//! `action-engine` plays pre-authored servo action groups on a legged robot
//! and stitches repeated locomotion actions into one continuous gait.
//!
//! # Architecture
//!
//! ```text
//! RunRequest
//!     │
//!     ▼
//! GaitEngine         ← decision loop: start / cycle / end transitions, stop signals
//!     │
//!     ├── SequenceStore     ← <root>/<name>.d6a (SQLite `ActionGroup` table) → ActionGroup
//!     │
//!     ▼
//! PlaybackExecutor   ← one sequence at a time, frame by frame, cancellable
//!     │
//!     ▼
//! ServoSink          ← supplied by the embedding application
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use action_engine::{EngineConfig, GaitEngine, RecordingSink, RunRequest};
//!
//! let engine = GaitEngine::new(RecordingSink::new(), &EngineConfig::default());
//! let summary = engine.run_action_group(&RunRequest::new("go_forward").times(3).with_stand(true))?;
//! assert_eq!(summary.played().len(), 5);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gait;
pub mod paths;
pub mod runner;
pub mod sink;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::{GaitEngine, PlayFailure, PlayRecord, RunRequest, RunSummary, StopHandle};
pub use error::{EngineError, Result};
pub use executor::{CancelToken, PlaybackExecutor};
pub use gait::{GaitFamily, GaitMode, GaitState};
pub use runner::BackgroundRunner;
pub use sink::{RecordingSink, ServoCommand, ServoSink, TransportError};
pub use store::SequenceStore;
pub use types::{ActionGroup, Frame, LockOverrides, PlayOutcome, ServoId, ServoTarget};
