//! Locomotion families and gait bookkeeping.
//!
//! Repeated locomotion cycles share a start and an end transition per family.
//! Everything else is a discrete action that never gets stitched.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const GO_FORWARD: &str = "go_forward";
pub const GO_FORWARD_FAST: &str = "go_forward_fast";
pub const GO_FORWARD_SLOW: &str = "go_forward_slow";
pub const BACK: &str = "back";
pub const BACK_FAST: &str = "back_fast";

pub const GO_FORWARD_START: &str = "go_forward_start";
pub const GO_FORWARD_START_FAST: &str = "go_forward_start_fast";
pub const GO_FORWARD_END: &str = "go_forward_end";
pub const BACK_START: &str = "back_start";
pub const BACK_END: &str = "back_end";

// ---------------------------------------------------------------------------
// GaitFamily
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaitFamily {
    Forward,
    Backward,
}

impl GaitFamily {
    /// Family of a locomotion primitive; `None` for discrete actions.
    pub fn of(action: &str) -> Option<GaitFamily> {
        [GaitFamily::Forward, GaitFamily::Backward]
            .into_iter()
            .find(|family| family.members().iter().any(|m| *m == action))
    }

    /// Locomotion primitives that share this family's transitions.
    pub fn members(self) -> &'static [&'static str] {
        match self {
            GaitFamily::Forward => &[GO_FORWARD, GO_FORWARD_FAST, GO_FORWARD_SLOW],
            GaitFamily::Backward => &[BACK, BACK_FAST],
        }
    }

    /// Transition that returns the robot to a stable stance.
    pub fn end_transition(self) -> &'static str {
        match self {
            GaitFamily::Forward => GO_FORWARD_END,
            GaitFamily::Backward => BACK_END,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GaitFamily::Forward => "forward",
            GaitFamily::Backward => "backward",
        }
    }
}

impl fmt::Display for GaitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start transition for a locomotion primitive. The fast forward gait has its
/// own; every other member uses the family's.
pub fn start_transition(action: &str) -> Option<&'static str> {
    match action {
        GO_FORWARD | GO_FORWARD_SLOW => Some(GO_FORWARD_START),
        GO_FORWARD_FAST => Some(GO_FORWARD_START_FAST),
        BACK | BACK_FAST => Some(BACK_START),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// GaitState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GaitMode {
    Idle,
    Started { family: GaitFamily },
}

/// Where the robot is in a stitched gait.
///
/// `pending_end` is set once a start transition has played and stays set until
/// the family's end transition is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaitState {
    pub mode: GaitMode,
    pub pending_end: bool,
}

impl Default for GaitState {
    fn default() -> Self {
        Self::idle()
    }
}

impl GaitState {
    pub fn idle() -> Self {
        Self {
            mode: GaitMode::Idle,
            pending_end: false,
        }
    }

    pub fn started(family: GaitFamily) -> Self {
        Self {
            mode: GaitMode::Started { family },
            pending_end: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.mode, GaitMode::Idle)
    }

    pub fn family(&self) -> Option<GaitFamily> {
        match self.mode {
            GaitMode::Idle => None,
            GaitMode::Started { family } => Some(family),
        }
    }

    /// End transition owed by the current gait, if any.
    pub fn owed_end(&self) -> Option<&'static str> {
        if self.pending_end {
            self.family().map(GaitFamily::end_transition)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_families() {
        for name in GaitFamily::Forward.members() {
            assert_eq!(GaitFamily::of(name), Some(GaitFamily::Forward));
        }
        for name in GaitFamily::Backward.members() {
            assert_eq!(GaitFamily::of(name), Some(GaitFamily::Backward));
        }
        assert_eq!(GaitFamily::of("wave"), None);
        assert_eq!(GaitFamily::of("go_forward_start"), None);
        assert_eq!(GaitFamily::of("back_end"), None);
    }

    #[test]
    fn start_transitions() {
        assert_eq!(start_transition("go_forward"), Some("go_forward_start"));
        assert_eq!(start_transition("go_forward_slow"), Some("go_forward_start"));
        assert_eq!(start_transition("go_forward_fast"), Some("go_forward_start_fast"));
        assert_eq!(start_transition("back_fast"), Some("back_start"));
        assert_eq!(start_transition("turn_left"), None);
    }

    #[test]
    fn owed_end_follows_family() {
        let mut state = GaitState::started(GaitFamily::Backward);
        assert_eq!(state.owed_end(), Some("back_end"));
        state.pending_end = false;
        assert_eq!(state.owed_end(), None);
        state.reset();
        assert!(state.is_idle());
        assert_eq!(state.family(), None);
    }

    #[test]
    fn state_serializes_tagged() {
        let yaml = serde_yaml::to_string(&GaitState::started(GaitFamily::Forward)).unwrap();
        assert!(yaml.contains("type: started"));
        assert!(yaml.contains("family: forward"));
    }
}
