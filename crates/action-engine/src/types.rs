use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ServoId
// ---------------------------------------------------------------------------

/// Bus servo identifier. Column `k` of an action group record drives servo `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServoId(pub u8);

impl ServoId {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ServoId {
    fn from(id: u8) -> Self {
        ServoId(id)
    }
}

// ---------------------------------------------------------------------------
// Frame / ActionGroup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoTarget {
    pub servo: ServoId,
    /// Raw pulse target; range checks belong to the servo sink.
    pub position: i32,
}

/// One timed snapshot of servo targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Always > 0. Also the pacing budget slept after dispatch.
    pub duration_ms: u32,
    pub targets: Vec<ServoTarget>,
}

impl Frame {
    /// Build a frame from positions listed in servo order, starting at servo 1.
    /// Servo ids stop at 255; positions past that are dropped.
    pub fn from_positions(duration_ms: u32, positions: &[i32]) -> Self {
        let targets = positions
            .iter()
            .zip(1..=u8::MAX)
            .map(|(&position, id)| ServoTarget {
                servo: ServoId(id),
                position,
            })
            .collect();
        Self {
            duration_ms,
            targets,
        }
    }
}

/// A named, pre-authored motion sequence. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGroup {
    pub name: String,
    pub frames: Vec<Frame>,
}

impl ActionGroup {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration_ms)).sum()
    }

    pub fn servo_count(&self) -> usize {
        self.frames.first().map(|f| f.targets.len()).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// LockOverrides
// ---------------------------------------------------------------------------

/// Per-call servo position substitutions. A locked servo keeps its override
/// position in every frame; frame durations are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOverrides(BTreeMap<ServoId, i32>);

impl LockOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(mut self, servo: impl Into<ServoId>, position: i32) -> Self {
        self.0.insert(servo.into(), position);
        self
    }

    pub fn get(&self, servo: ServoId) -> Option<i32> {
        self.0.get(&servo).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position actually commanded for `target`.
    pub fn apply(&self, target: &ServoTarget) -> i32 {
        self.get(target.servo).unwrap_or(target.position)
    }
}

impl FromIterator<(ServoId, i32)> for LockOverrides {
    fn from_iter<I: IntoIterator<Item = (ServoId, i32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// PlayOutcome
// ---------------------------------------------------------------------------

/// How a single sequence playback ended. Cancellation is a normal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayOutcome {
    Completed,
    Cancelled,
}

impl PlayOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayOutcome::Completed => "completed",
            PlayOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PlayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_positions_numbers_servos_from_one() {
        let frame = Frame::from_positions(100, &[500, 600, 700]);
        let ids: Vec<u8> = frame.targets.iter().map(|t| t.servo.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(frame.targets[2].position, 700);
    }

    #[test]
    fn from_positions_never_wraps_servo_ids() {
        let frame = Frame::from_positions(10, &[0; 300]);
        assert_eq!(frame.targets.len(), 255);
        assert_eq!(frame.targets.last().map(|t| t.servo), Some(ServoId(255)));
        assert!(frame.targets.iter().all(|t| t.servo != ServoId(0)));
    }

    #[test]
    fn overrides_replace_only_locked_servos() {
        let overrides = LockOverrides::new().lock(ServoId(2), 1500);
        let frame = Frame::from_positions(80, &[100, 200, 300]);
        let commanded: Vec<i32> = frame.targets.iter().map(|t| overrides.apply(t)).collect();
        assert_eq!(commanded, vec![100, 1500, 300]);
    }

    #[test]
    fn total_duration_sums_frames() {
        let group = ActionGroup::new(
            "wave",
            vec![
                Frame::from_positions(100, &[1]),
                Frame::from_positions(250, &[2]),
            ],
        );
        assert_eq!(group.total_duration_ms(), 350);
        assert_eq!(group.servo_count(), 1);
    }
}
