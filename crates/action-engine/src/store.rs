//! Action group storage.
//!
//! An action group file (`<root>/<name>.d6a`) is an SQLite database with a
//! single `ActionGroup` table. Each row is one frame:
//!
//! ```text
//! [Index] | Time (ms) | Servo1 | Servo2 | ... | ServoK
//! ```
//!
//! Rows are played in table order. Position column `k` drives servo id `k`;
//! servo ranges are not checked here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::paths;
use crate::types::{ActionGroup, Frame, ServoId, ServoTarget};

const TABLE: &str = "ActionGroup";

/// Leading non-servo columns: frame index, duration.
const HEADER_COLUMNS: usize = 2;

// ---------------------------------------------------------------------------
// SequenceStore
// ---------------------------------------------------------------------------

/// Resolves action names to loaded [`ActionGroup`]s.
///
/// File content is assumed stable for the life of the process, so loaded
/// groups may be cached by resolved path.
#[derive(Debug)]
pub struct SequenceStore {
    extension: String,
    cache: Option<Mutex<HashMap<PathBuf, Arc<ActionGroup>>>>,
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::new(paths::ACTION_EXTENSION, true)
    }
}

impl SequenceStore {
    pub fn new(extension: impl Into<String>, cache: bool) -> Self {
        Self {
            extension: extension.into(),
            cache: cache.then(|| Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.extension.clone(), config.cache)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path_for(&self, name: &str, root: &Path) -> PathBuf {
        paths::action_path(root, name, &self.extension)
    }

    /// Load `name` from `root`, failing with [`EngineError::NotFound`] when the
    /// file is absent.
    pub fn load(&self, name: &str, root: &Path) -> Result<Arc<ActionGroup>> {
        let path = self.path_for(name, root);

        if let Some(cache) = &self.cache {
            if let Some(group) = cache.lock().ok().and_then(|c| c.get(&path).cloned()) {
                return Ok(group);
            }
        }

        if !path.exists() {
            return Err(EngineError::NotFound {
                name: name.to_string(),
                path,
            });
        }

        let group = Arc::new(read_group(name, &path)?);
        debug!(
            action = %name,
            frames = group.frames.len(),
            servos = group.servo_count(),
            "loaded action group"
        );

        if let Some(cache) = &self.cache {
            if let Ok(mut c) = cache.lock() {
                c.insert(path, Arc::clone(&group));
            }
        }
        Ok(group)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Ok(mut c) = cache.lock() {
                c.clear();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_group(name: &str, path: &Path) -> Result<ActionGroup> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(&format!("SELECT * FROM {TABLE}"))?;

    let columns = stmt.column_count();
    if columns < HEADER_COLUMNS {
        return Err(invalid(
            name,
            format!("expected at least {HEADER_COLUMNS} columns, found {columns}"),
        ));
    }
    let servo_count = columns - HEADER_COLUMNS;
    if servo_count > usize::from(u8::MAX) {
        return Err(invalid(
            name,
            format!("{servo_count} servo columns exceeds {}", u8::MAX),
        ));
    }

    let mut rows = stmt.query([])?;
    let mut frames = Vec::new();
    while let Some(row) = rows.next()? {
        let ordinal = frames.len() + 1;
        let duration = integer_at(row, 1)?
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                invalid(name, format!("frame {ordinal}: duration must be a positive integer"))
            })?;

        let mut targets = Vec::with_capacity(servo_count);
        for k in 0..servo_count {
            let position = integer_at(row, HEADER_COLUMNS + k)?
                .and_then(|p| i32::try_from(p).ok())
                .ok_or_else(|| {
                    let reason = format!("frame {ordinal}: servo {} has no integer position", k + 1);
                    invalid(name, reason)
                })?;
            targets.push(ServoTarget {
                servo: ServoId((k + 1) as u8),
                position,
            });
        }

        frames.push(Frame {
            duration_ms: duration,
            targets,
        });
    }

    Ok(ActionGroup::new(name, frames))
}

fn integer_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(v) => Some(v),
        _ => None,
    })
}

fn invalid(name: &str, reason: String) -> EngineError {
    EngineError::InvalidFrame {
        name: name.to_string(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Write `group` to `path` in the `ActionGroup` table layout, replacing any
/// existing file. Targets must list servos `1..=k` in order in every frame.
pub fn write_group(path: &Path, group: &ActionGroup) -> Result<()> {
    let servo_count = group.servo_count();
    for (i, frame) in group.frames.iter().enumerate() {
        if frame.duration_ms == 0 {
            return Err(invalid(&group.name, format!("frame {}: zero duration", i + 1)));
        }
        let in_order = frame.targets.len() == servo_count
            && frame
                .targets
                .iter()
                .enumerate()
                .all(|(k, t)| usize::from(t.servo.get()) == k + 1);
        if !in_order {
            return Err(invalid(
                &group.name,
                format!("frame {}: targets must cover servos 1..={servo_count} in order", i + 1),
            ));
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let mut conn = Connection::open(path)?;
    let mut columns = vec![
        "[Index] INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string(),
        "Time INT".to_string(),
    ];
    columns.extend((1..=servo_count).map(|k| format!("Servo{k} INT")));
    conn.execute(&format!("CREATE TABLE {TABLE}({})", columns.join(", ")), [])?;

    let placeholders = (1..=servo_count + HEADER_COLUMNS)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {TABLE} VALUES ({placeholders})"))?;
        for (i, frame) in group.frames.iter().enumerate() {
            let mut values: Vec<i64> = Vec::with_capacity(servo_count + HEADER_COLUMNS);
            values.push(i as i64 + 1);
            values.push(i64::from(frame.duration_ms));
            values.extend(frame.targets.iter().map(|t| i64::from(t.position)));
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(())
}
