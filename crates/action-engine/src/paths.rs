use std::path::{Path, PathBuf};

use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const ACTION_EXTENSION: &str = "d6a";

/// Action whose presence marks a directory as an action-group root.
pub const PROBE_ACTION: &str = "go_forward";

pub const DEFAULT_ACTION_ROOT: &str = "/home/pi/TonyPi/ActionGroups/";

pub const KNOWN_ACTION_ROOTS: &[&str] = &[
    "/home/pi/TonyPi/ActionGroups/",
    "/home/pi/one/tonypi_pro/TonyPi/ActionGroups/",
    "/home/pi/tonypi_pro/TonyPi/ActionGroups/",
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<root>/<name>.<ext>`
pub fn action_path(root: &Path, name: &str, extension: &str) -> PathBuf {
    root.join(format!("{name}.{extension}"))
}

/// Installation roots probed when no root is configured, in order.
pub fn default_search_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = KNOWN_ACTION_ROOTS.iter().map(PathBuf::from).collect();
    if let Some(home) = home::home_dir() {
        let candidate = home.join("TonyPi").join("ActionGroups");
        if !roots.contains(&candidate) {
            roots.push(candidate);
        }
    }
    roots
}

/// Pick the first root holding `<probe>.<ext>`, else [`DEFAULT_ACTION_ROOT`].
pub fn resolve_action_root(candidates: &[PathBuf], probe: &str, extension: &str) -> PathBuf {
    for root in candidates {
        if action_path(root, probe, extension).exists() {
            info!(root = %root.display(), "found action groups");
            return root.clone();
        }
    }
    warn!(
        fallback = DEFAULT_ACTION_ROOT,
        searched = candidates.len(),
        "action groups not found; using default root"
    );
    PathBuf::from(DEFAULT_ACTION_ROOT)
}
