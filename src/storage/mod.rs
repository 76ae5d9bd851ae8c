//! Item state file.
//!
//! The last published state of each item lives in one JSON object keyed by
//! item name, so that a restart does not re-publish unchanged balances. Only
//! the current state is stored; there is no balance history.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Item name → last published state.
pub type ItemStates = BTreeMap<String, String>;

/// Sibling path the new contents are written to before replacing `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the state file at `path` with `states`.
///
/// Readers see either the previous file or the new one, never a partial write.
pub fn save_states(states: &ItemStates, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(states).context("Failed to serialise item states")?;

    let staging = staging_path(path);
    std::fs::write(&staging, &json)
        .with_context(|| format!("Failed to write item states to {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to replace state file {}", path.display()))?;

    debug!(path = %path.display(), items = states.len(), "Item states saved");
    Ok(())
}

/// Item states stored at `path`, or `None` on a fresh start.
pub fn load_states(path: &Path) -> Result<Option<ItemStates>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved item states found, starting fresh");
            return Ok(None);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read item states from {}", path.display()))
        }
    };

    let states: ItemStates = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse item states from {}", path.display()))?;

    info!(path = %path.display(), items = states.len(), "Item states loaded from disk");
    Ok(Some(states))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
