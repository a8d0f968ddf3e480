// Author: Dustin Pilgrim
// License: MIT

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct Paths {
    pub state_dir: PathBuf,
    pub log_path: PathBuf,
}

pub fn paths() -> Result<Paths> {
    // Persistent state (only the log lives here)
    let state_base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .context("Could not determine state directory")?;
    let state_dir = state_base.join("wb");
    let log_path = state_dir.join("wb.log");

    Ok(Paths { state_dir, log_path })
}

/// Directory for anonymous shm files: tmpfs runtime dir when available.
pub fn shm_dir() -> PathBuf {
    dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
}

/// Expand "~" / "~/" and "$HOME" / "${HOME}" in paths.
/// Does not do full shell expansion, globs, or ~user.
pub fn expand_user_path<P: AsRef<Path>>(p: P) -> Result<PathBuf> {
    let s = p.as_ref().to_string_lossy();
    let s = s.trim();

    let home = || std::env::var("HOME").context("HOME is not set (needed for path expansion)");

    if s == "~" {
        return Ok(PathBuf::from(home()?));
    }

    for prefix in ["~/", "${HOME}", "$HOME"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return Ok(PathBuf::from(home()?).join(rest.trim_start_matches('/')));
        }
    }

    Ok(PathBuf::from(s))
}
