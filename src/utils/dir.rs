use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

/// Overrides the platform default application directory.
pub const APP_DIR_ENV: &str = "STICKS_DIR";

const APP_DIR_NAME: &str = "sticks";

/// Resolves the application directory: `$STICKS_DIR`, otherwise `$XDG_STATE_HOME/sticks` or
/// `$HOME/.local/state/sticks` (`%APPDATA%\sticks` on Windows). The directory is created if
/// missing.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = match env::var_os(APP_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => platform_state_dir()?.join(APP_DIR_NAME),
    };
    ensure_dir(path)
}

fn platform_state_dir() -> Result<PathBuf> {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            env::var("APPDATA")
                .map(PathBuf::from)
                .context("APPDATA should be present on Windows")
        } else {
            env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
                .context("Couldn't find neither XDG_STATE_HOME nor HOME")
        }
    }
}

pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Failed to create {path:?}")),
    }
}
