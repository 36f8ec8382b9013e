//! Centralized path resolution for beacon
//!
//! # Environment Variables
//!
//! - `BEACON_CONFIG_DIR` - Override config directory
//! - `BEACON_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `BEACON_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/beacon` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\beacon`
//!    - macOS/Linux: `~/.config/beacon`
//!
//! For state_dir():
//! 1. `BEACON_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/beacon` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\beacon`
//!    - macOS/Linux: `~/.local/state/beacon`
//!
//! The `--config` and `--state` flags bypass all of the above.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "BEACON_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "BEACON_STATE_DIR";

/// Default config file name inside the config directory
pub const CONFIG_FILE: &str = "beacon.toml";

/// Default state file name inside the state directory
pub const STATE_FILE: &str = "state.json";

/// Get the beacon config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_dir(
        &env_var,
        ENV_CONFIG_DIR,
        "XDG_CONFIG_HOME",
        &[".config", "beacon"],
    )
}

/// Get the beacon state directory path
pub fn state_dir() -> Result<PathBuf> {
    resolve_dir(
        &env_var,
        ENV_STATE_DIR,
        "XDG_STATE_HOME",
        &[".local", "state", "beacon"],
    )
}

/// The config file: `--config` if given, else `<config_dir>/beacon.toml`
pub fn config_file(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(config_dir()?.join(CONFIG_FILE)),
    }
}

/// The state file: `--state` if given, else `<state_dir>/state.json`
pub fn state_file(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(state_dir()?.join(STATE_FILE)),
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve a directory from an override variable, an XDG variable, then
/// a path below the home directory.
fn resolve_dir(
    env: &dyn Fn(&str) -> Option<String>,
    override_var: &str,
    xdg_var: &str,
    home_default: &[&str],
) -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Some(dir) = env(override_var) {
        let path = expand(&dir);
        log::debug!("Using dir from {}: {}", override_var, path.display());
        return Ok(path);
    }

    // 2. Check XDG variable
    if let Some(xdg) = env(xdg_var) {
        let path = PathBuf::from(xdg).join("beacon");
        log::debug!("Using {}: {}", xdg_var, path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        let base = if override_var == ENV_STATE_DIR {
            dirs::data_local_dir()
        } else {
            dirs::config_dir()
        };
        if let Some(base) = base {
            return Ok(base.join("beacon"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home_default.iter().fold(home, |p, part| p.join(part));
    log::debug!("Using default dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
