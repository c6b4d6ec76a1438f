use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

pub const DATABASE_FILE_NAME: &str = "activity.sqlite3";

/// Returns (and creates) the state directory of the application. `$XDG_STATE_HOME/timetrail` or
/// `$HOME/.local/state/timetrail` on unix, `%APPDATA%\timetrail` on Windows.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = state_home()?;
    path.push("timetrail");

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

pub fn default_database_path() -> Result<PathBuf> {
    Ok(create_application_default_path()?.join(DATABASE_FILE_NAME))
}

#[cfg(windows)]
fn state_home() -> Result<PathBuf> {
    env::var("APPDATA")
        .map(PathBuf::from)
        .map_err(|_| anyhow!("APPDATA should be present on Windows"))
}

#[cfg(not(windows))]
fn state_home() -> Result<PathBuf> {
    env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
}
