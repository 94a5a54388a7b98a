use crate::domain::constants::LOG_TIMESTAMP_FORMAT;
use crate::error::{Result, TrustError};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| TrustError::Config("neither HOME nor USERPROFILE is set".to_string()))
}

pub fn config_dir(home: &Path) -> PathBuf {
    home.join(".config").join("trustline")
}

pub fn default_config_path(home: &Path) -> PathBuf {
    config_dir(home).join("config.toml")
}

/// Append-only run log: one `YYYY-MM-DD HH:MM:SS - message` line per event.
///
/// Writes never fail the run; a log that cannot be opened is reported once
/// through `tracing` and then ignored.
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %path.display(), error = %e, "event log disabled");
                return Self::disabled();
            }
        }
        Self { path: Some(path) }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn write(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let line = format!(
            "{} - {}\n",
            chrono::Local::now().format(LOG_TIMESTAMP_FORMAT),
            message
        );
        let res = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = res {
            tracing::debug!(path = %path.display(), error = %e, "event log write failed");
        }
    }
}
