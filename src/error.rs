use std::path::PathBuf;

/// Failure taxonomy for a provisioning run.
///
/// Precondition variants abort the run before anything is mutated; the rest
/// are scoped to a single target and recorded in the run report.
#[derive(thiserror::Error, Debug)]
pub enum TrustError {
    #[error("no network connectivity ({url}): {reason}")]
    NoConnectivity { url: String, reason: String },

    #[error("no certificate with subject '{subject}' in the system trust store")]
    AnchorNotFound { subject: String },

    #[error("{count} distinct certificates named '{subject}' in the system trust store")]
    AnchorAmbiguous { subject: String, count: usize },

    #[error("certificate store query failed: {0}")]
    AnchorSource(String),

    #[error("backup of {} failed: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} {args} exited with {status}: {stderr}")]
    Command {
        program: String,
        args: String,
        status: String,
        stderr: String,
    },

    #[error("{target}: {message}")]
    Target { target: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrustError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn target(target: &str, message: impl Into<String>) -> Self {
        Self::Target {
            target: target.to_string(),
            message: message.into(),
        }
    }

    /// Stable code used in `--json` error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoConnectivity { .. } => "NO_CONNECTIVITY",
            Self::AnchorNotFound { .. } => "ANCHOR_NOT_FOUND",
            Self::AnchorAmbiguous { .. } => "ANCHOR_AMBIGUOUS",
            Self::AnchorSource(_) => "ANCHOR_SOURCE",
            Self::Backup { .. } => "BACKUP_FAILED",
            Self::Command { .. } => "COMMAND_FAILED",
            Self::Target { .. } => "TARGET_FAILED",
            Self::Config(_) => "CONFIG",
            Self::Io { .. } => "IO",
        }
    }
}

pub type Result<T> = std::result::Result<T, TrustError>;
