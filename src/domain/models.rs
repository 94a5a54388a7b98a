use crate::domain::constants::{EXIT_ABORTED, EXIT_OK, EXIT_PARTIAL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonErr {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Result of a side-effect-free presence probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Detection {
    Present,
    Absent,
    Indeterminate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    SkippedAbsent,
    AlreadyTrusted,
    Applied,
    Failed,
    /// Verify-only runs: present and not yet trusted.
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub name: String,
    pub action: ActionTaken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetOutcome {
    pub fn new(name: &str, action: ActionTaken) -> Self {
        Self {
            name: name.to_string(),
            action,
            error: None,
        }
    }

    pub fn failed(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            action: ActionTaken::Failed,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    AbortedNoConnectivity,
    AbortedNoAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Provision,
    VerifyOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnchorSummary {
    pub subject: String,
    pub fingerprint_sha256: String,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub mode: RunMode,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorSummary>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcomes: Vec<TargetOutcome>,
    pub backups_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn count(&self, action: ActionTaken) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn exit_code(&self) -> u8 {
        if self.status != RunStatus::Completed {
            return EXIT_ABORTED;
        }
        let unsettled = self.outcomes.iter().any(|o| {
            matches!(o.action, ActionTaken::Failed | ActionTaken::Pending)
        });
        if unsettled {
            EXIT_PARTIAL
        } else {
            EXIT_OK
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub original: PathBuf,
    /// `None` when the original did not exist before the first mutation.
    pub backup: Option<PathBuf>,
    pub existed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct BackupManifest {
    pub version: u32,
    pub records: Vec<BackupRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreItem {
    pub original: PathBuf,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOutcome {
    Unchanged,
    Appended,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetListing {
    pub name: String,
    pub detection: Detection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            _ => Self::Linux,
        }
    }
}
