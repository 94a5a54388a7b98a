//! Copy-on-first-write backups.
//!
//! A path is snapshotted at most once per run. A path already recorded in the
//! manifest by an earlier run is never snapshotted again, so the backup
//! directory keeps the earliest original of every file this tool has touched.

use crate::domain::models::{BackupManifest, BackupRecord, RestoreItem};
use crate::error::{Result, TrustError};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";

pub struct BackupStore {
    dir: PathBuf,
    touched: HashSet<PathBuf>,
    created: usize,
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `<file name>.<first 16 hex digits of sha256(absolute path)>.bak`, unique per original.
fn backup_file_name(original: &Path) -> String {
    let digest = hex::encode(Sha256::digest(original.to_string_lossy().as_bytes()));
    let name = original
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    format!("{}.{}.bak", name, &digest[..16])
}

fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

pub fn load_manifest(dir: &Path) -> Result<BackupManifest> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Ok(BackupManifest {
            version: 1,
            records: vec![],
        });
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| TrustError::io(&path, e))?;
    serde_json::from_str(&raw)
        .map_err(|e| TrustError::Config(format!("{}: {}", path.display(), e)))
}

fn save_manifest(dir: &Path, manifest: &BackupManifest) -> std::io::Result<()> {
    let raw = serde_json::to_string_pretty(manifest).map_err(std::io::Error::other)?;
    std::fs::write(manifest_path(dir), raw)
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            touched: HashSet::new(),
            created: 0,
        }
    }

    /// Number of records created during this run.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Snapshot `path` before its first mutation in this run.
    ///
    /// Returns `None` when the path was already handled in this run or an
    /// earlier run's backup is kept.
    pub fn snapshot(&mut self, path: &Path) -> Result<Option<BackupRecord>> {
        let backup_err = |source| TrustError::Backup {
            path: path.to_path_buf(),
            source,
        };
        let original = absolute(path).map_err(backup_err)?;
        if self.touched.contains(&original) {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir).map_err(backup_err)?;
        let mut manifest = load_manifest(&self.dir)?;
        if manifest.records.iter().any(|r| r.original == original) {
            tracing::debug!(path = %original.display(), "keeping earlier backup");
            self.touched.insert(original);
            return Ok(None);
        }

        let existed = original.exists();
        let backup = if existed {
            let dest = self.dir.join(backup_file_name(&original));
            std::fs::copy(&original, &dest).map_err(backup_err)?;
            Some(dest)
        } else {
            None
        };

        let record = BackupRecord {
            original: original.clone(),
            backup,
            existed,
            created_at: Utc::now(),
        };
        manifest.records.push(record.clone());
        save_manifest(&self.dir, &manifest).map_err(backup_err)?;

        tracing::info!(path = %original.display(), existed, "backed up");
        self.touched.insert(original);
        self.created += 1;
        Ok(Some(record))
    }
}

/// Put every recorded original back and clear the manifest.
///
/// Files that did not exist before the first mutation are removed.
pub fn restore_all(dir: &Path) -> Result<Vec<RestoreItem>> {
    let manifest = load_manifest(dir)?;
    let mut out = Vec::new();
    let mut remaining = Vec::new();

    for record in manifest.records {
        let result = match (&record.backup, record.existed) {
            (Some(bak), true) => std::fs::copy(bak, &record.original)
                .and_then(|_| std::fs::remove_file(bak))
                .map(|_| "restored"),
            _ if record.original.exists() => {
                std::fs::remove_file(&record.original).map(|_| "removed")
            }
            _ => Ok("absent"),
        };
        match result {
            Ok(status) => out.push(RestoreItem {
                original: record.original.clone(),
                status: status.to_string(),
            }),
            Err(e) => {
                tracing::warn!(path = %record.original.display(), error = %e, "restore failed");
                out.push(RestoreItem {
                    original: record.original.clone(),
                    status: format!("failed: {}", e),
                });
                remaining.push(record);
            }
        }
    }

    if dir.exists() {
        save_manifest(
            dir,
            &BackupManifest {
                version: 1,
                records: remaining,
            },
        )
        .map_err(|e| TrustError::io(manifest_path(dir), e))?;
    }
    Ok(out)
}
