use crate::domain::models::EditOutcome;
use crate::error::{Result, TrustError};
use crate::services::backup::BackupStore;
use std::io::Write;
use std::path::Path;

/// Idempotent, backup-preserving mutations of text files.
///
/// Presence checks are exact: a line that differs only in quoting or
/// whitespace is not recognised and will be appended again.
pub struct ConfigFileEditor {
    backups: BackupStore,
}

fn read_or_empty(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(TrustError::io(path, e)),
    }
}

fn separator_for(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}

impl ConfigFileEditor {
    pub fn new(backups: BackupStore) -> Self {
        Self { backups }
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Snapshot a file that is about to be changed by something other than
    /// this editor (a tool CLI, keytool).
    pub fn protect(&mut self, path: &Path) -> Result<()> {
        self.backups.snapshot(path).map(|_| ())
    }

    pub fn has_line(&self, path: &Path, line: &str) -> Result<bool> {
        Ok(read_or_empty(path)?.lines().any(|l| l == line))
    }

    pub fn ensure_line(&mut self, path: &Path, line: &str) -> Result<EditOutcome> {
        let content = read_or_empty(path)?;
        if content.lines().any(|l| l == line) {
            return Ok(EditOutcome::Unchanged);
        }

        let sep = separator_for(&content);
        let mut addition = String::new();
        if !content.is_empty() && !content.ends_with('\n') {
            addition.push_str(sep);
        }
        addition.push_str(line);
        addition.push_str(sep);

        self.append(path, &addition)?;
        tracing::info!(path = %path.display(), line, "appended line");
        Ok(EditOutcome::Appended)
    }

    pub fn has_block(&self, path: &Path, block: &str) -> Result<bool> {
        let needle = normalize(block.trim());
        Ok(normalize(&read_or_empty(path)?).contains(&needle))
    }

    /// Like `ensure_line` for a multi-line block such as a PEM certificate.
    ///
    /// A missing file is first seeded with the contents of `seed`, if given
    /// and readable. A seed that already holds the block is copied as is.
    pub fn ensure_block(
        &mut self,
        path: &Path,
        block: &str,
        seed: Option<&Path>,
    ) -> Result<EditOutcome> {
        if self.has_block(path, block)? {
            return Ok(EditOutcome::Unchanged);
        }

        let mut content = read_or_empty(path)?;
        let mut addition = String::new();
        if !path.exists() {
            if let Some(seed) = seed {
                match std::fs::read_to_string(seed) {
                    Ok(base) => {
                        tracing::debug!(seed = %seed.display(), "seeding bundle");
                        let seeded = normalize(&base).contains(&normalize(block.trim()));
                        content = base.clone();
                        addition.push_str(&base);
                        if seeded {
                            if !base.is_empty() && !base.ends_with('\n') {
                                addition.push_str(separator_for(&base));
                            }
                            self.append(path, &addition)?;
                            tracing::info!(path = %path.display(), "seeded bundle already holds block");
                            return Ok(EditOutcome::Appended);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(seed = %seed.display(), error = %e, "bundle seed unreadable")
                    }
                }
            }
        }

        let sep = separator_for(&content);
        if !content.is_empty() && !content.ends_with('\n') {
            addition.push_str(sep);
        }
        addition.push_str(&normalize(block.trim()).replace('\n', sep));
        addition.push_str(sep);

        self.append(path, &addition)?;
        tracing::info!(path = %path.display(), "appended block");
        Ok(EditOutcome::Appended)
    }

    fn append(&mut self, path: &Path, addition: &str) -> Result<()> {
        self.backups.snapshot(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrustError::io(parent, e))?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(addition.as_bytes()))
            .map_err(|e| TrustError::io(path, e))
    }
}
