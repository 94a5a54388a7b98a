use crate::error::{Result, TrustError};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Converts a non-zero exit into a `TrustError::Command`.
    pub fn check(self, program: &Path, args: &[&str]) -> Result<CommandOutput> {
        if self.success {
            return Ok(self);
        }
        Err(TrustError::Command {
            program: program.display().to_string(),
            args: args.join(" "),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Seam between targets and the external tools they configure.
pub trait CommandRunner {
    /// Resolve a tool name against the search path without running it.
    fn which(&self, tool: &str) -> Option<PathBuf>;

    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn which(&self, tool: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        find_on_path(tool, &path)
    }

    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput> {
        tracing::debug!(program = %program.display(), ?args, "running");
        let out = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| TrustError::io(program, e))?;
        Ok(CommandOutput {
            success: out.status.success(),
            status: out.status.to_string(),
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        })
    }
}

fn executable_names(tool: &str) -> Vec<String> {
    if !cfg!(windows) || Path::new(tool).extension().is_some() {
        return vec![tool.to_string()];
    }
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT".to_string());
    exts.split(';')
        .filter(|e| !e.is_empty())
        .map(|e| format!("{}{}", tool, e.to_ascii_lowercase()))
        .collect()
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

pub fn find_on_path(tool: &str, path: &std::ffi::OsStr) -> Option<PathBuf> {
    let names = executable_names(tool);
    std::env::split_paths(path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

#[cfg(test)]
pub mod fake {
    use super::{CommandOutput, CommandRunner};
    use crate::error::Result;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// Scripted runner: tools listed in `installed` resolve to `/fake/bin/<tool>`,
    /// responses are keyed by `"<tool> <args...>"`.
    #[derive(Default)]
    pub struct FakeRunner {
        pub installed: Vec<String>,
        pub responses: RefCell<HashMap<String, CommandOutput>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        pub fn with_tools(tools: &[&str]) -> Self {
            Self {
                installed: tools.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn respond(&self, key: &str, success: bool, stdout: &str) {
            self.responses.borrow_mut().insert(
                key.to_string(),
                CommandOutput {
                    success,
                    status: if success { "exit status: 0" } else { "exit status: 1" }
                        .to_string(),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            );
        }
    }

    impl CommandRunner for FakeRunner {
        fn which(&self, tool: &str) -> Option<PathBuf> {
            self.installed
                .iter()
                .any(|t| t == tool)
                .then(|| PathBuf::from("/fake/bin").join(tool))
        }

        fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput> {
            let tool = program
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let key = format!("{} {}", tool, args.join(" "));
            self.calls.borrow_mut().push(key.clone());
            Ok(self
                .responses
                .borrow()
                .get(&key)
                .cloned()
                .unwrap_or(CommandOutput {
                    success: false,
                    status: "exit status: 1".to_string(),
                    stdout: String::new(),
                    stderr: format!("unscripted: {}", key),
                }))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::find_on_path;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn finds_only_executable_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        let tool = bin.join("node");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(bin.join("notes"), "plain file").unwrap();

        let path = std::env::join_paths([tmp.path().join("missing"), bin.clone()]).unwrap();
        assert_eq!(find_on_path("node", &path), Some(tool));
        assert_eq!(find_on_path("notes", &path), None);
        assert_eq!(find_on_path("git", &path), None);
    }
}
