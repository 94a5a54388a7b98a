use crate::domain::constants::WINDOWS_MACHINE_ENV_KEY;
use crate::error::{Result, TrustError};
use crate::services::editor::ConfigFileEditor;
use crate::services::process::CommandRunner;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvScope {
    /// Current process and the children it spawns.
    Process,
    /// Persistent, machine-wide (or login-shell-wide on Unix).
    Machine,
}

/// Where machine-scoped variables are persisted.
#[derive(Debug, Clone)]
pub enum MachineEnv {
    /// `setx /M` plus `reg query` against the Session Manager environment key.
    WindowsRegistry,
    /// `export VAR="value"` lines in each listed shell profile.
    ShellProfiles(Vec<PathBuf>),
}

pub struct EnvironmentPublisher {
    machine: MachineEnv,
}

pub fn export_line(var: &str, value: &str) -> String {
    format!("export {}=\"{}\"", var, value)
}

/// Value column of `reg query <key> /v <var>` output.
fn parse_reg_query(stdout: &str, var: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut cols = line.split_whitespace();
        let name = cols.next()?;
        if !name.eq_ignore_ascii_case(var) {
            return None;
        }
        let kind = cols.next()?;
        if !kind.starts_with("REG_") {
            return None;
        }
        let value = cols.collect::<Vec<_>>().join(" ");
        Some(value)
    })
}

impl EnvironmentPublisher {
    pub fn new(machine: MachineEnv) -> Self {
        Self { machine }
    }

    pub fn is_published(
        &self,
        editor: &ConfigFileEditor,
        runner: &dyn CommandRunner,
        var: &str,
        value: &str,
        scope: EnvScope,
    ) -> Result<bool> {
        match scope {
            EnvScope::Process => Ok(std::env::var(var).ok().as_deref() == Some(value)),
            EnvScope::Machine => match &self.machine {
                MachineEnv::WindowsRegistry => {
                    let reg = runner
                        .which("reg")
                        .ok_or_else(|| TrustError::target(var, "reg.exe not found"))?;
                    let out = runner.run(&reg, &["query", WINDOWS_MACHINE_ENV_KEY, "/v", var])?;
                    if !out.success {
                        return Ok(false);
                    }
                    Ok(parse_reg_query(&out.stdout, var).as_deref() == Some(value))
                }
                MachineEnv::ShellProfiles(profiles) => {
                    let line = export_line(var, value);
                    for profile in profiles {
                        if !editor.has_line(profile, &line)? {
                            return Ok(false);
                        }
                    }
                    Ok(!profiles.is_empty())
                }
            },
        }
    }

    /// Publish one variable. Each call stands alone so a failure here never
    /// prevents the caller from publishing the next one.
    pub fn set_scoped(
        &self,
        editor: &mut ConfigFileEditor,
        runner: &dyn CommandRunner,
        var: &str,
        value: &str,
        scope: EnvScope,
    ) -> Result<()> {
        match scope {
            EnvScope::Process => {
                std::env::set_var(var, value);
                Ok(())
            }
            EnvScope::Machine => match &self.machine {
                MachineEnv::WindowsRegistry => {
                    let setx = runner
                        .which("setx")
                        .ok_or_else(|| TrustError::target(var, "setx.exe not found"))?;
                    let args = [var, value, "/M"];
                    runner.run(&setx, &args)?.check(&setx, &args)?;
                    tracing::info!(var, "machine variable set");
                    Ok(())
                }
                MachineEnv::ShellProfiles(profiles) => {
                    if profiles.is_empty() {
                        return Err(TrustError::Config(
                            "no shell profiles configured for machine-scoped variables"
                                .to_string(),
                        ));
                    }
                    let line = export_line(var, value);
                    for profile in profiles {
                        editor.ensure_line(profile, &line)?;
                    }
                    Ok(())
                }
            },
        }
    }
}
