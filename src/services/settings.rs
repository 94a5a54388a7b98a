//! `config.toml` loading and resolution into the concrete values a run uses.
//!
//! Every key is optional; unset keys fall back to per-platform defaults and
//! command-line flags override both.

use crate::domain::constants::{
    DEFAULT_CONNECTIVITY_TIMEOUT_MS, DEFAULT_CONNECTIVITY_URL, DEFAULT_JAVA_STOREPASS,
    DEFAULT_SUBJECT, LINUX_SYSTEM_BUNDLE, MACOS_BASE_BUNDLE, MACOS_SYSTEM_KEYCHAIN,
};
use crate::domain::models::Platform;
use crate::error::{Result, TrustError};
use crate::services::anchor::{
    CertificateSource, KeychainSource, PemBundleSource, WindowsRootStoreSource,
};
use crate::services::backup::BackupStore;
use crate::services::connectivity::{ConnectivityProbe, HttpProbe, SkipProbe};
use crate::services::editor::ConfigFileEditor;
use crate::services::env::{EnvironmentPublisher, MachineEnv};
use crate::services::process::CommandRunner;
use crate::services::registry::{ProvisionContext, TargetRegistry};
use crate::services::storage::{config_dir, default_config_path, EventLog};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct SettingsFile {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub bundle_path: Option<PathBuf>,
    #[serde(default)]
    pub bundle_seed: Option<PathBuf>,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub profiles: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub disabled_targets: Vec<String>,
    #[serde(default)]
    pub connectivity: ConnectivitySettings,
    #[serde(default)]
    pub anchor: AnchorSettings,
    #[serde(default)]
    pub java: JavaSettings,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivitySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_connectivity_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_connectivity_url(),
            timeout_ms: DEFAULT_CONNECTIVITY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AnchorSettings {
    /// Read the anchor from this PEM bundle instead of the platform store.
    #[serde(default)]
    pub store_bundle: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct JavaSettings {
    #[serde(default)]
    pub storepass: Option<String>,
    #[serde(default)]
    pub cacerts: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_connectivity_url() -> String {
    DEFAULT_CONNECTIVITY_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_CONNECTIVITY_TIMEOUT_MS
}

/// Missing file at the default location is fine; a missing explicit
/// `--config` is not.
pub fn load_settings(explicit: Option<&Path>, home: &Path) -> Result<SettingsFile> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path(home),
    };
    if !path.exists() {
        if explicit.is_some() {
            return Err(TrustError::Config(format!(
                "{} does not exist",
                path.display()
            )));
        }
        return Ok(SettingsFile::default());
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| TrustError::io(&path, e))?;
    toml::from_str(&raw).map_err(|e| TrustError::Config(format!("{}: {}", path.display(), e)))
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub subject: Option<String>,
    pub store_bundle: Option<PathBuf>,
    pub skip_connectivity: bool,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub platform: Platform,
    pub home: PathBuf,
    pub subject: String,
    pub bundle_path: PathBuf,
    pub bundle_seed: Option<PathBuf>,
    pub backup_dir: PathBuf,
    pub log_file: PathBuf,
    pub profiles: Vec<PathBuf>,
    pub disabled_targets: Vec<String>,
    pub connectivity_enabled: bool,
    pub connectivity_url: String,
    pub connectivity_timeout_ms: u64,
    pub store_bundle: Option<PathBuf>,
    pub java_storepass: String,
    pub java_cacerts: Option<PathBuf>,
}

fn default_profiles(platform: Platform) -> Vec<PathBuf> {
    let names: &[&str] = match platform {
        Platform::MacOs => &[".zshrc", ".bash_profile"],
        Platform::Linux => &[".bashrc", ".profile"],
        Platform::Windows => &[],
    };
    names.iter().map(PathBuf::from).collect()
}

fn default_seed(platform: Platform) -> Option<PathBuf> {
    match platform {
        Platform::MacOs => Some(PathBuf::from(MACOS_BASE_BUNDLE)),
        Platform::Linux => Some(PathBuf::from(LINUX_SYSTEM_BUNDLE)),
        Platform::Windows => None,
    }
}

/// Relative paths in the settings file are relative to the home directory.
fn under_home(home: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        p
    } else {
        home.join(p)
    }
}

impl RunConfig {
    pub fn resolve(
        file: SettingsFile,
        overrides: Overrides,
        platform: Platform,
        home: &Path,
    ) -> Self {
        let base = config_dir(home);
        let subject = overrides
            .subject
            .or(file.subject)
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        let profiles = file
            .profiles
            .unwrap_or_else(|| default_profiles(platform))
            .into_iter()
            .map(|p| under_home(home, p))
            .collect();

        Self {
            platform,
            home: home.to_path_buf(),
            subject,
            bundle_path: file
                .bundle_path
                .map(|p| under_home(home, p))
                .unwrap_or_else(|| base.join("ca-bundle.pem")),
            bundle_seed: file.bundle_seed.or_else(|| default_seed(platform)),
            backup_dir: file
                .backup_dir
                .map(|p| under_home(home, p))
                .unwrap_or_else(|| base.join("backups")),
            log_file: file
                .log_file
                .map(|p| under_home(home, p))
                .unwrap_or_else(|| base.join("trustline.log")),
            profiles,
            disabled_targets: file.disabled_targets,
            connectivity_enabled: file.connectivity.enabled && !overrides.skip_connectivity,
            connectivity_url: file.connectivity.url,
            connectivity_timeout_ms: file.connectivity.timeout_ms,
            store_bundle: overrides.store_bundle.or(file.anchor.store_bundle),
            java_storepass: file
                .java
                .storepass
                .unwrap_or_else(|| DEFAULT_JAVA_STOREPASS.to_string()),
            java_cacerts: file.java.cacerts,
        }
    }

    pub fn machine_env(&self) -> MachineEnv {
        match self.platform {
            Platform::Windows => MachineEnv::WindowsRegistry,
            _ => MachineEnv::ShellProfiles(self.profiles.clone()),
        }
    }

    pub fn certificate_source<'a>(
        &self,
        runner: &'a dyn CommandRunner,
    ) -> Box<dyn CertificateSource + 'a> {
        if let Some(path) = &self.store_bundle {
            return Box::new(PemBundleSource { path: path.clone() });
        }
        match self.platform {
            Platform::MacOs => Box::new(KeychainSource {
                runner,
                keychain: PathBuf::from(MACOS_SYSTEM_KEYCHAIN),
            }),
            Platform::Windows => Box::new(WindowsRootStoreSource { runner }),
            Platform::Linux => Box::new(PemBundleSource {
                path: PathBuf::from(LINUX_SYSTEM_BUNDLE),
            }),
        }
    }

    pub fn probe(&self) -> Box<dyn ConnectivityProbe> {
        if self.connectivity_enabled {
            Box::new(HttpProbe::new(
                &self.connectivity_url,
                self.connectivity_timeout_ms,
            ))
        } else {
            Box::new(SkipProbe)
        }
    }

    pub fn registry(&self) -> TargetRegistry {
        TargetRegistry::for_platform(self.platform, &self.home)
    }

    pub fn event_log(&self) -> EventLog {
        EventLog::open(&self.log_file)
    }

    pub fn context<'a>(&self, runner: &'a dyn CommandRunner) -> ProvisionContext<'a> {
        ProvisionContext {
            editor: ConfigFileEditor::new(BackupStore::new(&self.backup_dir)),
            env: EnvironmentPublisher::new(self.machine_env()),
            runner,
            bundle_path: self.bundle_path.clone(),
            bundle_seed: self.bundle_seed.clone(),
            java_storepass: self.java_storepass.clone(),
            java_cacerts: self.java_cacerts.clone(),
            anchor_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_resolves_to_platform_defaults() {
        let home = Path::new("/Users/dev");
        let cfg = RunConfig::resolve(
            toml::from_str("").unwrap(),
            Overrides::default(),
            Platform::MacOs,
            home,
        );
        assert_eq!(cfg.subject, "Zscaler Root CA");
        assert_eq!(
            cfg.profiles,
            vec![home.join(".zshrc"), home.join(".bash_profile")]
        );
        assert_eq!(cfg.bundle_path, home.join(".config/trustline/ca-bundle.pem"));
        assert_eq!(cfg.bundle_seed, Some(PathBuf::from("/etc/ssl/cert.pem")));
        assert!(cfg.connectivity_enabled);
        assert_eq!(cfg.connectivity_timeout_ms, 3000);
        assert_eq!(cfg.java_storepass, "changeit");
    }

    #[test]
    fn file_values_and_cli_overrides_apply_in_order() {
        let raw = r#"
subject = "Corp Proxy Root"
profiles = [".zshrc"]
disabled_targets = ["java"]

[connectivity]
timeout_ms = 500

[anchor]
store_bundle = "/srv/roots.pem"
"#;
        let file: SettingsFile = toml::from_str(raw).unwrap();
        let home = Path::new("/home/dev");
        let cfg = RunConfig::resolve(
            file,
            Overrides {
                subject: Some("Zscaler Root CA".to_string()),
                store_bundle: None,
                skip_connectivity: true,
            },
            Platform::Linux,
            home,
        );
        assert_eq!(cfg.subject, "Zscaler Root CA");
        assert_eq!(cfg.profiles, vec![home.join(".zshrc")]);
        assert_eq!(cfg.disabled_targets, vec!["java".to_string()]);
        assert_eq!(cfg.connectivity_timeout_ms, 500);
        assert_eq!(cfg.connectivity_url, DEFAULT_CONNECTIVITY_URL);
        assert!(!cfg.connectivity_enabled);
        assert_eq!(cfg.store_bundle, Some(PathBuf::from("/srv/roots.pem")));
    }

    #[test]
    fn windows_publishes_through_the_registry() {
        let cfg = RunConfig::resolve(
            SettingsFile::default(),
            Overrides::default(),
            Platform::Windows,
            Path::new("C:\\Users\\dev"),
        );
        assert!(matches!(cfg.machine_env(), MachineEnv::WindowsRegistry));
        assert!(cfg.bundle_seed.is_none());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_settings(None, tmp.path()).is_ok());
        let err = load_settings(Some(&tmp.path().join("nope.toml")), tmp.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "profiles = 3").unwrap();
        let err = load_settings(Some(&path), tmp.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }
}
