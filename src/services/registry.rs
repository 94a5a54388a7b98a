//! Trust target contract, the shared provisioning context, and the static
//! per-platform registry of known tools.

use crate::domain::models::{Detection, EditOutcome, Platform, TargetListing};
use crate::error::{Result, TrustError};
use crate::services::anchor::TrustAnchor;
use crate::services::editor::ConfigFileEditor;
use crate::services::env::EnvironmentPublisher;
use crate::services::process::CommandRunner;
use crate::services::targets::{
    CertifiTarget, EnvVarTarget, KeytoolTarget, NpmrcTarget, ToolConfigTarget,
};
use std::path::{Path, PathBuf};

/// Machine-wide resources a target may read or mutate. Owned by the engine so
/// all access is sequential and goes through the backup discipline.
pub struct ProvisionContext<'a> {
    pub editor: ConfigFileEditor,
    pub env: EnvironmentPublisher,
    pub runner: &'a dyn CommandRunner,
    /// Managed PEM bundle that environment and config targets point at.
    pub bundle_path: PathBuf,
    pub bundle_seed: Option<PathBuf>,
    pub java_storepass: String,
    /// Explicit `cacerts` keystore; resolved from the `keytool` location when unset.
    pub java_cacerts: Option<PathBuf>,
    /// Transient copy of the anchor, present only while a run is provisioning.
    pub anchor_file: Option<PathBuf>,
}

impl ProvisionContext<'_> {
    pub fn bundle_value(&self) -> String {
        self.bundle_path.to_string_lossy().to_string()
    }

    pub fn bundle_trusts(&self, anchor: &TrustAnchor) -> Result<bool> {
        self.editor.has_block(&self.bundle_path, &anchor.pem)
    }

    pub fn ensure_bundle(&mut self, anchor: &TrustAnchor) -> Result<EditOutcome> {
        let seed = self.bundle_seed.clone();
        self.editor
            .ensure_block(&self.bundle_path, &anchor.pem, seed.as_deref())
    }
}

pub trait TrustTarget {
    fn name(&self) -> &str;

    /// Pure presence probe. Must not mutate anything.
    fn detect(&self, ctx: &ProvisionContext) -> Detection;

    fn current_state(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool>;

    /// Must be safe to call on a target that already trusts the anchor.
    fn apply(&self, ctx: &mut ProvisionContext, anchor: &TrustAnchor) -> Result<()>;

    fn verify(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool> {
        self.current_state(ctx, anchor)
    }
}

pub fn detect_any(runner: &dyn CommandRunner, tools: &[&str]) -> Detection {
    if tools.iter().any(|t| runner.which(t).is_some()) {
        Detection::Present
    } else {
        Detection::Absent
    }
}

pub struct TargetRegistry {
    targets: Vec<Box<dyn TrustTarget>>,
}

fn gcloud_config(platform: Platform, home: &Path) -> PathBuf {
    match (platform, std::env::var_os("APPDATA")) {
        (Platform::Windows, Some(appdata)) => PathBuf::from(appdata)
            .join("gcloud")
            .join("configurations")
            .join("config_default"),
        _ => home.join(".config/gcloud/configurations/config_default"),
    }
}

impl TargetRegistry {
    pub fn for_platform(platform: Platform, home: &Path) -> Self {
        let python: &'static [&'static str] = match platform {
            Platform::Windows => &["python", "py"],
            _ => &["python3", "python"],
        };
        let pip: &'static [&'static str] = match platform {
            Platform::Windows => &["pip"],
            _ => &["pip3", "pip"],
        };

        let targets: Vec<Box<dyn TrustTarget>> = vec![
            Box::new(EnvVarTarget::new("openssl", "SSL_CERT_FILE", &["openssl"])),
            Box::new(EnvVarTarget::new("curl", "CURL_CA_BUNDLE", &["curl"])),
            Box::new(EnvVarTarget::new("python-requests", "REQUESTS_CA_BUNDLE", python)),
            Box::new(EnvVarTarget::new("pip", "PIP_CERT", pip)),
            Box::new(EnvVarTarget::new("aws-cli", "AWS_CA_BUNDLE", &["aws"])),
            Box::new(EnvVarTarget::new("boto", "BOTO_CA_BUNDLE", &["gsutil"])),
            Box::new(EnvVarTarget::new("azure-cli", "AZURE_CA_BUNDLE", &["az"])),
            Box::new(EnvVarTarget::new("node", "NODE_EXTRA_CA_CERTS", &["node"])),
            Box::new(EnvVarTarget::new("composer", "COMPOSER_CAFILE", &["composer"])),
            Box::new(ToolConfigTarget {
                name: "git",
                tool: "git",
                get_args: &["config", "--global", "--get", "http.sslCAInfo"],
                set_args: &["config", "--global", "http.sslCAInfo"],
                config_file: home.join(".gitconfig"),
            }),
            Box::new(ToolConfigTarget {
                name: "gcloud",
                tool: "gcloud",
                get_args: &["config", "get-value", "core/custom_ca_certs_file"],
                set_args: &["config", "set", "core/custom_ca_certs_file"],
                config_file: gcloud_config(platform, home),
            }),
            Box::new(NpmrcTarget {
                npmrc: home.join(".npmrc"),
            }),
            Box::new(CertifiTarget { python }),
            Box::new(KeytoolTarget),
        ];
        Self { targets }
    }

    pub fn names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn TrustTarget> {
        self.targets.iter().map(|t| t.as_ref())
    }

    /// Registry order, restricted to `only` (when non-empty) minus `disabled`.
    pub fn select(&self, only: &[String], disabled: &[String]) -> Result<Vec<&dyn TrustTarget>> {
        let known = self.names();
        for name in only.iter().chain(disabled) {
            if !known.contains(name) {
                return Err(TrustError::Config(format!(
                    "unknown target '{}' (known: {})",
                    name,
                    known.join(", ")
                )));
            }
        }
        Ok(self
            .all()
            .filter(|t| only.is_empty() || only.iter().any(|o| o == t.name()))
            .filter(|t| !disabled.iter().any(|d| d == t.name()))
            .collect())
    }

    pub fn listing(&self, ctx: &ProvisionContext) -> Vec<TargetListing> {
        self.all()
            .map(|t| TargetListing {
                name: t.name().to_string(),
                detection: t.detect(ctx),
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_are_unique_and_ordered() {
        let reg = TargetRegistry::for_platform(Platform::MacOs, Path::new("/Users/dev"));
        let names = reg.names();
        let mut dedup = names.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(names.len(), dedup.len());
        assert_eq!(names.first().map(String::as_str), Some("openssl"));
        assert!(names.contains(&"java".to_string()));
    }

    #[test]
    fn select_filters_and_rejects_unknown_names() {
        let reg = TargetRegistry::for_platform(Platform::Linux, Path::new("/home/dev"));
        let only = vec!["node".to_string(), "git".to_string()];
        let picked: Vec<_> = reg
            .select(&only, &["git".to_string()])
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(picked, vec!["node".to_string()]);

        let err = reg.select(&["ruby".to_string()], &[]).err().unwrap();
        assert!(err.to_string().contains("unknown target 'ruby'"));
    }
}
