//! Concrete trust targets. Each one reports its own state and repairs only
//! itself; shared resources (the managed bundle, shell profiles) are reached
//! through idempotent editor calls so targets never depend on each other.

use crate::domain::models::Detection;
use crate::error::{Result, TrustError};
use crate::services::anchor::{certificates_from_pem, TrustAnchor};
use crate::services::env::EnvScope;
use crate::services::registry::{detect_any, ProvisionContext, TrustTarget};
use std::path::{Path, PathBuf};

/// A tool that reads a CA bundle path from an environment variable.
pub struct EnvVarTarget {
    name: &'static str,
    var: &'static str,
    tools: &'static [&'static str],
}

impl EnvVarTarget {
    pub fn new(name: &'static str, var: &'static str, tools: &'static [&'static str]) -> Self {
        Self { name, var, tools }
    }
}

impl TrustTarget for EnvVarTarget {
    fn name(&self) -> &str {
        self.name
    }

    fn detect(&self, ctx: &ProvisionContext) -> Detection {
        detect_any(ctx.runner, self.tools)
    }

    fn current_state(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool> {
        if !ctx.bundle_trusts(anchor)? {
            return Ok(false);
        }
        ctx.env.is_published(
            &ctx.editor,
            ctx.runner,
            self.var,
            &ctx.bundle_value(),
            EnvScope::Machine,
        )
    }

    fn apply(&self, ctx: &mut ProvisionContext, anchor: &TrustAnchor) -> Result<()> {
        ctx.ensure_bundle(anchor)?;
        let value = ctx.bundle_value();

        let mut errors = Vec::new();
        for scope in [EnvScope::Machine, EnvScope::Process] {
            if let Err(e) = ctx
                .env
                .set_scoped(&mut ctx.editor, ctx.runner, self.var, &value, scope)
            {
                tracing::warn!(var = self.var, ?scope, error = %e, "publish failed");
                errors.push(format!("{:?}: {}", scope, e));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TrustError::target(self.name, errors.join("; ")))
        }
    }
}

/// `cafile=` in the user's `.npmrc`.
pub struct NpmrcTarget {
    pub npmrc: PathBuf,
}

impl NpmrcTarget {
    fn line(ctx: &ProvisionContext) -> String {
        format!("cafile={}", ctx.bundle_value())
    }
}

impl TrustTarget for NpmrcTarget {
    fn name(&self) -> &str {
        "npm"
    }

    fn detect(&self, ctx: &ProvisionContext) -> Detection {
        detect_any(ctx.runner, &["npm"])
    }

    fn current_state(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool> {
        Ok(ctx.bundle_trusts(anchor)? && ctx.editor.has_line(&self.npmrc, &Self::line(ctx))?)
    }

    fn apply(&self, ctx: &mut ProvisionContext, anchor: &TrustAnchor) -> Result<()> {
        ctx.ensure_bundle(anchor)?;
        let line = Self::line(ctx);
        ctx.editor.ensure_line(&self.npmrc, &line)?;
        Ok(())
    }
}

/// A tool whose own CLI reads and writes the CA setting (`git config`,
/// `gcloud config`). The tool's config file is snapshotted before it writes.
pub struct ToolConfigTarget {
    pub name: &'static str,
    pub tool: &'static str,
    pub get_args: &'static [&'static str],
    pub set_args: &'static [&'static str],
    pub config_file: PathBuf,
}

impl ToolConfigTarget {
    fn program(&self, ctx: &ProvisionContext) -> Result<PathBuf> {
        ctx.runner
            .which(self.tool)
            .ok_or_else(|| TrustError::target(self.name, format!("`{}` not on PATH", self.tool)))
    }
}

impl TrustTarget for ToolConfigTarget {
    fn name(&self) -> &str {
        self.name
    }

    fn detect(&self, ctx: &ProvisionContext) -> Detection {
        detect_any(ctx.runner, &[self.tool])
    }

    fn current_state(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool> {
        if !ctx.bundle_trusts(anchor)? {
            return Ok(false);
        }
        let program = self.program(ctx)?;
        let out = ctx.runner.run(&program, self.get_args)?;
        // Unset keys exit non-zero.
        Ok(out.success && out.stdout.trim() == ctx.bundle_value())
    }

    fn apply(&self, ctx: &mut ProvisionContext, anchor: &TrustAnchor) -> Result<()> {
        ctx.ensure_bundle(anchor)?;
        let program = self.program(ctx)?;
        ctx.editor.protect(&self.config_file)?;

        let value = ctx.bundle_value();
        let mut args: Vec<&str> = self.set_args.to_vec();
        args.push(&value);
        ctx.runner.run(&program, &args)?.check(&program, &args)?;
        Ok(())
    }
}

/// The `certifi` bundle shipped inside the Python installation.
pub struct CertifiTarget {
    pub python: &'static [&'static str],
}

const CERTIFI_PROBE: &str = "import certifi; print(certifi.where())";

impl CertifiTarget {
    /// Location of `cacert.pem`, or `None` when no interpreter has certifi.
    fn locate(&self, ctx: &ProvisionContext) -> Result<Option<PathBuf>> {
        let Some(python) = self.python.iter().find_map(|p| ctx.runner.which(p)) else {
            return Ok(None);
        };
        let out = ctx.runner.run(&python, &["-c", CERTIFI_PROBE])?;
        let path = out.stdout.trim();
        if !out.success || path.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(path)))
    }

    fn bundle(&self, ctx: &ProvisionContext) -> Result<PathBuf> {
        self.locate(ctx)?
            .ok_or_else(|| TrustError::target("python-certifi", "certifi not importable"))
    }
}

impl TrustTarget for CertifiTarget {
    fn name(&self) -> &str {
        "python-certifi"
    }

    fn detect(&self, ctx: &ProvisionContext) -> Detection {
        match self.locate(ctx) {
            Ok(Some(_)) => Detection::Present,
            Ok(None) => Detection::Absent,
            Err(e) => Detection::Indeterminate(e.to_string()),
        }
    }

    fn current_state(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool> {
        let bundle = self.bundle(ctx)?;
        ctx.editor.has_block(&bundle, &anchor.pem)
    }

    fn apply(&self, ctx: &mut ProvisionContext, anchor: &TrustAnchor) -> Result<()> {
        let bundle = self.bundle(ctx)?;
        ctx.editor.ensure_block(&bundle, &anchor.pem, None)?;
        Ok(())
    }
}

/// The JDK `cacerts` keystore, managed through `keytool`.
pub struct KeytoolTarget;

impl KeytoolTarget {
    fn keytool(ctx: &ProvisionContext) -> Result<PathBuf> {
        ctx.runner
            .which("keytool")
            .ok_or_else(|| TrustError::target("java", "`keytool` not on PATH"))
    }

    /// `<jdk>/lib/security/cacerts` next to the resolved `keytool` binary.
    fn cacerts(ctx: &ProvisionContext, keytool: &Path) -> Result<PathBuf> {
        if let Some(explicit) = &ctx.java_cacerts {
            return Ok(explicit.clone());
        }
        let real = std::fs::canonicalize(keytool).unwrap_or_else(|_| keytool.to_path_buf());
        real.parent()
            .and_then(Path::parent)
            .map(|jdk| jdk.join("lib").join("security").join("cacerts"))
            .filter(|p| p.exists())
            .ok_or_else(|| {
                TrustError::target(
                    "java",
                    format!("cannot locate cacerts for {}", real.display()),
                )
            })
    }

    /// DER of the certificate currently stored under the alias, if any.
    fn stored(ctx: &ProvisionContext, keytool: &Path, alias: &str) -> Result<Option<Vec<u8>>> {
        let args = [
            "-list",
            "-cacerts",
            "-storepass",
            ctx.java_storepass.as_str(),
            "-alias",
            alias,
            "-rfc",
        ];
        let out = ctx.runner.run(keytool, &args)?;
        if !out.success {
            return Ok(None);
        }
        Ok(certificates_from_pem(out.stdout.as_bytes()).into_iter().next())
    }
}

impl TrustTarget for KeytoolTarget {
    fn name(&self) -> &str {
        "java"
    }

    fn detect(&self, ctx: &ProvisionContext) -> Detection {
        detect_any(ctx.runner, &["keytool"])
    }

    fn current_state(&self, ctx: &ProvisionContext, anchor: &TrustAnchor) -> Result<bool> {
        let keytool = Self::keytool(ctx)?;
        Ok(Self::stored(ctx, &keytool, &anchor.alias())?.as_deref() == Some(anchor.der.as_slice()))
    }

    fn apply(&self, ctx: &mut ProvisionContext, anchor: &TrustAnchor) -> Result<()> {
        let keytool = Self::keytool(ctx)?;
        let file = ctx
            .anchor_file
            .clone()
            .ok_or_else(|| TrustError::target("java", "anchor file not staged"))?;
        let cacerts = Self::cacerts(ctx, &keytool)?;
        ctx.editor.protect(&cacerts)?;

        let alias = anchor.alias();
        let storepass = ctx.java_storepass.clone();
        if Self::stored(ctx, &keytool, &alias)?.is_some() {
            let args = [
                "-delete",
                "-cacerts",
                "-storepass",
                storepass.as_str(),
                "-alias",
                alias.as_str(),
            ];
            ctx.runner.run(&keytool, &args)?.check(&keytool, &args)?;
        }

        let file = file.to_string_lossy().to_string();
        let args = [
            "-importcert",
            "-noprompt",
            "-trustcacerts",
            "-cacerts",
            "-storepass",
            storepass.as_str(),
            "-alias",
            alias.as_str(),
            "-file",
            file.as_str(),
        ];
        ctx.runner.run(&keytool, &args)?.check(&keytool, &args)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::anchor::testing::anchor;
    use crate::services::process::fake::FakeRunner;
    use crate::services::registry::testing::context;
    use tempfile::TempDir;

    const SUBJECT: &str = "Zscaler Root CA";

    #[test]
    fn env_var_target_writes_bundle_and_profile_then_reports_trusted() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeRunner::with_tools(&["node"]);
        let mut ctx = context(tmp.path(), &runner);
        let target = EnvVarTarget::new("node", "NODE_EXTRA_CA_CERTS", &["node"]);
        let anchor = anchor(SUBJECT);

        assert_eq!(target.detect(&ctx), Detection::Present);
        assert!(!target.current_state(&ctx, &anchor).unwrap());
        target.apply(&mut ctx, &anchor).unwrap();
        assert!(target.verify(&ctx, &anchor).unwrap());

        let profile = std::fs::read_to_string(tmp.path().join(".zshrc")).unwrap();
        assert_eq!(
            profile,
            format!("export NODE_EXTRA_CA_CERTS=\"{}\"\n", ctx.bundle_value())
        );
        assert_eq!(
            std::env::var("NODE_EXTRA_CA_CERTS").ok(),
            Some(ctx.bundle_value())
        );
    }

    #[test]
    fn env_var_target_without_tool_is_absent() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeRunner::default();
        let ctx = context(tmp.path(), &runner);
        let target = EnvVarTarget::new("aws-cli", "AWS_CA_BUNDLE", &["aws"]);
        assert_eq!(target.detect(&ctx), Detection::Absent);
    }

    #[test]
    fn npmrc_keeps_existing_settings() {
        let tmp = TempDir::new().unwrap();
        let npmrc = tmp.path().join(".npmrc");
        std::fs::write(&npmrc, "registry=https://registry.npmjs.org/\n").unwrap();
        let runner = FakeRunner::with_tools(&["npm"]);
        let mut ctx = context(tmp.path(), &runner);
        let target = NpmrcTarget {
            npmrc: npmrc.clone(),
        };
        let anchor = anchor(SUBJECT);

        target.apply(&mut ctx, &anchor).unwrap();
        target.apply(&mut ctx, &anchor).unwrap();
        assert!(target.current_state(&ctx, &anchor).unwrap());
        assert_eq!(
            std::fs::read_to_string(&npmrc).unwrap(),
            format!(
                "registry=https://registry.npmjs.org/\ncafile={}\n",
                ctx.bundle_value()
            )
        );
    }

    #[test]
    fn git_target_sets_ssl_ca_info_through_git() {
        let tmp = TempDir::new().unwrap();
        let gitconfig = tmp.path().join(".gitconfig");
        std::fs::write(&gitconfig, "[user]\n\tname = dev\n").unwrap();
        let runner = FakeRunner::with_tools(&["git"]);
        let mut ctx = context(tmp.path(), &runner);
        let bundle = ctx.bundle_value();
        runner.respond(
            &format!("git config --global http.sslCAInfo {}", bundle),
            true,
            "",
        );
        let target = ToolConfigTarget {
            name: "git",
            tool: "git",
            get_args: &["config", "--global", "--get", "http.sslCAInfo"],
            set_args: &["config", "--global", "http.sslCAInfo"],
            config_file: gitconfig,
        };
        let anchor = anchor(SUBJECT);

        assert!(!target.current_state(&ctx, &anchor).unwrap());
        target.apply(&mut ctx, &anchor).unwrap();
        assert_eq!(ctx.editor.backups().created(), 2);

        runner.respond(
            "git config --global --get http.sslCAInfo",
            true,
            &format!("{}\n", bundle),
        );
        assert!(target.verify(&ctx, &anchor).unwrap());
    }

    #[test]
    fn failing_tool_cli_is_a_target_error() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeRunner::with_tools(&["gcloud"]);
        let mut ctx = context(tmp.path(), &runner);
        let target = ToolConfigTarget {
            name: "gcloud",
            tool: "gcloud",
            get_args: &["config", "get-value", "core/custom_ca_certs_file"],
            set_args: &["config", "set", "core/custom_ca_certs_file"],
            config_file: tmp.path().join("config_default"),
        };
        let err = target.apply(&mut ctx, &anchor(SUBJECT)).unwrap_err();
        assert!(matches!(err, TrustError::Command { .. }));
    }

    #[test]
    fn certifi_detection_follows_the_import_probe() {
        let tmp = TempDir::new().unwrap();
        let cacert = tmp.path().join("site-packages/certifi/cacert.pem");
        std::fs::create_dir_all(cacert.parent().unwrap()).unwrap();
        std::fs::write(&cacert, "").unwrap();

        let runner = FakeRunner::with_tools(&["python3"]);
        let mut ctx = context(tmp.path(), &runner);
        let target = CertifiTarget {
            python: &["python3", "python"],
        };
        assert_eq!(target.detect(&ctx), Detection::Absent);

        runner.respond(
            &format!("python3 -c {}", CERTIFI_PROBE),
            true,
            &format!("{}\n", cacert.display()),
        );
        assert_eq!(target.detect(&ctx), Detection::Present);

        let anchor = anchor(SUBJECT);
        target.apply(&mut ctx, &anchor).unwrap();
        assert!(target.verify(&ctx, &anchor).unwrap());
        assert_eq!(
            std::fs::read_to_string(&cacert).unwrap().matches("BEGIN CERTIFICATE").count(),
            1
        );
    }

    #[test]
    fn keytool_imports_under_the_subject_alias() {
        let tmp = TempDir::new().unwrap();
        let cacerts = tmp.path().join("jdk/lib/security/cacerts");
        std::fs::create_dir_all(cacerts.parent().unwrap()).unwrap();
        std::fs::write(&cacerts, [0xfe, 0xed, 0xfe, 0xed]).unwrap();
        let staged = tmp.path().join("anchor.pem");

        let runner = FakeRunner::with_tools(&["keytool"]);
        let mut ctx = context(tmp.path(), &runner);
        ctx.java_cacerts = Some(cacerts);
        ctx.anchor_file = Some(staged.clone());
        let anchor = anchor(SUBJECT);
        runner.respond(
            &format!(
                "keytool -importcert -noprompt -trustcacerts -cacerts -storepass changeit \
                 -alias trustline-zscaler-root-ca -file {}",
                staged.display()
            ),
            true,
            "Certificate was added to keystore",
        );

        assert!(!KeytoolTarget.current_state(&ctx, &anchor).unwrap());
        KeytoolTarget.apply(&mut ctx, &anchor).unwrap();
        assert_eq!(ctx.editor.backups().created(), 1);

        runner.respond(
            "keytool -list -cacerts -storepass changeit -alias trustline-zscaler-root-ca -rfc",
            true,
            &anchor.pem,
        );
        assert!(KeytoolTarget.verify(&ctx, &anchor).unwrap());
        assert!(!runner.calls.borrow().iter().any(|c| c.contains("-delete")));
    }

    #[test]
    fn keytool_without_staged_anchor_fails() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeRunner::with_tools(&["keytool"]);
        let mut ctx = context(tmp.path(), &runner);
        let err = KeytoolTarget.apply(&mut ctx, &anchor(SUBJECT)).unwrap_err();
        assert!(err.to_string().contains("not staged"));
    }
}
