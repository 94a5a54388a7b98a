#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SUBJECT: &str = "Zscaler Root CA";

pub fn ca_pem(common_name: &str) -> String {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key_pair = KeyPair::generate().expect("generate key");
    params.self_signed(&key_pair).expect("self-sign").pem()
}

/// Isolated machine: temp HOME, a PATH holding only fake `node` and `npm`,
/// a system store bundle holding the anchor, connectivity check disabled.
pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub bin: PathBuf,
    pub store: PathBuf,
    pub anchor_pem: String,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&home).expect("create isolated home");
        fs::create_dir_all(&bin).expect("create bin dir");

        for tool in ["node", "npm"] {
            install_fake_tool(&bin, tool);
        }

        let anchor_pem = ca_pem(SUBJECT);
        let store = tmp.path().join("system-roots.pem");
        fs::write(&store, format!("{}{}", ca_pem("Some Other Root"), anchor_pem))
            .expect("write store bundle");
        let seed = tmp.path().join("base-bundle.pem");
        fs::write(&seed, ca_pem("Base Root")).expect("write seed bundle");

        let config = format!(
            r#"profiles = [".zshrc"]
bundle_seed = "{seed}"

[connectivity]
enabled = false

[anchor]
store_bundle = "{store}"
"#,
            seed = seed.display(),
            store = store.display()
        );
        let cfg_dir = home.join(".config/trustline");
        fs::create_dir_all(&cfg_dir).expect("create config dir");
        fs::write(cfg_dir.join("config.toml"), config).expect("write config");

        Self {
            _tmp: tmp,
            home,
            bin,
            store,
            anchor_pem,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("trustline");
        cmd.env_clear()
            .env("HOME", &self.home)
            .env("PATH", &self.bin)
            .env("RUST_LOG", "warn");
        cmd
    }

    pub fn bundle(&self) -> PathBuf {
        self.home.join(".config/trustline/ca-bundle.pem")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.home.join(".config/trustline/backups")
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.home.join(rel)).unwrap_or_default()
    }

    /// Runs with `--json`, asserts the exit code and returns parsed stdout.
    pub fn run_json(&self, args: &[&str], code: i32) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .code(code)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}

pub fn action_of<'a>(report: &'a Value, target: &str) -> &'a str {
    report["data"]["outcomes"]
        .as_array()
        .expect("outcomes array")
        .iter()
        .find(|o| o["name"] == target)
        .and_then(|o| o["action"].as_str())
        .unwrap_or("missing")
}

#[cfg(unix)]
fn install_fake_tool(bin: &Path, tool: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = bin.join(tool);
    fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write fake tool");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
}

#[cfg(not(unix))]
fn install_fake_tool(bin: &Path, tool: &str) {
    fs::write(bin.join(format!("{}.cmd", tool)), "@exit /b 0\r\n").expect("write fake tool");
}
