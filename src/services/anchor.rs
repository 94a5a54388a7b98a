//! Trust anchor extraction from the platform's system-level trust store.
//!
//! Only machine-wide stores are consulted (System keychain, LocalMachine\Root,
//! the system PEM bundle); user stores are never searched.

use crate::domain::models::AnchorSummary;
use crate::error::{Result, TrustError};
use crate::services::process::CommandRunner;
use base64::Engine;
use chrono::{DateTime, Utc};
use der::Decode;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use x509_cert::Certificate;

#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub subject: String,
    pub der: Vec<u8>,
    pub pem: String,
    pub fingerprint_sha256: String,
    pub extracted_at: DateTime<Utc>,
}

impl TrustAnchor {
    pub fn from_der(subject: &str, der: Vec<u8>) -> Self {
        let fingerprint_sha256 = hex::encode(Sha256::digest(&der));
        Self {
            subject: subject.to_string(),
            pem: encode_pem(&der),
            der,
            fingerprint_sha256,
            extracted_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> AnchorSummary {
        AnchorSummary {
            subject: self.subject.clone(),
            fingerprint_sha256: self.fingerprint_sha256.clone(),
            extracted_at: self.extracted_at,
        }
    }

    /// Keystore alias derived from the subject, e.g. `trustline-zscaler-root-ca`.
    pub fn alias(&self) -> String {
        let slug: String = self
            .subject
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let parts: Vec<&str> = slug.split('-').filter(|p| !p.is_empty()).collect();
        format!("trustline-{}", parts.join("-"))
    }
}

pub trait CertificateSource {
    fn fetch(&self, subject: &str) -> Result<TrustAnchor>;

    fn describe(&self) -> String;
}

pub fn encode_pem(der: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    let mut out = String::from("-----BEGIN CERTIFICATE-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str("-----END CERTIFICATE-----\n");
    out
}

pub fn common_name(cert: &Certificate) -> Option<String> {
    use const_oid::db::rfc4519::CN;

    for rdn in cert.tbs_certificate.subject.0.iter() {
        for atv in rdn.0.iter() {
            if atv.oid == CN {
                if let Ok(s) = std::str::from_utf8(atv.value.value()) {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

/// DER blobs of every certificate in a PEM stream; unparsable items are skipped.
pub fn certificates_from_pem(pem: &[u8]) -> Vec<Vec<u8>> {
    let mut reader = std::io::BufReader::new(pem);
    rustls_pemfile::certs(&mut reader)
        .filter_map(|r| r.ok())
        .map(|c| c.as_ref().to_vec())
        .collect()
}

/// Pick the single certificate whose subject CN equals `subject`.
///
/// Identical copies are collapsed by fingerprint; distinct certificates that
/// share the name are an error rather than a first-match guess.
pub fn select_anchor(subject: &str, candidates: Vec<Vec<u8>>) -> Result<TrustAnchor> {
    let mut matches: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for der in candidates {
        let cert = match Certificate::from_der(&der) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparsable certificate");
                continue;
            }
        };
        if common_name(&cert).as_deref() == Some(subject) {
            matches.insert(hex::encode(Sha256::digest(&der)), der);
        }
    }

    match matches.len() {
        0 => Err(TrustError::AnchorNotFound {
            subject: subject.to_string(),
        }),
        1 => {
            let der = matches.into_values().next().unwrap_or_default();
            Ok(TrustAnchor::from_der(subject, der))
        }
        count => Err(TrustError::AnchorAmbiguous {
            subject: subject.to_string(),
            count,
        }),
    }
}

/// A PEM bundle file; on Linux this is the system trust store itself.
pub struct PemBundleSource {
    pub path: PathBuf,
}

impl CertificateSource for PemBundleSource {
    fn fetch(&self, subject: &str) -> Result<TrustAnchor> {
        let raw = std::fs::read(&self.path).map_err(|e| {
            TrustError::AnchorSource(format!("{}: {}", self.path.display(), e))
        })?;
        select_anchor(subject, certificates_from_pem(&raw))
    }

    fn describe(&self) -> String {
        format!("pem-bundle:{}", self.path.display())
    }
}

/// macOS System keychain via `security find-certificate`.
pub struct KeychainSource<'a> {
    pub runner: &'a dyn CommandRunner,
    pub keychain: PathBuf,
}

impl CertificateSource for KeychainSource<'_> {
    fn fetch(&self, subject: &str) -> Result<TrustAnchor> {
        let security = self
            .runner
            .which("security")
            .ok_or_else(|| TrustError::AnchorSource("`security` not found".to_string()))?;
        let keychain = self.keychain.to_string_lossy().to_string();
        let out = self.runner.run(
            &security,
            &["find-certificate", "-a", "-c", subject, "-p", &keychain],
        )?;
        // `security` exits non-zero with empty output when nothing matches.
        if !out.success && out.stdout.trim().is_empty() {
            return Err(TrustError::AnchorNotFound {
                subject: subject.to_string(),
            });
        }
        select_anchor(subject, certificates_from_pem(out.stdout.as_bytes()))
    }

    fn describe(&self) -> String {
        format!("keychain:{}", self.keychain.display())
    }
}

/// Windows `Cert:\LocalMachine\Root` via PowerShell.
pub struct WindowsRootStoreSource<'a> {
    pub runner: &'a dyn CommandRunner,
}

impl WindowsRootStoreSource<'_> {
    fn script(subject: &str) -> String {
        let escaped = subject.replace('\'', "''");
        format!(
            "Get-ChildItem -Path Cert:\\LocalMachine\\Root | \
             Where-Object {{ $_.Subject -like ('*CN=' + [WildcardPattern]::Escape('{}') + '*') }} | \
             ForEach-Object {{ '-----BEGIN CERTIFICATE-----'; \
             [Convert]::ToBase64String($_.RawData, 'InsertLineBreaks'); \
             '-----END CERTIFICATE-----' }}",
            escaped
        )
    }
}

impl CertificateSource for WindowsRootStoreSource<'_> {
    fn fetch(&self, subject: &str) -> Result<TrustAnchor> {
        let shell = self
            .runner
            .which("powershell")
            .or_else(|| self.runner.which("pwsh"))
            .ok_or_else(|| TrustError::AnchorSource("PowerShell not found".to_string()))?;
        let script = Self::script(subject);
        let args = ["-NoProfile", "-NonInteractive", "-Command", script.as_str()];
        let out = self.runner.run(&shell, &args)?;
        if !out.success {
            return Err(TrustError::AnchorSource(out.stderr.trim().to_string()));
        }
        select_anchor(subject, certificates_from_pem(out.stdout.as_bytes()))
    }

    fn describe(&self) -> String {
        "cert-store:LocalMachine\\Root".to_string()
    }
}

#[cfg(test)]
pub mod testing {
    use super::TrustAnchor;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    /// Self-signed CA certificate with the given CN, as PEM.
    pub fn ca_pem(common_name: &str) -> String {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        dn.push(DnType::OrganizationName, "Trustline Test");
        params.distinguished_name = dn;
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let key_pair = KeyPair::generate().expect("generate key");
        params.self_signed(&key_pair).expect("self-sign").pem()
    }

    pub fn anchor(common_name: &str) -> TrustAnchor {
        let pem = ca_pem(common_name);
        let der = super::certificates_from_pem(pem.as_bytes()).remove(0);
        TrustAnchor::from_der(common_name, der)
    }
}
