//! Run orchestration.
//!
//! ```text
//! Init -> ConnectivityCheck -> AnchorAcquired -> Provisioning -> Verification -> Cleanup -> Done
//!               |                    |
//!               v                    v
//!     AbortedNoConnectivity   AbortedNoAnchor        (nothing mutated)
//! ```
//!
//! Per target: detect, then check state, then apply and verify. A failing
//! target is recorded and the loop moves on.

use crate::domain::models::{
    ActionTaken, Detection, RunMode, RunReport, RunStatus, TargetOutcome,
};
use crate::error::TrustError;
use crate::services::anchor::{CertificateSource, TrustAnchor};
use crate::services::connectivity::ConnectivityProbe;
use crate::services::registry::{ProvisionContext, TrustTarget};
use crate::services::report::RunReporter;
use crate::services::storage::EventLog;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    ConnectivityCheck,
    AnchorAcquired,
    Provisioning,
    Verification,
    Cleanup,
    Done,
    AbortedNoConnectivity,
    AbortedNoAnchor,
}

pub struct ProvisioningEngine<'a> {
    pub source: &'a dyn CertificateSource,
    pub probe: &'a dyn ConnectivityProbe,
    pub log: &'a EventLog,
}

/// Writes the anchor to `anchor.pem` in a fresh temporary directory. The
/// directory is removed when the returned guard is dropped or closed.
fn stage_anchor(anchor: &TrustAnchor) -> std::io::Result<TempDir> {
    let dir = tempfile::Builder::new().prefix("trustline-").tempdir()?;
    std::fs::write(dir.path().join("anchor.pem"), &anchor.pem)?;
    Ok(dir)
}

impl ProvisioningEngine<'_> {
    fn enter(&self, phase: RunPhase) {
        tracing::debug!(?phase, "phase");
        self.log.write(&format!("phase {:?}", phase));
    }

    fn note(&self, message: &str) {
        tracing::info!("{}", message);
        self.log.write(message);
    }

    fn abort(
        &self,
        reporter: RunReporter,
        phase: RunPhase,
        status: RunStatus,
        err: TrustError,
    ) -> RunReport {
        self.enter(phase);
        tracing::error!(code = err.code(), error = %err, "run aborted");
        self.log.write(&format!("aborted: {}", err));
        reporter.finalize(status, 0, Some(err.to_string()))
    }

    pub fn run(
        &self,
        ctx: &mut ProvisionContext,
        targets: &[&dyn TrustTarget],
        mode: RunMode,
        subject: &str,
    ) -> RunReport {
        self.enter(RunPhase::Init);
        let mut reporter = RunReporter::start(mode, subject);
        self.note(&format!(
            "run started: mode={:?} subject='{}' source={} targets={}",
            mode,
            subject,
            self.source.describe(),
            targets.len()
        ));

        if mode == RunMode::Provision {
            self.enter(RunPhase::ConnectivityCheck);
            if let Err(e) = self.probe.check() {
                return self.abort(
                    reporter,
                    RunPhase::AbortedNoConnectivity,
                    RunStatus::AbortedNoConnectivity,
                    e,
                );
            }
        }

        let anchor = match self.source.fetch(subject) {
            Ok(a) => a,
            Err(e) => {
                return self.abort(
                    reporter,
                    RunPhase::AbortedNoAnchor,
                    RunStatus::AbortedNoAnchor,
                    e,
                )
            }
        };
        self.enter(RunPhase::AnchorAcquired);
        self.note(&format!(
            "anchor '{}' sha256={}",
            anchor.subject, anchor.fingerprint_sha256
        ));
        reporter.anchor(anchor.summary());

        let staging = if mode == RunMode::Provision {
            match stage_anchor(&anchor) {
                Ok(dir) => {
                    ctx.anchor_file = Some(dir.path().join("anchor.pem"));
                    Some(dir)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not stage anchor file");
                    None
                }
            }
        } else {
            None
        };

        self.enter(RunPhase::Provisioning);
        for target in targets {
            let outcome = self.provision_one(*target, ctx, &anchor, mode);
            match &outcome.error {
                Some(err) => self.log.write(&format!("{}: failed: {}", outcome.name, err)),
                None => self.log.write(&format!("{}: {:?}", outcome.name, outcome.action)),
            }
            reporter.record(outcome);
        }

        self.enter(RunPhase::Verification);
        let trusted = reporter
            .outcomes()
            .iter()
            .filter(|o| matches!(o.action, ActionTaken::Applied | ActionTaken::AlreadyTrusted))
            .count();
        let unsettled = reporter
            .outcomes()
            .iter()
            .filter(|o| matches!(o.action, ActionTaken::Failed | ActionTaken::Pending))
            .count();
        self.note(&format!("{} trusted, {} not trusted", trusted, unsettled));

        self.enter(RunPhase::Cleanup);
        ctx.anchor_file = None;
        if let Some(dir) = staging {
            if let Err(e) = dir.close() {
                tracing::warn!(error = %e, "could not remove staged anchor");
            }
        }

        let backups = ctx.editor.backups().created();
        self.enter(RunPhase::Done);
        let report = reporter.finalize(RunStatus::Completed, backups, None);
        self.note(&format!(
            "run finished: exit={} backups={} elapsed_ms={}",
            report.exit_code(),
            backups,
            report.elapsed_ms
        ));
        report
    }

    fn provision_one(
        &self,
        target: &dyn TrustTarget,
        ctx: &mut ProvisionContext,
        anchor: &TrustAnchor,
        mode: RunMode,
    ) -> TargetOutcome {
        let name = target.name();
        match target.detect(ctx) {
            Detection::Absent => {
                tracing::info!(target_name = name, "skipped: not installed");
                return TargetOutcome::new(name, ActionTaken::SkippedAbsent);
            }
            Detection::Indeterminate(reason) => {
                return TargetOutcome::failed(name, format!("detection failed: {}", reason))
            }
            Detection::Present => {}
        }

        match target.current_state(ctx, anchor) {
            Ok(true) => return TargetOutcome::new(name, ActionTaken::AlreadyTrusted),
            Ok(false) if mode == RunMode::VerifyOnly => {
                return TargetOutcome::new(name, ActionTaken::Pending)
            }
            Ok(false) => {}
            Err(e) => return TargetOutcome::failed(name, e.to_string()),
        }

        if let Err(e) = target.apply(ctx, anchor) {
            return TargetOutcome::failed(name, e.to_string());
        }
        match target.verify(ctx, anchor) {
            Ok(true) => TargetOutcome::new(name, ActionTaken::Applied),
            Ok(false) => TargetOutcome::failed(name, "not trusted after apply"),
            Err(e) => TargetOutcome::failed(name, format!("verification failed: {}", e)),
        }
    }
}
