use crate::domain::models::{
    ActionTaken, AnchorSummary, RunMode, RunReport, RunStatus, TargetOutcome,
};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Accumulates outcomes for one run. `finalize` consumes it, so a report
/// cannot change after it is produced.
pub struct RunReporter {
    mode: RunMode,
    subject: String,
    started: Instant,
    started_at: DateTime<Utc>,
    anchor: Option<AnchorSummary>,
    outcomes: Vec<TargetOutcome>,
}

impl RunReporter {
    pub fn start(mode: RunMode, subject: &str) -> Self {
        Self {
            mode,
            subject: subject.to_string(),
            started: Instant::now(),
            started_at: Utc::now(),
            anchor: None,
            outcomes: Vec::new(),
        }
    }

    pub fn anchor(&mut self, summary: AnchorSummary) {
        self.anchor = Some(summary);
    }

    pub fn record(&mut self, outcome: TargetOutcome) {
        match &outcome.error {
            Some(err) => tracing::warn!(target_name = %outcome.name, error = %err, "target failed"),
            None => tracing::info!(target_name = %outcome.name, action = ?outcome.action, "target done"),
        }
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[TargetOutcome] {
        &self.outcomes
    }

    pub fn finalize(
        self,
        status: RunStatus,
        backups_created: usize,
        error: Option<String>,
    ) -> RunReport {
        RunReport {
            status,
            mode: self.mode,
            subject: self.subject,
            anchor: self.anchor,
            started_at: self.started_at,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            outcomes: self.outcomes,
            backups_created,
            error,
        }
    }
}

/// One-line human summary, e.g. `completed: 3 applied, 2 already trusted, ...`.
pub fn summary_line(report: &RunReport) -> String {
    let counts = [
        (ActionTaken::Applied, "applied"),
        (ActionTaken::AlreadyTrusted, "already trusted"),
        (ActionTaken::SkippedAbsent, "skipped"),
        (ActionTaken::Pending, "pending"),
        (ActionTaken::Failed, "failed"),
    ];
    let parts: Vec<String> = counts
        .iter()
        .map(|(action, label)| (report.count(*action), label))
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{} {}", n, label))
        .collect();
    let status = serde_json::to_value(report.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    if parts.is_empty() {
        format!("{}: no targets", status)
    } else {
        format!("{}: {}", status, parts.join(", "))
    }
}
