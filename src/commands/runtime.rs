use crate::*;

fn render_report(json: bool, report: RunReport) -> anyhow::Result<u8> {
    let code = report.exit_code();
    print_one(json, report, |r| {
        let mut lines = Vec::new();
        if let Some(anchor) = &r.anchor {
            lines.push(format!(
                "anchor\t{}\t{}",
                anchor.subject, anchor.fingerprint_sha256
            ));
        }
        for o in &r.outcomes {
            let action = serde_json::to_value(o.action)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            match &o.error {
                Some(err) => lines.push(format!("{}\t{}\t{}", o.name, action, err)),
                None => lines.push(format!("{}\t{}", o.name, action)),
            }
        }
        if let Some(err) = &r.error {
            lines.push(format!("error\t{}", err));
        }
        lines.push(format!(
            "{} (backups={}, {} ms)",
            summary_line(r),
            r.backups_created,
            r.elapsed_ms
        ));
        lines.join("\n")
    })?;
    Ok(code)
}

fn execute(cli: &Cli, cfg: &RunConfig, only: &[String], mode: RunMode) -> anyhow::Result<u8> {
    let runner = SystemRunner;
    let registry = cfg.registry();
    let targets = registry.select(only, &cfg.disabled_targets)?;
    let source = cfg.certificate_source(&runner);
    let probe = cfg.probe();
    let log = cfg.event_log();
    let mut ctx = cfg.context(&runner);

    let engine = ProvisioningEngine {
        source: source.as_ref(),
        probe: probe.as_ref(),
        log: &log,
    };
    let report = engine.run(&mut ctx, &targets, mode, &cfg.subject);
    render_report(cli.json, report)
}

/// Provision and verify; returns the process exit code.
pub fn handle_runtime_commands(cli: &Cli, cfg: &RunConfig) -> anyhow::Result<u8> {
    match &cli.command {
        Commands::Provision { only, .. } => execute(cli, cfg, only, RunMode::Provision),
        Commands::Verify { only } => execute(cli, cfg, only, RunMode::VerifyOnly),
        _ => Ok(EXIT_OK),
    }
}
