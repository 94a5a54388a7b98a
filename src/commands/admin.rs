use crate::*;

fn detection_row(d: &Detection) -> String {
    match d {
        Detection::Present => "present".to_string(),
        Detection::Absent => "absent".to_string(),
        Detection::Indeterminate(reason) => format!("indeterminate\t{}", reason),
    }
}

/// Read-only inspection and backup maintenance. Returns `None` when the
/// command belongs to another handler.
pub fn handle_admin_commands(cli: &Cli, cfg: &RunConfig) -> anyhow::Result<Option<u8>> {
    match &cli.command {
        Commands::Targets => {
            let runner = SystemRunner;
            let ctx = cfg.context(&runner);
            let listing = cfg.registry().listing(&ctx);
            print_out(cli.json, &listing, |t| {
                let disabled = if cfg.disabled_targets.contains(&t.name) {
                    "\t(disabled)"
                } else {
                    ""
                };
                format!("{}\t{}{}", t.name, detection_row(&t.detection), disabled)
            })?;
        }
        Commands::Anchor => {
            let runner = SystemRunner;
            let source = cfg.certificate_source(&runner);
            tracing::debug!(source = %source.describe(), "looking up anchor");
            let anchor = source.fetch(&cfg.subject)?;
            print_one(cli.json, anchor.summary(), |a| {
                format!(
                    "subject: {}\nsha256: {}\nsource: {}",
                    a.subject,
                    a.fingerprint_sha256,
                    source.describe()
                )
            })?;
        }
        Commands::Backups { command } => match command {
            BackupCommands::List => {
                let manifest = load_manifest(&cfg.backup_dir)?;
                print_out(cli.json, &manifest.records, |r| {
                    let backup = r
                        .backup
                        .as_ref()
                        .map(|b| b.display().to_string())
                        .unwrap_or_else(|| "(did not exist)".to_string());
                    format!(
                        "{}\t{}\t{}",
                        r.original.display(),
                        backup,
                        r.created_at.to_rfc3339()
                    )
                })?;
            }
            BackupCommands::Restore => {
                let items = restore_all(&cfg.backup_dir)?;
                let log = cfg.event_log();
                for item in &items {
                    log.write(&format!(
                        "restore {}: {}",
                        item.original.display(),
                        item.status
                    ));
                }
                print_out(cli.json, &items, |i| {
                    format!("{}\t{}", i.original.display(), i.status)
                })?;
                if items.iter().any(|i| i.status.starts_with("failed")) {
                    return Ok(Some(EXIT_PARTIAL));
                }
            }
        },
        _ => return Ok(None),
    }
    Ok(Some(EXIT_OK))
}
