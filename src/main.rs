use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod domain;
mod error;
mod services;

pub use cli::{BackupCommands, Cli, Commands};
pub use commands::{handle_admin_commands, handle_runtime_commands};
pub use domain::constants::{EXIT_ABORTED, EXIT_OK, EXIT_PARTIAL};
pub use domain::models::{Detection, Platform, RunMode, RunReport};
pub use error::TrustError;
pub use services::backup::{load_manifest, restore_all};
pub use services::engine::ProvisioningEngine;
pub use services::output::{print_error, print_one, print_out};
pub use services::process::SystemRunner;
pub use services::report::summary_line;
pub use services::settings::{load_settings, Overrides, RunConfig};
pub use services::storage::home_dir;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    let home = home_dir()?;
    let file = load_settings(cli.config.as_deref(), &home)?;
    let overrides = Overrides {
        subject: cli.subject.clone(),
        store_bundle: cli.store_bundle.clone(),
        skip_connectivity: matches!(
            cli.command,
            Commands::Provision {
                skip_connectivity: true,
                ..
            }
        ),
    };
    let cfg = RunConfig::resolve(file, overrides, Platform::detect(), &home);
    tracing::debug!(?cfg, "resolved settings");

    if let Some(code) = handle_admin_commands(cli, &cfg)? {
        return Ok(code);
    }
    handle_runtime_commands(cli, &cfg)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = e
                .downcast_ref::<TrustError>()
                .map(TrustError::code)
                .unwrap_or("ERROR");
            tracing::debug!(code, error = ?e, "command failed");
            print_error(cli.json, code, &format!("{:#}", e));
            ExitCode::from(EXIT_ABORTED)
        }
    }
}
