use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "trustline",
    version,
    about = "Distribute a proxy root certificate to every developer tool on the machine"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Settings file (default: ~/.config/trustline/config.toml)"
    )]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Subject common name of the trust anchor")]
    pub subject: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Read the anchor from this PEM bundle instead of the system store"
    )]
    pub store_bundle: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Debug-level diagnostics on stderr")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make every installed tool trust the anchor
    Provision {
        #[arg(long = "only", value_name = "TARGET")]
        only: Vec<String>,
        #[arg(long, default_value_t = false)]
        skip_connectivity: bool,
    },
    /// Report which tools trust the anchor without changing anything
    Verify {
        #[arg(long = "only", value_name = "TARGET")]
        only: Vec<String>,
    },
    /// List known targets and whether each is installed
    Targets,
    /// Show the trust anchor found in the system store
    Anchor,
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Files recorded in the backup manifest
    List,
    /// Put every backed-up original back in place
    Restore,
}
