//! Service layer containing business logic and side-effect helpers.
//!
//! ## Service map
//! - `engine.rs`: run state machine, per-target flow, failure isolation.
//! - `registry.rs`: `TrustTarget` contract, shared context, per-platform table.
//! - `targets.rs`: env-var, npmrc, tool-config, certifi and keytool targets.
//! - `anchor.rs`: trust anchor lookup in the system store.
//! - `editor.rs`: idempotent line/block edits with backups.
//! - `backup.rs`: copy-on-first-write backups, manifest and restore.
//! - `env.rs`: process and machine environment publishing.
//! - `connectivity.rs`: pre-run network probe.
//! - `process.rs`: external command seam.
//! - `report.rs`: run outcome accumulation.
//! - `settings.rs`: config file loading and resolution.
//! - `storage.rs`: home/config paths and the event log.
//! - `output.rs`: JSON/text output helpers.
//!
//! ## Conventions
//! - Presence probes never mutate.
//! - Every file mutation goes through `ConfigFileEditor` or `protect()` first.
//! - Keep command handlers thin; delegate to services.

pub mod anchor;
pub mod backup;
pub mod connectivity;
pub mod editor;
pub mod engine;
pub mod env;
pub mod output;
pub mod process;
pub mod registry;
pub mod report;
pub mod settings;
pub mod storage;
pub mod targets;
