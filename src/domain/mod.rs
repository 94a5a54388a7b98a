//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep report/outcome structs in one place.
//! - Avoid cyclic imports between the engine, targets and command handlers.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs`: detection, outcome, run report and backup record structs.
//! - `constants.rs`: stable constants (default subject, exit codes, system paths).
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/network side effects.
//!
//! ## Compatibility note
//! Changes in these structs affect `--json` output consumed by MDM reporting.

pub mod constants;
pub mod models;
