//! # auditchain-parsers
//!
//! Per-dialect raw audit log line parsers. Expressed as a small capability
//! set — `parse_line(line) -> event | skip | error` — registered by
//! `db_system` name, so adding a new dialect never touches the core crates.

pub mod mysql;
pub mod postgres;
pub mod registry;

pub use registry::{LineParser, ParseOutcome, ParserRegistry};
