//! # auditchain-core
//!
//! The per-event enrichment orchestrator for the auditchain pipeline: wires
//! the schema resolver, sensitivity dictionary, and risk policy together to
//! turn a parsed [`Event`](auditchain_model::event::Event) into an enriched
//! one, or an error event on failure.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditchain_core::enricher::{Enricher, EnrichOutcome};
//!
//! let enricher = Enricher::new(&dictionary, &risk_policy, &schema, 1000, false, false);
//! match enricher.enrich(event) {
//!     EnrichOutcome::Enriched(e) => emit(e),
//!     EnrichOutcome::Error(e) => emit_error(e),
//!     EnrichOutcome::Dropped => {}
//! }
//! ```

pub mod enricher;

pub use enricher::{EnrichOutcome, Enricher, DEFAULT_BULK_ROW_THRESHOLD};
