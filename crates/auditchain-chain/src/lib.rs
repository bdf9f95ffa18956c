//! # auditchain-chain
//!
//! Canonicalisation, SHA-256 hash chaining, atomic state persistence, and
//! signed checkpoints for the auditchain pipeline.
//!
//! ## Overview
//!
//! Every enriched event is reduced to canonical bytes and linked to the
//! previous event via its head hash. Tampering with any event — even a
//! single byte — breaks the chain and is detectable by `auditchain-verify`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditchain_chain::{chain, state};
//!
//! let current = state::load(&state_path)?;
//! let (next_state, count) = chain::compute(events, current, |annotated| {
//!     writeln!(out, "{}", serde_json::to_string(&annotated)?)?;
//!     Ok(())
//! })?;
//! state::save(&state_path, &next_state)?;
//! ```

pub mod canonical;
pub mod chain;
pub mod checkpoint;
pub mod state;

pub use canonical::{canonicalize, canonicalize_as_is, CanonicalError};
pub use chain::{compute, link};
