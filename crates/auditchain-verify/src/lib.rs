//! # auditchain-verify
//!
//! The inverse of `auditchain-chain`'s chain engine and checkpointer: recomputes
//! an annotated stream's hash chain and reports which events, if any, were
//! tampered with, plus optional checkpoint soundness.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use auditchain_verify::engine::{verify_stream, Outcome};
//!
//! let report = verify_stream(events, &starting_state);
//! match report.outcome {
//!     Outcome::Ok => {}
//!     Outcome::TamperDetected => std::process::exit(2),
//!     _ => std::process::exit(1),
//! }
//! ```

pub mod engine;

pub use engine::{verify_stream, verify_stream_with_checkpoint, Outcome, VerificationReport};
