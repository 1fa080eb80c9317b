//! itrace-core — record model for instruction-level execution traces.
//!
//! This crate defines the **stable boundary** used across itrace crates:
//! - the fixed-width [`Record`] wire unit and its closed [`RecordKind`] set,
//! - typed construction/decoding via [`RecordPayload`] (exhaustive matching,
//!   no open-ended dispatch),
//! - the [`ArchInterface`] collaborator trait that supplies disassembly and
//!   register naming to renderers (the core never implements either itself).
//!
//! Every record encodes to exactly [`Record::ENCODED_SIZE`] bytes, which is
//! what makes a persisted record stream randomly indexable without a length
//! table.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Disassembly/register-naming collaborator consumed by renderers.
pub mod arch;
/// Fixed-width records, the closed kind set, and the byte codec.
pub mod record;

// ---- Re-exports for workspace compatibility ----
pub use arch::*;
pub use record::*;
