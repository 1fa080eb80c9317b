//! itrace-stream — the buffered trace record pipeline.
//!
//! Producer side: a [`TraceSource`] owns a fixed-capacity packet buffer,
//! exposes one `trace_*` call per instrumentation point, enforces the
//! open/close packet protocol, and hands completed batches to a
//! [`TraceSink`] (binary persistence or write-through text rendering).
//!
//! Consumer side: a [`RecordFile`] gives random access to a persisted record
//! sequence, and the [`InstructionPrinter`] regroups records into
//! per-instruction packets, reassembles extension-widened values, and emits
//! disassembly-annotated text.
//!
//! Protocol violations (packet opened twice, tracing after termination,
//! decode-time kind mismatches) are bugs in the instrumented caller or
//! stream corruption and panic with a diagnostic; I/O failures come back as
//! `anyhow::Result` from the call that triggered the flush.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Random-access record stream over a persisted byte sequence.
pub mod file;
/// Deterministic synthetic trace generator (for sims/benches/tests).
pub mod generator;
/// Packet-regrouping decoder and text renderer.
pub mod printer;
/// Flushed-batch consumers: binary persistence and live text rendering.
pub mod sink;
/// Producer-side trace source with the packet buffer and flush policy.
pub mod source;
/// Per-kind record counts for tooling.
pub mod summary;

// ---- Re-exports for workspace compatibility ----
pub use file::{RecordFile, RecordIter};
pub use printer::InstructionPrinter;
pub use sink::{BinarySink, TextSink, TraceSink, RECORD_BUFFER_SIZE};
pub use source::{TraceSource, PACKET_BUFFER_SIZE};
pub use summary::{summarize, TraceSummary};
