//! Per-kind record counts for tooling (`itrace-cli info`).

use itrace_core::RecordKind;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::file::RecordFile;

/// Counts over a persisted record stream.
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    /// Total records in the stream.
    pub records: u64,
    /// Number of instruction packets (instruction headers seen).
    pub packets: u64,
    /// Extension records (widened values).
    pub extensions: u64,
    /// Per-kind record counts.
    pub counts: BTreeMap<RecordKind, u64>,
}

/// Tally a record file.
#[must_use]
pub fn summarize(file: &RecordFile) -> TraceSummary {
    let mut counts: BTreeMap<RecordKind, u64> = BTreeMap::new();
    for record in file.iter() {
        *counts.entry(record.kind()).or_insert(0) += 1;
    }
    TraceSummary {
        records: file.len(),
        packets: counts.get(&RecordKind::InstructionHeader).copied().unwrap_or(0),
        extensions: counts.get(&RecordKind::DataExtension).copied().unwrap_or(0),
        counts,
    }
}
