//! Instruction printer: regroups a flat record stream into packets and
//! renders them as disassembly-annotated text.
//!
//! Extension policy: extensions immediately follow the record they widen, so
//! after reading a base record the printer consumes the run of
//! data-extension records behind it (checking each carries the base's kind
//! tag) and recombines `(high << 32) | low` before rendering.
//!
//! Decode-time kind mismatches and unknown kinds mean stream corruption or
//! an encoder/decoder mismatch; both panic naming the offending kind and
//! stream index. They are not recoverable conditions and are deliberately
//! not converted into soft errors.

use itrace_core::{ArchInterface, Record, RecordKind, RecordPayload};
use std::fmt::Write as _;

use crate::file::RecordIter;

/// Packet-regrouping decoder/renderer with per-operation display toggles.
pub struct InstructionPrinter<'a> {
    arch: &'a dyn ArchInterface,
    show_reg_read: bool,
    show_reg_write: bool,
    show_bank_read: bool,
    show_bank_write: bool,
    show_mem_read: bool,
    show_mem_write: bool,
}

impl<'a> InstructionPrinter<'a> {
    /// Preset: render every operation fragment (the default).
    #[must_use]
    pub fn display_all(arch: &'a dyn ArchInterface) -> Self {
        Self {
            arch,
            show_reg_read: true,
            show_reg_write: true,
            show_bank_read: true,
            show_bank_write: true,
            show_mem_read: true,
            show_mem_write: true,
        }
    }

    /// Preset: only memory fragments.
    #[must_use]
    pub fn display_mem_only(arch: &'a dyn ArchInterface) -> Self {
        Self {
            show_reg_read: false,
            show_reg_write: false,
            show_bank_read: false,
            show_bank_write: false,
            ..Self::display_all(arch)
        }
    }

    /// Preset: header/opcode/disassembly only, no operation fragments.
    #[must_use]
    pub fn display_none(arch: &'a dyn ArchInterface) -> Self {
        Self {
            arch,
            show_reg_read: false,
            show_reg_write: false,
            show_bank_read: false,
            show_bank_write: false,
            show_mem_read: false,
            show_mem_write: false,
        }
    }

    /// Toggle register read fragments.
    #[must_use]
    pub fn with_reg_reads(mut self, on: bool) -> Self {
        self.show_reg_read = on;
        self
    }

    /// Toggle register write fragments.
    #[must_use]
    pub fn with_reg_writes(mut self, on: bool) -> Self {
        self.show_reg_write = on;
        self
    }

    /// Toggle banked register fragments (reads and writes).
    #[must_use]
    pub fn with_bank_ops(mut self, on: bool) -> Self {
        self.show_bank_read = on;
        self.show_bank_write = on;
        self
    }

    /// Toggle memory fragments (reads and writes).
    #[must_use]
    pub fn with_mem_ops(mut self, on: bool) -> Self {
        self.show_mem_read = on;
        self.show_mem_write = on;
        self
    }

    /// Render one instruction packet starting at the iterator's position,
    /// which must be an instruction header. The iterator is left at the next
    /// instruction header or at stream end.
    ///
    /// # Panics
    /// Panics on a malformed stream: a missing or mistyped header/code pair,
    /// a mismatched extension tag, a dangling memory data record, or an
    /// unknown record kind.
    pub fn print_instruction(&self, it: &mut RecordIter<'_>) -> String {
        let mut line = String::new();

        let (header, pc) = take_extended(it);
        let RecordPayload::InstructionHeader { .. } = header.payload() else {
            panic!(
                "expected instruction header at index {}, found {:?}",
                it.index().saturating_sub(1),
                header.kind()
            );
        };
        let (code, ir) = take_extended(it);
        let RecordPayload::InstructionCode { .. } = code.payload() else {
            panic!(
                "expected instruction code at index {}, found {:?}",
                it.index().saturating_sub(1),
                code.kind()
            );
        };

        let disasm = self.arch.disassemble(ir);
        let _ = write!(line, "[{pc:08x}] {ir:08x} {disasm}\t\t");

        while let Some(next) = it.peek() {
            if next.kind() == RecordKind::InstructionHeader {
                break;
            }
            let at = it.index();
            let (record, value) = take_extended(it);
            match record.payload() {
                RecordPayload::RegRead { regnum, .. } => {
                    if self.show_reg_read {
                        let _ = write!(line, "(R[{regnum}] -> 0x{value:08x})");
                    }
                }
                RecordPayload::RegWrite { regnum, .. } => {
                    if self.show_reg_write {
                        let _ = write!(line, "(R[{regnum}] <- 0x{value:08x})");
                    }
                }
                RecordPayload::BankRegRead { bank, regnum, .. } => {
                    if self.show_bank_read {
                        let _ = write!(line, "(R[{bank}][{regnum}] -> 0x{value:08x})");
                    }
                }
                RecordPayload::BankRegWrite { bank, regnum, .. } => {
                    if self.show_bank_write {
                        let _ = write!(line, "(R[{bank}][{regnum}] <- 0x{value:08x})");
                    }
                }
                RecordPayload::MemReadAddr { width, .. } => {
                    let data = self.take_mem_data(it, RecordKind::MemReadData, width);
                    if self.show_mem_read {
                        let _ = write!(line, "([{value:08x}]({width}) => 0x{data:08x})");
                    }
                }
                RecordPayload::MemWriteAddr { width, .. } => {
                    let data = self.take_mem_data(it, RecordKind::MemWriteData, width);
                    if self.show_mem_write {
                        let _ = write!(line, "([{value:08x}]({width}) <= 0x{data:08x})");
                    }
                }
                RecordPayload::MemReadData { .. } | RecordPayload::MemWriteData { .. } => {
                    panic!("memory data record without its address record at index {at}")
                }
                RecordPayload::DataExtension { base, .. } => {
                    panic!("extension record (for {base:?}) with no base record at index {at}")
                }
                RecordPayload::InstructionHeader { .. } | RecordPayload::InstructionCode { .. } => {
                    panic!(
                        "instruction record {:?} inside an open packet at index {at}",
                        record.kind()
                    )
                }
                RecordPayload::Unknown { raw_kind, .. } => {
                    panic!("unsupported record type {raw_kind} at index {at}")
                }
            }
        }

        line
    }

    /// Consume the data half of a memory operation (with its own extensions),
    /// masked to the declared access width.
    fn take_mem_data(&self, it: &mut RecordIter<'_>, expect: RecordKind, width: u8) -> u64 {
        let at = it.index();
        let (record, value) = take_extended(it);
        assert!(
            record.kind() == expect,
            "expected {expect:?} at index {at}, found {:?}",
            record.kind()
        );
        mask_to_width64(value, width)
    }
}

/// Read the record at the cursor together with its widened value:
/// the low 32 bits from the base record, the high bits from the run of
/// data-extension records immediately behind it.
///
/// # Panics
/// Panics if the stream ends at the cursor, if an extension's tag does not
/// match the base record's kind, or if more than one extension follows
/// (only 32/64-bit width classes exist on the wire).
fn take_extended(it: &mut RecordIter<'_>) -> (Record, u64) {
    let at = it.index();
    let Some(record) = it.next() else {
        panic!("record stream ended mid-packet at index {at}");
    };
    let mut value = u64::from(record.data32());
    let mut extensions = 0u32;
    while let Some(next) = it.peek() {
        let RecordPayload::DataExtension { base, high } = next.payload() else {
            break;
        };
        assert!(
            base == record.kind(),
            "extension tag {base:?} does not match base record {:?} at index {}",
            record.kind(),
            it.index()
        );
        assert!(
            extensions == 0,
            "more than one extension record for {:?} at index {}",
            record.kind(),
            it.index()
        );
        value |= u64::from(high) << 32;
        extensions += 1;
        let _ = it.next();
    }
    (record, value)
}

/// Mask a widened value down to `width * 8` bits (widths ≥ 8 keep all bits).
fn mask_to_width64(value: u64, width: u8) -> u64 {
    if width >= 8 {
        value
    } else {
        value & ((1u64 << (u32::from(width) * 8)) - 1)
    }
}
