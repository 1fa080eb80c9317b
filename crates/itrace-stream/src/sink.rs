//! Trace sinks: consumers of flushed record batches.
//!
//! [`TraceSink`] is a closed enum over the two reference consumers:
//!
//! - [`BinarySink`] accumulates records and appends them to a byte sink as
//!   raw fixed-width binary. It defines the persisted file format: a flat,
//!   headerless sequence of records in encounter order, logical length
//!   `file_size / Record::ENCODED_SIZE`.
//! - [`TextSink`] renders each record to text as it arrives (write-through,
//!   no accumulation), resolving names through an [`ArchInterface`].

use anyhow::{Context, Result};
use itrace_core::{ArchInterface, Record, RecordPayload};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Accumulation threshold (in records) before the binary sink hits the byte
/// sink. Independent of, and much larger than, the source's packet buffer.
pub const RECORD_BUFFER_SIZE: usize = 128 * 1024;

/// Closed set of sink kinds behind one capability surface.
///
/// The record-type set and the sink set are both fixed, so this is an enum
/// with exhaustive matching rather than open virtual dispatch.
pub enum TraceSink {
    /// Persist flushed batches as raw fixed-width binary.
    Binary(BinarySink),
    /// Render flushed batches as text immediately.
    Text(TextSink),
}

impl TraceSink {
    /// Consume a flushed batch of records.
    pub fn accept(&mut self, batch: &[Record]) -> Result<()> {
        match self {
            Self::Binary(s) => s.accept(batch),
            Self::Text(s) => s.accept(batch),
        }
    }

    /// Push any retained state through to the underlying byte sink.
    pub fn flush(&mut self) -> Result<()> {
        match self {
            Self::Binary(s) => s.flush(),
            Self::Text(s) => s.flush(),
        }
    }

    /// Flush and drop the sink.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

/// Binary-file sink: batches records, then writes them as raw bytes.
pub struct BinarySink {
    out: Box<dyn Write>,
    records: Vec<Record>,
    threshold: usize,
}

impl BinarySink {
    /// Create a sink writing to a new file at `path` (buffered).
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let f = File::create(path_ref)
            .with_context(|| format!("create {}", path_ref.to_string_lossy()))?;
        Ok(Self::from_writer(Box::new(BufWriter::new(f))))
    }

    /// Create a sink over an arbitrary byte writer.
    #[must_use]
    pub fn from_writer(out: Box<dyn Write>) -> Self {
        Self {
            out,
            records: Vec::new(),
            threshold: RECORD_BUFFER_SIZE,
        }
    }

    /// Override the accumulation threshold (in records).
    #[must_use]
    pub fn with_threshold(mut self, records: usize) -> Self {
        self.threshold = records;
        self
    }

    /// Append a batch to the accumulation; write through once it reaches
    /// the threshold.
    pub fn accept(&mut self, batch: &[Record]) -> Result<()> {
        self.records.extend_from_slice(batch);
        if self.records.len() >= self.threshold {
            self.write_out()?;
        }
        Ok(())
    }

    /// Write any accumulated records and flush the byte sink.
    pub fn flush(&mut self) -> Result<()> {
        self.write_out()
    }

    fn write_out(&mut self) -> Result<()> {
        for record in self.records.drain(..) {
            self.out
                .write_all(&record.to_bytes())
                .context("write record")?;
        }
        self.out.flush().context("flush record file")?;
        Ok(())
    }
}

/// Text sink: renders records to a byte writer as they arrive.
///
/// Stateful across calls: the most recent instruction header's PC and ISA
/// mode contextualize the operation lines that follow it.
pub struct TextSink {
    out: Box<dyn Write>,
    arch: Box<dyn ArchInterface>,
    pc: u32,
    isa_mode: u8,
}

impl TextSink {
    /// Create a text sink writing to a new file at `path` (buffered).
    pub fn create<P: AsRef<Path>>(path: P, arch: Box<dyn ArchInterface>) -> Result<Self> {
        let path_ref = path.as_ref();
        let f = File::create(path_ref)
            .with_context(|| format!("create {}", path_ref.to_string_lossy()))?;
        Ok(Self::from_writer(Box::new(BufWriter::new(f)), arch))
    }

    /// Create a text sink over an arbitrary byte writer.
    #[must_use]
    pub fn from_writer(out: Box<dyn Write>, arch: Box<dyn ArchInterface>) -> Self {
        Self {
            out,
            arch,
            pc: 0,
            isa_mode: 0,
        }
    }

    /// Last instruction header's program counter.
    #[must_use]
    pub fn current_pc(&self) -> u32 {
        self.pc
    }

    /// Last instruction header's ISA mode.
    #[must_use]
    pub fn current_isa_mode(&self) -> u8 {
        self.isa_mode
    }

    /// Render every record in the batch, in order.
    pub fn accept(&mut self, batch: &[Record]) -> Result<()> {
        for record in batch {
            self.write_record(*record)?;
        }
        Ok(())
    }

    /// Flush the byte sink.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context("flush text sink")
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        match record.payload() {
            RecordPayload::InstructionHeader { isa_mode, pc } => {
                self.pc = pc;
                self.isa_mode = isa_mode;
                write!(self.out, "\n[{pc:08x}] ")?;
            }
            RecordPayload::InstructionCode { ir, .. } => {
                let disasm = self.arch.disassemble(u64::from(ir));
                write!(self.out, "{ir:08x} {disasm}\t\t")?;
            }
            RecordPayload::RegRead { regnum, value } => {
                self.write_reg(u32::from(regnum), "=>", value)?;
            }
            RecordPayload::RegWrite { regnum, value } => {
                self.write_reg(u32::from(regnum), "<=", value)?;
            }
            RecordPayload::BankRegRead {
                bank,
                regnum,
                value,
            } => {
                let name = self.arch.register_bank_name(u32::from(bank));
                write!(self.out, "(R[{name}][{regnum:x}] => {value:08x})")?;
            }
            RecordPayload::BankRegWrite {
                bank,
                regnum,
                value,
            } => {
                let name = self.arch.register_bank_name(u32::from(bank));
                write!(self.out, "(R[{name}][{regnum:x}] <= {value:08x})")?;
            }
            RecordPayload::MemReadAddr { width, addr } => {
                write!(self.out, "(Mem[{width}][{addr:08x}] => ")?;
            }
            RecordPayload::MemReadData { width, value } => {
                self.write_mem_data(width, value)?;
            }
            RecordPayload::MemWriteAddr { width, addr } => {
                write!(self.out, "(Mem[{width}][{addr:08x}] <= ")?;
            }
            RecordPayload::MemWriteData { width, value } => {
                self.write_mem_data(width, value)?;
            }
            // Write-through rendering cannot retro-widen a value that has
            // already been printed; the offline printer handles extensions.
            RecordPayload::DataExtension { .. } => {}
            RecordPayload::Unknown { .. } => {
                // Defensive: push out what we have, not format-completing.
                self.flush()?;
            }
        }
        Ok(())
    }

    fn write_reg(&mut self, regnum: u32, dir: &str, value: u32) -> Result<()> {
        let name = self.arch.register_slot_name(regnum);
        match self.arch.register_slot_width(regnum) {
            1 => write!(self.out, "(R[{name}] {dir} {value:02x})")?,
            2 => write!(self.out, "(R[{name}] {dir} {value:04x})")?,
            _ => write!(self.out, "(R[{name}] {dir} {value:08x})")?,
        }
        Ok(())
    }

    fn write_mem_data(&mut self, width: u8, value: u32) -> Result<()> {
        match width {
            1 => write!(self.out, "{value:02x})")?,
            2 => write!(self.out, "{value:04x})")?,
            _ => write!(self.out, "{value:08x})")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itrace_core::DefaultArch;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared byte buffer so tests can observe what a boxed writer received.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn binary_sink_defers_until_threshold() {
        let buf = SharedBuf::default();
        let mut sink = BinarySink::from_writer(Box::new(buf.clone())).with_threshold(4);

        sink.accept(&[Record::reg_read(1, 2), Record::reg_write(3, 4)])
            .unwrap();
        assert!(buf.0.borrow().is_empty(), "below threshold, nothing written");

        sink.accept(&[Record::reg_read(5, 6), Record::reg_write(7, 8)])
            .unwrap();
        assert_eq!(buf.0.borrow().len(), 4 * Record::ENCODED_SIZE);
    }

    #[test]
    fn binary_sink_flush_writes_remainder() {
        let buf = SharedBuf::default();
        let mut sink = BinarySink::from_writer(Box::new(buf.clone()));
        sink.accept(&[Record::reg_read(1, 2)]).unwrap();
        assert!(buf.0.borrow().is_empty());
        sink.flush().unwrap();
        assert_eq!(buf.0.borrow().len(), Record::ENCODED_SIZE);
        let bytes: Vec<u8> = buf.0.borrow().clone();
        let mut arr = [0u8; Record::ENCODED_SIZE];
        arr.copy_from_slice(&bytes);
        assert_eq!(Record::from_bytes(arr), Record::reg_read(1, 2));
    }

    #[test]
    fn text_sink_renders_packet_inline() {
        let buf = SharedBuf::default();
        let mut sink =
            TextSink::from_writer(Box::new(buf.clone()), Box::new(DefaultArch));
        sink.accept(&[
            Record::instruction_header(0, 0x1000),
            Record::instruction_code(0, 0xE1A0_0000),
            Record::reg_read(1, 5),
            Record::mem_write_addr(4, 0x2000),
            Record::mem_write_data(4, 0xABCD_1234),
        ])
        .unwrap();
        sink.flush().unwrap();

        let text = String::from_utf8(buf.0.borrow().clone()).unwrap();
        assert_eq!(
            text,
            "\n[00001000] e1a00000 ???\t\t(R[???] => 00000005)(Mem[4][00002000] <= abcd1234)"
        );
        assert_eq!(sink.current_pc(), 0x1000);
    }

    #[test]
    fn text_sink_pads_narrow_mem_data() {
        let buf = SharedBuf::default();
        let mut sink =
            TextSink::from_writer(Box::new(buf.clone()), Box::new(DefaultArch));
        sink.accept(&[
            Record::mem_read_addr(1, 0x40),
            Record::mem_read_data(1, 0x1234_ABCD),
        ])
        .unwrap();
        let text = String::from_utf8(buf.0.borrow().clone()).unwrap();
        assert_eq!(text, "(Mem[1][00000040] => cd)");
    }
}
