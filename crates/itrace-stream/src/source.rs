//! Producer-side trace source.
//!
//! A [`TraceSource`] owns a fixed-capacity packet buffer of [`Record`]s and a
//! write cursor, exposes one `trace_*` entry point per instrumentation point,
//! and flushes completed batches to its [`TraceSink`].
//!
//! Call protocol (violations are bugs in the instrumented simulator and
//! panic; they are not recoverable runtime conditions):
//!
//! - `trace_instruction*` opens a packet; it requires no packet open and the
//!   source not terminated.
//! - operation calls (`trace_reg_*`, `trace_bank_reg_*`, `trace_mem_*`) are
//!   silent no-ops with no packet open, so instrumentation can be inserted
//!   unconditionally and go inert when tracing is not active.
//! - `end_instruction` on a closed packet is a no-op.
//! - after [`TraceSource::terminate`] no further emission is permitted.
//!
//! Width handling: every operation has a 32-bit and a 64-bit entry point,
//! chosen statically by the caller. The 64-bit form writes the base record
//! with the low 32 bits and then one data-extension record carrying the high
//! 32 bits; the 32-bit form never extends.

use anyhow::Result;
use itrace_core::Record;

use crate::sink::TraceSink;

/// Default packet-buffer capacity, in records.
pub const PACKET_BUFFER_SIZE: usize = 1024;

/// Producer-side component instrumented simulators call into.
///
/// New sources start in buffered mode: records accumulate until the packet
/// buffer fills or [`TraceSource::flush`] is called. Integrations that need
/// every record at the sink before the next instrumentation call returns
/// (crash-faithful capture) must opt in via
/// [`TraceSource::set_aggressive_flush`].
pub struct TraceSource {
    buf: Box<[Record]>,
    len: usize,
    sink: Option<TraceSink>,
    packet_open: bool,
    terminated: bool,
    suppressed: bool,
    aggressive_flush: bool,
    packet_count: u64,
    // Per-instance first-seen interning tables for name-based tracing.
    regs: Vec<String>,
    banks: Vec<String>,
}

impl TraceSource {
    /// Create a source with a packet buffer of `capacity` records.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "packet buffer capacity must be non-zero");
        Self {
            buf: vec![Record::default(); capacity].into_boxed_slice(),
            len: 0,
            sink: None,
            packet_open: false,
            terminated: false,
            suppressed: false,
            aggressive_flush: false,
            packet_count: 0,
            regs: Vec::new(),
            banks: Vec::new(),
        }
    }

    /* ---------------- Sink & policy ---------------- */

    /// Assign the sink; replaces any previous one (last writer wins).
    pub fn set_sink(&mut self, sink: TraceSink) {
        self.sink = Some(sink);
    }

    /// Take the sink back out (e.g. to `close` it after terminating).
    pub fn take_sink(&mut self) -> Option<TraceSink> {
        self.sink.take()
    }

    /// Enable or disable aggressive flushing (flush after every record).
    pub fn set_aggressive_flush(&mut self, on: bool) {
        self.aggressive_flush = on;
    }

    /// Whether aggressive flushing is enabled.
    #[must_use]
    pub fn aggressive_flush(&self) -> bool {
        self.aggressive_flush
    }

    /* ---------------- State queries ---------------- */

    /// Whether a packet is currently open.
    #[must_use]
    pub fn is_packet_open(&self) -> bool {
        self.packet_open
    }

    /// Whether the source has been terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of completed packets so far.
    #[must_use]
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /* ---------------- Suppression gate ---------------- */

    /// Start discarding trace calls (values are dropped, not buffered).
    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    /// Stop discarding trace calls.
    pub fn unsuppress(&mut self) {
        self.suppressed = false;
    }

    /// Whether the suppression gate is closed.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /* ---------------- Packet protocol ---------------- */

    /// Open a packet: emit the instruction header and code records.
    ///
    /// # Panics
    /// Panics if the source is terminated or a packet is already open.
    pub fn trace_instruction(
        &mut self,
        pc: u32,
        ir: u32,
        isa_mode: u8,
        irq_mode: u8,
    ) -> Result<()> {
        if self.suppressed {
            return Ok(());
        }
        self.open_packet()?;
        self.push(Record::instruction_header(isa_mode, pc))?;
        self.push(Record::instruction_code(u16::from(irq_mode), ir))
    }

    /// Open a packet for a 64-bit core: header and code each carry an
    /// extension record with their high 32 bits.
    ///
    /// # Panics
    /// Panics if the source is terminated or a packet is already open.
    pub fn trace_instruction64(
        &mut self,
        pc: u64,
        ir: u64,
        isa_mode: u8,
        irq_mode: u8,
    ) -> Result<()> {
        if self.suppressed {
            return Ok(());
        }
        self.open_packet()?;
        self.push_wide(Record::instruction_header(isa_mode, pc as u32), pc)?;
        self.push_wide(Record::instruction_code(u16::from(irq_mode), ir as u32), ir)
    }

    fn open_packet(&mut self) -> Result<()> {
        assert!(!self.terminated, "trace_instruction on a terminated source");
        assert!(
            !self.packet_open,
            "trace_instruction while a packet is already open"
        );
        self.packet_open = true;
        Ok(())
    }

    /// Close the open packet. No-op if no packet is open.
    pub fn end_instruction(&mut self) {
        if !self.packet_open {
            return;
        }
        self.packet_count += 1;
        self.packet_open = false;
    }

    /* ---------------- Register operations ---------------- */

    /// Trace a 32-bit register read.
    pub fn trace_reg_read(&mut self, regnum: u16, value: u32) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push(Record::reg_read(regnum, value))
    }

    /// Trace a 64-bit register read (base record + extension).
    pub fn trace_reg_read64(&mut self, regnum: u16, value: u64) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push_wide(Record::reg_read(regnum, value as u32), value)
    }

    /// Trace a 32-bit register write.
    pub fn trace_reg_write(&mut self, regnum: u16, value: u32) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push(Record::reg_write(regnum, value))
    }

    /// Trace a 64-bit register write (base record + extension).
    pub fn trace_reg_write64(&mut self, regnum: u16, value: u64) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push_wide(Record::reg_write(regnum, value as u32), value)
    }

    /// Trace a register read by name (interned per instance).
    pub fn trace_reg_read_named(&mut self, name: &str, value: u32) -> Result<()> {
        let id = self.reg_id(name);
        self.trace_reg_read(id, value)
    }

    /// Trace a register write by name (interned per instance).
    pub fn trace_reg_write_named(&mut self, name: &str, value: u32) -> Result<()> {
        let id = self.reg_id(name);
        self.trace_reg_write(id, value)
    }

    /* ---------------- Banked register operations ---------------- */

    /// Trace a banked register read.
    pub fn trace_bank_reg_read(&mut self, bank: u8, regnum: u8, value: u32) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push(Record::bank_reg_read(bank, regnum, value))
    }

    /// Trace a banked register write.
    pub fn trace_bank_reg_write(&mut self, bank: u8, regnum: u8, value: u32) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push(Record::bank_reg_write(bank, regnum, value))
    }

    /// Trace a banked register read, naming the bank (interned per instance).
    pub fn trace_bank_reg_read_named(
        &mut self,
        bank_name: &str,
        regnum: u8,
        value: u32,
    ) -> Result<()> {
        let bank = self.bank_id(bank_name);
        self.trace_bank_reg_read(bank, regnum, value)
    }

    /// Trace a banked register write, naming the bank (interned per instance).
    pub fn trace_bank_reg_write_named(
        &mut self,
        bank_name: &str,
        regnum: u8,
        value: u32,
    ) -> Result<()> {
        let bank = self.bank_id(bank_name);
        self.trace_bank_reg_write(bank, regnum, value)
    }

    /* ---------------- Memory operations ---------------- */

    /// Trace a 32-bit memory read (address record, then data record).
    pub fn trace_mem_read(&mut self, addr: u32, value: u32, width: u8) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push(Record::mem_read_addr(width, addr))?;
        self.push(Record::mem_read_data(width, value))
    }

    /// Trace a memory read on a 64-bit core; address and data each extend.
    pub fn trace_mem_read64(&mut self, addr: u64, value: u64, width: u8) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push_wide(Record::mem_read_addr(width, addr as u32), addr)?;
        self.push_wide(Record::mem_read_data(width, value as u32), value)
    }

    /// Trace a 32-bit memory write (address record, then data record).
    pub fn trace_mem_write(&mut self, addr: u32, value: u32, width: u8) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push(Record::mem_write_addr(width, addr))?;
        self.push(Record::mem_write_data(width, value))
    }

    /// Trace a memory write on a 64-bit core; address and data each extend.
    pub fn trace_mem_write64(&mut self, addr: u64, value: u64, width: u8) -> Result<()> {
        if !self.op_active() {
            return Ok(());
        }
        self.push_wide(Record::mem_write_addr(width, addr as u32), addr)?;
        self.push_wide(Record::mem_write_data(width, value as u32), value)
    }

    /* ---------------- Flushing ---------------- */

    /// Drain the packet buffer into the sink and flush the sink itself.
    ///
    /// # Panics
    /// Panics if no sink is assigned.
    pub fn flush(&mut self) -> Result<()> {
        self.emit_packets()?;
        self.sink
            .as_mut()
            .map_or_else(|| panic!("flush with no sink assigned"), TraceSink::flush)
    }

    /// Terminate the source (one-way). Pending records are flushed first
    /// when a sink is assigned; afterwards no tracing call may emit.
    pub fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        if self.sink.is_some() && self.len > 0 {
            self.flush()?;
        }
        self.terminated = true;
        Ok(())
    }

    /* ---------------- Naming tables ---------------- */

    /// Intern a register name, returning its stable first-seen index.
    pub fn reg_id(&mut self, name: &str) -> u16 {
        if let Some(pos) = self.regs.iter().position(|r| r == name) {
            return pos as u16;
        }
        self.regs.push(name.to_owned());
        (self.regs.len() - 1) as u16
    }

    /// Name previously interned for a register id, if any.
    #[must_use]
    pub fn reg_name(&self, id: u16) -> Option<&str> {
        self.regs.get(id as usize).map(String::as_str)
    }

    /// Intern a register bank name, returning its stable first-seen index.
    pub fn bank_id(&mut self, name: &str) -> u8 {
        if let Some(pos) = self.banks.iter().position(|b| b == name) {
            return pos as u8;
        }
        self.banks.push(name.to_owned());
        (self.banks.len() - 1) as u8
    }

    /// Name previously interned for a bank id, if any.
    #[must_use]
    pub fn bank_name(&self, id: u8) -> Option<&str> {
        self.banks.get(id as usize).map(String::as_str)
    }

    /* ---------------- Internals ---------------- */

    /// Operation calls are live only with an open packet and the gate open.
    fn op_active(&self) -> bool {
        if self.suppressed || !self.packet_open {
            return false;
        }
        assert!(!self.terminated, "trace call on a terminated source");
        true
    }

    /// Buffer one record. Flushes when the buffer is full before buffering,
    /// and after buffering when aggressive flushing is on, so in aggressive
    /// mode every record reaches the sink before the call returns.
    fn push(&mut self, record: Record) -> Result<()> {
        if self.len == self.buf.len() {
            self.emit_packets()?;
        }
        self.buf[self.len] = record;
        self.len += 1;
        if self.aggressive_flush {
            self.emit_packets()?;
        }
        Ok(())
    }

    /// Buffer a base record plus the extension carrying its high 32 bits.
    fn push_wide(&mut self, record: Record, value: u64) -> Result<()> {
        let kind = record.kind();
        self.push(record)?;
        self.push(Record::data_extension(kind, (value >> 32) as u32))
    }

    /// Hand the used range to the sink and reset the write cursor.
    ///
    /// # Panics
    /// Panics if no sink is assigned.
    fn emit_packets(&mut self) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            panic!("flush with no sink assigned");
        };
        sink.accept(&self.buf[..self.len])?;
        self.len = 0;
        Ok(())
    }
}

impl std::fmt::Debug for TraceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceSource")
            .field("capacity", &self.buf.len())
            .field("buffered", &self.len)
            .field("packet_open", &self.packet_open)
            .field("terminated", &self.terminated)
            .field("suppressed", &self.suppressed)
            .field("aggressive_flush", &self.aggressive_flush)
            .field("packet_count", &self.packet_count)
            .finish_non_exhaustive()
    }
}
