//! End-to-end pipeline properties.
//!
//! These tests treat:
//! - the **trace source** as authoritative for the packet protocol and the
//!   flush policy (buffered vs. aggressive), and
//! - the **instruction printer** as the reference decoder that must undo
//!   whatever the source encoded, extension records included.

use itrace_core::{DefaultArch, Record, RecordKind};
use itrace_stream::{BinarySink, InstructionPrinter, RecordFile, TraceSink, TraceSource};
use proptest::prelude::*;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Byte buffer shared with a boxed writer, with a flush counter so tests can
/// observe how often the binary sink hit the byte sink.
#[derive(Clone, Default)]
struct SharedBuf {
    data: Rc<RefCell<Vec<u8>>>,
    flushes: Rc<RefCell<usize>>,
}

impl SharedBuf {
    fn bytes(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }

    fn flushes(&self) -> usize {
        *self.flushes.borrow()
    }

    fn records(&self) -> Vec<Record> {
        let bytes = self.bytes();
        assert_eq!(bytes.len() % Record::ENCODED_SIZE, 0);
        bytes
            .chunks_exact(Record::ENCODED_SIZE)
            .map(|chunk| {
                let mut arr = [0u8; Record::ENCODED_SIZE];
                arr.copy_from_slice(chunk);
                Record::from_bytes(arr)
            })
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        *self.flushes.borrow_mut() += 1;
        Ok(())
    }
}

/// Source wired to a write-through binary sink (threshold 1), so each sink
/// `accept` carrying data becomes exactly one writer flush.
fn source_with_buf(capacity: usize) -> (TraceSource, SharedBuf) {
    let buf = SharedBuf::default();
    let mut src = TraceSource::new(capacity);
    src.set_sink(TraceSink::Binary(
        BinarySink::from_writer(Box::new(buf.clone())).with_threshold(1),
    ));
    (src, buf)
}

fn tmp_path(name: &str) -> std::path::PathBuf {
    let mut p = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    p.push(format!("itrace_pipeline_{name}_{nanos}.trace"));
    p
}

#[test]
fn buffer_full_triggers_exactly_one_accept() {
    // Capacity 4: header + code + op fill 3 slots; two more ops cross it.
    let (mut src, buf) = source_with_buf(4);
    src.trace_instruction(0x1000, 0xE1A0_0000, 0, 0).unwrap();
    src.trace_reg_read(1, 11).unwrap();
    src.trace_reg_read(2, 22).unwrap();
    assert_eq!(buf.flushes(), 0, "buffer not yet full");

    // Fifth record: the full buffer of 4 is handed over first.
    src.trace_reg_read(3, 33).unwrap();
    assert_eq!(buf.flushes(), 1);
    let flushed = buf.records();
    assert_eq!(flushed.len(), 4);
    assert_eq!(flushed[3], Record::reg_read(2, 22));

    src.end_instruction();
    src.flush().unwrap();
    assert_eq!(buf.records().last(), Some(&Record::reg_read(3, 33)));
}

#[test]
fn aggressive_flush_hands_over_every_record() {
    let (mut src, buf) = source_with_buf(1024);
    src.set_aggressive_flush(true);

    src.trace_instruction(0x1000, 0xE1A0_0000, 0, 0).unwrap();
    assert_eq!(buf.flushes(), 2, "header and code each flushed");
    src.trace_reg_write(0, 5).unwrap();
    assert_eq!(buf.flushes(), 3);
    src.trace_reg_write64(1, 0xAAAA_BBBB_CCCC_DDDD).unwrap();
    assert_eq!(buf.flushes(), 5, "base record and extension each flushed");
    src.end_instruction();

    assert_eq!(buf.records().len(), 5);
}

#[test]
fn wide_reg_write_emits_one_extension_then_decodes_bit_exact() {
    let value: u64 = 0xDEAD_BEEF_0BAD_F00D;
    let (mut src, buf) = source_with_buf(64);
    src.trace_instruction(0x1000, 0, 0, 0).unwrap();
    src.trace_reg_write64(7, value).unwrap();
    src.end_instruction();
    src.flush().unwrap();

    let records = buf.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records[2], Record::reg_write(7, value as u32));
    assert_eq!(
        records[3],
        Record::data_extension(RecordKind::RegWrite, (value >> 32) as u32)
    );

    let file = RecordFile::from_bytes(buf.bytes()).unwrap();
    let arch = DefaultArch;
    let printer = InstructionPrinter::display_all(&arch);
    let mut it = file.iter();
    let line = printer.print_instruction(&mut it);
    assert!(
        line.ends_with("(R[7] <- 0xdeadbeef0badf00d)"),
        "got: {line}"
    );
}

#[test]
fn wide_memory_op_extends_address_and_data_separately() {
    let addr: u64 = 0x0000_00F0_1234_5678;
    let value: u64 = 0x0102_0304_0506_0708;
    let (mut src, buf) = source_with_buf(64);
    src.trace_instruction64(0x0000_0001_0000_1000, 0, 0, 0)
        .unwrap();
    src.trace_mem_write64(addr, value, 8).unwrap();
    src.end_instruction();
    src.flush().unwrap();

    let file = RecordFile::from_bytes(buf.bytes()).unwrap();
    let arch = DefaultArch;
    let printer = InstructionPrinter::display_all(&arch);
    let mut it = file.iter();
    let line = printer.print_instruction(&mut it);
    assert!(
        line.starts_with("[100001000] "),
        "widened PC renders beyond 8 digits: {line}"
    );
    assert!(
        line.ends_with("([f012345678](8) <= 0x102030405060708)"),
        "got: {line}"
    );
}

#[test]
fn binary_sink_file_length_is_record_multiple() {
    let path = tmp_path("file_len");
    {
        let mut src = TraceSource::new(16);
        src.set_sink(TraceSink::Binary(BinarySink::create(&path).unwrap()));
        src.trace_instruction(0x1000, 1, 0, 0).unwrap();
        src.trace_reg_write(0, 2).unwrap();
        src.end_instruction();
        src.trace_instruction(0x1004, 3, 0, 0).unwrap();
        src.end_instruction();
        src.flush().unwrap();
        src.terminate().unwrap();
        src.take_sink().unwrap().close().unwrap();
    }
    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, 5 * Record::ENCODED_SIZE as u64);

    let file = RecordFile::open(&path).unwrap();
    assert_eq!(file.len(), 5);
    let _ = std::fs::remove_file(path);
}

#[test]
fn terminate_drains_pending_records() {
    let (mut src, buf) = source_with_buf(1024);
    src.trace_instruction(0x1000, 1, 0, 0).unwrap();
    src.trace_reg_write(0, 2).unwrap();
    src.end_instruction();
    assert!(buf.bytes().is_empty(), "nothing flushed yet");

    src.terminate().unwrap();
    assert_eq!(buf.records().len(), 3);
}

/// One traced operation for the 32-bit round-trip property.
#[derive(Clone, Debug)]
enum Op {
    RegRead(u16, u32),
    RegWrite(u16, u32),
    BankRead(u8, u8, u32),
    BankWrite(u8, u8, u32),
    MemRead(u32, u32, u8),
    MemWrite(u32, u32, u8),
}

impl Op {
    fn trace(&self, src: &mut TraceSource) {
        match *self {
            Op::RegRead(r, v) => src.trace_reg_read(r, v).unwrap(),
            Op::RegWrite(r, v) => src.trace_reg_write(r, v).unwrap(),
            Op::BankRead(b, r, v) => src.trace_bank_reg_read(b, r, v).unwrap(),
            Op::BankWrite(b, r, v) => src.trace_bank_reg_write(b, r, v).unwrap(),
            Op::MemRead(a, v, w) => src.trace_mem_read(a, v, w).unwrap(),
            Op::MemWrite(a, v, w) => src.trace_mem_write(a, v, w).unwrap(),
        }
    }

    fn expected_records(&self) -> Vec<Record> {
        match *self {
            Op::RegRead(r, v) => vec![Record::reg_read(r, v)],
            Op::RegWrite(r, v) => vec![Record::reg_write(r, v)],
            Op::BankRead(b, r, v) => vec![Record::bank_reg_read(b, r, v)],
            Op::BankWrite(b, r, v) => vec![Record::bank_reg_write(b, r, v)],
            Op::MemRead(a, v, w) => {
                vec![Record::mem_read_addr(w, a), Record::mem_read_data(w, v)]
            }
            Op::MemWrite(a, v, w) => {
                vec![Record::mem_write_addr(w, a), Record::mem_write_data(w, v)]
            }
        }
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    let width = prop_oneof![Just(1u8), Just(2u8), Just(4u8)];
    prop_oneof![
        (any::<u16>(), any::<u32>()).prop_map(|(r, v)| Op::RegRead(r, v)),
        (any::<u16>(), any::<u32>()).prop_map(|(r, v)| Op::RegWrite(r, v)),
        (any::<u8>(), any::<u8>(), any::<u32>()).prop_map(|(b, r, v)| Op::BankRead(b, r, v)),
        (any::<u8>(), any::<u8>(), any::<u32>()).prop_map(|(b, r, v)| Op::BankWrite(b, r, v)),
        (any::<u32>(), any::<u32>(), width.clone()).prop_map(|(a, v, w)| Op::MemRead(a, v, w)),
        (any::<u32>(), any::<u32>(), width).prop_map(|(a, v, w)| Op::MemWrite(a, v, w)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64, // good CI/runtime balance
        .. ProptestConfig::default()
    })]

    // Property: a 32-bit-native trace round-trips with no extension records
    // and the printer leaves the iterator on the next packet boundary.
    #[test]
    fn native_width_round_trip(
        packets in prop::collection::vec(
            (any::<u32>(), any::<u32>(), prop::collection::vec(arb_op(), 0..5)),
            1..8,
        )
    ) {
        let (mut src, buf) = source_with_buf(32);
        let mut expected = Vec::new();
        for (pc, ir, ops) in &packets {
            src.trace_instruction(*pc, *ir, 0, 0).unwrap();
            expected.push(Record::instruction_header(0, *pc));
            expected.push(Record::instruction_code(0, *ir));
            for op in ops {
                op.trace(&mut src);
                expected.extend(op.expected_records());
            }
            src.end_instruction();
        }
        src.flush().unwrap();

        let records = buf.records();
        prop_assert_eq!(&records, &expected);
        prop_assert!(records.iter().all(|r| r.kind() != RecordKind::DataExtension));

        let file = RecordFile::from_bytes(buf.bytes()).unwrap();
        let arch = DefaultArch;
        let printer = InstructionPrinter::display_all(&arch);
        let mut it = file.iter();
        let mut lines = 0usize;
        while !it.at_end() {
            let line = printer.print_instruction(&mut it);
            prop_assert!(line.starts_with('['));
            lines += 1;
        }
        prop_assert_eq!(lines, packets.len());
        prop_assert_eq!(src.packet_count(), packets.len() as u64);
    }
}
