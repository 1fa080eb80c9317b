//! Fixed-width trace records.
//!
//! A [`Record`] is two packed `u32`s: a `header` word holding the kind tag in
//! its high 16 bits and a narrow 16-bit field in its low 16 bits, and a wide
//! 32-bit `data` word. All variants share this shape, so the encoded size is
//! constant and a persisted stream can be indexed as `byte_offset / 8`.
//!
//! Values wider than the 32-bit inline field (a 64-bit PC, register value, or
//! address) are carried by a [`RecordKind::DataExtension`] record that
//! immediately follows its base record: the extension's narrow field holds the
//! base record's kind tag and its wide field holds the high-order 32 bits.

use serde::Serialize;

/// Closed set of record kinds.
///
/// Discriminants are part of the wire format; do not reorder. Serialized by
/// name for JSON summaries only; wire decoding goes through [`RecordKind::from_u16`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[repr(u16)]
pub enum RecordKind {
    /// Unrecognized kind tag (decoder fallback, never produced by an encoder).
    #[default]
    Unknown = 0,
    /// Start of an instruction packet: ISA mode + program counter.
    InstructionHeader = 1,
    /// Second record of a packet: interrupt mode + instruction word.
    InstructionCode = 2,
    /// Register read: register number + value.
    RegRead = 3,
    /// Register write: register number + value.
    RegWrite = 4,
    /// Banked register read: bank/regnum + value.
    BankRegRead = 5,
    /// Banked register write: bank/regnum + value.
    BankRegWrite = 6,
    /// Memory read, address half: access width + address.
    MemReadAddr = 7,
    /// Memory read, data half: access width + value.
    MemReadData = 8,
    /// Memory write, address half: access width + address.
    MemWriteAddr = 9,
    /// Memory write, data half: access width + value.
    MemWriteData = 10,
    /// High-order 32 bits of the immediately preceding base record's value.
    DataExtension = 11,
}

impl RecordKind {
    /// Map a raw wire tag to a kind, falling back to [`RecordKind::Unknown`].
    #[must_use]
    pub fn from_u16(raw: u16) -> Self {
        match raw {
            1 => Self::InstructionHeader,
            2 => Self::InstructionCode,
            3 => Self::RegRead,
            4 => Self::RegWrite,
            5 => Self::BankRegRead,
            6 => Self::BankRegWrite,
            7 => Self::MemReadAddr,
            8 => Self::MemReadData,
            9 => Self::MemWriteAddr,
            10 => Self::MemWriteData,
            11 => Self::DataExtension,
            _ => Self::Unknown,
        }
    }

    /// The raw wire tag for this kind.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// One fixed-width trace record.
///
/// Records are plain value types; copy them freely. Construction and
/// validation are atomic: the typed constructors below are the only way a
/// well-formed encoder produces records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Record {
    header: u32,
    data: u32,
}

/// Mask `value` down to `width * 8` bits (widths ≥ 4 keep all 32 bits).
#[inline]
#[must_use]
fn mask_to_width(value: u32, width: u8) -> u32 {
    match width {
        1 => value & 0xff,
        2 => value & 0xffff,
        3 => value & 0x00ff_ffff,
        _ => value,
    }
}

impl Record {
    /// Encoded size in bytes; constant across all variants.
    pub const ENCODED_SIZE: usize = 8;

    /// Pack a kind tag, narrow field, and wide field into a record.
    #[inline]
    #[must_use]
    pub const fn pack(kind: RecordKind, data16: u16, data32: u32) -> Self {
        Self {
            header: ((kind as u32) << 16) | data16 as u32,
            data: data32,
        }
    }

    /// The record's kind ([`RecordKind::Unknown`] for unrecognized tags).
    #[inline]
    #[must_use]
    pub fn kind(self) -> RecordKind {
        RecordKind::from_u16(self.raw_kind())
    }

    /// The raw 16-bit kind tag as stored on the wire.
    #[inline]
    #[must_use]
    pub const fn raw_kind(self) -> u16 {
        (self.header >> 16) as u16
    }

    /// The narrow 16-bit inline field.
    #[inline]
    #[must_use]
    pub const fn data16(self) -> u16 {
        (self.header & 0xffff) as u16
    }

    /// The wide 32-bit inline field.
    #[inline]
    #[must_use]
    pub const fn data32(self) -> u32 {
        self.data
    }

    /* ---------------- Typed constructors ---------------- */

    /// Instruction packet header: ISA mode + program counter (low bits).
    #[must_use]
    pub const fn instruction_header(isa_mode: u8, pc: u32) -> Self {
        Self::pack(RecordKind::InstructionHeader, isa_mode as u16, pc)
    }

    /// Instruction code: interrupt/exception mode + instruction word (low bits).
    #[must_use]
    pub const fn instruction_code(irq_mode: u16, ir: u32) -> Self {
        Self::pack(RecordKind::InstructionCode, irq_mode, ir)
    }

    /// Register read: register number + value (low bits).
    #[must_use]
    pub const fn reg_read(regnum: u16, value: u32) -> Self {
        Self::pack(RecordKind::RegRead, regnum, value)
    }

    /// Register write: register number + value (low bits).
    #[must_use]
    pub const fn reg_write(regnum: u16, value: u32) -> Self {
        Self::pack(RecordKind::RegWrite, regnum, value)
    }

    /// Banked register read: bank in the high byte, regnum in the low byte.
    #[must_use]
    pub const fn bank_reg_read(bank: u8, regnum: u8, value: u32) -> Self {
        Self::pack(
            RecordKind::BankRegRead,
            ((bank as u16) << 8) | regnum as u16,
            value,
        )
    }

    /// Banked register write: bank in the high byte, regnum in the low byte.
    #[must_use]
    pub const fn bank_reg_write(bank: u8, regnum: u8, value: u32) -> Self {
        Self::pack(
            RecordKind::BankRegWrite,
            ((bank as u16) << 8) | regnum as u16,
            value,
        )
    }

    /// Memory read address: access width in bytes + address (low bits).
    #[must_use]
    pub const fn mem_read_addr(width: u8, addr: u32) -> Self {
        Self::pack(RecordKind::MemReadAddr, width as u16, addr)
    }

    /// Memory read data: access width in bytes + value (low bits).
    ///
    /// The value is stored as given; the accessor masks to `width * 8` bits.
    #[must_use]
    pub const fn mem_read_data(width: u8, value: u32) -> Self {
        Self::pack(RecordKind::MemReadData, width as u16, value)
    }

    /// Memory write address: access width in bytes + address (low bits).
    #[must_use]
    pub const fn mem_write_addr(width: u8, addr: u32) -> Self {
        Self::pack(RecordKind::MemWriteAddr, width as u16, addr)
    }

    /// Memory write data: access width in bytes + value (low bits).
    #[must_use]
    pub const fn mem_write_data(width: u8, value: u32) -> Self {
        Self::pack(RecordKind::MemWriteData, width as u16, value)
    }

    /// Extension record: the extended base record's kind tag + high 32 bits.
    #[must_use]
    pub const fn data_extension(base: RecordKind, high: u32) -> Self {
        Self::pack(RecordKind::DataExtension, base.as_u16(), high)
    }

    /* ---------------- Byte codec ---------------- */

    /// Encode as 8 little-endian bytes (`header` word, then `data` word).
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::ENCODED_SIZE] {
        let mut out = [0u8; Self::ENCODED_SIZE];
        out[..4].copy_from_slice(&self.header.to_le_bytes());
        out[4..].copy_from_slice(&self.data.to_le_bytes());
        out
    }

    /// Decode from 8 little-endian bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; Self::ENCODED_SIZE]) -> Self {
        let header = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let data = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self { header, data }
    }

    /* ---------------- Typed view ---------------- */

    /// Unpack into the closed typed view for exhaustive dispatch.
    ///
    /// Memory data values come back already masked to their declared width,
    /// so a 1-byte read is always in `[0, 255]` regardless of stray high bits.
    #[must_use]
    pub fn payload(self) -> RecordPayload {
        let n = self.data16();
        let w = self.data32();
        match self.kind() {
            RecordKind::InstructionHeader => RecordPayload::InstructionHeader {
                isa_mode: n as u8,
                pc: w,
            },
            RecordKind::InstructionCode => RecordPayload::InstructionCode { irq_mode: n, ir: w },
            RecordKind::RegRead => RecordPayload::RegRead {
                regnum: n,
                value: w,
            },
            RecordKind::RegWrite => RecordPayload::RegWrite {
                regnum: n,
                value: w,
            },
            RecordKind::BankRegRead => RecordPayload::BankRegRead {
                bank: (n >> 8) as u8,
                regnum: (n & 0xff) as u8,
                value: w,
            },
            RecordKind::BankRegWrite => RecordPayload::BankRegWrite {
                bank: (n >> 8) as u8,
                regnum: (n & 0xff) as u8,
                value: w,
            },
            RecordKind::MemReadAddr => RecordPayload::MemReadAddr {
                width: n as u8,
                addr: w,
            },
            RecordKind::MemReadData => RecordPayload::MemReadData {
                width: n as u8,
                value: mask_to_width(w, n as u8),
            },
            RecordKind::MemWriteAddr => RecordPayload::MemWriteAddr {
                width: n as u8,
                addr: w,
            },
            RecordKind::MemWriteData => RecordPayload::MemWriteData {
                width: n as u8,
                value: mask_to_width(w, n as u8),
            },
            RecordKind::DataExtension => RecordPayload::DataExtension {
                base: RecordKind::from_u16(n),
                high: w,
            },
            RecordKind::Unknown => RecordPayload::Unknown {
                raw_kind: self.raw_kind(),
                data16: n,
                data32: w,
            },
        }
    }
}

/// Typed view over a [`Record`], one variant per operation kind.
///
/// Decoders match on this exhaustively; the compiler, not a runtime
/// "unsupported type" branch, keeps the set closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordPayload {
    /// Start of an instruction packet.
    InstructionHeader {
        /// ISA mode the instruction executed in.
        isa_mode: u8,
        /// Program counter (low 32 bits).
        pc: u32,
    },
    /// Instruction word of the current packet.
    InstructionCode {
        /// Interrupt/exception mode.
        irq_mode: u16,
        /// Instruction word (low 32 bits).
        ir: u32,
    },
    /// Register read.
    RegRead {
        /// Register slot number.
        regnum: u16,
        /// Value read (low 32 bits).
        value: u32,
    },
    /// Register write.
    RegWrite {
        /// Register slot number.
        regnum: u16,
        /// Value written (low 32 bits).
        value: u32,
    },
    /// Banked register read.
    BankRegRead {
        /// Register bank id.
        bank: u8,
        /// Register number within the bank.
        regnum: u8,
        /// Value read.
        value: u32,
    },
    /// Banked register write.
    BankRegWrite {
        /// Register bank id.
        bank: u8,
        /// Register number within the bank.
        regnum: u8,
        /// Value written.
        value: u32,
    },
    /// Address half of a memory read.
    MemReadAddr {
        /// Access width in bytes.
        width: u8,
        /// Address (low 32 bits).
        addr: u32,
    },
    /// Data half of a memory read; `value` is masked to `width * 8` bits.
    MemReadData {
        /// Access width in bytes.
        width: u8,
        /// Value, masked to the declared width.
        value: u32,
    },
    /// Address half of a memory write.
    MemWriteAddr {
        /// Access width in bytes.
        width: u8,
        /// Address (low 32 bits).
        addr: u32,
    },
    /// Data half of a memory write; `value` is masked to `width * 8` bits.
    MemWriteData {
        /// Access width in bytes.
        width: u8,
        /// Value, masked to the declared width.
        value: u32,
    },
    /// High-order 32 bits of the preceding base record's value.
    DataExtension {
        /// Kind of the base record this extends.
        base: RecordKind,
        /// High-order 32 bits.
        high: u32,
    },
    /// Unrecognized kind tag; raw fields preserved for diagnostics.
    Unknown {
        /// The raw 16-bit tag found on the wire.
        raw_kind: u16,
        /// Narrow field as stored.
        data16: u16,
        /// Wide field as stored.
        data32: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pack_unpack_fields() {
        let r = Record::pack(RecordKind::RegWrite, 0xBEEF, 0xDEAD_CAFE);
        assert_eq!(r.kind(), RecordKind::RegWrite);
        assert_eq!(r.data16(), 0xBEEF);
        assert_eq!(r.data32(), 0xDEAD_CAFE);
    }

    #[test]
    fn mem_data_masks_to_width() {
        let r = Record::mem_read_data(1, 0x1234_ABCD);
        assert_eq!(
            r.payload(),
            RecordPayload::MemReadData {
                width: 1,
                value: 0xCD
            }
        );
        let r = Record::mem_write_data(2, 0x1234_ABCD);
        assert_eq!(
            r.payload(),
            RecordPayload::MemWriteData {
                width: 2,
                value: 0xABCD
            }
        );
        let r = Record::mem_read_data(4, 0x1234_ABCD);
        assert_eq!(
            r.payload(),
            RecordPayload::MemReadData {
                width: 4,
                value: 0x1234_ABCD
            }
        );
    }

    #[test]
    fn bank_packing_splits_bytes() {
        let r = Record::bank_reg_write(0xAB, 0x0C, 7);
        assert_eq!(
            r.payload(),
            RecordPayload::BankRegWrite {
                bank: 0xAB,
                regnum: 0x0C,
                value: 7
            }
        );
    }

    #[test]
    fn unknown_tag_round_trips_raw_fields() {
        let r = Record::pack(RecordKind::Unknown, 0, 0);
        // Forge an out-of-range tag directly through the byte codec.
        let mut bytes = r.to_bytes();
        bytes[2] = 0x99; // low byte of the tag halfword
        let forged = Record::from_bytes(bytes);
        assert_eq!(forged.kind(), RecordKind::Unknown);
        match forged.payload() {
            RecordPayload::Unknown { raw_kind, .. } => assert_eq!(raw_kind, 0x99),
            other => panic!("expected Unknown payload, got {other:?}"),
        }
    }

    #[test]
    fn extension_carries_base_tag() {
        let r = Record::data_extension(RecordKind::RegWrite, 0x1122_3344);
        assert_eq!(
            r.payload(),
            RecordPayload::DataExtension {
                base: RecordKind::RegWrite,
                high: 0x1122_3344
            }
        );
    }

    proptest! {
        #[test]
        fn byte_codec_round_trips(tag in 0u16..=12, data16: u16, data32: u32) {
            let r = Record::pack(RecordKind::from_u16(tag), data16, data32);
            let back = Record::from_bytes(r.to_bytes());
            prop_assert_eq!(r, back);
        }

        #[test]
        fn kind_tag_round_trips(tag in 0u16..=11) {
            let kind = RecordKind::from_u16(tag);
            if kind != RecordKind::Unknown {
                prop_assert_eq!(kind.as_u16(), tag);
            }
        }
    }
}
