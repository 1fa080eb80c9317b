//! Architecture description collaborator.
//!
//! The trace core never disassembles instructions or names registers itself;
//! renderers (the text sink and the instruction printer) ask an
//! [`ArchInterface`] for that. Integrations wire in a real architecture
//! description; [`DefaultArch`] is the placeholder used when none is.

/// Disassembly and register-naming services consumed by renderers.
pub trait ArchInterface {
    /// Disassembly text for an instruction word.
    fn disassemble(&self, ir: u64) -> String;

    /// Human-readable name of a register slot.
    fn register_slot_name(&self, index: u32) -> String;

    /// Width of a register slot in bytes (drives hex padding in renderers).
    fn register_slot_width(&self, index: u32) -> u32;

    /// Human-readable name of a register bank.
    fn register_bank_name(&self, index: u32) -> String;
}

/// Fallback architecture description: placeholder text, 4-byte registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultArch;

impl ArchInterface for DefaultArch {
    fn disassemble(&self, _ir: u64) -> String {
        "???".to_string()
    }

    fn register_slot_name(&self, _index: u32) -> String {
        "???".to_string()
    }

    fn register_slot_width(&self, _index: u32) -> u32 {
        4
    }

    fn register_bank_name(&self, _index: u32) -> String {
        "???".to_string()
    }
}
