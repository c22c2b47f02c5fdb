//! The fixed instruction catalogue.
//!
//! The catalogue is the closed set of instructions a user can pick from. Each
//! entry is built once and never mutated.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use thiserror::Error;
use crate::cpu::decode::Opcode;
use crate::cpu::instruction::{Instruction, InstructionType};

/// A validated set of instructions with unique ids and mnemonics.
#[derive(Debug, Clone)]
pub struct Catalogue {
    entries: Vec<Instruction>,
}

impl Catalogue {
    /// Build a catalogue, rejecting duplicate ids or mnemonics.
    pub fn new(entries: Vec<Instruction>) -> Result<Self, CatalogueError> {
        let mut ids = HashSet::new();
        let mut mnemonics = HashSet::new();

        for entry in &entries {
            if !ids.insert(entry.id) {
                return Err(CatalogueError::DuplicateId(entry.id));
            }
            if !mnemonics.insert(entry.mnemonic.as_str()) {
                return Err(CatalogueError::DuplicateMnemonic(entry.mnemonic.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// The shared built-in catalogue.
    pub fn builtin() -> &'static Catalogue {
        static BUILTIN: OnceLock<Catalogue> = OnceLock::new();
        BUILTIN.get_or_init(|| Catalogue {
            entries: builtin_entries(),
        })
    }

    /// Look up an entry by id.
    pub fn get(&self, id: u32) -> Option<&Instruction> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Look up an entry by exact mnemonic.
    pub fn find(&self, mnemonic: &str) -> Option<&Instruction> {
        self.entries.iter().find(|e| e.mnemonic == mnemonic)
    }

    /// Iterate entries in catalogue order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalogue has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries grouped by type, groups in display order.
    pub fn by_type(&self) -> BTreeMap<InstructionType, Vec<&Instruction>> {
        let mut groups: BTreeMap<InstructionType, Vec<&Instruction>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.kind).or_default().push(entry);
        }
        groups
    }
}

impl<'a> IntoIterator for &'a Catalogue {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Errors raised while building a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogueError {
    #[error("duplicate instruction id {0}")]
    DuplicateId(u32),

    #[error("duplicate mnemonic {0:?}")]
    DuplicateMnemonic(String),
}

/// Display metadata for one opcode: description, group, operand count,
/// beginner explanation.
fn metadata(op: Opcode) -> (&'static str, InstructionType, u8, &'static str) {
    use InstructionType::*;

    match op {
        Opcode::MovAxImm => (
            "Move immediate value 42 into AX",
            Data, 2,
            "Puts the number 42 into the AX box.",
        ),
        Opcode::MovBxAx => (
            "Copy AX into BX",
            Data, 2,
            "Copies whatever is in AX into BX. AX keeps its value.",
        ),
        Opcode::AddAxBx => (
            "Add BX to AX",
            Arithmetic, 2,
            "Adds the numbers in AX and BX and keeps the answer in AX.",
        ),
        Opcode::SubCxDx => (
            "Subtract DX from CX",
            Arithmetic, 2,
            "Takes DX away from CX and keeps the answer in CX.",
        ),
        Opcode::MulBx => (
            "Multiply AX by BX",
            Arithmetic, 1,
            "Multiplies AX by BX. The answer goes into AX.",
        ),
        Opcode::DivCx => (
            "Divide AX by CX, remainder in DX",
            Arithmetic, 1,
            "Divides AX by CX. The whole-number answer goes into AX and the leftover into DX.",
        ),
        Opcode::AndAxImm => (
            "Bitwise AND of AX with 0xFF",
            Logical, 2,
            "Keeps only the lowest 8 bits of AX.",
        ),
        Opcode::OrBxCx => (
            "Bitwise OR of BX with CX",
            Logical, 2,
            "Turns on every bit in BX that is on in either BX or CX.",
        ),
        Opcode::XorDxDx => (
            "Bitwise XOR of DX with itself",
            Logical, 2,
            "A quick way to set DX to zero.",
        ),
        Opcode::NotAx => (
            "Bitwise NOT of AX (16-bit)",
            Logical, 1,
            "Flips every one of the 16 bits in AX.",
        ),
        Opcode::Jmp => (
            "Unconditional jump to 0x100",
            Control, 1,
            "Always continues the program at address 0x100.",
        ),
        Opcode::Je => (
            "Jump to 0x200 if equal",
            Control, 1,
            "Jumps to 0x200 only if the last comparison found two equal values.",
        ),
        Opcode::Jne => (
            "Jump to 0x300 if not equal",
            Control, 1,
            "Jumps to 0x300 only if the last comparison found different values.",
        ),
        Opcode::PushAx => (
            "Push AX onto the stack",
            Data, 1,
            "Saves AX on top of the stack so it can be restored later.",
        ),
        Opcode::PopBx => (
            "Pop the top of the stack into BX",
            Data, 1,
            "Takes the value on top of the stack and puts it into BX.",
        ),
        Opcode::XchgAxBx => (
            "Exchange AX and BX",
            Data, 2,
            "Swaps the values in AX and BX.",
        ),
        Opcode::LoadAx => (
            "Load AX from memory address 100",
            Data, 2,
            "Reads the number stored at memory address 100 into AX.",
        ),
        Opcode::StoreBx => (
            "Store BX to memory address 200",
            Data, 2,
            "Writes the number in BX into memory address 200.",
        ),
        Opcode::CmpAxBx => (
            "Compare AX with BX",
            Arithmetic, 2,
            "Checks whether AX and BX are equal and remembers the answer in FLAGS.",
        ),
        Opcode::IncCx => (
            "Increment CX",
            Arithmetic, 1,
            "Adds one to CX.",
        ),
        Opcode::DecBx => (
            "Decrement BX",
            Arithmetic, 1,
            "Takes one away from BX.",
        ),
        Opcode::In => (
            "Read port 60h into AX",
            Io, 2,
            "Reads a value from an input device (port 60h) into AX.",
        ),
        Opcode::Out => (
            "Write AL to port 61h",
            Io, 2,
            "Sends the low byte of AX to an output device (port 61h).",
        ),
        Opcode::Call => (
            "Call subroutine at 0x400",
            Control, 1,
            "Saves where we are on the stack, then jumps to the subroutine at 0x400.",
        ),
        Opcode::Ret => (
            "Return from subroutine",
            Control, 0,
            "Goes back to the address saved by the last CALL.",
        ),
    }
}

fn builtin_entries() -> Vec<Instruction> {
    Opcode::ALL
        .into_iter()
        .zip(1u32..)
        .map(|(op, id)| {
            let (description, kind, operands, explanation) = metadata(op);
            Instruction::new(id, op.mnemonic(), description, kind, operands)
                .with_explanation(explanation)
        })
        .collect()
}
