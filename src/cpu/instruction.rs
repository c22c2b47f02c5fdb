//! Catalogue instruction entries.

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::cpu::decode::Opcode;

/// Catalogue grouping for an instruction. Used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionType {
    Arithmetic,
    Logical,
    Data,
    Control,
    Io,
}

impl InstructionType {
    /// All groups in display order.
    pub const ALL: [InstructionType; 5] = [
        InstructionType::Arithmetic,
        InstructionType::Logical,
        InstructionType::Data,
        InstructionType::Control,
        InstructionType::Io,
    ];

    /// Human-readable group title.
    pub const fn title(self) -> &'static str {
        match self {
            InstructionType::Arithmetic => "Arithmetic",
            InstructionType::Logical => "Logical",
            InstructionType::Data => "Data Transfer",
            InstructionType::Control => "Control Flow",
            InstructionType::Io => "Input/Output",
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.title())
    }
}

/// An immutable catalogue entry.
///
/// The engine only ever looks at `mnemonic`. Everything else is display
/// metadata for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Unique id within the catalogue.
    pub id: u32,
    /// Exact dispatch key, e.g. `"ADD AX, BX"`.
    pub mnemonic: String,
    /// Short technical description.
    pub description: String,
    /// Catalogue group.
    #[serde(rename = "type")]
    pub kind: InstructionType,
    /// Operand count (not validated against the mnemonic).
    pub operands: u8,
    /// Optional plain-language explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beginner_explanation: Option<String>,
}

impl Instruction {
    /// Create an instruction without a beginner explanation.
    pub fn new(
        id: u32,
        mnemonic: impl Into<String>,
        description: impl Into<String>,
        kind: InstructionType,
        operands: u8,
    ) -> Self {
        Self {
            id,
            mnemonic: mnemonic.into(),
            description: description.into(),
            kind,
            operands,
            beginner_explanation: None,
        }
    }

    /// Attach a beginner explanation.
    pub fn with_explanation(mut self, text: impl Into<String>) -> Self {
        self.beginner_explanation = Some(text.into());
        self
    }

    /// Decode the mnemonic. `None` for anything outside the closed set.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_mnemonic(&self.mnemonic)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.mnemonic)
    }
}
