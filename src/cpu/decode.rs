//! Mnemonic decoder.
//!
//! The simulated machine has no binary encoding. Each catalogue mnemonic is an
//! opaque, fully formatted literal (`"ADD AX, BX"`) naming one fixed operand
//! combination, and decoding is an exact, case-sensitive string match against
//! that closed set.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A decoded catalogue operation.
///
/// Grouped the same way as the catalogue:
/// - Data transfer: MOV, XCHG, PUSH, POP
/// - Arithmetic: ADD, SUB, MUL, DIV, INC, DEC, CMP
/// - Logical: AND, OR, XOR, NOT
/// - Control: JMP, JE, JNE, CALL, RET
/// - I/O: IN, OUT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ==================== Data Transfer ====================

    /// `MOV AX, 42`: AX := 42
    MovAxImm,
    /// `MOV BX, AX`: BX := AX
    MovBxAx,
    /// `XCHG AX, BX`: swap AX and BX
    XchgAxBx,
    /// `PUSH AX`: SP := SP - 2, [SP] := AX
    PushAx,
    /// `POP BX`: BX := [SP], SP := SP + 2
    PopBx,
    /// `MOV AX, [100]`: AX := [100]
    LoadAx,
    /// `MOV [200], BX`: [200] := BX
    StoreBx,

    // ==================== Arithmetic ====================

    /// `ADD AX, BX`: AX := AX + BX
    AddAxBx,
    /// `SUB CX, DX`: CX := CX - DX
    SubCxDx,
    /// `MUL BX`: AX := AX * BX
    MulBx,
    /// `DIV CX`: AX := AX / CX, DX := AX mod CX
    DivCx,
    /// `INC CX`: CX := CX + 1
    IncCx,
    /// `DEC BX`: BX := BX - 1
    DecBx,
    /// `CMP AX, BX`: FLAGS := AX == BX
    CmpAxBx,

    // ==================== Logical ====================

    /// `AND AX, 0xFF`: AX := AX & 0xFF
    AndAxImm,
    /// `OR BX, CX`: BX := BX | CX
    OrBxCx,
    /// `XOR DX, DX`: DX := 0
    XorDxDx,
    /// `NOT AX`: AX := !AX (16-bit)
    NotAx,

    // ==================== Control Flow ====================

    /// `JMP 0x100`: PC := 0x100
    Jmp,
    /// `JE 0x200`: if FLAGS = 1 then PC := 0x200
    Je,
    /// `JNE 0x300`: if FLAGS = 0 then PC := 0x300
    Jne,
    /// `CALL 0x400`: push PC, PC := 0x400
    Call,
    /// `RET`: pop PC
    Ret,

    // ==================== I/O ====================

    /// `IN AX, 60h`: AX := simulated port input
    In,
    /// `OUT 61h, AL`: no modeled side effect
    Out,
}

impl Opcode {
    /// Every opcode, in catalogue order.
    pub const ALL: [Opcode; 25] = [
        Opcode::MovAxImm,
        Opcode::MovBxAx,
        Opcode::AddAxBx,
        Opcode::SubCxDx,
        Opcode::MulBx,
        Opcode::DivCx,
        Opcode::AndAxImm,
        Opcode::OrBxCx,
        Opcode::XorDxDx,
        Opcode::NotAx,
        Opcode::Jmp,
        Opcode::Je,
        Opcode::Jne,
        Opcode::PushAx,
        Opcode::PopBx,
        Opcode::XchgAxBx,
        Opcode::LoadAx,
        Opcode::StoreBx,
        Opcode::CmpAxBx,
        Opcode::IncCx,
        Opcode::DecBx,
        Opcode::In,
        Opcode::Out,
        Opcode::Call,
        Opcode::Ret,
    ];

    /// The exact mnemonic literal this opcode is dispatched on.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::MovAxImm => "MOV AX, 42",
            Opcode::MovBxAx => "MOV BX, AX",
            Opcode::XchgAxBx => "XCHG AX, BX",
            Opcode::PushAx => "PUSH AX",
            Opcode::PopBx => "POP BX",
            Opcode::LoadAx => "MOV AX, [100]",
            Opcode::StoreBx => "MOV [200], BX",
            Opcode::AddAxBx => "ADD AX, BX",
            Opcode::SubCxDx => "SUB CX, DX",
            Opcode::MulBx => "MUL BX",
            Opcode::DivCx => "DIV CX",
            Opcode::IncCx => "INC CX",
            Opcode::DecBx => "DEC BX",
            Opcode::CmpAxBx => "CMP AX, BX",
            Opcode::AndAxImm => "AND AX, 0xFF",
            Opcode::OrBxCx => "OR BX, CX",
            Opcode::XorDxDx => "XOR DX, DX",
            Opcode::NotAx => "NOT AX",
            Opcode::Jmp => "JMP 0x100",
            Opcode::Je => "JE 0x200",
            Opcode::Jne => "JNE 0x300",
            Opcode::Call => "CALL 0x400",
            Opcode::Ret => "RET",
            Opcode::In => "IN AX, 60h",
            Opcode::Out => "OUT 61h, AL",
        }
    }

    /// Decode a mnemonic by exact match. Unknown mnemonics yield `None`.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let op = match mnemonic {
            "MOV AX, 42" => Opcode::MovAxImm,
            "MOV BX, AX" => Opcode::MovBxAx,
            "XCHG AX, BX" => Opcode::XchgAxBx,
            "PUSH AX" => Opcode::PushAx,
            "POP BX" => Opcode::PopBx,
            "MOV AX, [100]" => Opcode::LoadAx,
            "MOV [200], BX" => Opcode::StoreBx,
            "ADD AX, BX" => Opcode::AddAxBx,
            "SUB CX, DX" => Opcode::SubCxDx,
            "MUL BX" => Opcode::MulBx,
            "DIV CX" => Opcode::DivCx,
            "INC CX" => Opcode::IncCx,
            "DEC BX" => Opcode::DecBx,
            "CMP AX, BX" => Opcode::CmpAxBx,
            "AND AX, 0xFF" => Opcode::AndAxImm,
            "OR BX, CX" => Opcode::OrBxCx,
            "XOR DX, DX" => Opcode::XorDxDx,
            "NOT AX" => Opcode::NotAx,
            "JMP 0x100" => Opcode::Jmp,
            "JE 0x200" => Opcode::Je,
            "JNE 0x300" => Opcode::Jne,
            "CALL 0x400" => Opcode::Call,
            "RET" => Opcode::Ret,
            "IN AX, 60h" => Opcode::In,
            "OUT 61h, AL" => Opcode::Out,
            _ => return None,
        };
        Some(op)
    }

    /// Whether this opcode is followed by a `memory` phase.
    ///
    /// This is a fixed membership list, not a property of the operands:
    /// `JMP 0x100` is in it, `CMP AX, BX` and `XCHG AX, BX` are not.
    pub const fn touches_memory(self) -> bool {
        matches!(
            self,
            Opcode::PushAx
                | Opcode::PopBx
                | Opcode::Jmp
                | Opcode::LoadAx
                | Opcode::StoreBx
                | Opcode::Call
                | Opcode::Ret
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}
