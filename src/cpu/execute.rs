//! Instruction execution engine.
//!
//! [`execute_instruction`] narrates one instruction as an ordered list of
//! [`ExecutionStep`]s, one per phase of the classic cycle:
//!
//! ```text
//! fetch -> decode -> execute -> (memory) -> writeback
//! ```
//!
//! The engine is pure. It reads a snapshot of the registers and memory,
//! pre-computes every new value, and returns absolute overwrites inside the
//! steps. Applying them is the caller's job (see [`crate::cpu::processor`]).

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::{debug, trace};
use crate::cpu::decode::Opcode;
use crate::cpu::instruction::Instruction;
use crate::cpu::memory::Memory;
use crate::cpu::registers::{Register, RegisterState};

/// Immediate operand of `MOV AX, 42`.
pub const MOV_IMMEDIATE: i64 = 42;
/// Mask applied by `AND AX, 0xFF`.
pub const AND_MASK: i64 = 0xFF;
/// Width mask for `NOT AX`.
pub const WORD_MASK: i64 = 0xFFFF;
/// Source address of `MOV AX, [100]`.
pub const LOAD_ADDRESS: i64 = 100;
/// Destination address of `MOV [200], BX`.
pub const STORE_ADDRESS: i64 = 200;
/// Target of `JMP 0x100`.
pub const JMP_TARGET: i64 = 0x100;
/// Target of `JE 0x200`.
pub const JE_TARGET: i64 = 0x200;
/// Target of `JNE 0x300`.
pub const JNE_TARGET: i64 = 0x300;
/// Target of `CALL 0x400`.
pub const CALL_TARGET: i64 = 0x400;
/// Value delivered by the simulated input port.
pub const PORT_INPUT: i64 = 0x42;
/// Bytes moved by one stack push or pop.
pub const STACK_WORD: i64 = 2;

/// One phase of the execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Fetch,
    Decode,
    Execute,
    Memory,
    Writeback,
}

impl Phase {
    /// Lowercase phase name as shown to users.
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Decode => "decode",
            Phase::Execute => "execute",
            Phase::Memory => "memory",
            Phase::Writeback => "writeback",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Processor-level phase: every [`Phase`] plus the resting `Idle` state.
///
/// The engine never emits `Idle`; it is where a consumer sits before and
/// after applying a run of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    #[default]
    Idle,
    Fetch,
    Decode,
    Execute,
    Memory,
    Writeback,
}

impl From<Phase> for ExecutionPhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Fetch => ExecutionPhase::Fetch,
            Phase::Decode => ExecutionPhase::Decode,
            Phase::Execute => ExecutionPhase::Execute,
            Phase::Memory => ExecutionPhase::Memory,
            Phase::Writeback => ExecutionPhase::Writeback,
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionPhase::Idle => "idle",
            ExecutionPhase::Fetch => "fetch",
            ExecutionPhase::Decode => "decode",
            ExecutionPhase::Execute => "execute",
            ExecutionPhase::Memory => "memory",
            ExecutionPhase::Writeback => "writeback",
        };
        f.pad(name)
    }
}

/// One phase's narrated, pre-computed effect.
///
/// Changes are absolute values to assign, never deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub phase: Phase,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub register_changes: BTreeMap<Register, i64>,
    /// Keyed by address; string-encoded on the wire.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub memory_changes: BTreeMap<i64, i64>,
}

impl ExecutionStep {
    /// A step with no state changes.
    pub fn new(phase: Phase, description: impl Into<String>) -> Self {
        Self {
            phase,
            description: description.into(),
            register_changes: BTreeMap::new(),
            memory_changes: BTreeMap::new(),
        }
    }

    /// Add a register overwrite.
    pub fn with_register(mut self, reg: Register, value: i64) -> Self {
        self.register_changes.insert(reg, value);
        self
    }

    /// Add a memory overwrite.
    pub fn with_memory(mut self, addr: i64, value: i64) -> Self {
        self.memory_changes.insert(addr, value);
        self
    }

    /// Whether applying this step changes any state.
    pub fn is_narration_only(&self) -> bool {
        self.register_changes.is_empty() && self.memory_changes.is_empty()
    }
}

/// Produce the full step sequence for one instruction.
///
/// `registers` and `memory` are the state before the instruction runs; neither
/// is modified. Unknown mnemonics get a generic execute step. The result
/// always starts with `fetch`, then `decode` and `execute`, then `memory`
/// for the fixed memory-access set, and ends with `writeback`.
pub fn execute_instruction(
    instruction: &Instruction,
    registers: &RegisterState,
    memory: &Memory,
) -> Vec<ExecutionStep> {
    let opcode = instruction.opcode();
    let mut steps = Vec::with_capacity(5);

    // PC auto-increments on every fetch; jumps overwrite it later.
    steps.push(
        ExecutionStep::new(Phase::Fetch, "Fetching instruction from memory")
            .with_register(Register::PC, registers.get(Register::PC).wrapping_add(1)),
    );

    steps.push(ExecutionStep::new(
        Phase::Decode,
        format!("Decoding instruction: {}", instruction.mnemonic),
    ));

    match opcode {
        Some(op) => steps.push(execute(op, registers, memory)),
        None => {
            trace!(mnemonic = %instruction.mnemonic, "unknown mnemonic, generic execute");
            steps.push(ExecutionStep::new(Phase::Execute, "Executing instruction"));
        }
    }

    if opcode.is_some_and(Opcode::touches_memory) {
        steps.push(ExecutionStep::new(Phase::Memory, "Accessing memory"));
    }

    steps.push(ExecutionStep::new(
        Phase::Writeback,
        "Writing results back to registers",
    ));

    debug!(
        mnemonic = %instruction.mnemonic,
        opcode = ?opcode,
        steps = steps.len(),
        "instruction expanded"
    );

    steps
}

/// The execute-phase step for a decoded opcode.
fn execute(op: Opcode, regs: &RegisterState, mem: &Memory) -> ExecutionStep {
    use Register::*;

    let ax = regs.get(AX);
    let bx = regs.get(BX);
    let cx = regs.get(CX);
    let dx = regs.get(DX);
    let pc = regs.get(PC);
    let sp = regs.get(SP);
    let flags = regs.get(FLAGS);

    let step = |description: String| ExecutionStep::new(Phase::Execute, description);

    match op {
        // ==================== Data Transfer ====================

        Opcode::MovAxImm => step(format!("Moving {} into AX", MOV_IMMEDIATE))
            .with_register(AX, MOV_IMMEDIATE),

        Opcode::MovBxAx => step(format!("Copying AX ({}) into BX", ax))
            .with_register(BX, ax),

        Opcode::XchgAxBx => step(format!("Exchanging AX ({}) and BX ({})", ax, bx))
            .with_register(AX, bx)
            .with_register(BX, ax),

        Opcode::PushAx => {
            let new_sp = sp.wrapping_sub(STACK_WORD);
            step(format!("Pushing AX ({}) onto the stack at address {}", ax, new_sp))
                .with_register(SP, new_sp)
                .with_memory(new_sp, ax)
        }

        Opcode::PopBx => {
            let value = mem.read(sp);
            step(format!("Popping {} from stack address {} into BX", value, sp))
                .with_register(BX, value)
                .with_register(SP, sp.wrapping_add(STACK_WORD))
        }

        Opcode::LoadAx => {
            let value = mem.read(LOAD_ADDRESS);
            step(format!("Loading {} from memory address {} into AX", value, LOAD_ADDRESS))
                .with_register(AX, value)
        }

        Opcode::StoreBx => step(format!("Storing BX ({}) to memory address {}", bx, STORE_ADDRESS))
            .with_memory(STORE_ADDRESS, bx),

        // ==================== Arithmetic ====================

        Opcode::AddAxBx => {
            let result = ax.wrapping_add(bx);
            step(format!("Adding AX ({}) and BX ({}) = {}", ax, bx, result))
                .with_register(AX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::SubCxDx => {
            let result = cx.wrapping_sub(dx);
            step(format!("Subtracting DX ({}) from CX ({}) = {}", dx, cx, result))
                .with_register(CX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::MulBx => {
            let result = ax.wrapping_mul(bx);
            step(format!("Multiplying AX ({}) by BX ({}) = {}", ax, bx, result))
                .with_register(AX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::DivCx => {
            if cx == 0 {
                // Modeled condition, not a fault: flag it and carry on.
                return step("Error: Division by zero".to_string())
                    .with_register(FLAGS, 1);
            }
            let quotient = floor_div(ax, cx);
            let remainder = ax.wrapping_rem(cx);
            step(format!(
                "Dividing AX ({}) by CX ({}) = {} remainder {}",
                ax, cx, quotient, remainder
            ))
            .with_register(AX, quotient)
            .with_register(DX, remainder)
            .with_register(FLAGS, zero_flag(quotient))
        }

        Opcode::IncCx => {
            let result = cx.wrapping_add(1);
            step(format!("Incrementing CX: {} + 1 = {}", cx, result))
                .with_register(CX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::DecBx => {
            let result = bx.wrapping_sub(1);
            step(format!("Decrementing BX: {} - 1 = {}", bx, result))
                .with_register(BX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::CmpAxBx => {
            let verdict = if ax == bx { "equal" } else { "not equal" };
            step(format!("Comparing AX ({}) with BX ({}): {}", ax, bx, verdict))
                .with_register(FLAGS, i64::from(ax == bx))
        }

        // ==================== Logical ====================

        Opcode::AndAxImm => {
            let result = ax & AND_MASK;
            step(format!("AX ({}) AND 0xFF = {}", ax, result))
                .with_register(AX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::OrBxCx => {
            let result = bx | cx;
            step(format!("BX ({}) OR CX ({}) = {}", bx, cx, result))
                .with_register(BX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        Opcode::XorDxDx => step("DX XOR DX = 0, clearing DX".to_string())
            .with_register(DX, 0)
            .with_register(FLAGS, 1),

        Opcode::NotAx => {
            let result = !ax & WORD_MASK;
            step(format!("NOT AX ({}) = {}", ax, result))
                .with_register(AX, result)
                .with_register(FLAGS, zero_flag(result))
        }

        // ==================== Control Flow ====================

        Opcode::Jmp => step(format!("Jumping to address {:#x}", JMP_TARGET))
            .with_register(PC, JMP_TARGET),

        Opcode::Je => {
            if flags == 1 {
                step(format!("Equal (FLAGS = 1), jumping to address {:#x}", JE_TARGET))
                    .with_register(PC, JE_TARGET)
            } else {
                step("Not equal (FLAGS = 0), no jump".to_string())
            }
        }

        Opcode::Jne => {
            if flags == 0 {
                step(format!("Not equal (FLAGS = 0), jumping to address {:#x}", JNE_TARGET))
                    .with_register(PC, JNE_TARGET)
            } else {
                step(format!("Equal (FLAGS = {}), no jump", flags))
            }
        }

        Opcode::Call => {
            // Return address is the PC as it was before this instruction's fetch.
            let new_sp = sp.wrapping_sub(STACK_WORD);
            step(format!(
                "Calling subroutine at {:#x}, saving return address {} at stack address {}",
                CALL_TARGET, pc, new_sp
            ))
            .with_register(SP, new_sp)
            .with_memory(new_sp, pc)
            .with_register(PC, CALL_TARGET)
        }

        Opcode::Ret => {
            let target = mem.read(sp);
            step(format!("Returning to address {} from stack address {}", target, sp))
                .with_register(PC, target)
                .with_register(SP, sp.wrapping_add(STACK_WORD))
        }

        // ==================== I/O ====================

        Opcode::In => step(format!("Reading {:#x} from port 60h into AX", PORT_INPUT))
            .with_register(AX, PORT_INPUT),

        Opcode::Out => step("Writing AL to port 61h".to_string()),
    }
}

/// FLAGS value for a result: 1 when zero.
#[inline]
fn zero_flag(value: i64) -> i64 {
    i64::from(value == 0)
}

/// Division rounding toward negative infinity. `divisor` must be non-zero.
fn floor_div(dividend: i64, divisor: i64) -> i64 {
    let quotient = dividend.wrapping_div(divisor);
    if dividend.wrapping_rem(divisor) != 0 && ((dividend < 0) != (divisor < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::catalogue::Catalogue;
    use rstest::rstest;

    fn instr(mnemonic: &str) -> Instruction {
        Catalogue::builtin()
            .find(mnemonic)
            .cloned()
            .unwrap_or_else(|| Instruction::new(0, mnemonic, "", crate::InstructionType::Control, 0))
    }

    fn regs(values: &[(Register, i64)]) -> RegisterState {
        values.iter().fold(RegisterState::new(), |r, &(reg, v)| r.with(reg, v))
    }

    fn execute_step(mnemonic: &str, registers: &RegisterState, memory: &Memory) -> ExecutionStep {
        execute_instruction(&instr(mnemonic), registers, memory)
            .into_iter()
            .find(|s| s.phase == Phase::Execute)
            .unwrap()
    }

    #[rstest]
    #[case("MOV AX, 42", &[], &[(Register::AX, 42)])]
    #[case("MOV BX, AX", &[(Register::AX, 7)], &[(Register::BX, 7)])]
    #[case("ADD AX, BX", &[(Register::AX, 5), (Register::BX, 3)], &[(Register::AX, 8), (Register::FLAGS, 0)])]
    #[case("ADD AX, BX", &[(Register::AX, 5), (Register::BX, -5)], &[(Register::AX, 0), (Register::FLAGS, 1)])]
    #[case("SUB CX, DX", &[(Register::CX, 9), (Register::DX, 9)], &[(Register::CX, 0), (Register::FLAGS, 1)])]
    #[case("SUB CX, DX", &[(Register::CX, 2), (Register::DX, 5)], &[(Register::CX, -3), (Register::FLAGS, 0)])]
    #[case("MUL BX", &[(Register::AX, 6), (Register::BX, 7)], &[(Register::AX, 42), (Register::FLAGS, 0)])]
    #[case("DIV CX", &[(Register::AX, 10), (Register::CX, 3)], &[(Register::AX, 3), (Register::DX, 1), (Register::FLAGS, 0)])]
    #[case("DIV CX", &[(Register::AX, 2), (Register::CX, 5)], &[(Register::AX, 0), (Register::DX, 2), (Register::FLAGS, 1)])]
    #[case("DIV CX", &[(Register::AX, -7), (Register::CX, 2)], &[(Register::AX, -4), (Register::DX, -1), (Register::FLAGS, 0)])]
    #[case("DIV CX", &[(Register::AX, 10), (Register::CX, 0)], &[(Register::FLAGS, 1)])]
    #[case("AND AX, 0xFF", &[(Register::AX, 0x1234)], &[(Register::AX, 0x34), (Register::FLAGS, 0)])]
    #[case("AND AX, 0xFF", &[(Register::AX, 0x100)], &[(Register::AX, 0), (Register::FLAGS, 1)])]
    #[case("OR BX, CX", &[(Register::BX, 0b1010), (Register::CX, 0b0101)], &[(Register::BX, 0b1111), (Register::FLAGS, 0)])]
    #[case("XOR DX, DX", &[(Register::DX, 77)], &[(Register::DX, 0), (Register::FLAGS, 1)])]
    #[case("NOT AX", &[(Register::AX, 0)], &[(Register::AX, 0xFFFF), (Register::FLAGS, 0)])]
    #[case("NOT AX", &[(Register::AX, 0xFFFF)], &[(Register::AX, 0), (Register::FLAGS, 1)])]
    #[case("JMP 0x100", &[(Register::PC, 9)], &[(Register::PC, 0x100)])]
    #[case("JE 0x200", &[(Register::FLAGS, 1)], &[(Register::PC, 0x200)])]
    #[case("JE 0x200", &[(Register::FLAGS, 0)], &[])]
    #[case("JNE 0x300", &[(Register::FLAGS, 0)], &[(Register::PC, 0x300)])]
    #[case("JNE 0x300", &[(Register::FLAGS, 1)], &[])]
    #[case("XCHG AX, BX", &[(Register::AX, 1), (Register::BX, 2)], &[(Register::AX, 2), (Register::BX, 1)])]
    #[case("CMP AX, BX", &[(Register::AX, 4), (Register::BX, 4)], &[(Register::FLAGS, 1)])]
    #[case("CMP AX, BX", &[(Register::AX, 4), (Register::BX, 5)], &[(Register::FLAGS, 0)])]
    #[case("INC CX", &[(Register::CX, -1)], &[(Register::CX, 0), (Register::FLAGS, 1)])]
    #[case("DEC BX", &[(Register::BX, 10)], &[(Register::BX, 9), (Register::FLAGS, 0)])]
    #[case("IN AX, 60h", &[], &[(Register::AX, 0x42)])]
    #[case("OUT 61h, AL", &[(Register::AX, 5)], &[])]
    fn test_register_effects(
        #[case] mnemonic: &str,
        #[case] before: &[(Register, i64)],
        #[case] expected: &[(Register, i64)],
    ) {
        let step = execute_step(mnemonic, &regs(before), &Memory::new());
        let expected: BTreeMap<Register, i64> = expected.iter().copied().collect();

        assert_eq!(step.register_changes, expected, "{}", mnemonic);
        assert!(step.memory_changes.is_empty());
    }

    #[test]
    fn test_division_by_zero_is_flagged() {
        let step = execute_step("DIV CX", &regs(&[(Register::AX, 10)]), &Memory::new());

        assert!(step.description.contains("Division by zero"));
        assert!(!step.register_changes.contains_key(&Register::AX));
        assert!(!step.register_changes.contains_key(&Register::DX));
    }

    #[test]
    fn test_push_writes_below_stack_pointer() {
        let step = execute_step(
            "PUSH AX",
            &regs(&[(Register::AX, 99), (Register::SP, 10)]),
            &Memory::new(),
        );

        assert_eq!(step.register_changes, BTreeMap::from([(Register::SP, 8)]));
        assert_eq!(step.memory_changes, BTreeMap::from([(8, 99)]));
    }

    #[test]
    fn test_pop_reads_at_stack_pointer() {
        let mut mem = Memory::new();
        mem.write(8, 55).unwrap();
        let step = execute_step("POP BX", &regs(&[(Register::SP, 8)]), &mem);

        assert_eq!(
            step.register_changes,
            BTreeMap::from([(Register::BX, 55), (Register::SP, 10)])
        );
    }

    #[test]
    fn test_memory_load_and_store() {
        let mut mem = Memory::with_size(256);
        mem.write(100, 12).unwrap();

        let load = execute_step("MOV AX, [100]", &RegisterState::new(), &mem);
        assert_eq!(load.register_changes, BTreeMap::from([(Register::AX, 12)]));

        // Default memory has no cell 100: reads as zero.
        let load = execute_step("MOV AX, [100]", &RegisterState::new(), &Memory::new());
        assert_eq!(load.register_changes, BTreeMap::from([(Register::AX, 0)]));

        let store = execute_step("MOV [200], BX", &regs(&[(Register::BX, 3)]), &Memory::new());
        assert!(store.register_changes.is_empty());
        assert_eq!(store.memory_changes, BTreeMap::from([(200, 3)]));
    }

    #[test]
    fn test_call_saves_pre_fetch_pc() {
        let step = execute_step(
            "CALL 0x400",
            &regs(&[(Register::PC, 5), (Register::SP, 20)]),
            &Memory::new(),
        );

        assert_eq!(
            step.register_changes,
            BTreeMap::from([(Register::SP, 18), (Register::PC, 0x400)])
        );
        assert_eq!(step.memory_changes, BTreeMap::from([(18, 5)]));
    }

    #[test]
    fn test_ret_pops_pc() {
        let mut mem = Memory::new();
        mem.write(18, 5).unwrap();
        let step = execute_step("RET", &regs(&[(Register::SP, 18)]), &mem);

        assert_eq!(
            step.register_changes,
            BTreeMap::from([(Register::PC, 5), (Register::SP, 20)])
        );
    }

    #[test]
    fn test_extreme_values_do_not_panic() {
        let r = regs(&[
            (Register::AX, i64::MIN),
            (Register::BX, -1),
            (Register::CX, -1),
            (Register::DX, i64::MAX),
            (Register::PC, i64::MAX),
            (Register::SP, i64::MIN),
        ]);
        for entry in Catalogue::builtin() {
            let steps = execute_instruction(entry, &r, &Memory::new());
            assert_eq!(steps.first().unwrap().phase, Phase::Fetch);
        }
    }

    #[test]
    fn test_step_wire_shape() {
        let step = ExecutionStep::new(Phase::Execute, "push")
            .with_register(Register::SP, 8)
            .with_memory(8, 99);
        let json = serde_json::to_value(&step).unwrap();

        assert_eq!(json["phase"], "execute");
        assert_eq!(json["registerChanges"]["SP"], 8);
        assert_eq!(json["memoryChanges"]["8"], 99);

        let bare = serde_json::to_value(ExecutionStep::new(Phase::Decode, "d")).unwrap();
        assert!(bare.get("registerChanges").is_none());

        let parsed: ExecutionStep = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, step);
    }

    #[test]
    fn test_floor_div() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
        assert_eq!(floor_div(i64::MIN, -1), i64::MIN);
    }
}
