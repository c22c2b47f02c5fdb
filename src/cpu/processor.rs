//! Applying execution steps.
//!
//! [`apply_step`] is a pure reducer: `state x step -> state'`. [`Cpu`] is a
//! sequential driver built on it that applies one step at a time, in order,
//! and can rewind. Timers, speed control and animation live in whatever
//! drives the `Cpu` (the TUI, the WASM bindings or a test).

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{trace, warn};
use crate::cpu::execute::{execute_instruction, ExecutionPhase, ExecutionStep};
use crate::cpu::instruction::Instruction;
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{RegisterState, StateError};

/// Everything a step can change, plus the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessorState {
    pub registers: RegisterState,
    pub memory: Memory,
    pub phase: ExecutionPhase,
}

impl ProcessorState {
    /// Zeroed registers, default memory, idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed registers and `memory_size` zeroed cells.
    pub fn with_memory_size(memory_size: usize) -> Self {
        Self {
            memory: Memory::with_size(memory_size),
            ..Self::default()
        }
    }
}

/// Apply one step to a state, returning the new state.
///
/// Register and memory changes are absolute overwrites. The input state is
/// left untouched.
pub fn apply_step(state: &ProcessorState, step: &ExecutionStep) -> Result<ProcessorState, CpuError> {
    let mut next = state.clone();

    for (&reg, &value) in &step.register_changes {
        next.registers.set(reg, value);
    }
    for (&addr, &value) in &step.memory_changes {
        next.memory.write(addr, value).map_err(|e| {
            warn!(addr, phase = %step.phase, "memory write rejected");
            CpuError::from(e)
        })?;
    }
    next.phase = step.phase.into();

    Ok(next)
}

/// Apply a whole step sequence in order. The final phase is idle.
pub fn apply_all(state: &ProcessorState, steps: &[ExecutionStep]) -> Result<ProcessorState, CpuError> {
    let mut current = state.clone();
    for step in steps {
        current = apply_step(&current, step)?;
    }
    current.phase = ExecutionPhase::Idle;
    Ok(current)
}

/// Sequential step driver.
///
/// `load` expands an instruction into steps against the current state;
/// `step` applies them one at a time.
#[derive(Debug, Clone)]
pub struct Cpu {
    state: ProcessorState,
    /// Instruction whose steps are queued.
    current: Option<Instruction>,
    /// Steps for `current`.
    steps: Vec<ExecutionStep>,
    /// Index of the next step to apply.
    cursor: usize,
    /// State before each applied step, for rewinding.
    history: Vec<ProcessorState>,
    /// Instructions completed since the last reset.
    pub completed: u64,
    memory_size: usize,
}

impl Cpu {
    /// Create a CPU with default memory.
    pub fn new() -> Self {
        Self::with_state(ProcessorState::new())
    }

    /// Create a CPU with `memory_size` memory cells.
    pub fn with_memory_size(memory_size: usize) -> Self {
        Self::with_state(ProcessorState::with_memory_size(memory_size))
    }

    /// Create a CPU starting from an explicit state.
    pub fn with_state(state: ProcessorState) -> Self {
        let memory_size = state.memory.len();
        Self {
            state,
            current: None,
            steps: Vec::new(),
            cursor: 0,
            history: Vec::new(),
            completed: 0,
            memory_size,
        }
    }

    /// Reset to zeroed registers, fresh memory and an empty queue.
    pub fn reset(&mut self) {
        *self = Self::with_memory_size(self.memory_size);
    }

    /// Queue the steps for `instruction`, computed against the current state.
    ///
    /// Replaces any unfinished steps. Returns the number of steps queued.
    pub fn load(&mut self, instruction: &Instruction) -> usize {
        self.steps = execute_instruction(instruction, &self.state.registers, &self.state.memory);
        self.current = Some(instruction.clone());
        self.cursor = 0;
        self.history.clear();
        self.state.phase = ExecutionPhase::Idle;
        self.steps.len()
    }

    /// Apply the next queued step.
    ///
    /// Returns `Ok(None)` once the queue is exhausted, at which point the
    /// phase is back to idle.
    pub fn step(&mut self) -> Result<Option<&ExecutionStep>, CpuError> {
        if self.current.is_none() {
            return Err(CpuError::NoInstruction);
        }
        let Some(step) = self.steps.get(self.cursor) else {
            self.state.phase = ExecutionPhase::Idle;
            return Ok(None);
        };

        let next = apply_step(&self.state, step)?;
        trace!(phase = %step.phase, cursor = self.cursor, "step applied");

        self.history.push(std::mem::replace(&mut self.state, next));
        self.cursor += 1;
        if self.cursor == self.steps.len() {
            self.completed += 1;
        }

        Ok(self.steps.get(self.cursor - 1))
    }

    /// Apply all remaining steps and return to idle.
    ///
    /// Returns the number of steps applied.
    pub fn run(&mut self) -> Result<usize, CpuError> {
        let start = self.cursor;
        while self.step()?.is_some() {}
        Ok(self.cursor - start)
    }

    /// Load and fully apply one instruction, returning its steps.
    pub fn execute(&mut self, instruction: &Instruction) -> Result<Vec<ExecutionStep>, CpuError> {
        self.load(instruction);
        self.run()?;
        Ok(self.steps.clone())
    }

    /// Undo the last applied step. Returns `false` if there is nothing to undo.
    pub fn rewind(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                if self.cursor == self.steps.len() {
                    self.completed = self.completed.saturating_sub(1);
                }
                self.state = previous;
                self.cursor -= 1;
                true
            }
            None => false,
        }
    }

    /// Current processor state.
    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    /// Current registers.
    pub fn registers(&self) -> &RegisterState {
        &self.state.registers
    }

    /// Current memory.
    pub fn memory(&self) -> &Memory {
        &self.state.memory
    }

    /// Current phase.
    pub fn phase(&self) -> ExecutionPhase {
        self.state.phase
    }

    /// The loaded instruction, if any.
    pub fn instruction(&self) -> Option<&Instruction> {
        self.current.as_ref()
    }

    /// All steps for the loaded instruction.
    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// Index of the next step to apply.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The most recently applied step.
    pub fn last_step(&self) -> Option<&ExecutionStep> {
        self.cursor.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Check if queued steps remain.
    pub fn has_pending(&self) -> bool {
        self.current.is_some() && self.cursor < self.steps.len()
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while applying steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("no instruction loaded")]
    NoInstruction,

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("invalid state: {0}")]
    State(#[from] StateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::catalogue::Catalogue;
    use crate::cpu::registers::Register;
    use crate::cpu::execute::Phase;

    fn instr(mnemonic: &str) -> &'static Instruction {
        Catalogue::builtin().find(mnemonic).unwrap()
    }

    #[test]
    fn test_apply_step_overwrites() {
        let state = ProcessorState::new();
        let step = ExecutionStep::new(Phase::Execute, "x")
            .with_register(Register::AX, 5)
            .with_memory(3, 9);

        let next = apply_step(&state, &step).unwrap();

        assert_eq!(next.registers.get(Register::AX), 5);
        assert_eq!(next.memory.read(3), 9);
        assert_eq!(next.phase, ExecutionPhase::Execute);
        // Input untouched
        assert_eq!(state, ProcessorState::new());
    }

    #[test]
    fn test_apply_step_rejects_negative_address() {
        let step = ExecutionStep::new(Phase::Execute, "x").with_memory(-2, 1);
        assert_eq!(
            apply_step(&ProcessorState::new(), &step),
            Err(CpuError::Memory(MemoryError::AddressOutOfRange(-2)))
        );
    }

    #[test]
    fn test_step_by_step() {
        let mut cpu = Cpu::new();
        assert_eq!(cpu.step().unwrap_err(), CpuError::NoInstruction);

        assert_eq!(cpu.load(instr("MOV AX, 42")), 4);
        assert_eq!(cpu.phase(), ExecutionPhase::Idle);

        assert_eq!(cpu.step().unwrap().unwrap().phase, Phase::Fetch);
        assert_eq!(cpu.registers().get(Register::PC), 1);
        assert_eq!(cpu.phase(), ExecutionPhase::Fetch);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers().get(Register::AX), 42);

        assert_eq!(cpu.step().unwrap().unwrap().phase, Phase::Writeback);
        assert!(cpu.step().unwrap().is_none());
        assert_eq!(cpu.phase(), ExecutionPhase::Idle);
        assert_eq!(cpu.completed, 1);
    }

    #[test]
    fn test_jump_supersedes_fetch_increment() {
        let mut cpu = Cpu::new();
        cpu.execute(instr("JMP 0x100")).unwrap();
        assert_eq!(cpu.registers().get(Register::PC), 0x100);
    }

    #[test]
    fn test_call_then_ret() {
        let mut cpu = Cpu::new();
        cpu.execute(instr("MOV AX, 42")).unwrap();
        cpu.execute(instr("MOV BX, AX")).unwrap();

        // PUSH/CALL need room below SP.
        let mut state = cpu.state().clone();
        state.registers.set(Register::SP, 40);
        let mut cpu = Cpu::with_state(state);

        cpu.execute(instr("CALL 0x400")).unwrap();
        assert_eq!(cpu.registers().get(Register::PC), 0x400);
        assert_eq!(cpu.registers().get(Register::SP), 38);
        assert_eq!(cpu.memory().read(38), 2);

        cpu.execute(instr("RET")).unwrap();
        assert_eq!(cpu.registers().get(Register::PC), 2);
        assert_eq!(cpu.registers().get(Register::SP), 40);
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let mut state = ProcessorState::new();
        state.registers.set(Register::SP, 10);
        state.registers.set(Register::AX, 99);
        let mut cpu = Cpu::with_state(state);

        cpu.execute(instr("PUSH AX")).unwrap();
        cpu.execute(instr("POP BX")).unwrap();

        assert_eq!(cpu.registers().get(Register::BX), 99);
        assert_eq!(cpu.registers().get(Register::SP), 10);
    }

    #[test]
    fn test_store_grows_memory() {
        let mut cpu = Cpu::new();
        cpu.execute(instr("IN AX, 60h")).unwrap();
        cpu.execute(instr("MOV BX, AX")).unwrap();
        cpu.execute(instr("MOV [200], BX")).unwrap();

        assert_eq!(cpu.memory().read(200), 0x42);
        assert_eq!(cpu.memory().len(), 201);
    }

    #[test]
    fn test_push_at_zero_sp_faults_on_apply() {
        let mut cpu = Cpu::new();
        cpu.load(instr("PUSH AX"));
        cpu.step().unwrap(); // fetch
        cpu.step().unwrap(); // decode
        assert_eq!(
            cpu.step().unwrap_err(),
            CpuError::Memory(MemoryError::AddressOutOfRange(-2))
        );
        // Nothing was applied by the failed step
        assert_eq!(cpu.registers().get(Register::SP), 0);
    }

    #[test]
    fn test_rewind() {
        let mut cpu = Cpu::new();
        assert!(!cpu.rewind());

        cpu.execute(instr("MOV AX, 42")).unwrap();
        assert_eq!(cpu.completed, 1);

        assert!(cpu.rewind()); // writeback
        assert_eq!(cpu.completed, 0);
        assert!(cpu.rewind()); // execute
        assert_eq!(cpu.registers().get(Register::AX), 0);
        assert_eq!(cpu.phase(), ExecutionPhase::Decode);
        assert_eq!(cpu.cursor(), 2);

        cpu.run().unwrap();
        assert_eq!(cpu.registers().get(Register::AX), 42);
        assert_eq!(cpu.completed, 1);
    }

    #[test]
    fn test_reset_keeps_memory_size() {
        let mut cpu = Cpu::with_memory_size(128);
        cpu.execute(instr("MOV AX, 42")).unwrap();
        cpu.reset();

        assert_eq!(cpu.registers(), &RegisterState::new());
        assert_eq!(cpu.memory().len(), 128);
        assert!(cpu.instruction().is_none());
        assert_eq!(cpu.completed, 0);
    }

    #[test]
    fn test_apply_all_ends_idle() {
        let state = ProcessorState::new();
        let steps = execute_instruction(instr("INC CX"), &state.registers, &state.memory);
        let done = apply_all(&state, &steps).unwrap();

        assert_eq!(done.registers.get(Register::CX), 1);
        assert_eq!(done.registers.get(Register::PC), 1);
        assert_eq!(done.phase, ExecutionPhase::Idle);
    }
}
