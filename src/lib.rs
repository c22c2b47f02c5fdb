//! # Cycle Simulator
//!
//! An educational simulator of a simplified single-core processor.
//!
//! Pick an instruction from the fixed catalogue and the engine narrates how
//! it moves through the classic five-phase cycle (fetch, decode, execute,
//! memory, writeback), together with the register and memory values each
//! phase writes. Front ends (terminal stepper, browser bindings) replay those
//! steps one at a time.

pub mod cpu;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{
    execute_instruction, apply_step, Catalogue, Cpu, CpuError, ExecutionPhase, ExecutionStep,
    Instruction, InstructionType, Memory, Opcode, Phase, ProcessorState, Register, RegisterState,
};
pub use config::{SimConfig, ConfigError};

#[cfg(feature = "tui")]
pub use tui::run_stepper;
