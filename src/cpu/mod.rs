//! The simulated processor.
//!
//! This module implements the whole machine model:
//! - A register file: AX, BX, CX, DX, PC, SP and a one-bit FLAGS
//! - 64 cells of flat integer memory
//! - A closed catalogue of 25 string-keyed instructions
//! - The execution engine that narrates each instruction phase by phase
//! - A reducer and driver that apply the narrated steps in order

pub mod registers;
pub mod memory;
pub mod instruction;
pub mod decode;
pub mod catalogue;
pub mod execute;
pub mod processor;

pub use registers::{Register, RegisterState, StateError};
pub use memory::{Memory, MemoryError, DEFAULT_MEMORY_SIZE, MAX_MEMORY_CELLS};
pub use instruction::{Instruction, InstructionType};
pub use decode::Opcode;
pub use catalogue::{Catalogue, CatalogueError};
pub use execute::{execute_instruction, ExecutionPhase, ExecutionStep, Phase};
pub use processor::{apply_all, apply_step, Cpu, CpuError, ProcessorState};
