//! WebAssembly bindings for the simulator.
//!
//! The browser front end owns presentation: it picks instructions, animates
//! phases and controls playback. These bindings hand it the engine's steps
//! and the applied state as JSON.

use wasm_bindgen::prelude::*;
use crate::{Catalogue, Cpu, Instruction, Memory, RegisterState};
use crate::cpu::execute::execute_instruction;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// WebAssembly-friendly simulator wrapper.
#[wasm_bindgen]
pub struct WasmSimulator {
    cpu: Cpu,
}

#[wasm_bindgen]
impl WasmSimulator {
    /// Create a simulator with the default 64-cell memory.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self { cpu: Cpu::new() }
    }

    /// Queue a catalogue instruction by mnemonic. Returns the step count.
    #[wasm_bindgen]
    pub fn load(&mut self, mnemonic: &str) -> Result<usize, JsError> {
        let instr = Catalogue::builtin()
            .find(mnemonic)
            .ok_or_else(|| JsError::new(&format!("unknown instruction: {}", mnemonic)))?;
        Ok(self.cpu.load(instr))
    }

    /// Queue a catalogue instruction by id. Returns the step count.
    #[wasm_bindgen]
    pub fn load_id(&mut self, id: u32) -> Result<usize, JsError> {
        let instr = Catalogue::builtin()
            .get(id)
            .ok_or_else(|| JsError::new(&format!("unknown instruction id: {}", id)))?;
        Ok(self.cpu.load(instr))
    }

    /// Queue any instruction given as JSON, catalogue member or not.
    #[wasm_bindgen]
    pub fn load_json(&mut self, instruction: &str) -> Result<usize, JsError> {
        let instr: Instruction = serde_json::from_str(instruction).map_err(js_err)?;
        Ok(self.cpu.load(&instr))
    }

    /// Apply one step. Returns the step as JSON, or `undefined` when done.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<Option<String>, JsError> {
        match self.cpu.step().map_err(js_err)? {
            Some(step) => Ok(Some(serde_json::to_string(step).map_err(js_err)?)),
            None => Ok(None),
        }
    }

    /// Apply all remaining steps. Returns how many were applied.
    #[wasm_bindgen]
    pub fn run(&mut self) -> Result<usize, JsError> {
        self.cpu.run().map_err(js_err)
    }

    /// Undo the last step.
    #[wasm_bindgen]
    pub fn rewind(&mut self) -> bool {
        self.cpu.rewind()
    }

    /// Reset to zeroed registers and fresh memory.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Current phase name (`idle`, `fetch`, ...).
    #[wasm_bindgen]
    pub fn phase(&self) -> String {
        self.cpu.phase().to_string()
    }

    /// Index of the next step to apply.
    #[wasm_bindgen]
    pub fn cursor(&self) -> usize {
        self.cpu.cursor()
    }

    /// Instructions completed since the last reset.
    #[wasm_bindgen]
    pub fn completed(&self) -> u64 {
        self.cpu.completed
    }

    /// All steps of the loaded instruction as a JSON array.
    #[wasm_bindgen]
    pub fn steps_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.cpu.steps()).map_err(js_err)
    }

    /// Registers as a JSON object.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.cpu.registers()).map_err(js_err)
    }

    /// Memory as a JSON array.
    #[wasm_bindgen]
    pub fn memory_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.cpu.memory()).map_err(js_err)
    }
}

impl Default for WasmSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in catalogue as a JSON array.
#[wasm_bindgen]
pub fn catalogue_json() -> Result<String, JsError> {
    let entries: Vec<&Instruction> = Catalogue::builtin().iter().collect();
    serde_json::to_string(&entries).map_err(js_err)
}

/// Every catalogue mnemonic, in catalogue order.
#[wasm_bindgen]
pub fn mnemonics() -> js_sys::Array {
    Catalogue::builtin()
        .iter()
        .map(|instr| JsValue::from_str(&instr.mnemonic))
        .collect()
}

/// Run the pure engine: JSON instruction, registers and memory in, JSON
/// step array out. Inputs missing a required register are rejected.
#[wasm_bindgen]
pub fn execute_instruction_json(
    instruction: &str,
    registers: &str,
    memory: &str,
) -> Result<String, JsError> {
    let instr: Instruction = serde_json::from_str(instruction).map_err(js_err)?;
    let regs: RegisterState = serde_json::from_str(registers).map_err(js_err)?;
    let mem: Memory = serde_json::from_str(memory).map_err(js_err)?;

    let steps = execute_instruction(&instr, &regs, &mem);
    serde_json::to_string(&steps).map_err(js_err)
}
