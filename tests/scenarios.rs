//! End-to-end scenarios: engine output and the state after applying it.

use std::collections::BTreeMap;
use cyclesim::cpu::{apply_all, Opcode};
use cyclesim::{
    execute_instruction, Catalogue, ExecutionStep, Instruction, InstructionType, Memory, Phase,
    ProcessorState, Register, RegisterState,
};

fn catalogue(mnemonic: &str) -> &'static Instruction {
    Catalogue::builtin().find(mnemonic).unwrap()
}

fn registers(ax: i64, cx: i64, sp: i64, flags: i64) -> RegisterState {
    RegisterState::new()
        .with(Register::AX, ax)
        .with(Register::CX, cx)
        .with(Register::SP, sp)
        .with(Register::FLAGS, flags)
}

fn execute_step(steps: &[ExecutionStep]) -> &ExecutionStep {
    steps.iter().find(|s| s.phase == Phase::Execute).unwrap()
}

fn phases(steps: &[ExecutionStep]) -> Vec<Phase> {
    steps.iter().map(|s| s.phase).collect()
}

#[test]
fn scenario_a_mov_immediate() {
    let steps = execute_instruction(catalogue("MOV AX, 42"), &RegisterState::new(), &Memory::new());

    assert_eq!(
        execute_step(&steps).register_changes,
        BTreeMap::from([(Register::AX, 42)])
    );

    let start = ProcessorState::new();
    let end = apply_all(&start, &steps).unwrap();
    assert_eq!(end.registers.get(Register::AX), 42);
    assert_eq!(end.registers.get(Register::PC), 1);
}

#[test]
fn scenario_b_divide_by_zero() {
    let steps = execute_instruction(catalogue("DIV CX"), &registers(10, 0, 0, 0), &Memory::new());
    let step = execute_step(&steps);

    assert!(step.description.contains("Division by zero"));
    assert_eq!(step.register_changes, BTreeMap::from([(Register::FLAGS, 1)]));
}

#[test]
fn scenario_c_divide() {
    let steps = execute_instruction(catalogue("DIV CX"), &registers(10, 3, 0, 0), &Memory::new());

    assert_eq!(
        execute_step(&steps).register_changes,
        BTreeMap::from([(Register::AX, 3), (Register::DX, 1), (Register::FLAGS, 0)])
    );
}

#[test]
fn scenario_d_push() {
    let regs = registers(99, 0, 10, 0);
    let steps = execute_instruction(catalogue("PUSH AX"), &regs, &Memory::new());
    let step = execute_step(&steps);

    assert_eq!(step.register_changes, BTreeMap::from([(Register::SP, 8)]));
    assert_eq!(step.memory_changes, BTreeMap::from([(8, 99)]));
    assert_eq!(
        phases(&steps),
        vec![Phase::Fetch, Phase::Decode, Phase::Execute, Phase::Memory, Phase::Writeback]
    );

    let json = serde_json::to_value(step).unwrap();
    assert_eq!(json["memoryChanges"], serde_json::json!({ "8": 99 }));
}

#[test]
fn scenario_e_conditional_jump() {
    let instr = catalogue("JE 0x200");

    let not_taken = execute_instruction(instr, &registers(0, 0, 0, 0), &Memory::new());
    assert!(execute_step(&not_taken).register_changes.is_empty());

    let taken = execute_instruction(instr, &registers(0, 0, 0, 1), &Memory::new());
    assert_eq!(
        execute_step(&taken).register_changes,
        BTreeMap::from([(Register::PC, 0x200)])
    );
}

#[test]
fn scenario_f_unknown_mnemonic() {
    let nop = Instruction::new(99, "NOP", "No operation", InstructionType::Control, 0);
    let steps = execute_instruction(&nop, &RegisterState::new(), &Memory::new());

    assert_eq!(
        phases(&steps),
        vec![Phase::Fetch, Phase::Decode, Phase::Execute, Phase::Writeback]
    );
    assert_eq!(steps[2].description, "Executing instruction");
    assert!(steps[2].is_narration_only());
}

#[test]
fn fixed_step_texts() {
    let steps = execute_instruction(catalogue("ADD AX, BX"), &RegisterState::new(), &Memory::new());

    assert_eq!(steps[0].description, "Fetching instruction from memory");
    assert_eq!(steps[1].description, "Decoding instruction: ADD AX, BX");
    assert!(steps[1].is_narration_only());
    assert_eq!(steps.last().unwrap().description, "Writing results back to registers");
    assert!(steps.last().unwrap().is_narration_only());

    let jmp = execute_instruction(catalogue("JMP 0x100"), &RegisterState::new(), &Memory::new());
    assert_eq!(jmp[3].description, "Accessing memory");
    assert!(jmp[3].is_narration_only());
}

#[test]
fn extra_registers_survive_application() {
    let mut start = ProcessorState::new();
    start.registers.set_named("IR", 7);

    let steps = execute_instruction(catalogue("INC CX"), &start.registers, &start.memory);
    let end = apply_all(&start, &steps).unwrap();

    assert_eq!(end.registers.get_named("IR"), Some(7));
    assert_eq!(end.registers.get(Register::CX), 1);
}

#[test]
fn engine_accepts_json_inputs() {
    let registers = r#"{"AX":10,"BX":0,"CX":3,"DX":0,"PC":0,"SP":0,"FLAGS":0}"#;
    let instruction = r#"{"id":6,"mnemonic":"DIV CX","description":"Divide","type":"arithmetic","operands":1}"#;

    let regs: RegisterState = serde_json::from_str(registers).unwrap();
    let instr: Instruction = serde_json::from_str(instruction).unwrap();
    let mem: Memory = serde_json::from_str(&serde_json::to_string(&vec![0; 64]).unwrap()).unwrap();

    assert_eq!(instr.opcode(), Some(Opcode::DivCx));
    let steps = execute_instruction(&instr, &regs, &mem);
    let json = serde_json::to_value(&steps).unwrap();

    assert_eq!(json[0]["registerChanges"]["PC"], 1);
    assert_eq!(json[2]["registerChanges"]["AX"], 3);
    assert_eq!(json[2]["registerChanges"]["DX"], 1);
}

#[test]
fn state_missing_register_is_rejected() {
    let registers = r#"{"AX":10,"BX":0,"CX":3,"DX":0,"PC":0,"SP":0}"#;
    assert!(serde_json::from_str::<RegisterState>(registers).is_err());
}
