//! Cycle Simulator - CLI Entry Point
//!
//! Commands:
//! - `cycle-sim list` - Show the instruction catalogue
//! - `cycle-sim run <mnemonic>` - Narrate one instruction phase by phase
//! - `cycle-sim debug [mnemonic]` - Interactive terminal stepper
//! - `cycle-sim test` - Built-in self-test

use clap::{Parser, Subcommand, Args};
use cyclesim::{Catalogue, Cpu, Instruction, ProcessorState, Register, SimConfig};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cycle-sim")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "Step through the fetch-decode-execute cycle of a simplified processor")]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<String>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the instruction catalogue grouped by type
    List,
    /// Execute one instruction and show every step
    Run {
        /// Exact mnemonic, e.g. "ADD AX, BX"
        mnemonic: String,
        #[command(flatten)]
        regs: RegisterArgs,
        /// JSON file with the initial {"registers": {...}, "memory": [...]}
        #[arg(long)]
        state: Option<String>,
        /// Print the step list as JSON instead of a trace
        #[arg(long)]
        json: bool,
    },
    /// Interactive terminal stepper
    Debug {
        /// Instruction to load at start
        mnemonic: Option<String>,
    },
    /// Run the built-in self-test
    Test,
}

/// Initial register overrides.
#[derive(Args)]
struct RegisterArgs {
    #[arg(long, allow_hyphen_values = true)]
    ax: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    bx: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    cx: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    dx: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    pc: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    sp: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    flags: Option<i64>,
}

impl RegisterArgs {
    fn apply(&self, state: &mut ProcessorState) {
        let overrides = [
            (Register::AX, self.ax),
            (Register::BX, self.bx),
            (Register::CX, self.cx),
            (Register::DX, self.dx),
            (Register::PC, self.pc),
            (Register::SP, self.sp),
            (Register::FLAGS, self.flags),
        ];
        for (reg, value) in overrides {
            if let Some(value) = value {
                state.registers.set(reg, value);
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    let tui = matches!(cli.command, Some(Commands::Debug { .. }));
    init_tracing(&config, cli.verbose, tui);
    debug!(?config, "configuration loaded");

    match cli.command {
        Some(Commands::List) => list_catalogue(),
        Some(Commands::Run { mnemonic, regs, state, json }) => {
            run_instruction(&config, &mnemonic, &regs, state.as_deref(), json);
        }
        Some(Commands::Debug { mnemonic }) => debug_stepper(config, mnemonic.as_deref()),
        Some(Commands::Test) => run_self_test(),
        None => {
            println!("Cycle Simulator v0.1.0");
            println!("Watch a simplified processor fetch, decode and execute instructions");
            println!();
            println!("Use --help for available commands");
            println!();
            list_catalogue();
        }
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins, then `--verbose`, then the config filter. While the TUI
/// owns the terminal, logs go to a file instead of stderr.
fn init_tracing(config: &SimConfig, verbose: bool, tui: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if tui {
        match std::fs::File::create("cycle-sim.log") {
            Ok(log_file) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .init(),
            Err(e) => eprintln!("⚠️  Logging disabled, cannot create cycle-sim.log: {}", e),
        }
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn find_instruction(mnemonic: &str) -> &'static Instruction {
    match Catalogue::builtin().find(mnemonic) {
        Some(instr) => instr,
        None => {
            eprintln!("❌ Unknown instruction: {:?}", mnemonic);
            eprintln!("   Run `cycle-sim list` to see the catalogue");
            std::process::exit(1);
        }
    }
}

fn list_catalogue() {
    println!("━━━ Instruction Catalogue ━━━");
    for (kind, entries) in Catalogue::builtin().by_type() {
        println!();
        println!("{}:", kind);
        for instr in entries {
            println!("  {:>2}  {:<14} {}", instr.id, instr.mnemonic, instr.description);
        }
    }
}

fn load_state(path: &str, memory_size: usize) -> ProcessorState {
    #[derive(serde::Deserialize)]
    struct StateFile {
        registers: Option<cyclesim::RegisterState>,
        memory: Option<cyclesim::Memory>,
    }

    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read state file: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::from_str::<StateFile>(&text) {
        Ok(file) => ProcessorState {
            registers: file.registers.unwrap_or_default(),
            memory: file.memory.unwrap_or_else(|| cyclesim::Memory::with_size(memory_size)),
            ..ProcessorState::default()
        },
        Err(e) => {
            eprintln!("❌ Invalid state file: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_instruction(config: &SimConfig, mnemonic: &str, regs: &RegisterArgs, state: Option<&str>, json: bool) {
    let instr = find_instruction(mnemonic);

    let mut initial = match state {
        Some(path) => load_state(path, config.memory_size),
        None => ProcessorState::with_memory_size(config.memory_size),
    };
    regs.apply(&mut initial);

    let mut cpu = Cpu::with_state(initial);
    cpu.load(instr);

    if json {
        match serde_json::to_string_pretty(cpu.steps()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to encode steps: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!("🔧 Executing: {} ({})", instr.mnemonic, instr.description);
    if let Some(explanation) = &instr.beginner_explanation {
        println!("   {}", explanation);
    }
    println!();
    println!("━━━ Steps ━━━");

    loop {
        match cpu.step() {
            Ok(Some(step)) => {
                println!("{:<9}  {}", step.phase, step.description);
                for (reg, value) in &step.register_changes {
                    println!("           {} ← {}", reg, value);
                }
                for (addr, value) in &step.memory_changes {
                    println!("           [{}] ← {}", addr, value);
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!(%e, "step failed");
                eprintln!("❌ Step failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("━━━ Result ━━━");
    for (reg, value) in cpu.registers().iter() {
        println!("{:<5} = {}", reg.name(), value);
    }
    let touched: Vec<String> = cpu
        .memory()
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, value)| **value != 0)
        .map(|(addr, value)| format!("[{}]={}", addr, value))
        .collect();
    if !touched.is_empty() {
        println!("Memory: {}", touched.join(" "));
    }
}

#[cfg(feature = "tui")]
fn debug_stepper(config: SimConfig, mnemonic: Option<&str>) {
    let initial = mnemonic.map(find_instruction);

    println!("🚀 Launching stepper...");

    if let Err(e) = cyclesim::run_stepper(config, initial) {
        eprintln!("❌ Stepper error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_stepper(_config: SimConfig, _mnemonic: Option<&str>) {
    eprintln!("❌ This build has no terminal stepper (enable the `tui` feature)");
    std::process::exit(1);
}

fn run_self_test() {
    use cyclesim::{ExecutionStep, Phase, RegisterState, Memory, execute_instruction};

    println!("━━━ Cycle Simulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    let zeros = Memory::new();
    let execute_of = |steps: &[ExecutionStep]| -> Option<ExecutionStep> {
        steps.iter().find(|s| s.phase == Phase::Execute).cloned()
    };

    // Test 1: shape invariant over the whole catalogue
    let shape_ok = Catalogue::builtin().iter().all(|instr| {
        let steps = execute_instruction(instr, &RegisterState::new(), &zeros);
        let has_memory = steps.iter().any(|s| s.phase == Phase::Memory);
        steps.first().map(|s| s.phase) == Some(Phase::Fetch)
            && steps.last().map(|s| s.phase) == Some(Phase::Writeback)
            && has_memory == instr.opcode().is_some_and(|op| op.touches_memory())
    });
    check("Step sequence shape", shape_ok);

    // Test 2: MOV AX, 42 applied end to end
    let mut cpu = Cpu::new();
    let ok = cpu.execute(find_instruction("MOV AX, 42")).is_ok()
        && cpu.registers().get(Register::AX) == 42
        && cpu.registers().get(Register::PC) == 1;
    check("MOV AX, 42", ok);

    // Test 3: division by zero is flagged, not raised
    let regs = RegisterState::new().with(Register::AX, 10);
    let steps = execute_instruction(find_instruction("DIV CX"), &regs, &zeros);
    let ok = execute_of(&steps).is_some_and(|s| {
        s.description.contains("Division by zero")
            && s.register_changes.get(&Register::FLAGS) == Some(&1)
            && !s.register_changes.contains_key(&Register::AX)
    });
    check("DIV CX by zero", ok);

    // Test 4: PUSH AX writes below SP
    let regs = RegisterState::new()
        .with(Register::AX, 99)
        .with(Register::SP, 10);
    let steps = execute_instruction(find_instruction("PUSH AX"), &regs, &zeros);
    let ok = execute_of(&steps).is_some_and(|s| {
        s.register_changes.get(&Register::SP) == Some(&8) && s.memory_changes.get(&8) == Some(&99)
    });
    check("PUSH AX", ok);

    // Test 5: unknown mnemonic falls through
    let nop = Instruction::new(0, "NOP", "No operation", cyclesim::InstructionType::Control, 0);
    let steps = execute_instruction(&nop, &RegisterState::new(), &zeros);
    check("Unknown mnemonic", steps.len() == 4);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
