//! Stepper application state and logic.

use std::collections::BTreeSet;
use std::time::Instant;
use crate::{Catalogue, Cpu, Instruction, Register, SimConfig};

/// Stepper application state.
pub struct StepperApp {
    /// The CPU being stepped.
    pub cpu: Cpu,
    /// Playback settings.
    pub config: SimConfig,
    /// Index of the highlighted catalogue entry.
    pub selected: usize,
    /// Is playback running continuously?
    pub playing: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset (in rows).
    pub mem_scroll: usize,
    /// When the last playback step was applied.
    last_tick: Instant,
}

impl StepperApp {
    /// Create a stepper, optionally with an instruction already loaded.
    pub fn new(config: SimConfig, initial: Option<&Instruction>) -> Self {
        let mut app = Self {
            cpu: Cpu::with_memory_size(config.memory_size),
            config,
            selected: 0,
            playing: false,
            should_quit: false,
            status: "Ready. Enter loads, 'n' steps, space plays, 'q' quits.".into(),
            mem_scroll: 0,
            last_tick: Instant::now(),
        };

        if let Some(instr) = initial {
            if let Some(index) = Catalogue::builtin().iter().position(|e| e.id == instr.id) {
                app.selected = index;
            }
            app.load(instr);
        }
        app
    }

    /// Move the catalogue selection by `delta`, wrapping around.
    pub fn select(&mut self, delta: isize) {
        let len = Catalogue::builtin().len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
    }

    /// Load the highlighted catalogue entry.
    pub fn load_selected(&mut self) {
        if let Some(instr) = Catalogue::builtin().iter().nth(self.selected) {
            self.load(instr);
        }
    }

    fn load(&mut self, instr: &Instruction) {
        let count = self.cpu.load(instr);
        self.playing = false;
        self.status = format!("Loaded {} ({} steps)", instr.mnemonic, count);
    }

    /// Apply one step.
    pub fn step(&mut self) {
        match self.cpu.step() {
            Ok(Some(step)) => {
                self.status = format!("[{}] {}", step.phase, step.description);
            }
            Ok(None) => {
                self.playing = false;
                self.status = "Instruction complete. Pick another and press Enter.".into();
            }
            Err(e) => {
                self.playing = false;
                self.status = format!("Error: {}", e);
            }
        }
    }

    /// Start or pause playback.
    pub fn toggle_play(&mut self) {
        if !self.cpu.has_pending() {
            self.status = "Nothing to play. Press Enter to load an instruction.".into();
            return;
        }
        self.playing = !self.playing;
        self.last_tick = Instant::now();
        self.status = if self.playing { "Playing..." } else { "Paused." }.into();
    }

    /// Run one iteration of continuous playback.
    pub fn tick(&mut self) {
        if !self.playing || self.last_tick.elapsed() < self.config.effective_interval() {
            return;
        }
        self.last_tick = Instant::now();
        self.step();
    }

    /// Undo the last step.
    pub fn rewind(&mut self) {
        self.playing = false;
        self.status = if self.cpu.rewind() {
            format!("Rewound to {}", self.cpu.phase())
        } else {
            "Nothing to rewind.".into()
        };
    }

    /// Change playback speed by a factor.
    pub fn scale_speed(&mut self, factor: f64) {
        let speed = self.config.speed * factor;
        self.config.set_speed(speed);
        self.status = format!("Speed {}x", self.config.speed);
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.playing = false;
        self.status = "Reset. Ready.".into();
    }

    /// Registers written by the most recently applied step.
    pub fn changed_registers(&self) -> BTreeSet<Register> {
        self.cpu
            .last_step()
            .map(|s| s.register_changes.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Memory addresses written by the most recently applied step.
    pub fn changed_addresses(&self) -> BTreeSet<i64> {
        self.cpu
            .last_step()
            .map(|s| s.memory_changes.keys().copied().collect())
            .unwrap_or_default()
    }
}

/// Run the stepper until the user quits.
pub fn run_stepper(config: SimConfig, initial: Option<&Instruction>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = StepperApp::new(config, initial);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('n') | KeyCode::Char('s') => {
                            app.playing = false;
                            app.step();
                        }
                        KeyCode::Char(' ') => app.toggle_play(),
                        KeyCode::Char('b') => app.rewind(),
                        KeyCode::Char('r') => app.reset(),
                        KeyCode::Char('+') => app.scale_speed(2.0),
                        KeyCode::Char('-') => app.scale_speed(0.5),
                        KeyCode::Enter => app.load_selected(),
                        KeyCode::Up => app.select(-1),
                        KeyCode::Down => app.select(1),
                        KeyCode::PageUp => app.mem_scroll = app.mem_scroll.saturating_sub(1),
                        KeyCode::PageDown => app.mem_scroll += 1,
                        _ => {}
                    }
                }
            }
        }

        app.tick();

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
