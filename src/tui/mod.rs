//! Terminal stepper.
//!
//! Replays an instruction's execution steps one phase at a time:
//! - Instruction picker over the built-in catalogue
//! - Register and memory views that highlight the last write
//! - Step, play/pause, rewind and speed controls

mod app;
mod ui;

pub use app::{StepperApp, run_stepper};
