//! Simulated register file.
//!
//! The machine exposes seven architectural registers:
//! - AX, BX, CX, DX: general purpose
//! - PC: program counter
//! - SP: stack pointer
//! - FLAGS: simplified one-bit condition register (1 = zero/equal)
//!
//! Additional named registers may ride along in a [`RegisterState`]. They are
//! preserved by every operation but never read or written by the engine.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of required architectural registers.
pub const REGISTER_COUNT: usize = 7;

/// A required architectural register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Register {
    AX,
    BX,
    CX,
    DX,
    PC,
    SP,
    FLAGS,
}

impl Register {
    /// All required registers in display order.
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::AX,
        Register::BX,
        Register::CX,
        Register::DX,
        Register::PC,
        Register::SP,
        Register::FLAGS,
    ];

    /// The register's canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            Register::AX => "AX",
            Register::BX => "BX",
            Register::CX => "CX",
            Register::DX => "DX",
            Register::PC => "PC",
            Register::SP => "SP",
            Register::FLAGS => "FLAGS",
        }
    }

    /// Look up a register by its exact name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A snapshot of the register file.
///
/// Serializes as a flat object keyed by register name. Deserializing an
/// object that lacks any required register fails with
/// [`StateError::MissingRegister`].
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, i64>", into = "BTreeMap<String, i64>")]
pub struct RegisterState {
    values: [i64; REGISTER_COUNT],
    extra: BTreeMap<String, i64>,
}

impl RegisterState {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a required register.
    #[inline]
    pub fn get(&self, reg: Register) -> i64 {
        self.values[reg.index()]
    }

    /// Overwrite a required register.
    #[inline]
    pub fn set(&mut self, reg: Register, value: i64) {
        self.values[reg.index()] = value;
    }

    /// Builder-style variant of [`RegisterState::set`].
    pub fn with(mut self, reg: Register, value: i64) -> Self {
        self.set(reg, value);
        self
    }

    /// Read any register, required or extra, by name.
    pub fn get_named(&self, name: &str) -> Option<i64> {
        match Register::from_name(name) {
            Some(reg) => Some(self.get(reg)),
            None => self.extra.get(name).copied(),
        }
    }

    /// Write any register by name. Unknown names become extra registers.
    pub fn set_named(&mut self, name: &str, value: i64) {
        match Register::from_name(name) {
            Some(reg) => self.set(reg, value),
            None => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }

    /// Extra (non-architectural) registers.
    pub fn extra(&self) -> &BTreeMap<String, i64> {
        &self.extra
    }

    /// Iterate the required registers in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, i64)> + '_ {
        Register::ALL.into_iter().map(move |r| (r, self.get(r)))
    }

    /// Reset all required registers to zero and drop the extras.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Debug for RegisterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (reg, value) in self.iter() {
            map.entry(&reg.name(), &value);
        }
        for (name, value) in &self.extra {
            map.entry(name, value);
        }
        map.finish()
    }
}

impl TryFrom<BTreeMap<String, i64>> for RegisterState {
    type Error = StateError;

    fn try_from(mut map: BTreeMap<String, i64>) -> Result<Self, Self::Error> {
        let mut values = [0; REGISTER_COUNT];
        for reg in Register::ALL {
            values[reg.index()] = map
                .remove(reg.name())
                .ok_or(StateError::MissingRegister(reg.name()))?;
        }
        Ok(Self { values, extra: map })
    }
}

impl From<RegisterState> for BTreeMap<String, i64> {
    fn from(state: RegisterState) -> Self {
        let mut map = state.extra;
        for reg in Register::ALL {
            map.insert(reg.name().to_string(), state.values[reg.index()]);
        }
        map
    }
}

/// Errors raised when a register snapshot violates the data model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("required register {0} is missing")]
    MissingRegister(&'static str),
}
