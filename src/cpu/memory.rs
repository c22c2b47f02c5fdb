//! Flat simulated memory.
//!
//! Memory is an ordered run of integer cells addressed by index. A fresh
//! machine has 64 zeroed cells.
//!
//! Address policy:
//! - Reads outside the allocated cells (including negative addresses) yield 0.
//! - Writes past the end grow memory with zeroed cells, up to
//!   [`MAX_MEMORY_CELLS`].
//! - Writes to a negative address or beyond the 16-bit address space fail.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of cells in a freshly initialized memory.
pub const DEFAULT_MEMORY_SIZE: usize = 64;

/// Upper bound on memory growth (the 16-bit address space).
pub const MAX_MEMORY_CELLS: usize = 0x1_0000;

/// Simulated memory: a growable sequence of integer cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct Memory {
    cells: Vec<i64>,
}

impl Memory {
    /// Create a memory of [`DEFAULT_MEMORY_SIZE`] zeroed cells.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_MEMORY_SIZE)
    }

    /// Create a memory of `size` zeroed cells (capped at [`MAX_MEMORY_CELLS`]).
    pub fn with_size(size: usize) -> Self {
        Self {
            cells: vec![0; size.min(MAX_MEMORY_CELLS)],
        }
    }

    /// Wrap existing cell values.
    pub fn from_cells(cells: Vec<i64>) -> Result<Self, MemoryError> {
        if cells.len() > MAX_MEMORY_CELLS {
            return Err(MemoryError::TooLarge(cells.len()));
        }
        Ok(Self { cells })
    }

    /// Number of allocated cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cells are allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read a cell. Unallocated or negative addresses read as 0.
    #[inline]
    pub fn read(&self, addr: i64) -> i64 {
        usize::try_from(addr)
            .ok()
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(0)
    }

    /// Write a cell, growing memory if `addr` lies past the end.
    pub fn write(&mut self, addr: i64, value: i64) -> Result<(), MemoryError> {
        let index = usize::try_from(addr)
            .ok()
            .filter(|&index| index < MAX_MEMORY_CELLS)
            .ok_or(MemoryError::AddressOutOfRange(addr))?;

        if index >= self.cells.len() {
            self.cells.resize(index + 1, 0);
        }
        self.cells[index] = value;
        Ok(())
    }

    /// Borrow all cells.
    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    /// Clear all memory to zeros, keeping the current size.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Dump a window of memory (for display).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, i64)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<i64>> for Memory {
    type Error = MemoryError;

    fn try_from(cells: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_cells(cells)
    }
}

impl From<Memory> for Vec<i64> {
    fn from(mem: Memory) -> Self {
        mem.cells
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero cells
        let non_zero: Vec<_> = self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell != 0)
            .collect();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address {0} out of range (0 to {max})", max = MAX_MEMORY_CELLS - 1)]
    AddressOutOfRange(i64),

    #[error("memory image of {0} cells exceeds the {max}-cell address space", max = MAX_MEMORY_CELLS)]
    TooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10), 42);
        assert_eq!(mem.len(), DEFAULT_MEMORY_SIZE);
    }

    #[test]
    fn test_unallocated_reads_are_zero() {
        let mem = Memory::new();
        assert_eq!(mem.read(100), 0);
        assert_eq!(mem.read(-2), 0);
        assert_eq!(mem.read(i64::MAX), 0);
    }

    #[test]
    fn test_write_grows_memory() {
        let mut mem = Memory::new();
        mem.write(200, 7).unwrap();

        assert_eq!(mem.len(), 201);
        assert_eq!(mem.read(200), 7);
        assert_eq!(mem.read(150), 0);
    }

    #[test]
    fn test_write_bounds() {
        let mut mem = Memory::new();

        assert_eq!(mem.write(-2, 1), Err(MemoryError::AddressOutOfRange(-2)));
        assert_eq!(
            mem.write(MAX_MEMORY_CELLS as i64, 1),
            Err(MemoryError::AddressOutOfRange(MAX_MEMORY_CELLS as i64))
        );
        assert!(mem.write(MAX_MEMORY_CELLS as i64 - 1, 1).is_ok());
        assert_eq!(mem.len(), MAX_MEMORY_CELLS);
    }

    #[test]
    fn test_dump_window() {
        let mut mem = Memory::new();
        mem.write(1, 5).unwrap();

        assert_eq!(mem.dump(0, 3), vec![(0, 0), (1, 5), (2, 0)]);
        assert_eq!(mem.dump(62, 10).len(), 2);
        assert!(mem.dump(100, 4).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let mut mem = Memory::with_size(3);
        mem.write(2, 9).unwrap();
        assert_eq!(serde_json::to_string(&mem).unwrap(), "[0,0,9]");
    }
}
