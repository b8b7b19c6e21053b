/// Number of patterns held in storage.
pub const PATTERN_COUNT: u8 = 32;

/// Number of bytes in a pattern-update payload: eight rows, each sent as two nibbles.
pub const PATTERN_NIBBLES: usize = 16;

/// A cell of the 8×8 grid, packed as `row << 4 | col`.
///
/// Motion entries are grid positions. Only the low three bits of each nibble address the grid, so any byte (including
/// values read from erased storage) names a valid cell.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GridPosition(u8);

impl GridPosition {
    /// Wraps a packed motion entry.
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Builds a position from its row and column.
    pub const fn from_row_col(row: u8, col: u8) -> Self {
        Self(((row & 0x07) << 4) | (col & 0x07))
    }

    /// Returns the packed byte.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Returns the row, 0 to 7.
    pub fn row(self) -> u8 {
        (self.0 >> 4) & 0x07
    }

    /// Returns the column, 0 to 7.
    pub fn col(self) -> u8 {
        self.0 & 0x07
    }

    /// Applies a motion's random mask, which can confine row and column independently.
    pub fn masked(self, mask: u8) -> Self {
        Self(self.0 & mask)
    }

    /// Index of this cell in row-major tables such as the scale.
    pub fn cell(self) -> usize {
        usize::from(self.row() * 8 + self.col())
    }

    /// The bit which lights this column on a display row.
    pub fn column_bit(self) -> u8 {
        1 << self.col()
    }
}

/// An 8×8 grid of active steps, one byte per row. Bit `n` of a row is column `n`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pattern([u8; 8]);

impl Pattern {
    /// A pattern with every cell active.
    pub const FULL: Self = Self([0xFF; 8]);

    /// Wraps eight rows.
    pub const fn new(rows: [u8; 8]) -> Self {
        Self(rows)
    }

    /// Reassembles rows from nibble pairs, high nibble first.
    ///
    /// Returns `None` unless exactly [`PATTERN_NIBBLES`] bytes are given.
    pub fn from_nibbles(nibbles: &[u8]) -> Option<Self> {
        if nibbles.len() != PATTERN_NIBBLES {
            return None;
        }

        let mut rows = [0; 8];
        for (row, pair) in rows.iter_mut().zip(nibbles.chunks_exact(2)) {
            *row = ((pair[0] << 4) & 0xF0) | (pair[1] & 0x0F);
        }
        Some(Self(rows))
    }

    /// Returns the rows.
    pub fn rows(&self) -> &[u8; 8] {
        &self.0
    }

    /// Returns true when the cell at `position` triggers a note.
    pub fn is_active(&self, position: GridPosition) -> bool {
        (self.0[usize::from(position.row())] >> position.col()) & 0x01 == 0x01
    }
}
