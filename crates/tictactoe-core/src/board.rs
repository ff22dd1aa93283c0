//! The 3x3 placement grid and its win/tie evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of rows and columns on the board.
pub const BOARD_SIZE: usize = 3;

/// The marker a player owns within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    /// Always moves first.
    Cross,
    /// Moves second.
    Circle,
}

impl Symbol {
    /// Both symbols, in turn order.
    pub const ALL: [Self; 2] = [Self::Cross, Self::Circle];

    /// The other symbol.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Cross => Self::Circle,
            Self::Circle => Self::Cross,
        }
    }

    /// Wire name (`"cross"` / `"circle"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cross => "cross",
            Self::Circle => "circle",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board placement error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Cell ({row}, {col}) is already occupied")]
    CellOccupied { row: usize, col: usize },
    #[error("Cell ({row}, {col}) is outside the board")]
    OutOfRange { row: usize, col: usize },
}

/// Grid of optional symbols. Cells are set at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE],
}

// Rows, then columns, then the two diagonals.
const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

impl Board {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `symbol` on an empty cell.
    ///
    /// # Errors
    /// Returns `OutOfRange` for indices past the grid and `CellOccupied`
    /// if the cell already holds a symbol.
    pub fn place(&mut self, row: usize, col: usize, symbol: Symbol) -> Result<(), BoardError> {
        let cell = self
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(BoardError::OutOfRange { row, col })?;

        if cell.is_some() {
            return Err(BoardError::CellOccupied { row, col });
        }
        *cell = Some(symbol);
        Ok(())
    }

    /// Symbol at a cell, `None` when empty or out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Symbol> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Owner of the first fully matched line, scanning rows, columns,
    /// then diagonals.
    #[must_use]
    pub fn winner(&self) -> Option<Symbol> {
        LINES.iter().find_map(|[a, b, c]| {
            let first = self.cells[a.0][a.1]?;
            (self.cells[b.0][b.1] == Some(first) && self.cells[c.0][c.1] == Some(first))
                .then_some(first)
        })
    }

    /// True iff no empty cell remains.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }

    /// Row-major view of the cells.
    #[must_use]
    pub const fn cells(&self) -> &[[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }
}
