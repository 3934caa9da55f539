//! The 3×3 tic-tac-toe board shown to the player.
//!
//! The server decides which moves are legal; the board only mirrors the
//! placements it reports.  Coordinates are 1-based, `x` is the column and `y`
//! the row, matching the values carried by `PutChess`.

use std::fmt;

use thiserror::Error;

/// Board edge length.
pub const SIZE: usize = 3;

/// Contents of one board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    /// Piece of the receiving player, drawn as `O`.
    FirstHand,
    /// Piece of the opponent, drawn as `X`.
    BackHand,
}

impl Cell {
    fn symbol(self) -> char {
        match self {
            Cell::Empty => ' ',
            Cell::FirstHand => 'O',
            Cell::BackHand => 'X',
        }
    }
}

/// Reasons a placement is refused.
#[derive(Debug, Error, PartialEq)]
pub enum BoardError {
    #[error("position ({x}, {y}) is outside the 3x3 board")]
    OutOfRange { x: i32, y: i32 },

    #[error("position ({x}, {y}) is already occupied")]
    Occupied { x: i32, y: i32 },

    #[error("the game already has a winner")]
    GameOver,
}

/// A 3×3 grid of [`Cell`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Cell; SIZE]; SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell at 1-based `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::OutOfRange`] for coordinates outside `1..=3`.
    pub fn cell_at(&self, x: i32, y: i32) -> Result<Cell, BoardError> {
        let (col, row) = index(x, y)?;
        Ok(self.cells[row][col])
    }

    /// Places `cell` at 1-based `(x, y)`.
    ///
    /// # Errors
    ///
    /// Fails when the position is off the board, already holds a piece, or
    /// the game has already been won.
    pub fn put(&mut self, cell: Cell, x: i32, y: i32) -> Result<(), BoardError> {
        let (col, row) = index(x, y)?;
        if self.cells[row][col] != Cell::Empty && cell != Cell::Empty {
            return Err(BoardError::Occupied { x, y });
        }
        if self.winner() != Cell::Empty {
            return Err(BoardError::GameOver);
        }
        self.cells[row][col] = cell;
        Ok(())
    }

    /// Clears every cell.
    pub fn reset(&mut self) {
        self.cells = [[Cell::Empty; SIZE]; SIZE];
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(|&c| c == Cell::Empty)
    }

    /// Returns the owner of a completed line, or [`Cell::Empty`] when nobody
    /// has three in a row.
    pub fn winner(&self) -> Cell {
        let c = &self.cells;
        let mut lines: Vec<[Cell; SIZE]> = Vec::with_capacity(2 * SIZE + 2);
        for i in 0..SIZE {
            lines.push(c[i]);
            lines.push([c[0][i], c[1][i], c[2][i]]);
        }
        lines.push([c[0][0], c[1][1], c[2][2]]);
        lines.push([c[0][2], c[1][1], c[2][0]]);

        lines
            .into_iter()
            .find(|line| line[0] != Cell::Empty && line.iter().all(|&cell| cell == line[0]))
            .map_or(Cell::Empty, |line| line[0])
    }
}

fn index(x: i32, y: i32) -> Result<(usize, usize), BoardError> {
    let in_range = |v: i32| (1..=SIZE as i32).contains(&v);
    if !in_range(x) || !in_range(y) {
        return Err(BoardError::OutOfRange { x, y });
    }
    Ok(((x - 1) as usize, (y - 1) as usize))
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(SIZE * 2 + 1);
        writeln!(f, "{rule}")?;
        for row in &self.cells {
            write!(f, "|")?;
            for cell in row {
                write!(f, "{}|", cell.symbol())?;
            }
            writeln!(f)?;
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
