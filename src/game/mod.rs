//! The abstract game contract (spec §3.1, §6.1) that every search engine
//! in this crate is generic over. Concrete games (chess, Go, Oware, ...)
//! are external collaborators; this crate only ever talks to `Game`.

pub mod mock;

use crate::error::EngineError;

/// Move identifiers are opaque, game-defined integers. `NULL_MOVE` marks
/// "no move" (an exhausted generator, or the absence of a hash move).
pub type Move = i32;

/// Scores live in a single integer domain shared by both search engines,
/// always expressed in South's frame (positive = South advantage) unless
/// a function doc says otherwise.
pub type Score = i32;

pub const NULL_MOVE: Move = -1;
pub const DRAW: Score = 0;
pub const DRAW_SCORE: Score = 0;

/// Side to move. `South` and `North` mirror spec §3.1's `{SOUTH = +1,
/// NORTH = -1}` convention; the `i32` representation is the sign used to
/// flip a South-frame score into the mover's frame (`score * turn()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Player {
    South = 1,
    North = -1,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::South => Player::North,
            Player::North => Player::South,
        }
    }

    /// Sign multiplier used to rotate a South-frame score into this
    /// player's frame.
    pub fn sign(self) -> i32 {
        self as i32
    }
}

/// The outcome of a finished game, independent of whose frame a score is
/// reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    South,
    North,
    Draw,
}

/// The abstract position every search engine operates on.
///
/// Implementors own their own move stack, move-generation cursor, and
/// Zobrist-style hash; `make_move`/`unmake_move` must be exact inverses
/// (spec §3.1 invariant), including restoration of the cursor.
pub trait Game: Clone {
    /// Side to move at the current position.
    fn turn(&self) -> Player;

    /// The moves played to reach the current position, in order.
    fn move_stack(&self) -> &[Move];

    fn length(&self) -> usize {
        self.move_stack().len()
    }

    fn is_legal(&self, m: Move) -> bool;

    /// Plays `m`. Implementors push onto the move stack, update the
    /// hash, and reset the move-generation cursor for the new position.
    fn make_move(&mut self, m: Move) -> Result<(), EngineError>;

    /// Undoes the last move, restoring hash, move stack, and cursor.
    fn unmake_move(&mut self);

    fn unmake_moves(&mut self, k: usize) {
        for _ in 0..k {
            self.unmake_move();
        }
    }

    /// Advances the move-generation cursor and returns the next legal
    /// move, or `NULL_MOVE` once the generator is exhausted.
    fn next_move(&mut self) -> Move;

    /// Convenience default built from repeated `next_move` calls,
    /// restoring the cursor afterward.
    fn legal_moves(&mut self) -> Vec<Move> {
        let saved = self.get_cursor();
        self.reset_cursor();
        let mut moves = Vec::new();
        loop {
            let m = self.next_move();
            if m == NULL_MOVE {
                break;
            }
            moves.push(m);
        }
        self.set_cursor(saved);
        moves
    }

    fn has_ended(&self) -> bool;

    /// Terminal utility in South's frame. Callers needing the mover's
    /// frame multiply by `turn().sign()`.
    fn outcome(&self) -> Score;

    /// Heuristic static evaluation in South's frame.
    fn score(&self) -> Score;

    fn winner(&self) -> Winner;

    /// Hashes the position including side-to-move.
    fn hash(&self) -> u64;

    /// Converts an internal score to centipawns for reporting (spec §6.3).
    fn to_centipawns(&self, s: Score) -> i32;

    /// Pre-reserves internal storage (move stack, cursor stack, ...) for
    /// at least `capacity` plies from the current position.
    fn ensure_capacity(&mut self, capacity: usize) -> Result<(), EngineError>;

    fn get_cursor(&self) -> i64;
    fn set_cursor(&mut self, cursor: i64);
    fn reset_cursor(&mut self);

    /// Score substituted for a draw outcome (spec GLOSSARY: Contempt).
    fn contempt(&self) -> Score;

    /// The ± bound used as "mate"/"win" score (spec `set_infinity`).
    fn infinity(&self) -> Score;

    /// Releases any resources tied to the ongoing match (opponent
    /// connections, opening books, ...). A no-op for most games.
    fn end_match(&mut self) {}
}

/// The notation/diagram-facing side of a concrete game (spec §6.1).
/// Search engines never call this; it exists for outer layers (UCI, PGN,
/// GUIs) that are out of scope for this crate.
pub trait Board {
    type Move;
    type Position;

    fn to_board(notation: &str) -> Result<Self, EngineError>
    where
        Self: Sized;
    fn to_diagram(&self) -> String;
    fn to_move(&self, coordinates: &str) -> Option<Self::Move>;
    fn to_coordinates(&self, m: Self::Move) -> String;
    fn to_notation(&self, moves: &[Self::Move]) -> String;
    fn to_moves(&self, notation: &str) -> Vec<Self::Move>;
    fn position(&self) -> &Self::Position;
    fn turn(&self) -> Player;
}
