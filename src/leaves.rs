//! Endgame-database probing (spec §4.2's `leaves` collaborator, C2).
//!
//! A `Leaves` implementation answers "is this position already solved
//! externally" and, if so, supplies the exact score and bound flag the
//! Negamax engine should store as if it had searched it. Concrete
//! endgame-database file formats are out of scope for this crate; only
//! the lookup contract lives here.

use crate::cache::EntryFlag;
use crate::game::{Game, Score};

/// Consulted by `NegamaxEngine` at the top of every recursive call,
/// before the transposition table. A hit short-circuits the search at
/// that node exactly as a terminal position would.
pub trait Leaves<G: Game> {
    /// Returns `true` and leaves `get_score`/`get_flag` valid for `game`
    /// if this position is present in the database.
    fn find(&mut self, game: &G) -> bool;

    /// The score of the most recent successful `find`, in South's frame.
    fn get_score(&self) -> Score;

    /// The bound flag of the most recent successful `find`. Endgame
    /// databases are normally exact, but a `Leaves` backed by a
    /// compressed or truncated database may report a bound instead.
    fn get_flag(&self) -> EntryFlag;
}

/// The always-miss `Leaves`, used whenever no endgame database is
/// configured. `NegamaxEngine::new` defaults to this.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLeaves;

impl<G: Game> Leaves<G> for NullLeaves {
    fn find(&mut self, _game: &G) -> bool {
        false
    }

    fn get_score(&self) -> Score {
        0
    }

    fn get_flag(&self) -> EntryFlag {
        EntryFlag::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mock::MockGame;

    #[test]
    fn null_leaves_always_misses() {
        let mut leaves = NullLeaves;
        let game = MockGame::new();
        assert!(!Leaves::<MockGame>::find(&mut leaves, &game));
    }
}
