pub mod cache;
pub mod config;
pub mod doe;
pub mod error;
pub mod game;
pub mod leaves;
pub mod lifecycle;
pub mod negamax;
pub mod uct;

pub mod prelude {
    pub use crate::cache::{EntryFlag, TranspositionTable};
    pub use crate::config::{DoeConfig, NegamaxConfig, UctConfig};
    pub use crate::error::EngineError;
    pub use crate::game::{Board, Game, Player, DRAW, DRAW_SCORE, NULL_MOVE};
    pub use crate::leaves::{Leaves, NullLeaves};
    pub use crate::lifecycle::{Consumer, Report};
    pub use crate::negamax::NegamaxEngine;
    pub use crate::uct::UctEngine;
}
