//! Error taxonomy for the engine (spec §7).
//!
//! `Cache` and `Leaves` never produce errors: an absent backing is
//! modeled as an always-miss implementation, not a failure. Cancellation
//! is likewise not an error a caller observes; it is folded back into a
//! best-effort result by the search loops.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("illegal move")]
    IllegalMove,

    #[error("illegal position: {0}")]
    IllegalPosition(String),

    #[error("requested capacity {requested} exceeds the game's maximum {max}")]
    CapacityExceeded { requested: usize, max: usize },

    #[error("store failure: {0}")]
    StoreFailure(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
