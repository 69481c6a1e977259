//! The persisted UCT node (C8, spec §3.4): the same running-mean tree
//! node as C5, but addressed by a stable store-assigned id instead of an
//! arena handle, and self-describing enough for a worker thread to
//! replay the position without touching the live game object.

use serde::{Deserialize, Serialize};

use crate::game::{Move, Player, NULL_MOVE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoeNode {
    /// `0` means "not yet assigned"; the store assigns a real id on
    /// first `write`. The root's id is always `1`.
    pub id: u64,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
    pub hash: u64,
    pub mv: Move,
    /// Path of moves from the root to this node, carried so an
    /// evaluator worker can replay the position without a live tree.
    pub moves: Vec<Move>,
    pub turn: Player,
    pub evaluated: bool,
    pub terminal: bool,
    pub expanded: bool,
    pub cursor: i64,
    pub reset_cursor: i64,
    pub count: u64,
    pub score: f64,
}

impl DoeNode {
    pub fn root(hash: u64, turn: Player, cursor: i64) -> Self {
        DoeNode {
            id: 1,
            parent: None,
            children: Vec::new(),
            hash,
            mv: NULL_MOVE,
            moves: Vec::new(),
            turn,
            evaluated: true,
            terminal: false,
            expanded: false,
            cursor,
            reset_cursor: cursor,
            count: 1,
            score: 0.0,
        }
    }

    pub fn child(parent: u64, moves: Vec<Move>, mv: Move, hash: u64, turn: Player) -> Self {
        DoeNode {
            id: 0,
            parent: Some(parent),
            children: Vec::new(),
            hash,
            mv,
            moves,
            turn,
            evaluated: false,
            terminal: false,
            expanded: false,
            cursor: 0,
            reset_cursor: 0,
            count: 0,
            score: 0.0,
        }
    }

    pub fn init_score(&mut self, v: f64) {
        self.score = v;
        self.count = 1;
    }

    pub fn update_score(&mut self, v: f64) {
        self.count += 1;
        self.score += (v - self.score) / self.count as f64;
    }
}
