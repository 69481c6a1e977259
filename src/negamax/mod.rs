//! Iterative-deepening alpha-beta search (C4, spec §4.2).

mod report;
pub use report::extract_report;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{EntryFlag, TranspositionTable};
use crate::config::{clamp_negamax_depth, NegamaxConfig, NEGAMAX_MAX_DEPTH, NEGAMAX_MIN_DEPTH};
use crate::game::{Game, Move, Score, DRAW, NULL_MOVE};
use crate::leaves::{Leaves, NullLeaves};
use crate::lifecycle::{new_abort_flag, Consumer, SearchTimer};

/// Root-move reordering only ever rotates a hash move found within the
/// first 6 generated moves into position 0 (spec §9, preserved verbatim
/// as an open design question rather than "fixed").
const ROOT_REORDER_LIMIT: usize = 6;

/// Iterative-deepening Negamax with a hash-move-ordered alpha-beta core,
/// backed by a two-tier transposition table and optional endgame probing.
pub struct NegamaxEngine<G: Game, L: Leaves<G> = NullLeaves> {
    config: NegamaxConfig,
    cache: TranspositionTable,
    leaves: L,
    consumers: Vec<Arc<dyn Consumer + Send + Sync>>,
    abort: Arc<AtomicBool>,
    last_complete: Option<(Move, Score)>,
    _game: PhantomData<G>,
}

impl<G: Game> NegamaxEngine<G, NullLeaves> {
    pub fn new() -> Self {
        NegamaxEngine::with_leaves(NullLeaves)
    }
}

impl<G: Game> Default for NegamaxEngine<G, NullLeaves> {
    fn default() -> Self {
        NegamaxEngine::new()
    }
}

impl<G: Game, L: Leaves<G>> NegamaxEngine<G, L> {
    pub fn with_leaves(leaves: L) -> Self {
        let config = NegamaxConfig::default();
        let cache = TranspositionTable::new(config.cache_bytes);
        NegamaxEngine {
            config,
            cache,
            leaves,
            consumers: Vec::new(),
            abort: new_abort_flag(),
            last_complete: None,
            _game: PhantomData,
        }
    }

    pub fn set_depth(&mut self, depth: u32) {
        self.config.depth = clamp_negamax_depth(depth);
    }

    pub fn set_move_time(&mut self, ms: u64) {
        self.config.move_time_ms = ms.max(1);
    }

    pub fn set_contempt(&mut self, contempt: Score) {
        self.config.contempt = contempt;
    }

    pub fn set_infinity(&mut self, max_score: Score) {
        self.config.infinity = max_score.abs();
    }

    pub fn set_cache(&mut self, cache: TranspositionTable) {
        self.cache = cache;
    }

    pub fn set_leaves(&mut self, leaves: L) {
        self.leaves = leaves;
    }

    pub fn attach_consumer(&mut self, consumer: Arc<dyn Consumer + Send + Sync>) {
        self.consumers.push(consumer);
    }

    pub fn detach_consumer(&mut self, consumer: &Arc<dyn Consumer + Send + Sync>) {
        self.consumers.retain(|c| !Arc::ptr_eq(c, consumer));
    }

    pub fn new_match(&mut self) {
        self.cache.clear();
    }

    pub fn abort_computation(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    fn outcome_or_contempt(&self, game: &G) -> Score {
        let outcome = game.outcome();
        if outcome == DRAW {
            game.contempt()
        } else {
            outcome
        }
    }

    fn leaf_or_contempt(&self, game: &G, score: Score) -> Score {
        if score == DRAW {
            // Contempt substitutes for a draw score reported by an
            // endgame database the same way it does for a live draw.
            game.contempt()
        } else {
            score
        }
    }

    fn notify(&mut self, game: &mut G, best_move: Move) {
        if self.consumers.is_empty() {
            return;
        }
        let report = extract_report(&mut self.cache, game, best_move);
        for consumer in &self.consumers {
            consumer.on_report(&report);
        }
    }

    /// Runs iterative deepening until aborted, the depth ceiling is hit,
    /// or a proven terminal is found, and returns the chosen move.
    pub fn compute_best_move(&mut self, game: &mut G) -> Move {
        let max_score = self.config.infinity;

        if game.has_ended() {
            let score = -(game.outcome() * game.turn().sign());
            self.last_complete = Some((NULL_MOVE, score));
            return NULL_MOVE;
        }

        let timer = SearchTimer::arm(
            Duration::from_millis(self.config.move_time_ms),
            Arc::clone(&self.abort),
        );

        let _ = game.ensure_capacity(NEGAMAX_MAX_DEPTH as usize + game.length());
        self.cache.discharge();

        let mut root_moves = game.legal_moves();
        if self.cache.find(game.hash()) {
            let hash_move = self.cache.get_move();
            if hash_move != NULL_MOVE {
                if let Some(pos) = root_moves
                    .iter()
                    .take(ROOT_REORDER_LIMIT)
                    .position(|&m| m == hash_move)
                {
                    root_moves[..=pos].rotate_right(1);
                }
            }
        }

        let max_depth = self.config.depth;
        let mut best_move = NULL_MOVE;
        let mut best_score = DRAW;
        let mut depth = NEGAMAX_MIN_DEPTH;

        while depth <= max_depth {
            let mut beta = max_score;
            let mut iter_best_score = DRAW;
            let mut iter_best_move = NULL_MOVE;
            let mut iteration_aborted = false;

            for &m in &root_moves {
                if game.make_move(m).is_err() {
                    continue;
                }
                let s = self.search(game, -max_score, beta, depth - 1);
                game.unmake_move();

                if timer.is_aborted() && depth > NEGAMAX_MIN_DEPTH {
                    iteration_aborted = true;
                    break;
                }

                if s < beta {
                    iter_best_move = m;
                    iter_best_score = s;
                    beta = s;
                } else if s == beta {
                    iter_best_score = s;
                }
            }

            if iteration_aborted {
                break;
            }

            best_move = iter_best_move;
            best_score = iter_best_score;
            self.last_complete = Some((best_move, best_score));

            if depth > NEGAMAX_MIN_DEPTH {
                self.notify(game, best_move);
            }

            if best_score.abs() >= max_score {
                break;
            }
            depth += 2;
        }

        timer.disarm();
        best_move
    }

    /// Side-effect equivalent to `compute_best_move`; returns the
    /// negated score in the caller's frame.
    pub fn compute_best_score(&mut self, game: &mut G) -> Score {
        self.compute_best_move(game);
        -self.last_complete.map(|(_, s)| s).unwrap_or(DRAW)
    }

    pub fn get_ponder_move(&mut self, game: &G) -> Move {
        if self.cache.find(game.hash()) && self.cache.get_flag() == EntryFlag::Exact {
            self.cache.get_move()
        } else {
            NULL_MOVE
        }
    }

    fn search(&mut self, game: &mut G, mut alpha: Score, beta: Score, depth: u32) -> Score {
        let max_score = self.config.infinity;
        let turn = game.turn().sign();

        if self.abort.load(Ordering::SeqCst) && depth > NEGAMAX_MIN_DEPTH {
            return -max_score;
        }
        if game.has_ended() {
            return self.outcome_or_contempt(game) * turn;
        }
        if self.leaves.find(game) {
            let score = self.leaves.get_score();
            return self.leaf_or_contempt(game, score) * turn;
        }
        if depth == 0 {
            return game.score() * turn;
        }

        let mut hash_move = NULL_MOVE;
        if depth > 2 && self.cache.find(game.hash()) {
            let stored_depth = self.cache.get_depth() as u32;
            if stored_depth >= depth {
                match self.cache.get_flag() {
                    EntryFlag::Exact => return self.cache.get_score(),
                    EntryFlag::Upper => {
                        if self.cache.get_score() >= beta {
                            return beta;
                        }
                    }
                    EntryFlag::Lower => {
                        if self.cache.get_score() <= alpha {
                            return alpha;
                        }
                    }
                    EntryFlag::Empty => {}
                }
            }
            hash_move = self.cache.get_move();
        }

        let mut flag = EntryFlag::Lower;
        let mut best_move = hash_move;

        if hash_move != NULL_MOVE && game.make_move(hash_move).is_ok() {
            let score = -self.search(game, -beta, -alpha, depth - 1);
            game.unmake_move();

            if score >= beta {
                if depth > 2 && !self.abort.load(Ordering::SeqCst) {
                    self.cache
                        .store(game.hash(), beta, hash_move, depth as u8, EntryFlag::Upper);
                }
                return beta;
            }
            if score > alpha {
                alpha = score;
                flag = EntryFlag::Exact;
            }
        }

        game.reset_cursor();
        loop {
            let m = game.next_move();
            if m == NULL_MOVE {
                break;
            }
            if m == hash_move {
                continue;
            }
            if game.make_move(m).is_err() {
                continue;
            }
            let score = -self.search(game, -beta, -alpha, depth - 1);
            game.unmake_move();

            if score >= beta {
                alpha = beta;
                flag = EntryFlag::Upper;
                best_move = m;
                break;
            }
            if score > alpha {
                alpha = score;
                best_move = m;
            }
        }

        if depth > 2 && !self.abort.load(Ordering::SeqCst) {
            self.cache
                .store(game.hash(), alpha, best_move, depth as u8, flag);
        }
        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mock::MockGame;

    #[test]
    fn finds_proven_win_from_empty_position() {
        let mut engine = NegamaxEngine::<MockGame>::new();
        engine.set_depth(8);
        engine.set_move_time(5_000);
        let mut game = MockGame::new();

        let m = engine.compute_best_move(&mut game);
        assert_ne!(m, NULL_MOVE);

        game.make_move(m).unwrap();
        while !game.has_ended() {
            let reply = engine.compute_best_move(&mut game);
            game.make_move(reply).unwrap();
        }
        assert_eq!(game.outcome(), game.infinity());
    }

    #[test]
    fn restores_move_stack_after_search() {
        let sequence = [0, 1, 3, 2, 0, 1, 4, 1];
        let mut game = MockGame::new();
        for &m in &sequence {
            game.make_move(m).unwrap();
        }
        let mut engine = NegamaxEngine::<MockGame>::new();
        engine.set_depth(2);
        let _ = engine.compute_best_move(&mut game);
        assert_eq!(game.move_stack(), &sequence[..]);
    }

    #[test]
    fn cache_hit_reproduces_score() {
        let mut engine = NegamaxEngine::<MockGame>::new();
        engine.set_depth(4);
        let mut game = MockGame::new();

        let m1 = engine.compute_best_move(&mut game);
        let score1 = engine.last_complete.unwrap().1;

        let m2 = engine.compute_best_move(&mut game);
        let score2 = engine.last_complete.unwrap().1;

        assert_eq!(m1, m2);
        assert_eq!(score1, score2);
        assert!(engine.cache.find(game.hash()));
    }

    #[test]
    fn sees_terminal_loss_in_one() {
        // One move away from has_ended(); every continuation is terminal.
        let mut game = MockGame::new();
        for _ in 0..7 {
            game.make_move(1).unwrap();
        }
        let mut engine = NegamaxEngine::<MockGame>::new();
        engine.set_depth(2);
        let m = engine.compute_best_move(&mut game);
        assert_ne!(m, NULL_MOVE);
        game.make_move(m).unwrap();
        assert!(game.has_ended());
        game.unmake_move();
    }
}
