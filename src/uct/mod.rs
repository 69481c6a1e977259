//! Incremental best-first Monte-Carlo tree search (C6, spec §4.3).

pub mod pool;
mod report;
pub use report::extract_report;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::config::{
    UctConfig, UCT_DEFAULT_BIAS, UCT_INITIAL_REPORT_PROBES, UCT_MAX_DEPTH, UCT_MIN_PROBES,
    UCT_REPORT_PROBES_GROWTH,
};
use crate::game::{Game, Move, Score, DRAW, NULL_MOVE};
use crate::leaves::{Leaves, NullLeaves};
use crate::lifecycle::{new_abort_flag, Consumer, SearchTimer};

use pool::{NodeHandle, NodePool};

/// A fresh arena is sized generously; `new_match`/memory pruning keep it
/// from growing without bound during long searches.
const DEFAULT_POOL_CAPACITY: usize = 1 << 20;

/// Pruning kicks in once the arena is this close to full — the
/// generalization of the source's "free heap" signal to a bounded
/// arena (see DESIGN.md).
const PRUNE_FREE_SLOTS_THRESHOLD_FRACTION: usize = 20;
const PRUNE_ITERATIONS: usize = 8;

/// `simulate_match`'s two variants (spec §4.3 / §9's open question on
/// the cooperative `Partner` engine): the default is purely positional;
/// `Cooperative` performs random playouts and skips the sign flip its
/// caller would otherwise apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollout {
    Positional,
    Cooperative,
}

pub struct UctEngine<G: Game, L: Leaves<G> = NullLeaves> {
    config: UctConfig,
    pool: NodePool,
    root: Option<NodeHandle>,
    leaves: L,
    rollout: Rollout,
    consumers: Vec<Arc<dyn Consumer + Send + Sync>>,
    abort: Arc<AtomicBool>,
    _game: PhantomData<G>,
}

impl<G: Game> UctEngine<G, NullLeaves> {
    pub fn new() -> Self {
        UctEngine::with_leaves(NullLeaves)
    }
}

impl<G: Game> Default for UctEngine<G, NullLeaves> {
    fn default() -> Self {
        UctEngine::new()
    }
}

impl<G: Game, L: Leaves<G>> UctEngine<G, L> {
    pub fn with_leaves(leaves: L) -> Self {
        UctEngine {
            config: UctConfig::default(),
            pool: NodePool::with_capacity(DEFAULT_POOL_CAPACITY),
            root: None,
            leaves,
            rollout: Rollout::Positional,
            consumers: Vec::new(),
            abort: new_abort_flag(),
            _game: PhantomData,
        }
    }

    pub fn set_depth(&mut self, depth: u32) {
        self.config.depth = depth.min(UCT_MAX_DEPTH).max(1);
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

    pub fn set_exploration_bias(&mut self, bias: f64) {
        self.config.exploration_bias = if bias > 0.0 { bias } else { UCT_DEFAULT_BIAS };
    }

    pub fn set_leaves(&mut self, leaves: L) {
        self.leaves = leaves;
    }

    pub fn set_rollout(&mut self, rollout: Rollout) {
        self.rollout = rollout;
    }

    pub fn attach_consumer(&mut self, consumer: Arc<dyn Consumer + Send + Sync>) {
        self.consumers.push(consumer);
    }

    pub fn detach_consumer(&mut self, consumer: &Arc<dyn Consumer + Send + Sync>) {
        self.consumers.retain(|c| !Arc::ptr_eq(c, consumer));
    }

    /// Discards the tree and asks the arena to start over (spec: "requests
    /// GC hints" — there is no GC to invoke, so this just clears the pool).
    pub fn new_match(&mut self) {
        self.pool.clear();
        self.root = None;
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
            game.contempt()
        } else {
            score
        }
    }

    /// `(value, already turn-adjusted)`. Terminal and endgame-probe
    /// values are in South's frame and still need the `* turn` flip;
    /// a cooperative rollout already returns a mover-frame value.
    fn leaf_value(&mut self, game: &mut G, terminal: bool, depth: u32) -> (Score, bool) {
        if terminal {
            (self.outcome_or_contempt(game), false)
        } else if self.leaves.find(game) {
            let score = self.leaves.get_score();
            (self.leaf_or_contempt(game, score), false)
        } else {
            match self.rollout {
                Rollout::Positional => (game.score(), false),
                Rollout::Cooperative => (self.simulate_cooperative(game, depth), true),
            }
        }
    }

    fn simulate_cooperative(&self, game: &mut G, max_depth: u32) -> Score {
        let mut rng = thread_rng();
        let mut played = 0u32;
        while played < max_depth && !game.has_ended() {
            let moves = game.legal_moves();
            let Some(&m) = moves.choose(&mut rng) else {
                break;
            };
            if game.make_move(m).is_err() {
                break;
            }
            played += 1;
        }
        let outcome = self.outcome_or_contempt(game);
        game.unmake_moves(played as usize);
        outcome
    }

    fn bias_scale(&self) -> f64 {
        self.config.exploration_bias * self.config.infinity as f64
    }

    /// Finds a node within depth 2 of `old_root` whose hash matches the
    /// current position, detaches it, and frees the rest of the old
    /// tree (spec §4.3's tree-reuse step).
    fn reuse_or_rebuild_root(&mut self, game: &G) -> NodeHandle {
        if let Some(old_root) = self.root {
            if self.pool.get(old_root).hash == game.hash() {
                return old_root;
            }
            let mut found = None;
            'search: for child in self.pool.children(old_root) {
                if self.pool.get(child).hash == game.hash() {
                    found = Some(child);
                    break 'search;
                }
                for grandchild in self.pool.children(child) {
                    if self.pool.get(grandchild).hash == game.hash() {
                        found = Some(grandchild);
                        break 'search;
                    }
                }
            }
            if let Some(found) = found {
                self.unlink(found);
                self.pool.free_subtree(old_root);
                return found;
            }
            self.pool.free_subtree(old_root);
        }
        let handle = self
            .pool
            .alloc(pool::UctNode::root(game.hash(), game.get_cursor()))
            .expect("fresh pool always has room for a root");
        handle
    }

    fn unlink(&mut self, handle: NodeHandle) {
        if let Some(parent) = self.pool.get(handle).parent {
            let first = self.pool.get(parent).child;
            if first == Some(handle) {
                let sibling = self.pool.get(handle).sibling;
                self.pool.get_mut(parent).child = sibling;
            } else {
                let mut cur = first;
                while let Some(c) = cur {
                    let next = self.pool.get(c).sibling;
                    if next == Some(handle) {
                        let after = self.pool.get(handle).sibling;
                        self.pool.get_mut(c).sibling = after;
                        break;
                    }
                    cur = next;
                }
            }
        }
        self.pool.get_mut(handle).parent = None;
        self.pool.get_mut(handle).sibling = None;
    }

    /// Best child of `node` by display score (spec §4.3).
    fn best_child(&self, node: NodeHandle) -> Option<NodeHandle> {
        let max_score = self.config.infinity;
        self.pool
            .children(node)
            .into_iter()
            .max_by(|&a, &b| {
                self.pool
                    .get(a)
                    .display_score(max_score)
                    .partial_cmp(&self.pool.get(b).display_score(max_score))
                    .unwrap()
            })
    }

    pub fn compute_best_move(&mut self, game: &mut G) -> Move {
        if game.has_ended() {
            return NULL_MOVE;
        }

        let timer = SearchTimer::arm(
            Duration::from_millis(self.config.move_time_ms),
            Arc::clone(&self.abort),
        );
        let _ = game.ensure_capacity(UCT_MAX_DEPTH as usize + game.length());

        let root = self.reuse_or_rebuild_root(game);
        self.root = Some(root);

        let mut report_probes = UCT_INITIAL_REPORT_PROBES;
        let mut last_reported_move = NULL_MOVE;
        let mut last_reported_score = f64::NEG_INFINITY;

        loop {
            self.expand(game, root, self.config.depth);
            self.prune_garbage(game, root);

            let count = self.pool.get(root).count;
            if count >= report_probes {
                if let Some(best) = self.best_child(root) {
                    let score = self.pool.get(best).display_score(self.config.infinity);
                    let mv = self.pool.get(best).mv;
                    if mv != last_reported_move || (score - last_reported_score).abs() > 5.0 {
                        self.notify(game, root);
                        last_reported_move = mv;
                        last_reported_score = score;
                    }
                }
                report_probes = ((report_probes as f64) * UCT_REPORT_PROBES_GROWTH) as u64;
            }

            if !timer.is_aborted() || self.pool.get(root).count < UCT_MIN_PROBES {
                continue;
            }
            break;
        }

        self.notify(game, root);
        timer.disarm();
        self.best_child(root)
            .map(|h| self.pool.get(h).mv)
            .unwrap_or(NULL_MOVE)
    }

    fn notify(&mut self, game: &mut G, root: NodeHandle) {
        if self.consumers.is_empty() {
            return;
        }
        let report = extract_report(&self.pool, game, root, self.config.infinity);
        for consumer in &self.consumers {
            consumer.on_report(&report);
        }
    }

    /// Grows the tree by one simulation from `node`, returning the
    /// back-propagated value in `node`'s mover frame.
    fn expand(&mut self, game: &mut G, node: NodeHandle, depth: u32) -> f64 {
        if self.pool.get(node).terminal || depth == 0 {
            self.pool.get_mut(node).count += 1;
            return self.pool.get(node).score;
        }

        game.set_cursor(self.pool.get(node).cursor);
        let next = game.next_move();
        self.pool.get_mut(node).cursor = game.get_cursor();

        let (child, v) = if next != NULL_MOVE {
            if game.make_move(next).is_err() {
                self.pool.get_mut(node).count += 1;
                return self.pool.get(node).score;
            }
            let terminal = game.has_ended();
            let child = self
                .pool
                .alloc(pool::UctNode::new(
                    Some(node),
                    game.hash(),
                    next,
                    game.get_cursor(),
                ))
                .unwrap_or_else(|| {
                    // Arena exhausted mid-expansion: recycle the
                    // least-useful branch then retry the allocation.
                    self.force_prune_one(node);
                    self.pool
                        .alloc(pool::UctNode::new(Some(node), game.hash(), next, game.get_cursor()))
                        .expect("freed at least one slot")
                });
            self.pool.push_child(node, child);
            self.pool.get_mut(child).terminal = terminal;

            let (raw, pre_adjusted) = self.leaf_value(game, terminal, depth - 1);
            let turn = game.turn().sign();
            let signed = if pre_adjusted { raw } else { raw * turn };
            let v = -(signed as f64);
            self.pool.get_mut(child).init_score(-v);
            game.unmake_move();
            (child, v)
        } else {
            self.pool.get_mut(node).expanded = true;
            let b = self.bias_scale();
            let parent_count = self.pool.get(node).count;
            let chosen = self
                .pool
                .children(node)
                .into_iter()
                .max_by(|&a, &b2| {
                    self.pool
                        .get(a)
                        .priority(parent_count, b)
                        .partial_cmp(&self.pool.get(b2).priority(parent_count, b))
                        .unwrap()
                })
                .expect("a fully expanded node has at least one child");
            game.make_move(self.pool.get(chosen).mv).ok();
            let v = -self.expand(game, chosen, depth - 1);
            game.unmake_move();
            (chosen, v)
        };

        let child_terminal = self.pool.get(child).terminal;
        let max_score = self.config.infinity as f64;
        if !child_terminal {
            self.pool.get_mut(node).update_score(v);
        } else if v == -max_score {
            self.pool.get_mut(node).settle_score(v);
        } else if v == max_score && self.pool.get(node).expanded {
            self.prove_score(node, v);
        } else {
            self.pool.get_mut(node).update_score(v);
        }

        v
    }

    /// `prove_score` (spec §4.3): promotes `node` to terminal if every
    /// child is terminal and mirrors `v`.
    fn prove_score(&mut self, node: NodeHandle, v: f64) {
        let children = self.pool.children(node);
        let all_mirror = !children.is_empty()
            && children
                .iter()
                .all(|&c| self.pool.get(c).terminal && self.pool.get(c).score == -v);
        if all_mirror {
            self.pool.get_mut(node).settle_score(v);
        } else {
            self.pool.get_mut(node).update_score(v);
        }
    }

    /// Memory-pressure pruning (spec §4.3): walk down always choosing
    /// the futile (lowest-score, expanded) sibling and detach its
    /// parent's children once the arena is close to full.
    fn prune_garbage(&mut self, _game: &mut G, root: NodeHandle) {
        let threshold = self.pool.capacity() / PRUNE_FREE_SLOTS_THRESHOLD_FRACTION.max(1);
        if self.pool.capacity() - self.pool.len() >= threshold {
            return;
        }
        for _ in 0..PRUNE_ITERATIONS {
            self.prune_one_walk(root);
        }
    }

    fn force_prune_one(&mut self, root: NodeHandle) {
        self.prune_one_walk(root);
    }

    fn prune_one_walk(&mut self, root: NodeHandle) {
        let mut current = root;
        loop {
            let children = self.pool.children(current);
            let futile = children
                .into_iter()
                .filter(|&c| self.pool.get(c).expanded)
                .min_by(|&a, &b| {
                    self.pool
                        .get(a)
                        .score
                        .partial_cmp(&self.pool.get(b).score)
                        .unwrap()
                });
            match futile {
                Some(next) => current = next,
                None => break,
            }
        }
        if current == root {
            return;
        }
        let parent = match self.pool.get(current).parent {
            Some(p) if p != root => p,
            _ => return,
        };
        let cursor = self.pool.get(parent).reset_cursor;
        if let Some(child) = self.pool.get(parent).child {
            self.pool.get_mut(parent).child = None;
            self.pool.free_subtree(child);
        }
        self.pool.get_mut(parent).expanded = false;
        self.pool.get_mut(parent).cursor = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mock::MockGame;

    #[test]
    fn converges_to_the_same_move_as_negamax() {
        let mut uct = UctEngine::<MockGame>::new();
        uct.set_depth(8);
        uct.set_move_time(2_000);

        let mut game = MockGame::new();
        let uct_move = uct.compute_best_move(&mut game);
        assert_ne!(uct_move, NULL_MOVE);
        assert_eq!(game.move_stack(), &[] as &[Move]);

        let mut negamax = crate::negamax::NegamaxEngine::<MockGame>::new();
        negamax.set_depth(8);
        let negamax_move = negamax.compute_best_move(&mut game);

        assert_eq!(uct_move, negamax_move);
    }

    #[test]
    fn tree_is_reused_across_moves() {
        let mut uct = UctEngine::<MockGame>::new();
        uct.set_depth(8);
        uct.set_move_time(500);
        let mut game = MockGame::new();

        let m1 = uct.compute_best_move(&mut game);
        game.make_move(m1).unwrap();
        assert!(uct.root.is_some());
        let m2 = uct.compute_best_move(&mut game);
        assert_ne!(m2, NULL_MOVE);
    }
}
