//! Asynchronous book-building UCT (C9, spec §4.5): a persistent tree
//! grown by a single orchestrator and evaluated by a bounded worker
//! pool, all mutations serialized through one lock (spec §5: "the DOE
//! tree is guarded by a single mutex; every read/modify/commit sequence
//! takes the lock").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{DoeConfig, UCT_DEFAULT_BIAS, UCT_MAX_DEPTH};
use crate::error::EngineError;
use crate::game::{Game, Move, Score, DRAW};
use crate::lifecycle::{new_abort_flag, Consumer, Report};

use super::node::DoeNode;
use super::pool::WorkerPool;
use super::store::Store;

/// Scores a leaf position identified only by its move path — this is
/// what lets evaluation run on a worker thread without sharing the
/// live game object.
pub type Scorer = Arc<dyn Fn(&[Move]) -> Score + Send + Sync>;

pub struct DoeEngine<S: Store + Send + 'static> {
    state: Arc<Mutex<S>>,
    pool: Option<WorkerPool>,
    pool_size: usize,
    config: DoeConfig,
    abort: Arc<AtomicBool>,
    consumers: Vec<Arc<dyn Consumer + Send + Sync>>,
    evaluations_done: Arc<AtomicU64>,
}

impl<S: Store + Send + 'static> DoeEngine<S> {
    /// `config.pool_size` of `None` resolves to `2 x cores`, matching the
    /// worker pool's documented default (spec §4.5).
    pub fn new(store: S, config: DoeConfig) -> Self {
        let pool_size = config.pool_size.unwrap_or_else(|| num_cpus::get() * 2).max(1);
        DoeEngine {
            state: Arc::new(Mutex::new(store)),
            pool: None,
            pool_size,
            config,
            abort: new_abort_flag(),
            consumers: Vec::new(),
            evaluations_done: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn attach_consumer(&mut self, consumer: Arc<dyn Consumer + Send + Sync>) {
        self.consumers.push(consumer);
    }

    pub fn abort_computation(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    fn outcome_or_contempt<G: Game>(game: &G) -> Score {
        let outcome = game.outcome();
        if outcome == DRAW {
            game.contempt()
        } else {
            outcome
        }
    }

    fn leaf_score<G: Game>(game: &mut G, terminal: bool) -> Score {
        if terminal {
            Self::outcome_or_contempt(game)
        } else {
            let raw = game.score();
            if raw == DRAW {
                game.contempt()
            } else {
                raw
            }
        }
    }

    /// Runs `size` expansion rounds of the persistent tree rooted at
    /// `game`'s current position, submitting new leaves to the worker
    /// pool for asynchronous scoring via `scorer`.
    pub fn train_engine<G: Game>(
        &mut self,
        size: usize,
        game: &mut G,
        scorer: Scorer,
    ) -> Result<(), EngineError> {
        let _ = game.ensure_capacity(UCT_MAX_DEPTH as usize + game.length());
        self.abort.store(false, Ordering::SeqCst);
        self.pool = Some(WorkerPool::new(self.pool_size));

        {
            let mut store = self.state.lock().expect("doe lock poisoned");
            if store.contains(1)? {
                let root = store.read(1)?.ok_or_else(|| {
                    EngineError::StoreFailure("root reported present but missing".into())
                })?;
                if root.hash != game.hash() {
                    return Err(EngineError::IllegalPosition(
                        "existing opening book root does not match the given position".into(),
                    ));
                }
            } else {
                let root = DoeNode::root(game.hash(), game.turn(), game.get_cursor());
                store.write(&root)?;
            }
            store.commit()?;
        }

        // Recovery: anything left un-evaluated by a prior run gets
        // re-enqueued before fresh expansion starts. The store lock must
        // be released first — `submit_evaluation`'s jobs re-lock the
        // store themselves, and `submit` blocks once the pool is
        // saturated, which would deadlock against a lock held here.
        let pending = {
            let mut store = self.state.lock().expect("doe lock poisoned");
            store
                .values()?
                .into_iter()
                .filter(|node| !node.evaluated && node.id != 1)
                .collect::<Vec<_>>()
        };
        for node in pending {
            self.submit_evaluation(node, Arc::clone(&scorer));
        }

        for _ in 0..size {
            if self.abort.load(Ordering::SeqCst) {
                break;
            }
            let returned = {
                let mut store = self.state.lock().expect("doe lock poisoned");
                let expanded = self.expand(&mut *store, game, 1)?;
                for node in &expanded {
                    if node.id != 1 {
                        let v = -node.score;
                        Self::backpropagate(&mut *store, node.clone(), v)?;
                    }
                }
                store.commit()?;
                expanded
            };

            for node in returned {
                if node.id == 1 {
                    continue;
                }
                if node.evaluated {
                    continue;
                }
                self.submit_evaluation(node, Arc::clone(&scorer));
            }
        }

        if let Some(pool) = self.pool.take() {
            pool.shutdown(Duration::from_secs(self.config.shutdown_timeout_secs));
        }
        Ok(())
    }

    fn submit_evaluation(&self, node: DoeNode, scorer: Scorer) {
        let state = Arc::clone(&self.state);
        let consumers = self.consumers.clone();
        let counter = Arc::clone(&self.evaluations_done);
        let report_every = self.config.report_every.max(1);
        let node_id = node.id;
        let node_moves = node.moves.clone();

        let Some(pool) = &self.pool else { return };
        pool.submit(move || {
            let s = scorer(&node_moves) as f64;
            let mut store = state.lock().expect("doe lock poisoned");
            if let Ok(Some(mut n)) = store.read(node_id) {
                n.evaluated = true;
                n.init_score(s);
                let _ = store.write(&n);
                let _ = Self::backpropagate(&mut *store, n.clone(), -n.score);
                let _ = store.commit();
            }
            drop(store);

            let done = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if done % report_every == 0 && !consumers.is_empty() {
                let report = Report {
                    depth: node_moves.len() as u32,
                    flag: crate::cache::EntryFlag::Empty,
                    score: s as i32,
                    variation: node_moves.clone(),
                };
                for c in &consumers {
                    c.on_report(&report);
                }
            }
        });
    }

    fn backpropagate(store: &mut S, mut node: DoeNode, mut v: f64) -> Result<(), EngineError> {
        loop {
            let parent_id = match node.parent {
                Some(p) => p,
                None => break,
            };
            let mut parent = store
                .read(parent_id)?
                .ok_or_else(|| EngineError::StoreFailure("missing parent node".into()))?;
            parent.update_score(v);
            store.write(&parent)?;
            v = -parent.score;
            node = parent;
        }
        Ok(())
    }

    fn priority(child: &DoeNode, parent_count: u64, bias: f64) -> f64 {
        if child.count == 0 {
            return f64::INFINITY;
        }
        (parent_count.max(1) as f64).ln().max(0.0).sqrt() / (child.count as f64).sqrt() * bias
            + child.score
    }

    /// Spec's DOE `expand`: descends from `node_id` through already fully
    /// expanded nodes by UCB1 priority, then either returns the single
    /// terminal/depth-exhausted node it lands on, or appends and returns
    /// every child of the first frontier node it reaches (§4.5 adopts the
    /// "all children at once" variant for `train_engine`).
    fn expand<G: Game>(
        &self,
        store: &mut S,
        game: &mut G,
        node_id: u64,
    ) -> Result<Vec<DoeNode>, EngineError> {
        let root = store
            .read(node_id)?
            .ok_or_else(|| EngineError::StoreFailure("missing node".into()))?;
        for &m in &root.moves {
            game.make_move(m).map_err(|_| {
                EngineError::StoreFailure("stored move path is no longer legal".into())
            })?;
        }

        let mut current = root.clone();
        let mut descended = 0usize;
        let result = loop {
            let depth_remaining = UCT_MAX_DEPTH.saturating_sub(current.moves.len() as u32);
            if current.terminal || depth_remaining == 0 {
                break Ok(vec![current]);
            }

            if !current.expanded {
                break self.expand_frontier(store, game, current);
            }

            let children = current
                .children
                .iter()
                .map(|&id| store.read(id))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();
            if children.is_empty() {
                break Ok(vec![current]);
            }
            let bias = UCT_DEFAULT_BIAS * 30_000.0;
            let chosen = children
                .into_iter()
                .max_by(|a, b| {
                    Self::priority(a, current.count, bias)
                        .partial_cmp(&Self::priority(b, current.count, bias))
                        .unwrap()
                })
                .unwrap();
            if game.make_move(chosen.mv).is_err() {
                break Ok(vec![current]);
            }
            descended += 1;
            current = chosen;
        };

        for _ in 0..(root.moves.len() + descended) {
            game.unmake_move();
        }
        result
    }

    /// `node` has never been expanded: generate and persist every legal
    /// child in one step, matching the "all children at once" variant.
    fn expand_frontier<G: Game>(
        &self,
        store: &mut S,
        game: &mut G,
        mut parent: DoeNode,
    ) -> Result<Vec<DoeNode>, EngineError> {
        let legal_moves = game.legal_moves();
        let mut new_children = Vec::with_capacity(legal_moves.len());
        for m in legal_moves {
            if game.make_move(m).is_err() {
                continue;
            }
            let terminal = game.has_ended();
            let turn = game.turn().sign();
            let raw = Self::leaf_score(game, terminal);
            let score = -(raw * turn) as f64;
            let mut path = parent.moves.clone();
            path.push(m);
            let mut child = DoeNode::child(parent.id, path, m, game.hash(), game.turn());
            child.terminal = terminal;
            child.evaluated = terminal;
            child.init_score(score);
            let id = store.write(&child)?;
            child.id = id;
            parent.children.push(id);
            new_children.push(child);
            game.unmake_move();
        }
        parent.expanded = true;
        store.write(&parent)?;
        Ok(new_children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoeConfig;
    use crate::doe::store::SqliteStore;
    use crate::game::mock::MockGame;
    use std::path::Path;

    #[test]
    fn train_engine_persists_evaluated_leaves() {
        let store = SqliteStore::open(Path::new(":memory:")).unwrap();
        let mut engine = DoeEngine::new(store, DoeConfig::default());
        let mut game = MockGame::new();
        let scorer: Scorer = Arc::new(|moves: &[Move]| moves.iter().sum::<i32>());

        engine.train_engine(5, &mut game, scorer).unwrap();
        assert_eq!(game.move_stack(), &[] as &[Move]);
    }
}
