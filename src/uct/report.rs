//! Principal-variation extraction for UCT (C7, spec §4.4, UCT half).

use crate::cache::EntryFlag;
use crate::game::{Game, Score};
use crate::lifecycle::Report;

use super::pool::{NodeHandle, NodePool};

/// Follows the chain of best children (by display score) from `root`
/// until a node with no expanded children is reached.
pub fn extract_report<G: Game>(
    pool: &NodePool,
    game: &G,
    root: NodeHandle,
    max_score: Score,
) -> Report {
    let mut variation = Vec::new();
    let mut current = root;
    let mut first_score = 0.0_f64;
    let mut first_terminal = false;
    let mut first = true;

    loop {
        let children = pool.children(current);
        if children.is_empty() {
            break;
        }
        let best = children
            .into_iter()
            .max_by(|&a, &b| {
                pool.get(a)
                    .display_score(max_score)
                    .partial_cmp(&pool.get(b).display_score(max_score))
                    .unwrap()
            })
            .unwrap();

        if first {
            first_score = pool.get(best).score;
            first_terminal = pool.get(best).terminal;
            first = false;
        }

        variation.push(pool.get(best).mv);
        current = best;
        if pool.get(best).child.is_none() {
            break;
        }
    }

    Report {
        depth: variation.len() as u32,
        flag: if first_terminal {
            EntryFlag::Exact
        } else {
            EntryFlag::Empty
        },
        score: game.to_centipawns(first_score as i32),
        variation,
    }
}
