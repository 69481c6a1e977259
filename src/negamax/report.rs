//! Principal-variation extraction for Negamax (C7, spec §4.4).

use crate::cache::{EntryFlag, TranspositionTable};
use crate::game::{Game, Move, NULL_MOVE};
use crate::lifecycle::Report;

/// Walks the transposition table from `best_move` onward, building the
/// PV the engine just searched. Makes and unmakes moves on `game` as it
/// goes, restoring the position before returning.
pub fn extract_report<G: Game>(
    cache: &mut TranspositionTable,
    game: &mut G,
    best_move: Move,
) -> Report {
    let mut variation = vec![best_move];
    let mut made = 0usize;
    let mut flag = EntryFlag::Empty;
    let mut depth = 0u32;
    let mut score = 0i32;

    if game.make_move(best_move).is_ok() {
        made += 1;
        if cache.find(game.hash()) {
            flag = cache.get_flag();
            depth = 1 + cache.get_depth() as u32;
            score = -game.to_centipawns(cache.get_score());
        }

        loop {
            if game.has_ended() {
                break;
            }
            if !cache.find(game.hash()) {
                break;
            }
            if cache.get_flag() != EntryFlag::Exact {
                break;
            }
            let m = cache.get_move();
            if m == NULL_MOVE {
                break;
            }
            if game.make_move(m).is_err() {
                break;
            }
            made += 1;
            variation.push(m);
        }
    }

    for _ in 0..made {
        game.unmake_move();
    }

    Report {
        depth,
        flag,
        score,
        variation,
    }
}
