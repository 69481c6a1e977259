//! Tiny non-interactive demo wiring the two search engines to `MockGame`.
//! Real games, CLI parsing, and UCI plumbing are external to this crate
//! (spec Non-goals); this binary exists only to exercise the public API
//! end to end.

use std::sync::Arc;

use negauct::game::mock::MockGame;
use negauct::lifecycle::TracingConsumer;
use negauct::prelude::*;

fn main() {
    tracing_subscriber::fmt::init();

    let mut game = MockGame::new();

    let mut negamax = NegamaxEngine::<MockGame>::new();
    negamax.attach_consumer(Arc::new(TracingConsumer));
    negamax.set_depth(6);
    let negamax_move = negamax.compute_best_move(&mut game);
    tracing::info!(?negamax_move, "negamax chose a move");

    let mut uct = UctEngine::<MockGame>::new();
    uct.attach_consumer(Arc::new(TracingConsumer));
    uct.set_move_time(500);
    let uct_move = uct.compute_best_move(&mut game);
    tracing::info!(?uct_move, "uct chose a move");
}
