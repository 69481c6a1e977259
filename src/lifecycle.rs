//! Search lifecycle machinery shared by both engines (C10, spec §4.6):
//! a move-time timer, a cooperative abort flag, and consumer reporting.
//! Negamax and UCT each embed a `SearchLifecycle` rather than inheriting
//! from a shared base class.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use crate::cache::EntryFlag;
use crate::game::Move;

/// Snapshot handed to consumers on every reportable change (spec §6.3).
/// Never a live reference into the search tree or transposition table.
#[derive(Debug, Clone)]
pub struct Report {
    pub depth: u32,
    pub flag: EntryFlag,
    pub score: i32,
    pub variation: Vec<Move>,
}

/// Receives `Report`s as a search makes progress. Implemented by
/// whatever UI or protocol layer drives the engine (UCI, a GUI, a
/// logger); this crate does not assume a transport.
pub trait Consumer {
    fn on_report(&self, report: &Report);
}

/// A `Consumer` that pushes every report through `tracing`, used when no
/// consumer is attached so progress is still observable in logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsumer;

impl Consumer for TracingConsumer {
    fn on_report(&self, report: &Report) {
        tracing::debug!(
            depth = report.depth,
            score = report.score,
            flag = ?report.flag,
            variation = ?report.variation,
            "search report"
        );
    }
}

/// The cooperative cancellation flag plus the scheduler thread that
/// flips it after `move_time` elapses (spec §4.6, §5).
///
/// `abort_computation` can also be called directly by an outer caller
/// that wants to cut a search short before its deadline.
pub struct SearchTimer {
    abort: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    cancel: Option<Sender<()>>,
}

impl SearchTimer {
    /// Arms a single-shot timer that sets the shared abort flag after
    /// `move_time`. The scheduler thread waits on a cancellation channel
    /// rather than sleeping outright, so `disarm` can wake it immediately
    /// when the search exits early (depth ceiling reached, terminal
    /// proven) instead of blocking for the rest of the move-time budget.
    pub fn arm(move_time: Duration, abort: Arc<AtomicBool>) -> Self {
        abort.store(false, Ordering::SeqCst);
        let flag = Arc::clone(&abort);
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            if cancel_rx.recv_timeout(move_time).is_err() {
                flag.store(true, Ordering::SeqCst);
            }
        });
        SearchTimer {
            abort,
            handle: Some(handle),
            cancel: Some(cancel_tx),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Forces the abort flag immediately (spec's `abort_computation`).
    pub fn abort_now(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Wakes the scheduler thread, joins it, and clears the abort flag,
    /// publishing its clearing under the engine's lock as the search loop
    /// returns (spec: "briefly re-enters the engine's lock to publish its
    /// clearing after the search loop exits").
    pub fn disarm(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.abort.store(false, Ordering::SeqCst);
    }
}

/// A fresh, cleared abort flag an engine owns for its whole lifetime and
/// hands to each `SearchTimer::arm` call.
pub fn new_abort_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timer_sets_flag_after_duration() {
        let abort = new_abort_flag();
        let timer = SearchTimer::arm(Duration::from_millis(20), Arc::clone(&abort));
        assert!(!timer.is_aborted());
        thread::sleep(Duration::from_millis(80));
        assert!(timer.is_aborted());
        timer.disarm();
        assert!(!abort.load(Ordering::SeqCst));
    }

    #[test]
    fn abort_now_is_immediate() {
        let abort = new_abort_flag();
        let timer = SearchTimer::arm(Duration::from_secs(60), Arc::clone(&abort));
        timer.abort_now();
        assert!(timer.is_aborted());
    }
}
