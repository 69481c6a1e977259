//! The DOE worker pool (spec §4.5/§5): a bounded pool of evaluator
//! threads whose `submit` blocks once `pool_size` tasks are in flight,
//! implemented as a permit channel pre-loaded with `pool_size` tokens
//! rather than a dedicated semaphore type.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send>;

pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` persistent worker threads. `size` defaults to
    /// `2 x cores` at the call site (spec §4.5) since `num_cpus::get()`
    /// cannot appear in a `const` default.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (job_tx, job_rx) = unbounded::<Job>();
        let (permit_tx, permit_rx) = bounded::<()>(size);
        for _ in 0..size {
            permit_tx.send(()).expect("fresh channel never disconnects");
        }

        let handles = (0..size)
            .map(|_| {
                let job_rx: Receiver<Job> = job_rx.clone();
                thread::spawn(move || {
                    for job in job_rx.iter() {
                        job();
                    }
                })
            })
            .collect();

        WorkerPool {
            job_tx: Some(job_tx),
            permit_tx,
            permit_rx,
            handles,
        }
    }

    /// Blocks until a permit is free, then dispatches `job` to the pool.
    /// The permit is returned to the pool when `job` finishes, so at
    /// most `size` jobs are ever in flight at once.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
        self.permit_rx
            .recv()
            .expect("pool outlives every submit call");
        let permit_tx = self.permit_tx.clone();
        let wrapped = move || {
            job();
            let _ = permit_tx.send(());
        };
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(Box::new(wrapped));
        }
    }

    /// Stops accepting new jobs and waits up to `timeout` for in-flight
    /// work to drain. There is no safe way to force-kill a running
    /// native thread, so past the timeout this just stops waiting and
    /// logs a warning; the worker threads are abandoned to finish or be
    /// reclaimed when the process exits.
    pub fn shutdown(mut self, timeout: Duration) {
        self.job_tx.take();
        let (done_tx, done_rx) = bounded::<()>(1);
        let handles = std::mem::take(&mut self.handles);
        thread::spawn(move || {
            for handle in handles {
                let _ = handle.join();
            }
            let _ = done_tx.send(());
        });
        if done_rx.recv_timeout(timeout).is_err() {
            tracing::warn!(
                ?timeout,
                "worker pool did not drain in time; abandoning remaining tasks"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn submits_run_and_drain_on_shutdown() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown(Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }
}
