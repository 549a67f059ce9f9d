//! Bounded worker pool
//!
//! K tokio workers share an atomic cursor. Each worker loops "claim next index,
//! run the task, store the output in that index's slot" until the cursor runs
//! past the end, then exits on its own.
//!
//! ```text
//!   cursor ──fetch_add──► worker 0 ─┐
//!          ──fetch_add──► worker 1 ─┼─► slots[index] = task(index)
//!          ──fetch_add──► worker K ─┘
//! ```
//!
//! Guarantees:
//! - every index in `0..count` is claimed exactly once
//! - `output[i]` always belongs to index `i`, whatever the completion order
//! - one failing task never stops the pool or its worker (tasks are expected to
//!   catch their own errors; a panicking task leaves its slot `None` and the
//!   worker moves on to the next index)

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Clamp a requested concurrency to `[1, items]` (at least 1 even for no items).
pub fn effective_concurrency(requested: usize, items: usize) -> usize {
    requested.min(items).max(1)
}

/// Fixed-size pool of cursor-driven workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Pool sized for `items` units of work, capped at `requested` workers.
    pub fn new(requested: usize, items: usize) -> Self {
        Self {
            workers: effective_concurrency(requested, items),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task(i)` for every `i` in `0..count`, at most `workers` at a time.
    ///
    /// Returns one slot per index; a slot is `None` only if its task panicked.
    pub async fn run<T, F, Fut>(&self, count: usize, task: F) -> Vec<Option<T>>
    where
        T: Send + 'static,
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let cursor = Arc::new(AtomicUsize::new(0));
        let slots: Arc<Mutex<Vec<Option<T>>>> =
            Arc::new(Mutex::new((0..count).map(|_| None).collect()));
        let task = Arc::new(task);
        let mut join_set = JoinSet::new();

        for worker in 0..self.workers {
            let cursor = cursor.clone();
            let slots = slots.clone();
            let task = task.clone();

            join_set.spawn(async move {
                let mut processed = 0usize;
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= count {
                        break;
                    }
                    // Each claim runs in its own task so a panic stays with its index.
                    match tokio::spawn((*task)(index)).await {
                        Ok(output) => slots.lock().await[index] = Some(output),
                        Err(e) => warn!(worker, index, error = %e, "pool task panicked"),
                    }
                    processed += 1;
                }
                debug!(worker, processed, "worker finished");
            });
        }

        while let Some(res) = join_set.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "pool worker panicked");
            }
        }

        let mut slots = slots.lock().await;
        std::mem::take(&mut *slots)
    }
}
