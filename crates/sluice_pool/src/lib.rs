//! Bounded worker pool for Sluice.
//!
//! `run_parallel` executes a batch of tasks across at most `concurrency`
//! worker threads pulling from a shared queue. The first task to fail sets a
//! shared cancellation flag: workers stop picking up queued tasks, but tasks
//! already running are not preempted. Only the first error is returned;
//! later ones are discarded.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Cooperative cancellation flag shared by all workers of one pool run.
///
/// Long-running tasks may poll [`Cancellation::is_cancelled`] to bail out
/// early; the pool itself only consults it between tasks.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A unit of work executed by the pool.
///
/// Tasks may borrow from the caller's stack; workers run inside a
/// [`std::thread::scope`] bounded by the `run_parallel` call.
pub type Task<'a> = Box<dyn FnOnce(&Cancellation) -> Result<()> + Send + 'a>;

/// Auto-selected worker count: hardware parallelism clamped to [2, 8].
fn auto_concurrency() -> usize {
    thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
        .clamp(2, 8)
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking task poisons the queue/error mutexes; the data is still
    // usable for the remaining control flow.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run `tasks` with up to `concurrency` workers.
///
/// `concurrency == 0` auto-selects based on available hardware parallelism;
/// the worker count is never larger than the number of tasks. An empty batch
/// returns `Ok(())` without spawning any workers.
pub fn run_parallel(concurrency: usize, tasks: Vec<Task<'_>>) -> Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }

    let workers = if concurrency == 0 {
        auto_concurrency()
    } else {
        concurrency
    }
    .min(tasks.len());

    let cancel = Cancellation::new();
    let queue: Mutex<VecDeque<Task<'_>>> = Mutex::new(tasks.into());
    let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            let cancel = &cancel;
            let queue = &queue;
            let first_error = &first_error;
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    return;
                }
                let task = match lock_ignore_poison(queue).pop_front() {
                    Some(task) => task,
                    None => return,
                };
                if let Err(err) = task(cancel) {
                    let mut slot = lock_ignore_poison(first_error);
                    if slot.is_none() {
                        *slot = Some(err);
                        cancel.cancel();
                    }
                    return;
                }
            });
        }
    });

    let first_error = lock_ignore_poison(&first_error).take();
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
