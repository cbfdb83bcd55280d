//! Fixed-size pool of worker threads draining one FIFO task queue.
//!
//! Work is tracked by a pending counter that is bumped on submission and
//! dropped after a task finishes, so [`TaskScheduler::await_idle`] also covers
//! tasks submitted by other tasks while the wait is in progress.

use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

struct State {
    queue: VecDeque<Task>,
    pending: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    idle: Condvar,
}

impl Shared {
    fn submit(&self, task: Task) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(Error::SchedulerShutdown);
        }
        state.pending += 1;
        state.queue.push_back(task);
        drop(state);
        self.work_ready.notify_one();
        Ok(())
    }
}

pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

/// Cloneable submission handle, for tasks that queue follow-up work on the
/// pool running them.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.shared.submit(Box::new(task))
    }
}

impl TaskScheduler {
    /// Starts `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self> {
        let count = workers.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State { queue: VecDeque::new(), pending: 0, shutdown: false }),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
        });
        // Dropping a partially started pool on error stops the threads already running.
        let mut scheduler = Self { shared, workers: Vec::with_capacity(count) };
        for id in 0..count {
            let shared = Arc::clone(&scheduler.shared);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker_loop(&shared))
                .map_err(Error::Spawn)?;
            scheduler.workers.push(handle);
        }
        debug!(workers = count, "task scheduler started");
        Ok(scheduler)
    }

    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.shared.submit(Box::new(task))
    }

    pub fn handle(&self) -> SchedulerHandle { SchedulerHandle { shared: Arc::clone(&self.shared) } }

    /// Blocks until every submitted task, including ones queued by running
    /// tasks, has finished. Must not be called from inside a task.
    pub fn await_idle(&self) {
        let mut state = self.shared.state.lock();
        while state.pending > 0 {
            self.shared.idle.wait(&mut state);
        }
    }

    /// Stops the workers once their current task is done. Queued tasks that
    /// have not started are dropped. Later submissions are rejected.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        let dropped = std::mem::take(&mut state.queue);
        state.pending -= dropped.len();
        let idle = state.pending == 0;
        drop(state);

        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "discarding queued tasks on shutdown");
        }
        drop(dropped);
        self.shared.work_ready.notify_all();
        if idle {
            self.shared.idle.notify_all();
        }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize { self.workers.len() }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize { self.shared.state.lock().pending }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && !state.shutdown {
                shared.work_ready.wait(&mut state);
            }
            if state.shutdown {
                break;
            }
            match state.queue.pop_front() {
                Some(task) => task,
                None => continue,
            }
        };

        run(task);

        let mut state = shared.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            shared.idle.notify_all();
        }
    }
    trace!("worker exiting");
}

fn run(task: Task) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(task));
    let current = thread::current();
    let worker = current.name().unwrap_or("worker");
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(worker, "task failed: {err:#}"),
        Err(payload) => error!(worker, "task panicked: {}", panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn panic_payloads_are_readable() {
        let literal = panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        assert_eq!(panic_message(literal.as_ref()), "kaboom");
        let formatted = panic::catch_unwind(|| panic!("bad page {}", 7)).unwrap_err();
        assert_eq!(panic_message(formatted.as_ref()), "bad page 7");
        let other = panic::catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(panic_message(other.as_ref()), "non-string payload");
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let scheduler = TaskScheduler::new(0).unwrap();
        assert_eq!(scheduler.size(), 1);
    }

    #[test]
    fn failing_task_does_not_kill_the_worker() {
        let scheduler = TaskScheduler::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        scheduler.submit(|| Err(anyhow::anyhow!("boom"))).unwrap();
        scheduler.submit(|| panic!("kaboom")).unwrap();
        let counter = Arc::clone(&done);
        scheduler
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        scheduler.await_idle();
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let scheduler = TaskScheduler::new(2).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        let err = scheduler.submit(|| Ok(())).unwrap_err();
        assert!(matches!(err, Error::SchedulerShutdown));
        assert_eq!(scheduler.pending(), 0);
        scheduler.await_idle();
    }
}
