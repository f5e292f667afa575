//! Background finalize of built indexes.
//!
//! Once every chunk of an index is committed, the writer is handed to a
//! finalize task that force-merges the index and compares its document count
//! against the source row count. The tasks run on a small fixed pool so the
//! orchestrator can start building the next index right away; the process
//! collects every [`TaskHandle`] before declaring the run complete.

use crate::source::CatalogSource;
use musearch_core::{Error, IndexKind, Result};
use musearch_engine::IndexWriter;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

// ============================================================================
// Task handles
// ============================================================================

struct Slot<T> {
    value: Mutex<Option<Result<T>>>,
    ready: Condvar,
}

/// Result of one submitted task.
pub struct TaskHandle<T> {
    name: String,
    slot: Arc<Slot<T>>,
}

impl<T> TaskHandle<T> {
    /// Name the task was submitted under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.slot.value.lock().is_some()
    }

    /// Block until the task has finished and take its result.
    pub fn wait(self) -> Result<T> {
        let mut value = self.slot.value.lock();
        loop {
            if let Some(result) = value.take() {
                return result;
            }
            self.slot.ready.wait(&mut value);
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

type Job = Box<dyn FnOnce() + Send>;

struct SchedulerInner {
    queue: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
    queue_depth: AtomicUsize,
    active_tasks: AtomicUsize,
    tasks_completed: AtomicU64,
}

/// Scheduler metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks waiting in the queue.
    pub queue_depth: usize,
    /// Tasks currently running.
    pub active_tasks: usize,
    /// Tasks finished since the scheduler was created.
    pub tasks_completed: u64,
    /// Worker threads.
    pub worker_count: usize,
}

/// FIFO pool of finalize workers.
///
/// Workers are named `musearch-finalize-0`, `musearch-finalize-1`, ...
pub struct FinalizeScheduler {
    inner: Arc<SchedulerInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl FinalizeScheduler {
    /// Start `num_threads` workers.
    pub fn new(num_threads: usize) -> Result<Self> {
        let num_threads = num_threads.max(1);
        let inner = Arc::new(SchedulerInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            queue_depth: AtomicUsize::new(0),
            active_tasks: AtomicUsize::new(0),
            tasks_completed: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let inner_clone = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("musearch-finalize-{}", i))
                .spawn(move || worker_loop(&inner_clone))?;
            workers.push(handle);
        }

        Ok(Self {
            inner,
            workers: Mutex::new(workers),
            num_threads,
        })
    }

    /// Queue `work`; its result is delivered through the returned handle.
    ///
    /// A panicking task resolves its handle with an error instead of taking
    /// the worker down.
    pub fn submit<T, F>(&self, name: impl Into<String>, work: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let name = name.into();
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(Error::Engine(format!(
                "finalize scheduler is shut down, cannot run {}",
                name
            )));
        }

        let slot = Arc::new(Slot {
            value: Mutex::new(None),
            ready: Condvar::new(),
        });
        let task_slot = Arc::clone(&slot);
        let task_name = name.clone();
        let job: Job = Box::new(move || {
            let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(work)) {
                Ok(result) => result,
                Err(e) => {
                    let message = e
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| e.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "(non-string panic)".to_string());
                    error!(target: "musearch::build", task = %task_name, "Finalize task panicked: {}", message);
                    Err(Error::Engine(format!("{} panicked: {}", task_name, message)))
                }
            };
            *task_slot.value.lock() = Some(result);
            task_slot.ready.notify_all();
        });

        {
            let mut queue = self.inner.queue.lock();
            queue.push_back(job);
            self.inner.queue_depth.fetch_add(1, Ordering::Release);
        }
        self.inner.work_ready.notify_one();
        Ok(TaskHandle { name, slot })
    }

    /// Signal the workers to exit once the queue is empty and join them.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Return a snapshot of scheduler metrics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            active_tasks: self.inner.active_tasks.load(Ordering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

impl Drop for FinalizeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &SchedulerInner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.queue_depth.fetch_sub(1, Ordering::Release);
                    inner.active_tasks.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };
        job();
        inner.active_tasks.fetch_sub(1, Ordering::Release);
        inner.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Finalize
// ============================================================================

/// Outcome of finalizing one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Index name
    pub name: String,
    /// Indexable rows in the source up to the built max id
    pub db_rows: u64,
    /// Entity documents in the index, the meta document excluded
    pub index_docs: u64,
    /// Whether the force-merge succeeded
    pub merged: bool,
    /// Whether the document count matches the source
    pub ok: bool,
}

impl fmt::Display for FinalizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: db_rows={} index_docs={} merged={} {}",
            self.name,
            self.db_rows,
            self.index_docs,
            self.merged,
            if self.ok { "ok" } else { "MISMATCH" }
        )
    }
}

/// Merge the index and verify its document count against the source.
///
/// A count mismatch is reported, not returned as an error; a failed merge is
/// an error.
pub fn finalize_index(
    mut writer: Box<dyn IndexWriter>,
    source: &dyn CatalogSource,
    kind: IndexKind,
    max_id: u32,
) -> Result<FinalizeReport> {
    writer.force_merge()?;
    info!(target: "musearch::build", index = kind.name(), "Merged index");

    let index_docs = writer.num_docs().saturating_sub(1);
    let db_rows = source.row_count(kind, max_id)?;
    let ok = db_rows == index_docs;
    if ok {
        info!(
            target: "musearch::build",
            index = kind.name(),
            documents = index_docs,
            "Verified document count"
        );
    } else {
        warn!(
            target: "musearch::build",
            index = kind.name(),
            db_rows,
            index_docs,
            "Document count differs from source row count"
        );
    }
    Ok(FinalizeReport {
        name: kind.name().to_string(),
        db_rows,
        index_docs,
        merged: true,
        ok,
    })
}
