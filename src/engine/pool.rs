//! Fixed worker pool and the engine facade the intake layer talks to
//!
//! Workers are OS threads created once at startup and never respawned per
//! job. Each worker blocks on the dataset readiness latch, then loops:
//! dequeue, execute, persist, decrement the active counter. A dequeued
//! shutdown sentinel terminates exactly one worker.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;

use crate::dataset::{DatasetView, ReadyLatch};
use crate::store::ResultStore;

use super::aggregate::{self, error_payload};
use super::job::{JobId, JobKind, JobParams};
use super::queue::{JobQueue, QueueTask};

/// The job-processing engine: worker pool plus submission facade.
///
/// `submit` is fire and forget: it never blocks and never waits for the job
/// to finish. Results surface through the [`ResultStore`] under the returned
/// job id.
pub struct JobEngine {
    queue: Arc<JobQueue>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl JobEngine {
    /// Spawn the worker pool. Fails only at startup, when a worker thread
    /// cannot be created.
    pub fn start(
        dataset: Arc<DatasetView>,
        store: Arc<dyn ResultStore>,
        ready: Arc<ReadyLatch>,
        configured_workers: Option<usize>,
    ) -> io::Result<Self> {
        let worker_count = resolve_worker_count(configured_workers);
        let queue = Arc::new(JobQueue::new());

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let dataset = Arc::clone(&dataset);
            let store = Arc::clone(&store);
            let ready = Arc::clone(&ready);

            let handle = thread::Builder::new()
                .name(format!("statflow-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, queue, dataset, store, ready))?;
            workers.push(handle);
        }

        log::info!("job engine started with {} workers", worker_count);

        Ok(Self {
            queue,
            workers: Mutex::new(workers),
            worker_count,
        })
    }

    /// Enqueue an ordinary job and return its id, or `None` when admission
    /// is closed (the job is dropped; callers surface "shutting down").
    pub fn submit(&self, kind: JobKind, params: JobParams) -> Option<JobId> {
        match self.queue.admit(kind, params) {
            Some(id) => {
                log::debug!("job {} admitted: {}", id, kind);
                Some(id)
            }
            None => {
                log::debug!("rejected {} submission: admission closed", kind);
                None
            }
        }
    }

    /// Begin graceful shutdown: close admission and queue one sentinel per
    /// worker. Jobs already queued still execute; new submissions are
    /// dropped. Idempotent.
    pub fn shutdown(&self) {
        log::info!("shutdown requested, draining {} queued jobs", self.active_job_count());
        self.queue.begin_shutdown(self.worker_count);
    }

    /// Jobs admitted but not yet finished.
    pub fn active_job_count(&self) -> u64 {
        self.queue.active_jobs()
    }

    pub fn admission_open(&self) -> bool {
        self.queue.admission_open()
    }

    /// Highest job id handed out so far; 0 before the first submission.
    pub fn last_job_id(&self) -> JobId {
        self.queue.last_job_id()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Wait for every worker to consume its sentinel and exit. Only sensible
    /// after [`shutdown`](Self::shutdown).
    pub fn join(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }
}

/// Configured count clamped to available parallelism; default is the
/// host's available parallelism. Fixed for the lifetime of the pool.
fn resolve_worker_count(configured: Option<usize>) -> usize {
    let hardware = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match configured {
        Some(n) => n.clamp(1, hardware),
        None => hardware,
    }
}

fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    dataset: Arc<DatasetView>,
    store: Arc<dyn ResultStore>,
    ready: Arc<ReadyLatch>,
) {
    ready.wait();
    log::debug!("worker {} ready", worker_id);

    loop {
        match queue.dequeue() {
            QueueTask::Shutdown => {
                log::debug!("worker {} exiting", worker_id);
                break;
            }
            QueueTask::Job(job) => {
                let payload = match aggregate::run(&dataset, &job) {
                    Ok(payload) => payload,
                    Err(err) => {
                        log::warn!("job {} ({}) failed: {}", job.id, job.kind, err);
                        error_payload(&err)
                    }
                };

                persist_result(store.as_ref(), job.id, &payload);
                queue.finish_job();
            }
        }
    }
}

/// Persist a result with a short bounded retry so a transient store error
/// does not leave the job id "running" forever. If every attempt fails the
/// job still counts as finished; this is the one path where a finished job
/// has no result, and it is logged at error level.
fn persist_result(store: &dyn ResultStore, id: JobId, payload: &Value) {
    const PUT_ATTEMPTS: u32 = 3;
    let mut delay = Duration::from_millis(50);

    for attempt in 1..=PUT_ATTEMPTS {
        match store.put(id, payload) {
            Ok(()) => return,
            Err(err) if attempt < PUT_ATTEMPTS => {
                log::warn!(
                    "job {}: result write failed (attempt {} of {}): {}",
                    id,
                    attempt,
                    PUT_ATTEMPTS,
                    err
                );
                thread::sleep(delay);
                delay *= 2;
            }
            Err(err) => {
                log::error!(
                    "job {}: could not persist result after {} attempts: {}",
                    id,
                    PUT_ATTEMPTS,
                    err
                );
            }
        }
    }
}
