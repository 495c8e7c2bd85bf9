//! Job queue, admission control and active-job accounting
//!
//! All shared mutable state of the engine lives behind one mutex: the FIFO
//! task list, the admission latch, the active-job counter and the id
//! allocator. The condvar is the counting wake-up signal, notified once per
//! enqueued item (sentinels included) and consumed once per dequeue, so
//! blocking and depth stay consistent under concurrent submission.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::job::{Job, JobId, JobKind, JobParams};

/// Item a worker pulls off the queue: an ordinary job or its own
/// termination sentinel.
#[derive(Debug, Clone)]
pub enum QueueTask {
    Job(Job),
    Shutdown,
}

struct QueueInner {
    tasks: VecDeque<QueueTask>,
    admission_open: bool,
    active_jobs: u64,
    next_id: JobId,
}

pub struct JobQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                tasks: VecDeque::new(),
                admission_open: true,
                active_jobs: 0,
                next_id: 1,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // A worker panicking mid-job must not wedge the rest of the pool
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit an ordinary job: assign the next id, append it to the tail and
    /// bump the active counter. Returns `None` without side effects when
    /// admission is closed.
    pub fn admit(&self, kind: JobKind, params: JobParams) -> Option<JobId> {
        let mut inner = self.lock();
        if !inner.admission_open {
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.active_jobs += 1;
        inner.tasks.push_back(QueueTask::Job(Job { id, kind, params }));
        self.available.notify_one();
        Some(id)
    }

    /// Shutdown transition: enqueue exactly one sentinel per worker, then
    /// close admission. Runs under the queue mutex, so no ordinary job can
    /// be admitted once the transition begins. Idempotent.
    pub fn begin_shutdown(&self, worker_count: usize) {
        let mut inner = self.lock();
        if !inner.admission_open {
            return;
        }

        for _ in 0..worker_count {
            inner.tasks.push_back(QueueTask::Shutdown);
            self.available.notify_one();
        }
        inner.admission_open = false;
    }

    /// Block until an item is available, then remove and return the head.
    pub fn dequeue(&self) -> QueueTask {
        let mut inner = self.lock();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                return task;
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Mark one dequeued job as finished (its result has been stored).
    pub fn finish_job(&self) {
        let mut inner = self.lock();
        debug_assert!(inner.active_jobs > 0, "finish_job without matching admit");
        inner.active_jobs = inner.active_jobs.saturating_sub(1);
    }

    /// Jobs admitted but not yet finished.
    pub fn active_jobs(&self) -> u64 {
        self.lock().active_jobs
    }

    pub fn admission_open(&self) -> bool {
        self.lock().admission_open
    }

    /// Highest id handed out so far; 0 before the first admission.
    pub fn last_job_id(&self) -> JobId {
        self.lock().next_id - 1
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.lock().tasks.len()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn params() -> JobParams {
        JobParams::question("Q")
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let queue = JobQueue::new();
        assert_eq!(queue.last_job_id(), 0);
        assert_eq!(queue.admit(JobKind::StatesMean, params()), Some(1));
        assert_eq!(queue.admit(JobKind::GlobalMean, params()), Some(2));
        assert_eq!(queue.admit(JobKind::Best5, params()), Some(3));
        assert_eq!(queue.last_job_id(), 3);
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let queue = JobQueue::new();
        queue.admit(JobKind::StatesMean, params());
        queue.admit(JobKind::GlobalMean, params());

        match queue.dequeue() {
            QueueTask::Job(job) => assert_eq!(job.id, 1),
            QueueTask::Shutdown => panic!("unexpected sentinel"),
        }
        match queue.dequeue() {
            QueueTask::Job(job) => assert_eq!(job.id, 2),
            QueueTask::Shutdown => panic!("unexpected sentinel"),
        }
    }

    #[test]
    fn test_shutdown_closes_admission_and_queues_sentinels() {
        let queue = JobQueue::new();
        queue.admit(JobKind::StatesMean, params());
        queue.begin_shutdown(3);

        assert!(!queue.admission_open());
        assert_eq!(queue.admit(JobKind::StatesMean, params()), None);
        // Rejected admission allocates no id and leaves the counter alone
        assert_eq!(queue.last_job_id(), 1);
        assert_eq!(queue.active_jobs(), 1);
        // Job queued before shutdown is still there, followed by sentinels
        assert_eq!(queue.depth(), 4);
        assert!(matches!(queue.dequeue(), QueueTask::Job(_)));
        for _ in 0..3 {
            assert!(matches!(queue.dequeue(), QueueTask::Shutdown));
        }
    }

    #[test]
    fn test_begin_shutdown_is_idempotent() {
        let queue = JobQueue::new();
        queue.begin_shutdown(2);
        queue.begin_shutdown(2);
        assert_eq!(queue.depth(), 2);
    }

    #[test]
    fn test_active_counter_tracks_finishes() {
        let queue = JobQueue::new();
        queue.admit(JobKind::StatesMean, params());
        queue.admit(JobKind::StatesMean, params());
        assert_eq!(queue.active_jobs(), 2);

        queue.dequeue();
        // Dequeue alone does not finish the job
        assert_eq!(queue.active_jobs(), 2);

        queue.finish_job();
        queue.finish_job();
        assert_eq!(queue.active_jobs(), 0);
    }

    #[test]
    fn test_dequeue_blocks_until_enqueue() {
        let queue = Arc::new(JobQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };

        // Give the consumer a chance to park on the condvar
        thread::sleep(std::time::Duration::from_millis(50));
        queue.admit(JobKind::GlobalMean, params());

        match consumer.join().unwrap() {
            QueueTask::Job(job) => assert_eq!(job.kind, JobKind::GlobalMean),
            QueueTask::Shutdown => panic!("unexpected sentinel"),
        }
    }

    #[test]
    fn test_concurrent_admission_has_no_id_gaps() {
        let queue = Arc::new(JobQueue::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..50 {
                    if let Some(id) = queue.admit(JobKind::StatesMean, params()) {
                        ids.push(id);
                    }
                }
                ids
            }));
        }

        let mut all_ids: Vec<JobId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all_ids.sort_unstable();

        let expected: Vec<JobId> = (1..=400).collect();
        assert_eq!(all_ids, expected);
    }
}
