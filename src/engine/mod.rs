//! Job Engine - Concurrent Statistical Aggregation Core
//!
//! This module owns the fixed worker pool, its synchronization protocol
//! (submission, dispatch, graceful shutdown, active-job accounting) and the
//! aggregation algorithms the workers execute.
//!
//! # Architecture
//!
//! ```text
//! HTTP intake → JobEngine::submit()
//!     ↓
//! JobQueue (FIFO + admission latch + active counter, one mutex)
//!     ↓
//! Worker threads (fixed pool, block on dequeue)
//!     ↓
//! aggregate::run() (pure functions over the DatasetView)
//!     ↓
//! ResultStore::put(job_id, payload)
//! ```
//!
//! Shutdown closes admission and injects one sentinel per worker, so every
//! queued job still runs and every worker exits after draining its share.

pub mod aggregate;
pub mod job;
pub mod pool;
pub mod queue;

pub use aggregate::EngineError;
pub use job::{Job, JobId, JobKind, JobParams};
pub use pool::JobEngine;
pub use queue::{JobQueue, QueueTask};
