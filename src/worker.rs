//! Bounded background job queue and worker pool.
//!
//! Analysis jobs flow through a bounded channel consumed by a fixed set
//! of workers; each worker finishes one job fully before taking the next,
//! which bounds concurrent filesystem, network, and generation load. A
//! started job cannot be cancelled.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{mpsc, Mutex};

use crate::config::Config;
use crate::pipeline;

/// Sending half of the job queue, shared with the HTTP layer.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<String>,
}

/// The queue is at capacity; no job row was created for the request.
#[derive(Debug)]
pub struct QueueFull;

impl std::fmt::Display for QueueFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("job queue is at capacity")
    }
}

impl std::error::Error for QueueFull {}

/// A reserved queue slot. The caller creates the job row first and sends
/// its id afterwards; dropping an unused slot releases the capacity.
pub struct QueueSlot {
    permit: mpsc::OwnedPermit<String>,
}

impl QueueSlot {
    pub fn send(self, job_id: String) {
        let _ = self.permit.send(job_id);
    }
}

impl JobQueue {
    /// Reserve a slot before creating the job row, so a full queue
    /// rejects the request cleanly instead of stranding a PENDING job
    /// that no worker will ever pick up.
    pub fn try_reserve(&self) -> Result<QueueSlot, QueueFull> {
        match self.tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot { permit }),
            Err(_) => Err(QueueFull),
        }
    }
}

/// Spawn the worker pool and return the queue handle. Workers run for the
/// life of the process and exit when the queue closes.
pub fn start(config: Arc<Config>, pool: SqlitePool) -> JobQueue {
    let (tx, rx) = mpsc::channel::<String>(config.queue.capacity);
    let rx = Arc::new(Mutex::new(rx));

    for n in 0..config.queue.workers {
        let rx = Arc::clone(&rx);
        let config = Arc::clone(&config);
        let pool = pool.clone();

        tokio::spawn(async move {
            loop {
                // Hold the lock only while waiting for the next id, so
                // other workers can take jobs while this one processes.
                let job_id = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                let Some(job_id) = job_id else { break };

                println!("worker {}: job {} started", n, job_id);
                pipeline::run_job(&config, &pool, &job_id).await;
                println!("worker {}: job {} finished", n, job_id);
            }
        });
    }

    JobQueue { tx }
}
