//! Work queue and the single worker that drains it.
//!
//! Jobs are base names pushed over an unbounded FIFO channel. A pending
//! set deduplicates base names that are queued but not yet picked up; a
//! name enqueued again while its job is mid-flight is accepted, since the
//! completion flags decide what actually reruns.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::steps::Pipeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMessage {
    Job(String),
    /// Graceful-shutdown sentinel; the worker finishes everything queued
    /// before it and then exits.
    Shutdown,
}

/// Cloneable producer handle shared by the watchers and the CLI.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<QueueMessage>,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl WorkQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            pending: Arc::new(Mutex::new(HashSet::new())),
        };
        (queue, rx)
    }

    /// Enqueue a job. Returns false when the base name is already queued
    /// and waiting; the queued run will pick up the current record anyway.
    pub fn enqueue(&self, base: &str) -> bool {
        {
            let mut pending = self.pending.lock().unwrap();
            if !pending.insert(base.to_string()) {
                debug!("[{}] Already queued, not enqueueing again", base);
                return false;
            }
        }
        info!("[{}] Enqueued", base);
        if self.tx.send(QueueMessage::Job(base.to_string())).is_err() {
            error!("[{}] Worker is gone, dropping job", base);
            return false;
        }
        true
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(QueueMessage::Shutdown);
    }

    fn take_pending(&self, base: &str) {
        self.pending.lock().unwrap().remove(base);
    }
}

/// Worker loop: drains the queue sequentially. Errors are contained per
/// job; nothing that happens while processing one base name stops the
/// loop itself.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<QueueMessage>,
    queue: WorkQueue,
    pipeline: Pipeline,
) {
    info!("Worker started");
    while let Some(message) = rx.recv().await {
        match message {
            QueueMessage::Shutdown => {
                info!("Worker received shutdown signal");
                break;
            }
            QueueMessage::Job(base) => {
                // Picked up: a fresh edit arriving from here on must be
                // allowed to queue the job again.
                queue.take_pending(&base);
                if let Err(e) = pipeline.process_job(&base).await {
                    error!("[{}] Pipeline failed: {}", base, e);
                }
            }
        }
    }
    info!("Worker stopped");
}
