//! Fixed-size worker pool over a bounded queue.
//!
//! Submission never waits: when the queue is full the job is dropped and
//! the caller gets [`SubmitError::QueueFull`]. Workers check for shutdown
//! between jobs and always finish the job they hold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::WorkerSettings;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SubmitError;

#[async_trait]
pub trait JobHandler<J>: Send + Sync + 'static {
    async fn handle(&self, job: J);
}

pub struct WorkerPool<J> {
    sender: mpsc::Sender<J>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl<J: Send + 'static> WorkerPool<J> {
    pub fn start(
        settings: &WorkerSettings,
        handler: Arc<dyn JobHandler<J>>,
        cancel: CancellationToken,
    ) -> Self {
        let count = settings.count.max(1);
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    receiver.clone(),
                    handler.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!(
            workers = count,
            queue_capacity = settings.queue_capacity.max(1),
            "Worker pool started"
        );
        Self {
            sender,
            workers,
            cancel,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue `job` without waiting.
    pub fn submit(&self, job: J) -> Result<(), SubmitError> {
        if self.cancel.is_cancelled() {
            return Err(SubmitError::Closed);
        }
        self.sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "Worker queue full, dropping message");
                SubmitError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Jobs rejected because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop taking jobs and wait for in-flight ones to finish. Jobs still
    /// queued are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.sender);
        for worker in self.workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn run_worker<J: Send + 'static>(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<J>>>,
    handler: Arc<dyn JobHandler<J>>,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };
        handler.handle(job).await;
    }
    tracing::debug!(worker, "Worker exiting");
}
