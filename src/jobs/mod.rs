// src/jobs/mod.rs
// At-least-once background dispatch: unbounded queue, worker pool,
// exponential backoff for transient failures, dead-letter terminal state.

pub mod worker;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::JobsConfig;
use crate::llm::ChatTurn;

pub use worker::WorkerContext;

#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub user_id: String,
    pub session_id: String,
    /// Copy of the unprocessed window taken at dispatch time.
    pub window: Vec<ChatTurn>,
    pub target_watermark: i64,
}

#[derive(Debug, Clone)]
pub struct SummaryJob {
    pub session_id: String,
    pub target_watermark: i64,
}

#[derive(Debug, Clone)]
pub enum Job {
    Extraction(ExtractionJob),
    Summary(SummaryJob),
}

impl Job {
    fn describe(&self) -> String {
        match self {
            Job::Extraction(j) => format!(
                "extraction(session={}, target={})",
                j.session_id, j.target_watermark
            ),
            Job::Summary(j) => format!(
                "summary(session={}, target={})",
                j.session_id, j.target_watermark
            ),
        }
    }
}

/// Opaque queue entry; only the queue itself reads it.
#[derive(Debug, Clone)]
pub struct Envelope {
    job_id: Uuid,
    attempt: u32,
    job: Job,
}

/// A job that exhausted its retries (or failed non-transiently), kept with
/// its error for inspection.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub job_id: Uuid,
    pub error: String,
    pub job: Job,
}

pub struct JobQueue {
    tx: mpsc::UnboundedSender<Envelope>,
    config: JobsConfig,
    dead_letters: Mutex<Vec<DeadLetter>>,
    /// Jobs enqueued but not yet terminal (includes retry waits).
    pending: AtomicUsize,
    idle_notify: Notify,
}

impl JobQueue {
    pub fn new(config: JobsConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            tx,
            config,
            dead_letters: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            idle_notify: Notify::new(),
        });
        (queue, rx)
    }

    /// Enqueue a job for background execution; returns its id.
    pub fn enqueue(&self, job: Job) -> Uuid {
        let job_id = Uuid::new_v4();
        debug!(job_id = %job_id, "enqueued {}", job.describe());
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self
            .tx
            .send(Envelope {
                job_id,
                attempt: 0,
                job,
            })
            .is_err()
        {
            // Workers are gone; the process is shutting down.
            self.settle();
        }
        job_id
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().expect("dead letter lock").clone()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued job reached a terminal state. Test hook;
    /// production workers run for the process lifetime.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle_notify.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn settle(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle_notify.notify_waiters();
        }
    }

    fn dead_letter(&self, envelope: Envelope, error: String) {
        error!(
            job_id = %envelope.job_id,
            attempt = envelope.attempt,
            "dead-lettering {}: {}",
            envelope.job.describe(),
            error
        );
        self.dead_letters
            .lock()
            .expect("dead letter lock")
            .push(DeadLetter {
                job_id: envelope.job_id,
                error,
                job: envelope.job,
            });
        self.settle();
    }

    fn retry_later(self: &Arc<Self>, mut envelope: Envelope) {
        envelope.attempt += 1;
        let delay =
            Duration::from_secs(self.config.retry_backoff_secs << (envelope.attempt - 1).min(16));
        warn!(
            job_id = %envelope.job_id,
            attempt = envelope.attempt,
            delay_secs = delay.as_secs(),
            "retrying {}",
            envelope.job.describe()
        );

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if queue.tx.send(envelope).is_err() {
                queue.settle();
            }
        });
    }

    async fn run_one(self: &Arc<Self>, ctx: &WorkerContext, envelope: Envelope) {
        let outcome = worker::handle(ctx, &envelope.job).await;
        match outcome {
            Ok(()) => {
                debug!(job_id = %envelope.job_id, "completed {}", envelope.job.describe());
                self.settle();
            }
            Err(e) if e.is_transient() && envelope.attempt < self.config.max_retries => {
                self.retry_later(envelope);
            }
            Err(e) => {
                self.dead_letter(envelope, e.to_string());
            }
        }
    }

    /// Spawn the worker pool draining `rx`. Handlers are idempotent, so
    /// at-least-once delivery under crash/retry is safe.
    pub fn spawn_workers(
        self: &Arc<Self>,
        rx: mpsc::UnboundedReceiver<Envelope>,
        ctx: Arc<WorkerContext>,
    ) {
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let count = self.config.worker_count.max(1);
        info!("starting {} background workers", count);

        for worker_id in 0..count {
            let rx = Arc::clone(&rx);
            let ctx = Arc::clone(&ctx);
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                loop {
                    let envelope = { rx.lock().await.recv().await };
                    let Some(envelope) = envelope else {
                        debug!(worker_id, "job channel closed, worker exiting");
                        break;
                    };
                    queue.run_one(&ctx, envelope).await;
                }
            });
        }
    }
}
