//! Batch job poller with backoff, an overall deadline and cancellation.
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::PollSettings;
use crate::error::{AppError, AppResult};
use crate::gemini::{BatchStatus, GenerativeBackend};

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cloned into every task that should stop on cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelHandle {
    pub fn pair() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx: Some(rx) })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken { rx: Some(self.tx.subscribe()) }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancelToken { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        std::future::pending::<()>().await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    settings: PollSettings,
}

impl Poller {
    pub fn new(settings: PollSettings) -> Self {
        Poller { settings }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.settings.backoff).min(self.settings.max_interval)
    }

    /// Polls `job` until it reaches a terminal state.
    pub async fn wait(&self, backend: &dyn GenerativeBackend, job: &str, cancel: &CancelToken) -> AppResult<BatchStatus> {
        // A timeout too large to represent means no deadline.
        let deadline = Instant::now().checked_add(self.settings.timeout);
        let mut interval = self.settings.interval;
        let mut cancel = cancel.clone();
        tracing::info!("Polling status for job: {}", job);

        loop {
            if cancel.is_cancelled() {
                return Err(AppError::PollCancelled(job.to_string()));
            }
            let status = backend.get_batch(job).await?;
            if status.state.is_terminal() {
                tracing::info!("Job {} finished with state: {}", job, status.state);
                return Ok(status);
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!("Job {} still {} at the polling deadline", job, status.state);
                        return Err(AppError::PollTimeout(job.to_string()));
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            tracing::info!("Job not finished. Current state: {}. Waiting {:?}...", status.state, wait);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(AppError::PollCancelled(job.to_string())),
            }
            interval = self.next_interval(interval);
        }
    }
}
