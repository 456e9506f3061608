//! Deadline and cancellation for in-flight applies

use crate::error::{ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Per-call execution context
///
/// Every remote call made on behalf of an apply races the caller's deadline
/// and cancellation signal.
#[derive(Debug, Clone)]
pub struct ApplyContext {
    deadline: Option<Instant>,
    cancel: watch::Receiver<bool>,
}

impl ApplyContext {
    /// Context cancelled once `true` is sent on the channel
    pub fn new(cancel: watch::Receiver<bool>) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Context that is never cancelled and has no deadline
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Fail fast if the call has already been cancelled or timed out
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ProviderError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless cancelled or past the deadline first
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            loop {
                if *cancel.borrow_and_update() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    // sender gone: nobody can cancel any more
                    std::future::pending::<()>().await;
                }
            }
        };
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(ProviderError::Cancelled),
            _ = expired => Err(ProviderError::DeadlineExceeded),
            result = fut => result,
        }
    }

    /// Sleep that wakes early on cancellation or deadline
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
