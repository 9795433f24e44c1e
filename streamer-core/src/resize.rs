//! Remote terminal size synchronization
//!
//! Pushes the local terminal size to the remote session when streaming
//! starts and again on every local resize. Resizing is best effort: a
//! failed initial resize is retried in the background a bounded number of
//! times, and nothing here ever affects the stream's result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use streamer_utils::{Result, StreamerError};

use crate::local_io::current_size;
use crate::terminal::{Dimensions, LocalTerminal};

/// Default number of background retries after a failed resize
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// Default delay before each retry
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Issues terminal resize requests for a remote session
///
/// `cancel` fires when the session ends; a slow request should give up
/// when it does.
pub trait ResizeCapability: Send + Sync + 'static {
    fn resize<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        session_id: &'a str,
        size: Dimensions,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Any async `Fn(cancel, session_id, size)` can resize, e.g. a closure
/// wrapping a container API's exec-resize call.
impl<F, Fut> ResizeCapability for F
where
    F: Fn(CancellationToken, String, Dimensions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn resize<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        session_id: &'a str,
        size: Dimensions,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self(cancel.clone(), session_id.to_string(), size))
    }
}

/// Bounded fixed-delay retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// How a background retry run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Retries performed, not counting the initial attempt
    pub attempts: usize,
    pub succeeded: bool,
}

/// Keeps the remote terminal the same size as the local one
pub struct ResizeSynchronizer<T: LocalTerminal> {
    terminal: Arc<T>,
    capability: Arc<dyn ResizeCapability>,
    session_id: Arc<str>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl<T: LocalTerminal> Clone for ResizeSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            terminal: self.terminal.clone(),
            capability: self.capability.clone(),
            session_id: self.session_id.clone(),
            policy: self.policy,
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: LocalTerminal> ResizeSynchronizer<T> {
    pub fn new(
        terminal: Arc<T>,
        capability: Arc<dyn ResizeCapability>,
        session_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            terminal,
            capability,
            session_id: session_id.into(),
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Token that stops in-flight requests and pending retries
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read the local size and forward it once, without retrying
    pub async fn resize_once(&self) -> Result<Dimensions> {
        let size = current_size(self.terminal.as_ref());
        if size.is_zero() {
            return Err(StreamerError::TtySizeUnavailable);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StreamerError::Cancelled),
            result = self.capability.resize(&self.cancel, &self.session_id, size) => {
                result.map(|()| size)
            }
        }
    }

    /// Resize now; on failure schedule the background retries
    ///
    /// Returns the retry task when one was spawned. Callers are free to
    /// drop it.
    pub async fn sync(&self) -> Option<JoinHandle<RetryOutcome>> {
        match self.resize_once().await {
            Ok(size) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    rows = size.rows,
                    cols = size.cols,
                    "Remote tty resized"
                );
                None
            }
            Err(StreamerError::Cancelled) => None,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, "Failed to resize tty: {}", e);
                let this = self.clone();
                Some(tokio::spawn(async move { this.retry().await }))
            }
        }
    }

    /// Retry the resize on the fixed schedule until it succeeds, the budget
    /// runs out, or the session is cancelled
    pub async fn retry(&self) -> RetryOutcome {
        for attempt in 1..=self.policy.max_retries {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(session_id = %self.session_id, attempt, "Resize retry cancelled");
                    return RetryOutcome {
                        attempts: attempt - 1,
                        succeeded: false,
                    };
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }

            match self.resize_once().await {
                Ok(size) => {
                    tracing::debug!(
                        session_id = %self.session_id,
                        attempt,
                        rows = size.rows,
                        cols = size.cols,
                        "Remote tty resized after retry"
                    );
                    return RetryOutcome {
                        attempts: attempt,
                        succeeded: true,
                    };
                }
                Err(e) => tracing::trace!(attempt, "Resize retry failed: {}", e),
            }
        }

        tracing::warn!(
            session_id = %self.session_id,
            "Failed to resize tty, using default size"
        );
        RetryOutcome {
            attempts: self.policy.max_retries,
            succeeded: false,
        }
    }

    /// Run the initial resize and follow local size changes until `cancel`
    /// fires
    ///
    /// `cancel` also aborts a resize request still in flight and any
    /// background retries.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        let this = self.with_cancel(cancel);
        tokio::spawn(async move {
            // Subscribe first so a resize during the initial sync isn't lost
            let changes = this.terminal.size_changes();

            this.sync().await;

            let mut changes = match changes {
                Ok(changes) => changes,
                Err(e) => {
                    tracing::warn!("Failed to watch terminal size changes: {}", e);
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    change = changes.next() => match change {
                        Some(()) => {
                            this.sync().await;
                        }
                        None => break,
                    },
                }
            }

            tracing::debug!(session_id = %this.session_id, "Resize listener stopped");
        })
    }
}
