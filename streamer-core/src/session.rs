//! Session streamer
//!
//! Ties one attach session together: raw mode scope, resize
//! synchronization, and the multiplexer whose outcome becomes the result.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use streamer_utils::{Result, StreamerError};

use crate::attach::AttachStream;
use crate::config::StreamerConfig;
use crate::escape::{parse_detach_keys, EscapeProxy, DEFAULT_DETACH_KEYS};
use crate::local_io::{LocalIo, LocalReader};
use crate::multiplexer::StreamMultiplexer;
use crate::resize::{ResizeCapability, ResizeSynchronizer, RetryPolicy};
use crate::terminal::{CrosstermTerminal, LocalTerminal, RawModeGuard};

/// What happens after the user detaches
///
/// Only surfacing [`StreamerError::DetachRequested`] to the caller is
/// supported. The streamer takes no action of its own and the remote
/// process keeps running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetachPolicy {
    #[default]
    Surface,
}

/// Attaches the local terminal to one remote session
pub struct SessionStreamer<T: LocalTerminal> {
    io: LocalIo<T>,
    detach_keys: Vec<u8>,
    detach_policy: DetachPolicy,
    retry_policy: RetryPolicy,
}

impl SessionStreamer<CrosstermTerminal> {
    /// Streamer over the process's stdin/stdout with default settings
    pub fn stdio() -> Self {
        Self::new(LocalIo::stdio())
    }
}

impl<T: LocalTerminal> SessionStreamer<T> {
    pub fn new(io: LocalIo<T>) -> Self {
        Self {
            io,
            // The default key list is known to parse
            detach_keys: parse_detach_keys(DEFAULT_DETACH_KEYS).unwrap_or_default(),
            detach_policy: DetachPolicy::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Build a streamer from loaded configuration
    pub fn from_config(io: LocalIo<T>, config: &StreamerConfig) -> Result<Self> {
        Ok(Self::new(io)
            .with_detach_keys(config.detach_keys()?)
            .with_retry_policy(config.retry_policy()))
    }

    /// Key sequence that detaches; empty disables detaching
    pub fn with_detach_keys(mut self, keys: Vec<u8>) -> Self {
        self.detach_keys = keys;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Stream between the local terminal and `stream` until the session ends
    ///
    /// The local terminal is back in its original mode by the time this
    /// returns, on every path. Resize failures are logged and never become
    /// the result.
    pub async fn stream<S, R>(
        self,
        cancel: &CancellationToken,
        session_id: &str,
        stream: S,
        resize: R,
    ) -> Result<()>
    where
        S: AttachStream,
        R: ResizeCapability,
    {
        if session_id.is_empty() {
            return Err(StreamerError::EmptySessionId);
        }

        let (input, output, terminal) = self.io.into_parts();
        let raw_mode = RawModeGuard::enter(terminal.clone())?;

        let input: LocalReader = if self.detach_keys.is_empty() {
            input
        } else {
            Box::new(EscapeProxy::new(input, self.detach_keys))
        };

        let multiplexer = StreamMultiplexer::new(input, output, raw_mode.restorer());
        let task_cancel = cancel.clone();
        let mut outcome = AbortOnDropHandle::new(tokio::spawn(async move {
            multiplexer.run(&task_cancel, stream).await
        }));

        let resize_cancel = cancel.child_token();
        if terminal.is_terminal() {
            ResizeSynchronizer::new(terminal, Arc::new(resize), session_id)
                .with_retry_policy(self.retry_policy)
                .start(resize_cancel.clone());
        }

        let result = match (&mut outcome).await {
            Ok(result) => result,
            Err(e) => Err(StreamerError::internal(format!("stream task failed: {}", e))),
        };

        resize_cancel.cancel();
        drop(raw_mode);

        match &result {
            Ok(()) => tracing::debug!(session_id, "Stream finished"),
            Err(StreamerError::DetachRequested) => match self.detach_policy {
                DetachPolicy::Surface => {
                    tracing::info!(session_id, "Detached from session")
                }
            },
            Err(e) => tracing::error!(session_id, "Stream error: {}", e),
        }

        result
    }
}
