//! Bidirectional copy between the local terminal and the attach stream
//!
//! Two tasks run side by side: inbound (local input to the remote process)
//! and outbound (remote output to the local terminal). Which one finishes
//! first, and how, decides the session result:
//!
//! 1. Outbound finishing is authoritative. The remote side stopped sending,
//!    so the session is over and its error (if any) is the result.
//! 2. Inbound reaching EOF only half-closes the remote input. We keep waiting
//!    for outbound so trailing output still reaches the terminal, or for
//!    cancellation.
//! 3. The detach key sequence ends the session immediately with
//!    [`StreamerError::DetachRequested`].
//! 4. Cancellation wins over any result that has not arrived yet.
//!
//! Both copy tasks are aborted when [`StreamMultiplexer::run`] returns,
//! which drops the stream halves and closes the connection.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use streamer_utils::{Result, StreamerError};

use crate::attach::AttachStream;
use crate::escape::is_detach_escape;
use crate::local_io::{LocalReader, LocalWriter};
use crate::terminal::Restorer;

/// How the local-to-remote copy ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Local input ended (EOF or error) and the remote input was half-closed
    Finished,
    /// The user typed the detach key sequence
    Detached,
}

/// Runs the two copy directions for one session
pub struct StreamMultiplexer {
    input: LocalReader,
    output: LocalWriter,
    restorer: Restorer,
}

impl StreamMultiplexer {
    pub fn new(input: LocalReader, output: LocalWriter, restorer: Restorer) -> Self {
        Self {
            input,
            output,
            restorer,
        }
    }

    /// Copy in both directions until the session ends
    pub async fn run<S: AttachStream>(self, cancel: &CancellationToken, stream: S) -> Result<()> {
        let (reader, writer) = stream.split();

        let mut outbound = AbortOnDropHandle::new(tokio::spawn(copy_outbound(
            reader,
            self.output,
            self.restorer.clone(),
        )));
        let mut inbound = AbortOnDropHandle::new(tokio::spawn(copy_inbound(
            self.input,
            writer,
            self.restorer,
        )));

        tokio::select! {
            biased;

            res = &mut outbound => outbound_result(res),
            res = &mut inbound => match res.map_err(|e| task_failed("input", e))? {
                InboundOutcome::Detached => Err(StreamerError::DetachRequested),
                InboundOutcome::Finished => {
                    tracing::debug!("Input done, waiting for remote output to finish");
                    tokio::select! {
                        biased;

                        res = &mut outbound => outbound_result(res),
                        _ = cancel.cancelled() => Err(StreamerError::Cancelled),
                    }
                }
            },
            _ = cancel.cancelled() => Err(StreamerError::Cancelled),
        }
    }
}

/// Local input to the attach stream's write side
async fn copy_inbound<W>(mut input: LocalReader, mut writer: W, restorer: Restorer) -> InboundOutcome
where
    W: AsyncWrite + Unpin,
{
    let result = tokio::io::copy(&mut input, &mut writer).await;
    restorer.restore();

    match result {
        Err(e) if is_detach_escape(&e) => {
            // The remote process keeps its stdin open so it survives detaching
            tracing::debug!("Detach sequence received");
            return InboundOutcome::Detached;
        }
        Err(e) => tracing::warn!("Input stream error: {}", e),
        Ok(bytes) => tracing::debug!(bytes, "Input stream finished"),
    }

    if let Err(e) = writer.shutdown().await {
        tracing::warn!("Failed to close attach stream write side: {}", e);
    }

    InboundOutcome::Finished
}

/// Attach stream's read side to local output
async fn copy_outbound<R>(mut reader: R, mut output: LocalWriter, restorer: Restorer) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let result = tokio::io::copy(&mut reader, &mut output).await;
    restorer.restore();

    match &result {
        Ok(bytes) => tracing::debug!(bytes, "Output stream finished"),
        Err(e) => tracing::warn!("Output stream error: {}", e),
    }

    result
}

fn outbound_result(res: std::result::Result<io::Result<u64>, JoinError>) -> Result<()> {
    match res {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(StreamerError::Transport(e)),
        Err(e) => Err(task_failed("output", e)),
    }
}

fn task_failed(direction: &str, err: JoinError) -> StreamerError {
    StreamerError::internal(format!("{} copy task failed: {}", direction, err))
}
