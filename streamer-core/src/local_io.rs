//! Local input/output adapter
//!
//! Bundles the local input and output streams with the terminal they belong
//! to. Tests swap in in-memory pipes and a fake terminal here.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::terminal::{CrosstermTerminal, Dimensions, LocalTerminal};

/// Boxed local input stream
pub type LocalReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed local output stream
pub type LocalWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Local side of an attach session
pub struct LocalIo<T: LocalTerminal> {
    input: LocalReader,
    output: LocalWriter,
    terminal: Arc<T>,
}

impl LocalIo<CrosstermTerminal> {
    /// The process's stdin/stdout and controlling terminal
    pub fn stdio() -> Self {
        Self::new(
            tokio::io::stdin(),
            tokio::io::stdout(),
            Arc::new(CrosstermTerminal::new()),
        )
    }
}

impl<T: LocalTerminal> LocalIo<T> {
    pub fn new(
        input: impl AsyncRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
        terminal: Arc<T>,
    ) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            terminal,
        }
    }

    /// Whether local input is an interactive terminal
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_terminal()
    }

    /// Current output size; 0x0 when it cannot be determined
    pub fn current_size(&self) -> Dimensions {
        current_size(self.terminal.as_ref())
    }

    pub fn terminal(&self) -> &Arc<T> {
        &self.terminal
    }

    pub fn into_parts(self) -> (LocalReader, LocalWriter, Arc<T>) {
        (self.input, self.output, self.terminal)
    }
}

/// Query the terminal size, folding failures into the invalid 0x0 reading
pub(crate) fn current_size<T: LocalTerminal>(terminal: &T) -> Dimensions {
    match terminal.size() {
        Ok(size) => size,
        Err(e) => {
            tracing::debug!("Failed to query terminal size: {}", e);
            Dimensions::default()
        }
    }
}
