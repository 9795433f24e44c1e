//! streamer-core: attach a local terminal to a remote exec session
//!
//! This crate provides:
//! - The attach stream seam ([`AttachStream`])
//! - Local terminal handling and raw mode scoping ([`terminal`], [`LocalIo`])
//! - Detach key detection ([`EscapeProxy`])
//! - Remote size synchronization ([`ResizeSynchronizer`])
//! - The bidirectional copy engine ([`StreamMultiplexer`])
//! - The per-session orchestrator ([`SessionStreamer`])

pub mod attach;
pub mod config;
pub mod escape;
pub mod local_io;
pub mod multiplexer;
pub mod resize;
pub mod session;
pub mod terminal;

#[cfg(test)]
mod testing;

pub use attach::AttachStream;
pub use config::{load_config, load_from_path, StreamerConfig};
pub use escape::{is_detach_escape, parse_detach_keys, EscapeProxy, DEFAULT_DETACH_KEYS};
pub use local_io::{LocalIo, LocalReader, LocalWriter};
pub use multiplexer::{InboundOutcome, StreamMultiplexer};
pub use resize::{ResizeCapability, ResizeSynchronizer, RetryOutcome, RetryPolicy};
pub use session::{DetachPolicy, SessionStreamer};
pub use terminal::{CrosstermTerminal, Dimensions, LocalTerminal, RawModeGuard, Restorer};

pub use streamer_utils::{Result, StreamerError};
