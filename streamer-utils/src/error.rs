//! Error types for exec-streamer
//!
//! Provides a unified error type used across all exec-streamer crates.

use std::path::PathBuf;

/// Main error type for exec-streamer operations
#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    // === File Errors ===

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Session Errors ===

    #[error("Empty exec session id")]
    EmptySessionId,

    #[error("Attach stream error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("Detach requested")]
    DetachRequested,

    #[error("Stream cancelled")]
    Cancelled,

    // === Terminal Errors ===

    #[error("Failed to set raw terminal mode: {0}")]
    RawMode(#[source] std::io::Error),

    #[error("TTY size is 0")]
    TtySizeUnavailable,

    #[error("Resize failed: {0}")]
    Resize(String),

    #[error("Invalid detach keys: {0}")]
    InvalidDetachKeys(String),

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamerError {
    /// Create a resize error
    pub fn resize(msg: impl Into<String>) -> Self {
        Self::Resize(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the user asked to leave the session via the detach keys
    pub fn is_detach(&self) -> bool {
        matches!(self, Self::DetachRequested)
    }
}

/// Result type alias using StreamerError
pub type Result<T> = std::result::Result<T, StreamerError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display_empty_session_id() {
        let err = StreamerError::EmptySessionId;
        assert_eq!(err.to_string(), "Empty exec session id");
    }

    #[test]
    fn test_error_display_tty_size() {
        assert_eq!(StreamerError::TtySizeUnavailable.to_string(), "TTY size is 0");
    }

    #[test]
    fn test_error_display_transport() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = StreamerError::Transport(io_err);
        assert_eq!(err.to_string(), "Attach stream error: pipe closed");
    }

    #[test]
    fn test_error_display_raw_mode() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "device busy");
        let err = StreamerError::RawMode(io_err);
        assert!(err.to_string().contains("raw terminal mode"));
        assert!(err.to_string().contains("device busy"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = StreamerError::FileRead {
            path: PathBuf::from("/etc/exec-streamer/config.toml"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("config.toml"));
    }

    #[test]
    fn test_error_display_config_invalid() {
        let err = StreamerError::ConfigInvalid {
            path: PathBuf::from("/home/user/.config/exec-streamer/config.toml"),
            message: "syntax error".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn test_error_display_detach_and_cancel() {
        assert_eq!(StreamerError::DetachRequested.to_string(), "Detach requested");
        assert_eq!(StreamerError::Cancelled.to_string(), "Stream cancelled");
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_is_detach() {
        assert!(StreamerError::DetachRequested.is_detach());
        assert!(!StreamerError::Cancelled.is_detach());
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "x");
        assert!(!StreamerError::Transport(io_err).is_detach());
    }

    // ==================== Helper Function Tests ====================

    #[test]
    fn test_helpers() {
        assert!(matches!(StreamerError::resize("x"), StreamerError::Resize(_)));
        assert!(matches!(StreamerError::config("x"), StreamerError::Config(_)));
        assert!(matches!(StreamerError::connection("x"), StreamerError::Connection(_)));
        assert_eq!(
            StreamerError::internal("task panicked").to_string(),
            "Internal error: task panicked"
        );
    }
}
