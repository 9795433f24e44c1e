//! Local terminal mode management
//!
//! Provides the [`LocalTerminal`] seam over the local tty, the crossterm
//! backed implementation, and the raw-mode guard whose restoration runs at
//! most once no matter how many exit paths ask for it.

use std::io;
use std::sync::Arc;

use crossterm::terminal;
use crossterm::tty::IsTty;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;

use streamer_utils::{Result, StreamerError};

/// Size of the local output terminal in character cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub rows: u16,
    pub cols: u16,
}

impl Dimensions {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// A 0x0 reading means the size could not be determined and must not be
    /// forwarded to the remote side.
    pub fn is_zero(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }
}

/// Capabilities of the local terminal the streamer relies on
pub trait LocalTerminal: Send + Sync + 'static {
    /// Saved terminal mode handed back to [`LocalTerminal::restore`]
    type Mode: Send + 'static;

    /// Whether local input is an interactive terminal
    fn is_terminal(&self) -> bool;

    /// Current size of the local output terminal
    fn size(&self) -> io::Result<Dimensions>;

    /// Switch local input to raw mode, returning the mode to restore later
    fn enter_raw(&self) -> io::Result<Self::Mode>;

    /// Put back a mode saved by [`LocalTerminal::enter_raw`]
    fn restore(&self, mode: Self::Mode) -> io::Result<()>;

    /// Notifications fired whenever the local terminal is resized
    fn size_changes(&self) -> io::Result<BoxStream<'static, ()>>;
}

/// The process's own tty, driven through crossterm
#[derive(Debug)]
pub struct CrosstermTerminal {
    is_tty: bool,
}

/// Raw mode state captured before crossterm enabled it
#[derive(Debug, Clone, Copy)]
pub struct CrosstermMode {
    was_raw: bool,
}

impl CrosstermTerminal {
    pub fn new() -> Self {
        Self {
            is_tty: io::stdin().is_tty(),
        }
    }
}

impl Default for CrosstermTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTerminal for CrosstermTerminal {
    type Mode = CrosstermMode;

    fn is_terminal(&self) -> bool {
        self.is_tty
    }

    fn size(&self) -> io::Result<Dimensions> {
        let (cols, rows) = terminal::size()?;
        Ok(Dimensions::new(rows, cols))
    }

    fn enter_raw(&self) -> io::Result<CrosstermMode> {
        let was_raw = terminal::is_raw_mode_enabled()?;
        if !was_raw {
            terminal::enable_raw_mode()?;
        }
        Ok(CrosstermMode { was_raw })
    }

    fn restore(&self, mode: CrosstermMode) -> io::Result<()> {
        // Someone else put the terminal in raw mode; leave it that way
        if mode.was_raw {
            return Ok(());
        }
        terminal::disable_raw_mode()
    }

    #[cfg(unix)]
    fn size_changes(&self) -> io::Result<BoxStream<'static, ()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let winch = signal(SignalKind::window_change())?;
        Ok(stream::unfold(winch, |mut winch| async move {
            winch.recv().await.map(|()| ((), winch))
        })
        .boxed())
    }

    #[cfg(not(unix))]
    fn size_changes(&self) -> io::Result<BoxStream<'static, ()>> {
        Ok(stream::pending().boxed())
    }
}

trait RestoreOnce: Send + Sync {
    /// Returns true if this call performed the restore
    fn restore_once(&self) -> bool;
}

struct SavedMode<T: LocalTerminal> {
    terminal: Arc<T>,
    mode: Mutex<Option<T::Mode>>,
}

impl<T: LocalTerminal> RestoreOnce for SavedMode<T> {
    fn restore_once(&self) -> bool {
        // Held until the restore completes so later callers wait for it
        let mut slot = self.mode.lock();
        let Some(mode) = slot.take() else {
            return false;
        };

        match self.terminal.restore(mode) {
            Ok(()) => tracing::debug!("Terminal mode restored"),
            Err(e) => tracing::error!("Failed to restore terminal: {}", e),
        }
        drop(slot);
        true
    }
}

struct NoRestore;

impl RestoreOnce for NoRestore {
    fn restore_once(&self) -> bool {
        false
    }
}

/// Cloneable handle that restores the saved terminal mode
///
/// Every clone shares one saved mode, so the underlying restore executes at
/// most once however many clones call [`Restorer::restore`], concurrently or
/// not. A caller that loses the race returns only after the winning restore
/// has finished. Restore failures are logged and swallowed.
#[derive(Clone)]
pub struct Restorer {
    inner: Arc<dyn RestoreOnce>,
}

impl Restorer {
    /// A restorer with nothing to restore (local input is not a terminal)
    pub fn noop() -> Self {
        Self {
            inner: Arc::new(NoRestore),
        }
    }

    /// Restore the saved mode if nobody has yet
    pub fn restore(&self) -> bool {
        self.inner.restore_once()
    }
}

impl std::fmt::Debug for Restorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Restorer").finish_non_exhaustive()
    }
}

/// Scope guard for raw mode; restores the terminal when dropped
#[derive(Debug)]
pub struct RawModeGuard {
    restorer: Restorer,
}

impl RawModeGuard {
    /// Put the local terminal into raw mode
    ///
    /// When local input is not a terminal nothing is changed and the guard's
    /// restorer is a no-op.
    pub fn enter<T: LocalTerminal>(terminal: Arc<T>) -> Result<Self> {
        if !terminal.is_terminal() {
            return Ok(Self {
                restorer: Restorer::noop(),
            });
        }

        let mode = terminal.enter_raw().map_err(StreamerError::RawMode)?;
        tracing::debug!("Terminal switched to raw mode");

        Ok(Self {
            restorer: Restorer {
                inner: Arc::new(SavedMode {
                    terminal,
                    mode: Mutex::new(Some(mode)),
                }),
            },
        })
    }

    /// Handle for restoring from another task before the guard drops
    pub fn restorer(&self) -> Restorer {
        self.restorer.clone()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restorer.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTerminal;
    use std::time::Duration;

    #[test]
    fn test_dimensions_zero() {
        assert!(Dimensions::new(0, 0).is_zero());
        assert!(Dimensions::default().is_zero());
        assert!(!Dimensions::new(24, 0).is_zero());
        assert!(!Dimensions::new(0, 80).is_zero());
    }

    #[test]
    fn test_enter_raw_on_terminal() {
        let term = Arc::new(FakeTerminal::tty(24, 80));
        let guard = RawModeGuard::enter(term.clone()).unwrap();
        assert_eq!(term.raw_entered(), 1);
        assert_eq!(term.restored(), 0);

        drop(guard);
        assert_eq!(term.restored(), 1);
    }

    #[test]
    fn test_enter_raw_not_terminal_is_noop() {
        let term = Arc::new(FakeTerminal::piped());
        let guard = RawModeGuard::enter(term.clone()).unwrap();
        assert!(!guard.restorer().restore());

        drop(guard);
        assert_eq!(term.raw_entered(), 0);
        assert_eq!(term.restored(), 0);
    }

    #[test]
    fn test_enter_raw_failure() {
        let term = Arc::new(FakeTerminal::tty(24, 80).failing_raw());
        let err = RawModeGuard::enter(term.clone()).unwrap_err();
        assert!(matches!(err, StreamerError::RawMode(_)));
        assert_eq!(term.restored(), 0);
    }

    #[test]
    fn test_restore_runs_once() {
        let term = Arc::new(FakeTerminal::tty(24, 80));
        let guard = RawModeGuard::enter(term.clone()).unwrap();
        let restorer = guard.restorer();

        assert!(restorer.restore());
        assert!(!restorer.restore());
        assert!(!guard.restorer().restore());
        drop(guard);

        assert_eq!(term.restored(), 1);
    }

    #[test]
    fn test_restore_concurrent_callers() {
        let term = Arc::new(FakeTerminal::tty(24, 80));
        let guard = RawModeGuard::enter(term.clone()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let restorer = guard.restorer();
                std::thread::spawn(move || restorer.restore())
            })
            .collect();
        let performed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|did| *did)
            .count();
        drop(guard);

        assert_eq!(performed, 1);
        assert_eq!(term.restored(), 1);
    }

    #[test]
    fn test_guard_drop_waits_for_inflight_restore() {
        let term = Arc::new(FakeTerminal::tty(24, 80).slow_restore(Duration::from_millis(200)));
        let guard = RawModeGuard::enter(term.clone()).unwrap();

        let restorer = guard.restorer();
        let copier = std::thread::spawn(move || restorer.restore());
        std::thread::sleep(Duration::from_millis(20));

        drop(guard);
        assert_eq!(term.restored(), 1);
        assert!(copier.join().unwrap());
    }

    #[test]
    fn test_restore_failure_is_swallowed() {
        let term = Arc::new(FakeTerminal::tty(24, 80).failing_restore());
        let guard = RawModeGuard::enter(term.clone()).unwrap();
        assert!(guard.restorer().restore());
        drop(guard);
        assert_eq!(term.restored(), 1);
    }
}
