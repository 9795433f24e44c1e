//! Test doubles shared by the unit tests

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use crate::terminal::{Dimensions, LocalTerminal};

/// In-memory terminal that counts mode switches
pub struct FakeTerminal {
    is_tty: bool,
    size: Mutex<Dimensions>,
    fail_raw: bool,
    fail_restore: bool,
    restore_delay: Option<Duration>,
    raw_entered: AtomicUsize,
    restored: AtomicUsize,
    resize_tx: mpsc::UnboundedSender<()>,
    resize_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl FakeTerminal {
    fn build(is_tty: bool, size: Dimensions) -> Self {
        let (resize_tx, resize_rx) = mpsc::unbounded_channel();
        Self {
            is_tty,
            size: Mutex::new(size),
            fail_raw: false,
            fail_restore: false,
            restore_delay: None,
            raw_entered: AtomicUsize::new(0),
            restored: AtomicUsize::new(0),
            resize_tx,
            resize_rx: Mutex::new(Some(resize_rx)),
        }
    }

    pub fn tty(rows: u16, cols: u16) -> Self {
        Self::build(true, Dimensions::new(rows, cols))
    }

    pub fn piped() -> Self {
        Self::build(false, Dimensions::default())
    }

    pub fn failing_raw(mut self) -> Self {
        self.fail_raw = true;
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    /// Block inside `restore` before completing it
    pub fn slow_restore(mut self, delay: Duration) -> Self {
        self.restore_delay = Some(delay);
        self
    }

    pub fn raw_entered(&self) -> usize {
        self.raw_entered.load(Ordering::SeqCst)
    }

    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }

    pub fn set_size(&self, rows: u16, cols: u16) {
        *self.size.lock() = Dimensions::new(rows, cols);
    }

    /// Simulate a SIGWINCH
    pub fn notify_resize(&self) {
        let _ = self.resize_tx.send(());
    }
}

impl LocalTerminal for FakeTerminal {
    type Mode = ();

    fn is_terminal(&self) -> bool {
        self.is_tty
    }

    fn size(&self) -> io::Result<Dimensions> {
        Ok(*self.size.lock())
    }

    fn enter_raw(&self) -> io::Result<()> {
        if self.fail_raw {
            return Err(io::Error::new(io::ErrorKind::Other, "device busy"));
        }
        self.raw_entered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore(&self, _mode: ()) -> io::Result<()> {
        if let Some(delay) = self.restore_delay {
            std::thread::sleep(delay);
        }
        self.restored.fetch_add(1, Ordering::SeqCst);
        if self.fail_restore {
            return Err(io::Error::new(io::ErrorKind::Other, "tcsetattr failed"));
        }
        Ok(())
    }

    fn size_changes(&self) -> io::Result<BoxStream<'static, ()>> {
        let rx = self
            .resize_rx
            .lock()
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "already subscribed"))?;
        Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|()| ((), rx)) }).boxed())
    }
}

/// Reader that fails every read with the given error kind
pub struct FailingReader(pub io::ErrorKind);

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(self.0, "attach stream broke")))
    }
}
