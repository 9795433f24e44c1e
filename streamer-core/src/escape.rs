//! Detach escape sequence handling
//!
//! [`EscapeProxy`] sits between local input and the attach stream and turns
//! the configured detach key sequence into a tagged I/O error, so the
//! inbound copy can tell "the user wants out" apart from a broken pipe.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use streamer_utils::{Result, StreamerError};

/// Default detach keys: ctrl-p followed by ctrl-q
pub const DEFAULT_DETACH_KEYS: &str = "ctrl-p,ctrl-q";

/// Payload of the I/O error raised when the detach sequence is typed
#[derive(Debug, thiserror::Error)]
#[error("read escape sequence")]
pub struct DetachEscape;

/// Build the tagged error the proxy returns on detach
pub fn detach_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, DetachEscape)
}

/// Whether an I/O error carries the detach tag
pub fn is_detach_escape(err: &io::Error) -> bool {
    err.get_ref().map_or(false, |inner| inner.is::<DetachEscape>())
}

/// Parse a comma-separated detach key list such as `ctrl-p,ctrl-q`
///
/// Each key is either `ctrl-<c>` for a letter or one of `@ [ \ ] ^ _`, or a
/// single ASCII character. An empty string disables detaching.
pub fn parse_detach_keys(keys: &str) -> Result<Vec<u8>> {
    if keys.trim().is_empty() {
        return Ok(Vec::new());
    }

    keys.split(',').map(|key| parse_key(key.trim())).collect()
}

fn parse_key(key: &str) -> Result<u8> {
    let invalid = || StreamerError::InvalidDetachKeys(format!("unknown key '{}'", key));

    if let Some(rest) = key.strip_prefix("ctrl-") {
        let &[c] = rest.as_bytes() else {
            return Err(invalid());
        };
        return match c.to_ascii_lowercase() {
            c @ b'a'..=b'z' => Ok(c - b'a' + 1),
            b'@' => Ok(0),
            b'[' => Ok(27),
            b'\\' => Ok(28),
            b']' => Ok(29),
            b'^' => Ok(30),
            b'_' => Ok(31),
            _ => Err(invalid()),
        };
    }

    match key.as_bytes() {
        &[c] if c.is_ascii() => Ok(c),
        _ => Err(invalid()),
    }
}

/// Reader adapter that watches for the detach key sequence
///
/// Bytes that could be the start of the sequence are held back until the
/// sequence either completes or breaks. Overlapping sequences such as
/// `a,a,b` are matched correctly; a broken or EOF-truncated prefix is
/// passed through unchanged. Input preceding a completed sequence is still
/// delivered, then every later read fails with [`detach_error`].
pub struct EscapeProxy<R> {
    inner: R,
    keys: Vec<u8>,
    /// `fallback[i]`: longest proper prefix of `keys[..=i]` that is also its suffix
    fallback: Vec<usize>,
    matched: usize,
    pending: Vec<u8>,
    detached: bool,
    eof: bool,
}

impl<R: AsyncRead + Unpin> EscapeProxy<R> {
    pub fn new(inner: R, keys: Vec<u8>) -> Self {
        let fallback = prefix_fallback(&keys);
        Self {
            inner,
            keys,
            fallback,
            matched: 0,
            pending: Vec::new(),
            detached: false,
            eof: false,
        }
    }

    fn scan(&mut self, bytes: &[u8]) {
        for &b in bytes {
            // Release held bytes until the remaining held suffix can still
            // grow into the sequence
            while self.matched > 0 && b != self.keys[self.matched] {
                let keep = self.fallback[self.matched - 1];
                self.pending.extend_from_slice(&self.keys[..self.matched - keep]);
                self.matched = keep;
            }

            if b == self.keys[self.matched] {
                self.matched += 1;
                if self.matched == self.keys.len() {
                    self.matched = 0;
                    self.detached = true;
                    return;
                }
            } else {
                self.pending.push(b);
            }
        }
    }
}

fn prefix_fallback(keys: &[u8]) -> Vec<usize> {
    let mut fallback = vec![0; keys.len()];
    let mut len = 0;
    for i in 1..keys.len() {
        while len > 0 && keys[i] != keys[len] {
            len = fallback[len - 1];
        }
        if keys[i] == keys[len] {
            len += 1;
        }
        fallback[i] = len;
    }
    fallback
}

impl<R: AsyncRead + Unpin> AsyncRead for EscapeProxy<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.keys.is_empty() {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        }

        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending[..n]);
                this.pending.drain(..n);
                return Poll::Ready(Ok(()));
            }
            if this.detached {
                return Poll::Ready(Err(detach_error()));
            }
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            let mut scratch = [0u8; 1024];
            let mut read_buf = ReadBuf::new(&mut scratch);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read_buf))?;

            let filled = read_buf.filled();
            if filled.is_empty() {
                this.eof = true;
                let held = std::mem::take(&mut this.matched);
                this.pending.extend_from_slice(&this.keys[..held]);
                continue;
            }
            this.scan(filled);
        }
    }
}
