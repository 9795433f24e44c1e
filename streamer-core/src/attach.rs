//! Attach stream abstraction
//!
//! An attach stream is the duplex byte connection to the remote process's
//! stdio. Splitting it yields independently owned read and write halves;
//! `AsyncWriteExt::shutdown` on the write half is the half-close, and
//! dropping both halves closes the connection.

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::{tcp, TcpStream};

/// Duplex connection to a remote process's stdin/stdout
pub trait AttachStream: Send + 'static {
    type Reader: AsyncRead + Send + Unpin + 'static;
    type Writer: AsyncWrite + Send + Unpin + 'static;

    /// Split into the remote output (read) and remote input (write) halves
    fn split(self) -> (Self::Reader, Self::Writer);
}

impl AttachStream for TcpStream {
    type Reader = tcp::OwnedReadHalf;
    type Writer = tcp::OwnedWriteHalf;

    fn split(self) -> (Self::Reader, Self::Writer) {
        self.into_split()
    }
}

#[cfg(unix)]
impl AttachStream for tokio::net::UnixStream {
    type Reader = tokio::net::unix::OwnedReadHalf;
    type Writer = tokio::net::unix::OwnedWriteHalf;

    fn split(self) -> (Self::Reader, Self::Writer) {
        self.into_split()
    }
}

impl AttachStream for DuplexStream {
    type Reader = ReadHalf<DuplexStream>;
    type Writer = WriteHalf<DuplexStream>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        tokio::io::split(self)
    }
}

/// Already-split halves, e.g. a hijacked HTTP connection's reader and writer
impl<R, W> AttachStream for (R, W)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    type Reader = R;
    type Writer = W;

    fn split(self) -> (R, W) {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_duplex_half_close_keeps_read_side_open() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (mut reader, mut writer) = AttachStream::split(local);

        writer.write_all(b"exit\n").await.unwrap();
        writer.shutdown().await.unwrap();

        // Remote sees the input followed by EOF
        let mut received = Vec::new();
        remote.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"exit\n");

        // ...and can still send output back
        remote.write_all(b"bye").await.unwrap();
        drop(remote);

        let mut output = Vec::new();
        reader.read_to_end(&mut output).await.unwrap();
        assert_eq!(output, b"bye");
    }

    #[tokio::test]
    async fn test_tcp_split() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, mut writer) = AttachStream::split(stream);
        writer.write_all(b"ping").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut echoed = Vec::new();
        reader.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"ping");
        server.await.unwrap();
    }
}
