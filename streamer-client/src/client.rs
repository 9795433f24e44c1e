//! Attach stream connection
//!
//! Opens the raw byte stream the streamer attaches to. Whatever sits on the
//! other end (an exec-start hijack proxy, a socat bridge) is responsible for
//! the session itself.

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, UnixStream};
use url::Url;

use streamer_utils::{Result, StreamerError};

/// Trait alias for streams that can carry an attach session
pub trait StreamTrait: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamTrait for T {}

/// Split connection handed to the streamer
pub type Connection = (ReadHalf<Box<dyn StreamTrait>>, WriteHalf<Box<dyn StreamTrait>>);

/// Where to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

/// Parse `tcp://host:port`, `unix:///path`, or a bare socket path
pub fn parse_addr(addr: &str) -> Result<Endpoint> {
    if addr.starts_with("tcp://") {
        let url = Url::parse(addr)
            .map_err(|e| StreamerError::connection(format!("Invalid TCP URL '{}': {}", addr, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| StreamerError::connection("Missing host in TCP URL"))?;
        let port = url
            .port()
            .ok_or_else(|| StreamerError::connection("Missing port in TCP URL"))?;

        return Ok(Endpoint::Tcp(format!("{}:{}", host, port)));
    }

    // Assume Unix socket
    let path_str = if addr.starts_with("unix://") {
        let url = Url::parse(addr)
            .map_err(|e| StreamerError::connection(format!("Invalid Unix URL: {}", e)))?;
        url.path().to_string()
    } else {
        addr.to_string()
    };

    Ok(Endpoint::Unix(PathBuf::from(path_str)))
}

/// Connect to the attach stream at `addr`
pub async fn connect(addr: &str) -> Result<Connection> {
    let stream: Box<dyn StreamTrait> = match parse_addr(addr)? {
        Endpoint::Tcp(tcp_addr) => {
            let tcp_stream = TcpStream::connect(&tcp_addr).await.map_err(|e| {
                StreamerError::connection(format!("Failed to connect to {}: {}", tcp_addr, e))
            })?;
            Box::new(tcp_stream)
        }
        Endpoint::Unix(path) => {
            let unix_stream = UnixStream::connect(&path).await.map_err(|e| {
                StreamerError::connection(format!("Failed to connect to {}: {}", path.display(), e))
            })?;
            Box::new(unix_stream)
        }
    };

    tracing::debug!(addr, "Connected to attach stream");
    Ok(tokio::io::split(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            parse_addr("tcp://127.0.0.1:2375").unwrap(),
            Endpoint::Tcp("127.0.0.1:2375".into())
        );
    }

    #[test]
    fn test_parse_tcp_missing_port() {
        let err = parse_addr("tcp://localhost").unwrap_err();
        assert!(err.to_string().contains("Missing port"));
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let path = std::env::temp_dir().join("exec-streamer-no-such.sock");
        let Err(err) = connect(&format!("unix://{}", path.display())).await else {
            panic!("connect to a missing socket should fail");
        };
        assert!(err.to_string().contains("Failed to connect"));
    }

    #[test]
    fn test_parse_unix() {
        assert_eq!(
            parse_addr("unix:///tmp/exec.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/exec.sock"))
        );
        assert_eq!(
            parse_addr("/run/exec.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/run/exec.sock"))
        );
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let Err(err) = connect(&format!("tcp://{}", addr)).await else {
            panic!("connect to a closed port should fail");
        };
        assert!(matches!(err, StreamerError::Connection(_)));
    }
}
