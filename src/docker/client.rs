//! HTTP/1.1 client for the runtime's local management API.
//!
//! Every request opens its own connection over the configured transport
//! (UNIX domain socket or TCP), performs a single `GET`, and tears the
//! connection down before returning. Two response modes are offered:
//!
//! - [`Client::get`] buffers the complete body.
//! - [`Client::stream`] hands each body fragment to a caller-supplied consumer
//!   as it arrives; the consumer decides when to abort the connection. The
//!   runtime's stats endpoint never ends its response on its own, so this is
//!   the only way to read it without holding a socket open indefinitely.
//!
//! Connecting is bounded by the connect timeout; waiting for the response head
//! and for every body fragment is bounded by the read timeout.

use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use hyper_util::rt::TokioIo;

use super::{Error, Result};

/// Address of the runtime's management socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A UNIX domain socket, written as `unix:///var/run/docker.sock`.
    Unix(PathBuf),
    /// A TCP endpoint, written as `tcp://host:port` or `http://host:port`.
    Tcp(String),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid runtime address `{0}`")]
pub struct InvalidAddress(pub String);

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(InvalidAddress(s.to_owned()));
            }
            return Ok(Address::Unix(PathBuf::from(path)));
        }

        let authority = s
            .strip_prefix("tcp://")
            .or_else(|| s.strip_prefix("http://"))
            .unwrap_or(s)
            .trim_end_matches('/');
        match authority.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Address::Tcp(authority.to_owned()))
            }
            _ => Err(InvalidAddress(s.to_owned())),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Unix(path) => write!(f, "unix://{}", path.display()),
            Address::Tcp(authority) => write!(f, "tcp://{authority}"),
        }
    }
}

/// A complete, buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

/// Owns the task driving a single HTTP connection.
///
/// Dropping the guard aborts the task, which closes the underlying socket.
/// This runs on every exit path of a request, including early returns on
/// errors and consumers that stop reading an endless body.
struct Connection(tokio::task::JoinHandle<()>);

impl Drop for Connection {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runtime API client over a local socket.
#[derive(Debug, Clone)]
pub struct Client {
    address: Address,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Client {
    /// Constructs a [`Client`].
    ///
    /// # Arguments
    ///
    /// * `address` - Where the runtime listens.
    /// * `connect_timeout` - Upper bound for establishing the connection.
    /// * `read_timeout` - Upper bound for every single read from the runtime.
    pub fn new(address: Address, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Performs a `GET` and buffers the complete response.
    ///
    /// Non-200 statuses are returned as-is; the caller decides what they mean.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`], [`Error::Timeout`] or [`Error::Http`] on
    /// transport failures.
    pub async fn get(&self, uri: &str) -> Result<Response> {
        let (mut sender, _connection) = self.connect(uri).await?;
        let response = self.send(&mut sender, uri).await?;
        let status = response.status().as_u16();
        let body = self.collect(uri, response.into_body()).await?;
        log::trace!("GET {} -> {} ({} bytes)", uri, status, body.len());

        Ok(Response { status, body })
    }

    /// Performs a `GET` and streams the body fragment by fragment.
    ///
    /// `on_fragment` is invoked once per received body fragment. Returning
    /// [`ControlFlow::Break`] stops reading and tears the connection down
    /// immediately; otherwise reading continues until the runtime ends the
    /// body.
    ///
    /// # Errors
    ///
    /// Transport failures as for [`Client::get`]. A non-200 status is returned
    /// as [`Error::Status`] carrying the (buffered) error body.
    pub async fn stream<F>(&self, uri: &str, mut on_fragment: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> ControlFlow<()>,
    {
        let (mut sender, connection) = self.connect(uri).await?;
        let response = self.send(&mut sender, uri).await?;
        let status = response.status().as_u16();
        if status != 200 {
            let body = self.collect(uri, response.into_body()).await?;
            return Err(Error::Status {
                uri: uri.to_owned(),
                status,
                body: String::from_utf8_lossy(&body).trim().to_owned(),
            });
        }

        let mut body = response.into_body();
        let mut fragments = 0usize;
        loop {
            let frame = match tokio::time::timeout(self.read_timeout, body.frame()).await {
                Err(_) => return Err(self.read_timed_out(uri)),
                Ok(None) => break,
                Ok(Some(Err(source))) => {
                    return Err(Error::Http {
                        uri: uri.to_owned(),
                        source,
                    });
                }
                Ok(Some(Ok(frame))) => frame,
            };

            let Ok(data) = frame.into_data() else {
                continue;
            };
            fragments += 1;
            log::trace!("GET {} fragment #{} ({} bytes)", uri, fragments, data.len());
            if on_fragment(&data).is_break() {
                log::trace!("GET {} aborted after {} fragments", uri, fragments);
                break;
            }
        }

        drop(body);
        drop(connection);
        Ok(())
    }

    async fn connect(&self, uri: &str) -> Result<(SendRequest<Empty<Bytes>>, Connection)> {
        let connect_error = |source| Error::Connect {
            address: self.address.to_string(),
            uri: uri.to_owned(),
            source,
        };
        match &self.address {
            Address::Unix(path) => {
                let stream =
                    tokio::time::timeout(self.connect_timeout, tokio::net::UnixStream::connect(path))
                        .await
                        .map_err(|_| self.connect_timed_out(uri))?
                        .map_err(connect_error)?;
                self.handshake(uri, TokioIo::new(stream)).await
            }
            Address::Tcp(authority) => {
                let stream = tokio::time::timeout(
                    self.connect_timeout,
                    tokio::net::TcpStream::connect(authority.as_str()),
                )
                .await
                .map_err(|_| self.connect_timed_out(uri))?
                .map_err(connect_error)?;
                self.handshake(uri, TokioIo::new(stream)).await
            }
        }
    }

    async fn handshake<T>(
        &self,
        uri: &str,
        io: T,
    ) -> Result<(SendRequest<Empty<Bytes>>, Connection)>
    where
        T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let (sender, conn) = tokio::time::timeout(
            self.connect_timeout,
            hyper::client::conn::http1::handshake(io),
        )
        .await
        .map_err(|_| self.connect_timed_out(uri))?
        .map_err(|source| Error::Http {
            uri: uri.to_owned(),
            source,
        })?;

        let handle = tokio::spawn(async move {
            if let Err(err) = conn.await {
                log::trace!("runtime connection closed: {}", err);
            }
        });

        Ok((sender, Connection(handle)))
    }

    async fn send(
        &self,
        sender: &mut SendRequest<Empty<Bytes>>,
        uri: &str,
    ) -> Result<hyper::Response<Incoming>> {
        let host = match &self.address {
            Address::Unix(_) => "localhost",
            Address::Tcp(authority) => authority.as_str(),
        };
        let request = hyper::Request::get(uri)
            .header(hyper::header::HOST, host)
            .header(hyper::header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|source| Error::Request {
                uri: uri.to_owned(),
                source,
            })?;

        tokio::time::timeout(self.read_timeout, sender.send_request(request))
            .await
            .map_err(|_| self.read_timed_out(uri))?
            .map_err(|source| Error::Http {
                uri: uri.to_owned(),
                source,
            })
    }

    async fn collect(&self, uri: &str, body: Incoming) -> Result<Bytes> {
        let collected = tokio::time::timeout(self.read_timeout, body.collect())
            .await
            .map_err(|_| self.read_timed_out(uri))?
            .map_err(|source| Error::Http {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(collected.to_bytes())
    }

    fn read_timed_out(&self, uri: &str) -> Error {
        Error::Timeout {
            uri: uri.to_owned(),
            timeout: self.read_timeout,
        }
    }

    fn connect_timed_out(&self, uri: &str) -> Error {
        Error::Timeout {
            uri: uri.to_owned(),
            timeout: self.connect_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{UnixListener, UnixStream};

    use super::*;
    use crate::docker::ErrorClass;

    async fn read_request_head(stream: &mut UnixStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn client(path: &Path) -> Client {
        Client::new(
            Address::Unix(path.to_path_buf()),
            Duration::from_secs(1),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            "unix:///var/run/docker.sock".parse::<Address>().unwrap(),
            Address::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            "tcp://127.0.0.1:2375".parse::<Address>().unwrap(),
            Address::Tcp("127.0.0.1:2375".to_owned())
        );
        assert_eq!(
            "http://docker.local:2375/".parse::<Address>().unwrap(),
            Address::Tcp("docker.local:2375".to_owned())
        );
        assert!("unix://".parse::<Address>().is_err());
        assert!("tcp://no-port".parse::<Address>().is_err());
    }

    #[tokio::test]
    async fn test_get_buffers_complete_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_request_head(&mut stream).await;
            assert!(head.starts_with("GET /containers/json?status=running HTTP/1.1"));
            let body = r#"[{"Id":"a"}]"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });

        let response = client(&path)
            .get("/containers/json?status=running")
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], br#"[{"Id":"a"}]"#);
    }

    #[tokio::test]
    async fn test_stream_reports_non_200_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request_head(&mut stream).await;
            let body = "no such container";
            let response = format!(
                "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });

        let err = client(&path)
            .stream("/containers/c1/stats", |_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Protocol);
        assert_eq!(err.to_string(), "404 - no such container");
    }

    #[tokio::test]
    async fn test_stream_abort_tears_down_endless_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let peer_closed = Arc::new(AtomicBool::new(false));

        let server = {
            let peer_closed = Arc::clone(&peer_closed);
            tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                read_request_head(&mut stream).await;
                stream
                    .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
                    .await
                    .unwrap();
                let chunk = b"{\"read\":\"2024-01-01T00:00:00Z\"}\n";
                loop {
                    let framed = [
                        format!("{:x}\r\n", chunk.len()).into_bytes(),
                        chunk.to_vec(),
                        b"\r\n".to_vec(),
                    ]
                    .concat();
                    if stream.write_all(&framed).await.is_err() {
                        peer_closed.store(true, Ordering::SeqCst);
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let mut received = 0;
        client(&path)
            .stream("/containers/c1/stats", |_| {
                received += 1;
                ControlFlow::Break(())
            })
            .await
            .unwrap();
        assert_eq!(received, 1);

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should notice the closed connection")
            .unwrap();
        assert!(peer_closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_get_times_out_on_silent_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request_head(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let err = client(&path).get("/containers/json").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.class(), ErrorClass::Connection);
    }

    #[tokio::test]
    async fn test_stream_times_out_on_stalled_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request_head(&mut stream).await;
            // Announces a 32 byte chunk, sends only part of it and stalls.
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n20\r\n{\"read\":")
                .await
                .unwrap();
            let mut buf = [0u8; 64];
            matches!(stream.read(&mut buf).await, Ok(0) | Err(_))
        });

        let mut received = 0;
        let err = client(&path)
            .stream("/containers/c1/stats", |_| {
                received += 1;
                ControlFlow::Continue(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.class(), ErrorClass::Connection);
        assert_eq!(err.uri(), "/containers/c1/stats");
        assert!(received <= 1);

        let peer_closed = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should notice the closed connection")
            .unwrap();
        assert!(peer_closed);
    }

    #[tokio::test]
    async fn test_get_missing_socket_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = client(&dir.path().join("missing.sock"))
            .get("/containers/json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
        assert_eq!(err.class(), ErrorClass::Connection);
        assert_eq!(err.uri(), "/containers/json");
    }
}
