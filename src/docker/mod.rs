//! Access to the container runtime's local management API.
//!
//! # Key Components
//!
//! - [`Client`]: HTTP transport over a UNIX or TCP socket with buffered and
//!   streamed response modes.
//! - [`FirstObject`] / [`MultiObject`]: extraction policies for streamed bodies.
//! - [`RuntimeApi`]: the operations the probe needs, implemented by [`Docker`].
//!
//! # Endpoints
//!
//! - `/containers/json?status=running`: buffered, array of summaries.
//! - `/containers/{id}/json`: buffered, container descriptor.
//! - `/events?since={t0}&until={t1}`: streamed, every document is kept.
//! - `/containers/{id}/stats`: streamed, only the first document is kept.
mod client;
mod error;
mod extract;
pub mod models;

use std::future::Future;

use serde::de::DeserializeOwned;

pub use client::{Address, Client, InvalidAddress, Response};
pub use error::{Error, ErrorClass, Result};
pub use extract::{FirstObject, MAX_PARSE_FAILURES, MultiObject};

use crate::container::ContainerID;
use models::{
    ContainerDescriptor, ContainerSummary, LifecycleEvent, RawEvent, StatsSnapshot,
};

pub fn running_containers_uri() -> String {
    "/containers/json?status=running".to_owned()
}

pub fn container_uri(id: &ContainerID) -> String {
    format!("/containers/{id}/json")
}

/// Event log query for the closed second range `[since, until]`.
pub fn events_uri(since: i64, until: i64) -> String {
    format!("/events?since={since}&until={until}")
}

pub fn stats_uri(id: &ContainerID) -> String {
    format!("/containers/{id}/stats")
}

/// Operations the probe performs against the runtime.
pub trait RuntimeApi {
    /// Lists the ids of all running containers.
    ///
    /// Returns `Ok(None)` if the runtime answered with an empty body.
    fn running_containers(&self) -> impl Future<Output = Result<Option<Vec<ContainerID>>>>;

    /// Resolves the display name of a container.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedName`] if the runtime does not know the container or
    /// its descriptor is empty or has no name, in addition to the transport and
    /// protocol errors.
    fn container_name(&self, id: &ContainerID) -> impl Future<Output = Result<String>>;

    /// Fetches the lifecycle events emitted in the closed second range
    /// `[since, until]`.
    fn events(&self, since: i64, until: i64) -> impl Future<Output = Result<Vec<LifecycleEvent>>>;

    /// Fetches the current stats snapshot of a container.
    ///
    /// Returns `Ok(None)` if the stream ended or was abandoned before a
    /// complete snapshot arrived.
    fn stats(&self, id: &ContainerID) -> impl Future<Output = Result<Option<StatsSnapshot>>>;
}

/// [`RuntimeApi`] backed by the runtime's HTTP API.
#[derive(Debug, Clone)]
pub struct Docker {
    client: Client,
}

impl Docker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches and decodes a buffered JSON document.
    ///
    /// Returns `Ok(None)` for an empty body.
    async fn get_json<T: DeserializeOwned>(&self, uri: &str) -> Result<Option<T>> {
        let response = self.client.get(uri).await?;
        if response.status != 200 {
            return Err(Error::Status {
                uri: uri.to_owned(),
                status: response.status,
                body: String::from_utf8_lossy(&response.body).trim().to_owned(),
            });
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&response.body)
            .map(Some)
            .map_err(|source| Error::Decode {
                uri: uri.to_owned(),
                source,
            })
    }
}

impl RuntimeApi for Docker {
    async fn running_containers(&self) -> Result<Option<Vec<ContainerID>>> {
        let uri = running_containers_uri();
        let containers: Option<Vec<ContainerSummary>> = self.get_json(&uri).await?;
        Ok(containers.map(|containers| containers.into_iter().map(|c| c.id).collect()))
    }

    async fn container_name(&self, id: &ContainerID) -> Result<String> {
        let uri = container_uri(id);
        let descriptor: Option<ContainerDescriptor> = match self.get_json(&uri).await {
            // The runtime already forgot the container, e.g. after `destroy`.
            Err(Error::Status { status: 404, .. }) => None,
            other => other?,
        };
        descriptor
            .as_ref()
            .and_then(ContainerDescriptor::display_name)
            .map(str::to_owned)
            .ok_or_else(|| Error::UnresolvedName {
                uri,
                id: id.to_string(),
            })
    }

    async fn events(&self, since: i64, until: i64) -> Result<Vec<LifecycleEvent>> {
        let uri = events_uri(since, until);
        let mut extractor = MultiObject::<RawEvent>::new();
        self.client
            .stream(&uri, |fragment| extractor.push(fragment))
            .await?;

        Ok(extractor
            .into_items()
            .into_iter()
            .filter_map(|raw| {
                LifecycleEvent::try_from(raw)
                    .map_err(|raw| log::trace!("ignoring non-container event: {:?}", raw))
                    .ok()
            })
            .collect())
    }

    async fn stats(&self, id: &ContainerID) -> Result<Option<StatsSnapshot>> {
        let uri = stats_uri(id);
        let mut extractor = FirstObject::<StatsSnapshot>::new();
        self.client
            .stream(&uri, |fragment| extractor.push(fragment))
            .await?;

        let snapshot = extractor.into_value();
        if snapshot.is_none() {
            log::debug!("no stats snapshot for container `{}`", id.short());
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;

    /// Serves one canned response per accepted connection, in order.
    fn serve(listener: UnixListener, responses: Vec<String>) {
        tokio::spawn(async move {
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut chunk = [0u8; 512];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
    }

    fn ok(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn chunked(chunks: &[&str]) -> String {
        let mut out = String::from("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
        for chunk in chunks {
            out.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), chunk));
        }
        out.push_str("0\r\n\r\n");
        out
    }

    fn docker(dir: &tempfile::TempDir) -> (Docker, UnixListener) {
        let path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let client = Client::new(
            Address::Unix(path),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        (Docker::new(client), listener)
    }

    #[tokio::test]
    async fn test_running_containers_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(
            listener,
            vec![ok(r#"[{"Id":"a","Names":["/web"]}]"#), ok(r#"{"Name":"/web"}"#)],
        );

        let ids = docker.running_containers().await.unwrap().unwrap();
        assert_eq!(ids, vec![ContainerID::new("a").unwrap()]);
        assert_eq!(docker.container_name(&ids[0]).await.unwrap(), "web");
    }

    #[tokio::test]
    async fn test_empty_body_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(listener, vec![ok(""), ok("")]);

        assert_eq!(docker.running_containers().await.unwrap(), None);
        let err = docker
            .container_name(&ContainerID::new("a").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnresolvedName);
    }

    #[tokio::test]
    async fn test_unknown_container_name_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        let body = r#"{"message":"No such container: c1"}"#;
        serve(
            listener,
            vec![format!(
                "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            )],
        );

        let err = docker
            .container_name(&ContainerID::new("c1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedName { .. }));
        assert_eq!(err.class(), ErrorClass::UnresolvedName);
        assert_eq!(err.uri(), "/containers/c1/json");
    }

    #[tokio::test]
    async fn test_container_name_server_error_stays_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(
            listener,
            vec!["HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\n\r\noops".to_owned()],
        );

        let err = docker
            .container_name(&ContainerID::new("c1").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Protocol);
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(listener, vec![ok("[{")]);

        let err = docker.running_containers().await.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(err.class(), ErrorClass::Protocol);
        assert_eq!(err.uri(), "/containers/json?status=running");
    }

    #[tokio::test]
    async fn test_events_window() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(
            listener,
            vec![chunked(&[
                r#"[{"status":"die","id":"c1","from":"nginx","time":10},{"Type":"network","Action":"connect","Actor":{"ID":"7b2c0e8a1234"}}]"#,
            ])],
        );

        let events = docker.events(10, 14).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, "die");
        assert_eq!(events[0].id.as_ref(), "c1");
        assert_eq!(events[0].image.as_deref(), Some("nginx"));
    }

    #[tokio::test]
    async fn test_stats_first_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(
            listener,
            vec![chunked(&[
                r#"{"read":"2024-01-01T00:00:00Z","memory_stats":{"usage":1,"limit":2}}"#,
                r#"{"read":"2024-01-01T00:00:01Z","memory_stats":{"usage":2,"limit":2}}"#,
            ])],
        );

        let snapshot = docker
            .stats(&ContainerID::new("c1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.memory_stats.usage, Some(1));
    }

    #[tokio::test]
    async fn test_stats_stream_ending_early_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (docker, listener) = docker(&dir);
        serve(listener, vec![chunked(&[r#"{"read":"#])]);

        let snapshot = docker.stats(&ContainerID::new("c1").unwrap()).await.unwrap();
        assert!(snapshot.is_none());
    }
}
