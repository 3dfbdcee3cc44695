use std::time::Duration;

/// Coarse classification of a runtime API failure.
///
/// The probe decides how to surface a failure from its class alone: connection
/// and protocol failures are reported against the probe's own health service,
/// unresolved names only drop the affected unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The runtime could not be reached, or did not answer in time.
    Connection,
    /// The runtime answered with a non-200 status or an unparseable body.
    Protocol,
    /// The container has no resolvable descriptor.
    UnresolvedName,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to `{address}` for `{uri}`: {source}")]
    Connect {
        address: String,
        uri: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request `{uri}` timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },
    #[error("request `{uri}` failed: {source}")]
    Http {
        uri: String,
        #[source]
        source: hyper::Error,
    },
    #[error("failed to build request `{uri}`: {source}")]
    Request {
        uri: String,
        #[source]
        source: hyper::http::Error,
    },
    #[error("{status} - {body}")]
    Status {
        uri: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response of `{uri}`: {source}")]
    Decode {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("container `{id}` has no resolvable name")]
    UnresolvedName { uri: String, id: String },
}

impl Error {
    /// Returns the request path the failure belongs to.
    pub fn uri(&self) -> &str {
        match self {
            Error::Connect { uri, .. }
            | Error::Timeout { uri, .. }
            | Error::Http { uri, .. }
            | Error::Request { uri, .. }
            | Error::Status { uri, .. }
            | Error::Decode { uri, .. }
            | Error::UnresolvedName { uri, .. } => uri,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Connect { .. } | Error::Timeout { .. } | Error::Http { .. } => {
                ErrorClass::Connection
            }
            Error::Request { .. } | Error::Status { .. } | Error::Decode { .. } => {
                ErrorClass::Protocol
            }
            Error::UnresolvedName { .. } => ErrorClass::UnresolvedName,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
