use crate::docker::InvalidAddress;

/// Errors that may occur while resolving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for `{name}`: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("invalid value for `{name}`: {source}")]
    InvalidAddress {
        name: &'static str,
        #[source]
        source: InvalidAddress,
    },
    #[error("unknown check `{0}` (expected one of `cpu`, `event`, `network`, `memory`)")]
    UnknownCheck(String),
}

pub type Result<T> = std::result::Result<T, Error>;
