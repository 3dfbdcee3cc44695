//! Events emitted by the probe and their delivery.
//!
//! [`Reporter`] wraps an [`EventSink`] and applies the decorations every event
//! shares (TTL, tags, host, attributes) before handing it over.
mod error;
mod sink;

use std::collections::{BTreeMap, BTreeSet};

pub use error::{Error, Result};
pub use sink::{EventSink, JsonLinesSink};

use crate::docker::{self, ErrorClass};
use crate::metrics::Severity;

/// Service name of reported runtime API failures.
pub const FAILURE_SERVICE: &str = "docker";

/// Serialized [`Event`] fields; attributes must not use these names.
pub const RESERVED_FIELDS: [&str; 8] = [
    "service",
    "state",
    "description",
    "metric",
    "tags",
    "time",
    "host",
    "ttl",
];

/// A single health event.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Event {
    pub service: String,
    pub state: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
    pub tags: BTreeSet<String>,
    /// Epoch seconds the event refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Seconds the event stays valid at the sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<f32>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new(service: impl Into<String>, state: Severity, description: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            state,
            description: description.into(),
            metric: None,
            tags: BTreeSet::new(),
            time: None,
            host: None,
            ttl: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Decorations applied to every reported event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decorations {
    /// TTL for events reported without one, see [`Reporter::report`].
    pub ttl: Option<f32>,
    pub tags: Vec<String>,
    pub host: Option<String>,
    /// Merged into every event, overriding event attributes of the same name.
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Reporter<S> {
    sink: S,
    decorations: Decorations,
}

impl<S: EventSink> Reporter<S> {
    pub fn new(sink: S, decorations: Decorations) -> Self {
        Self { sink, decorations }
    }

    /// Reports an event, defaulting its TTL to the configured one.
    pub fn report(&mut self, mut event: Event) -> Result<()> {
        if event.ttl.is_none() {
            event.ttl = self.decorations.ttl;
        }
        self.report_no_ttl(event)
    }

    /// Reports an event without defaulting its TTL.
    pub fn report_no_ttl(&mut self, mut event: Event) -> Result<()> {
        event.tags.extend(self.decorations.tags.iter().cloned());
        if let Some(host) = &self.decorations.host {
            event.host = Some(host.clone());
        }
        event.attributes.extend(
            self.decorations
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.sink.send(event)
    }

    /// Reports a runtime API failure as a `critical` event of the probe itself.
    ///
    /// Unresolved container names are only logged: the affected lifecycle or
    /// stats event is dropped instead.
    pub fn report_failure(&mut self, err: &docker::Error) -> Result<()> {
        let description = match err.class() {
            ErrorClass::UnresolvedName => {
                log::debug!("{}", err);
                return Ok(());
            }
            ErrorClass::Connection => format!("Docker remote API connection error: {err}"),
            ErrorClass::Protocol => format!("Docker remote API response error: {err}"),
        };
        log::error!("{}", description);

        self.report(
            Event::new(FAILURE_SERVICE, Severity::Critical, description)
                .with_tags([FAILURE_SERVICE])
                .with_attribute("uri", err.uri()),
        )
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
