//! Probe configuration.
//!
//! Every setting is read once at startup from a `PROBE_*` environment variable
//! and falls back to a default when unset:
//!
//! | Variable | Default |
//! |---|---|
//! | `PROBE_DOCKER_ADDRESS` | `unix:///var/run/docker.sock` |
//! | `PROBE_CHECKS` | `cpu,event,network,memory` |
//! | `PROBE_READ_TIMEOUT` | `2` (seconds) |
//! | `PROBE_OPEN_TIMEOUT` | `1` (seconds) |
//! | `PROBE_MEMORY_WARNING` / `PROBE_MEMORY_CRITICAL` | `0.85` / `0.95` |
//! | `PROBE_CPU_WARNING` / `PROBE_CPU_CRITICAL` | `0.9` / `0.95` |
//! | `PROBE_NETWORK_WARNING` | `rx_dropped,rx_errors,tx_dropped,tx_errors` |
//! | `PROBE_NETWORK_CRITICAL` | (none) |
//! | `PROBE_WARNING_EVENTS` | `die,destroy,kill,pause,stop` |
//! | `PROBE_CRITICAL_EVENTS` | `oom` |
//! | `PROBE_INTERVAL` | `5` (seconds) |
//! | `PROBE_TTL` | twice the interval |
//! | `PROBE_TAGS` | (none) |
//! | `PROBE_ATTRIBUTES` | (none), as `key=value,...` |
//! | `PROBE_EVENT_HOST` | (none) |
//!
//! List values are comma-separated; an empty value means an empty list.
mod checks;
mod error;

use std::collections::BTreeMap;
use std::time::Duration;

pub use checks::{Check, Checks};
pub use error::{Error, Result};

use crate::docker::Address;
use crate::metrics::{NameLevels, Thresholds};
use crate::probe::Settings;
use crate::report::{Decorations, RESERVED_FIELDS};

const DEFAULT_DOCKER_ADDRESS: &str = "unix:///var/run/docker.sock";
const DEFAULT_CHECKS: &str = "cpu,event,network,memory";
const DEFAULT_NETWORK_WARNING: &str = "rx_dropped,rx_errors,tx_dropped,tx_errors";
const DEFAULT_WARNING_EVENTS: &str = "die,destroy,kill,pause,stop";
const DEFAULT_CRITICAL_EVENTS: &str = "oom";

/// Fully resolved probe configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub docker_address: Address,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Time between two ticks.
    pub interval: Duration,
    pub settings: Settings,
    pub decorations: Decorations,
}

impl Config {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] naming the first variable with an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves the configuration from an arbitrary variable lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value of a variable, or `None` if unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);

        let address = vars.string("PROBE_DOCKER_ADDRESS", DEFAULT_DOCKER_ADDRESS);
        let docker_address = address
            .parse::<Address>()
            .map_err(|source| Error::InvalidAddress {
                name: "PROBE_DOCKER_ADDRESS",
                source,
            })?;

        let checks = vars
            .list("PROBE_CHECKS", DEFAULT_CHECKS)
            .iter()
            .map(|check| check.parse::<Check>())
            .collect::<Result<Checks>>()?;

        let memory = vars.thresholds(
            ("PROBE_MEMORY_WARNING", 0.85),
            ("PROBE_MEMORY_CRITICAL", 0.95),
        )?;
        let cpu = vars.thresholds(("PROBE_CPU_WARNING", 0.9), ("PROBE_CPU_CRITICAL", 0.95))?;

        let interval = vars.seconds("PROBE_INTERVAL", 5.0)?;
        let ttl = match lookup("PROBE_TTL") {
            Some(_) => vars.seconds("PROBE_TTL", 0.0)?.as_secs_f32(),
            None => interval.as_secs_f32() * 2.0,
        };

        let attributes = vars
            .list("PROBE_ATTRIBUTES", "")
            .into_iter()
            .map(|attribute| match attribute.split_once('=') {
                Some((key, _)) if RESERVED_FIELDS.contains(&key) => Err(Error::InvalidValue {
                    name: "PROBE_ATTRIBUTES",
                    value: attribute,
                    reason: "attribute name is reserved for an event field",
                }),
                Some((key, value)) if !key.is_empty() => {
                    Ok((key.to_owned(), value.to_owned()))
                }
                _ => Err(Error::InvalidValue {
                    name: "PROBE_ATTRIBUTES",
                    value: attribute,
                    reason: "expected `key=value`",
                }),
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Config {
            docker_address,
            connect_timeout: vars.seconds("PROBE_OPEN_TIMEOUT", 1.0)?,
            read_timeout: vars.seconds("PROBE_READ_TIMEOUT", 2.0)?,
            interval,
            settings: Settings {
                checks,
                memory,
                cpu,
                network: NameLevels::new(
                    vars.list("PROBE_NETWORK_WARNING", DEFAULT_NETWORK_WARNING),
                    vars.list("PROBE_NETWORK_CRITICAL", ""),
                ),
                events: NameLevels::new(
                    vars.list("PROBE_WARNING_EVENTS", DEFAULT_WARNING_EVENTS),
                    vars.list("PROBE_CRITICAL_EVENTS", DEFAULT_CRITICAL_EVENTS),
                ),
            },
            decorations: Decorations {
                ttl: Some(ttl),
                tags: vars.list("PROBE_TAGS", ""),
                host: lookup("PROBE_EVENT_HOST").filter(|host| !host.is_empty()),
                attributes,
            },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_owned())
    }

    fn list(&self, name: &str, default: &str) -> Vec<String> {
        self.string(name, default)
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn fraction(&self, name: &'static str, default: f64) -> Result<f64> {
        let Some(raw) = (self.0)(name) else {
            return Ok(default);
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
            _ => Err(Error::InvalidValue {
                name,
                value: raw,
                reason: "expected a non-negative number",
            }),
        }
    }

    fn thresholds(
        &self,
        (warning_name, warning): (&'static str, f64),
        (critical_name, critical): (&'static str, f64),
    ) -> Result<Thresholds> {
        Ok(Thresholds {
            warning: self.fraction(warning_name, warning)?,
            critical: self.fraction(critical_name, critical)?,
        })
    }

    fn seconds(&self, name: &'static str, default: f64) -> Result<Duration> {
        let seconds = self.fraction(name, default)?;
        match Duration::try_from_secs_f64(seconds) {
            Ok(duration) if !duration.is_zero() => Ok(duration),
            _ => Err(Error::InvalidValue {
                name,
                value: seconds.to_string(),
                reason: "expected a positive number of seconds",
            }),
        }
    }
}
