//! Response documents of the runtime's management API.
//!
//! Only the fields the probe consumes are modelled; everything else in the
//! runtime's (large) documents is ignored during deserialization. Fields that
//! differ between runtime generations are optional.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::container::ContainerID;

/// Entry of `/containers/json`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: ContainerID,
}

/// The part of `/containers/{id}/json` the probe needs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ContainerDescriptor {
    #[serde(rename = "Name")]
    pub name: Option<String>,
}

impl ContainerDescriptor {
    /// Returns the display name without the runtime's leading `/`.
    ///
    /// Returns `None` if the descriptor carries no (or an empty) name.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(|name| name.strip_prefix('/').unwrap_or(name))
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
struct EventActor {
    #[serde(rename = "ID")]
    id: Option<String>,
}

/// Raw entry of `/events`, as emitted by both legacy and current runtimes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct RawEvent {
    /// Object kind of current runtimes (`container`, `network`, `volume`, ...).
    #[serde(rename = "Type")]
    kind: Option<String>,
    status: Option<String>,
    id: Option<String>,
    from: Option<String>,
    time: Option<i64>,
    #[serde(rename = "Action")]
    action: Option<String>,
    #[serde(rename = "Actor", default)]
    actor: EventActor,
}

/// A container lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub id: ContainerID,
    pub status: String,
    pub image: Option<String>,
    /// Epoch seconds at which the runtime emitted the event.
    pub time: Option<i64>,
}

impl TryFrom<RawEvent> for LifecycleEvent {
    type Error = RawEvent;

    /// Normalizes a raw event, preferring the legacy `status`/`id` fields and
    /// falling back to `Action`/`Actor.ID`.
    ///
    /// Returns the raw event back if it concerns another object kind, or has no
    /// usable status or container id.
    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        if raw.kind.as_deref().is_some_and(|kind| kind != "container") {
            return Err(raw);
        }
        let status = raw.status.clone().or_else(|| raw.action.clone());
        let id = raw
            .id
            .as_deref()
            .or(raw.actor.id.as_deref())
            .and_then(|id| ContainerID::new(id).ok());
        match (status, id) {
            (Some(status), Some(id)) => Ok(LifecycleEvent {
                id,
                status,
                image: raw.from,
                time: raw.time,
            }),
            _ => Err(raw),
        }
    }
}

/// `cpu_stats.cpu_usage` of a stats document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    pub system_cpu_usage: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct MemoryStats {
    pub usage: Option<u64>,
    pub max_usage: Option<u64>,
    pub limit: Option<u64>,
}

/// Cumulative network counters keyed by counter name.
///
/// Per-interface counters are keyed `<iface>.<counter>`.
pub type NetworkCounters = BTreeMap<String, u64>;

/// The first document of `/containers/{id}/stats`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct StatsSnapshot {
    /// When the runtime took the sample.
    pub read: DateTime<Utc>,
    #[serde(default)]
    network: Option<NetworkCounters>,
    #[serde(default)]
    networks: Option<BTreeMap<String, NetworkCounters>>,
    #[serde(default)]
    pub memory_stats: MemoryStats,
    #[serde(default)]
    pub cpu_stats: CpuStats,
}

impl StatsSnapshot {
    /// Returns the cumulative network counters of the container.
    ///
    /// The flat legacy `network` map is used as-is; the per-interface
    /// `networks` map is flattened into `<iface>.<counter>` keys.
    pub fn network_counters(&self) -> NetworkCounters {
        if let Some(network) = &self.network {
            return network.clone();
        }

        let mut out = NetworkCounters::new();
        for (iface, counters) in self.networks.iter().flatten() {
            for (counter, value) in counters {
                out.insert(format!("{iface}.{counter}"), *value);
            }
        }
        out
    }

    /// Epoch seconds of [`StatsSnapshot::read`].
    pub fn read_time(&self) -> i64 {
        self.read.timestamp()
    }
}
