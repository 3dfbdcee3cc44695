//! In-memory view of the containers the probe currently believes are running.
//!
//! A [`ContainerRecord`] starts out with only a display name. Its previous
//! counters are seeded by the first successful stats poll and replaced by
//! every later one; deltas are only computed once a previous sample exists.

use std::collections::HashMap;

use crate::container::ContainerID;
use crate::docker::models::{CpuUsage, NetworkCounters};

/// Runtime lifecycle statuses that make a container tracked.
pub const START_EVENTS: [&str; 2] = ["start", "unpause"];
/// Runtime lifecycle statuses that make a container untracked.
pub const STOP_EVENTS: [&str; 5] = ["oom", "destroy", "die", "kill", "pause"];

/// Effect of a lifecycle status on the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    /// Not relevant for tracking; still eligible for reporting.
    Other,
}

impl Transition {
    pub fn of(status: &str) -> Self {
        if STOP_EVENTS.contains(&status) {
            Transition::Stop
        } else if START_EVENTS.contains(&status) {
            Transition::Start
        } else {
            Transition::Other
        }
    }
}

/// Last observed state of a tracked container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    pub name: String,
    pub last_network: Option<NetworkCounters>,
    pub last_cpu_usage: Option<CpuUsage>,
    pub last_system_cpu_usage: Option<u64>,
}

impl ContainerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Registry {
    containers: HashMap<ContainerID, ContainerRecord>,
}

impl Registry {
    /// Builds a registry holding exactly the given containers, without counters.
    pub fn from_names(names: impl IntoIterator<Item = (ContainerID, String)>) -> Self {
        Self {
            containers: names
                .into_iter()
                .map(|(id, name)| (id, ContainerRecord::new(name)))
                .collect(),
        }
    }

    /// Starts tracking a container, or refreshes the name of a tracked one.
    ///
    /// Previously seeded counters of a tracked container are kept.
    pub fn track(&mut self, container_id: ContainerID, name: String) {
        match self.containers.get_mut(&container_id) {
            Some(record) => record.name = name,
            None => {
                log::debug!("tracking container `{}` ({})", container_id.short(), name);
                self.containers
                    .insert(container_id, ContainerRecord::new(name));
            }
        }
    }

    /// Stops tracking a container. Untracked ids are ignored.
    pub fn untrack(&mut self, container_id: &ContainerID) {
        if let Some(record) = self.containers.remove(container_id) {
            log::debug!(
                "untracking container `{}` ({})",
                container_id.short(),
                record.name
            );
        }
    }

    pub fn get(&self, container_id: &ContainerID) -> Option<&ContainerRecord> {
        self.containers.get(container_id)
    }

    pub fn get_mut(&mut self, container_id: &ContainerID) -> Option<&mut ContainerRecord> {
        self.containers.get_mut(container_id)
    }

    pub fn name(&self, container_id: &ContainerID) -> Option<&str> {
        self.get(container_id).map(|record| record.name.as_str())
    }

    pub fn contains(&self, container_id: &ContainerID) -> bool {
        self.containers.contains_key(container_id)
    }

    /// Returns the tracked ids in a stable order.
    pub fn ids(&self) -> Vec<ContainerID> {
        let mut ids: Vec<_> = self.containers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ContainerID {
        ContainerID::new(raw).unwrap()
    }

    #[test]
    fn test_transition_of() {
        assert_eq!(Transition::of("start"), Transition::Start);
        assert_eq!(Transition::of("unpause"), Transition::Start);
        for status in STOP_EVENTS {
            assert_eq!(Transition::of(status), Transition::Stop);
        }
        assert_eq!(Transition::of("stop"), Transition::Other);
        assert_eq!(Transition::of("exec_start"), Transition::Other);
    }

    #[test]
    fn test_untrack_missing_is_noop() {
        let mut registry = Registry::from_names([(id("a"), "web".to_owned())]);
        registry.untrack(&id("b"));
        assert_eq!(registry, Registry::from_names([(id("a"), "web".to_owned())]));
    }

    #[test]
    fn test_track_existing_keeps_counters() {
        let mut registry = Registry::from_names([(id("a"), "web".to_owned())]);
        {
            let record = registry.get_mut(&id("a")).unwrap();
            record.last_system_cpu_usage = Some(10);
            record.last_network = Some(NetworkCounters::from([("rx_bytes".to_owned(), 5)]));
        }

        registry.track(id("a"), "web-renamed".to_owned());

        let record = registry.get(&id("a")).unwrap();
        assert_eq!(record.name, "web-renamed");
        assert_eq!(record.last_system_cpu_usage, Some(10));
        assert!(record.last_network.is_some());
    }

    #[test]
    fn test_track_and_untrack() {
        let mut registry = Registry::default();
        registry.track(id("b"), "db".to_owned());
        registry.track(id("a"), "web".to_owned());
        assert_eq!(registry.ids(), vec![id("a"), id("b")]);
        assert_eq!(registry.name(&id("b")), Some("db"));

        registry.untrack(&id("b"));
        assert!(!registry.contains(&id("b")));
        assert_eq!(registry.len(), 1);
    }
}
