//! The probe loop.
//!
//! A [`Probe`] owns the [`Registry`] and drives one tick at a time:
//!
//! 1. While uninitialized, bootstrap the registry from the running containers.
//! 2. Otherwise advance the check window and fetch its lifecycle events.
//! 3. Apply the events to the registry and report them.
//! 4. Poll the stats of every tracked container and report derived metrics.
//!
//! Runtime API failures never escape a tick. They are either reported as
//! `critical` events or drop the affected unit of work. The only error a tick
//! returns is a failure of the event sink itself.
mod schedule;

use std::collections::HashMap;

pub use schedule::{next_sleep, run};

use crate::config::Checks;
use crate::container::ContainerID;
use crate::docker::RuntimeApi;
use crate::docker::models::{LifecycleEvent, StatsSnapshot};
use crate::metrics::{self, CpuCounters, NameLevels, Sample, Thresholds};
use crate::registry::{ContainerRecord, Registry, Transition};
use crate::report::{self, Event, EventSink, Reporter};

/// Service name of reported lifecycle events.
pub const EVENTS_SERVICE: &str = "docker.events";

/// Which checks run and how their results are classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub checks: Checks,
    pub memory: Thresholds,
    pub cpu: Thresholds,
    /// Counter names whose increase is a warning or critical condition.
    pub network: NameLevels,
    /// Lifecycle statuses reported as warning or critical.
    pub events: NameLevels,
}

pub struct Probe<A, S> {
    api: A,
    reporter: Reporter<S>,
    settings: Settings,
    /// `None` until the first successful bootstrap.
    registry: Option<Registry>,
    /// End of the last check window, in epoch seconds.
    last_check: i64,
}

impl<A: RuntimeApi, S: EventSink> Probe<A, S> {
    pub fn new(api: A, reporter: Reporter<S>, settings: Settings) -> Self {
        Self {
            api,
            reporter,
            settings,
            registry: None,
            last_check: 0,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn reporter(&self) -> &Reporter<S> {
        &self.reporter
    }

    /// Returns the registry, or `None` while the probe is uninitialized.
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// Runs one tick at the current wall-clock time.
    pub async fn tick(&mut self) -> report::Result<()> {
        self.tick_at(chrono::Utc::now().timestamp()).await
    }

    /// Runs one tick as if the current time were `now` (epoch seconds).
    ///
    /// # Errors
    ///
    /// Returns a [`report::Error`] if the event sink rejected an event. The
    /// registry and check window stay consistent in that case; the events of
    /// the rest of the tick are lost.
    pub async fn tick_at(&mut self, now: i64) -> report::Result<()> {
        let Some(mut registry) = self.registry.take() else {
            return self.bootstrap(now).await;
        };

        let result = self.refresh(&mut registry, now).await;
        self.registry = Some(registry);
        result
    }

    /// Replaces the registry with the currently running containers.
    ///
    /// Containers whose name cannot be resolved are left out. On failure the
    /// probe stays uninitialized and the next tick retries.
    async fn bootstrap(&mut self, now: i64) -> report::Result<()> {
        let ids = match self.api.running_containers().await {
            Ok(Some(ids)) => ids,
            Ok(None) => {
                log::warn!("runtime returned no container list; retrying bootstrap next tick");
                return Ok(());
            }
            Err(err) => {
                log::warn!("bootstrap failed; retrying next tick");
                return self.reporter.report_failure(&err);
            }
        };

        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            match self.api.container_name(&id).await {
                Ok(name) => names.push((id, name)),
                Err(err) => self.reporter.report_failure(&err)?,
            }
        }

        let registry = Registry::from_names(names);
        log::debug!("bootstrapped registry with {} containers", registry.len());
        self.registry = Some(registry);
        self.last_check = now;
        Ok(())
    }

    async fn refresh(&mut self, registry: &mut Registry, now: i64) -> report::Result<()> {
        let events = self.window_events(now).await?;
        if !events.is_empty() {
            let known: HashMap<ContainerID, String> = events
                .iter()
                .filter_map(|event| {
                    let name = registry.name(&event.id)?;
                    Some((event.id.clone(), name.to_owned()))
                })
                .collect();

            self.apply_lifecycle(registry, &events).await?;
            if self.settings.checks.events {
                self.report_lifecycle(registry, &known, &events).await?;
            }
        }

        if self.settings.checks.any_stats() {
            for id in registry.ids() {
                self.poll_stats(registry, &id).await?;
            }
        }
        Ok(())
    }

    /// Advances the check window to `now` and fetches the events of the
    /// window left behind, `[last_check, now - 1]`.
    async fn window_events(&mut self, now: i64) -> report::Result<Vec<LifecycleEvent>> {
        let since = self.last_check;
        if now <= since {
            return Ok(Vec::new());
        }
        self.last_check = now;
        log::debug!("check window advanced to [{}, {})", since, now);

        match self.api.events(since, now - 1).await {
            Ok(events) => Ok(events),
            Err(err) => {
                self.reporter.report_failure(&err)?;
                Ok(Vec::new())
            }
        }
    }

    async fn apply_lifecycle(
        &mut self,
        registry: &mut Registry,
        events: &[LifecycleEvent],
    ) -> report::Result<()> {
        for event in events {
            match Transition::of(&event.status) {
                Transition::Stop => registry.untrack(&event.id),
                Transition::Start => match self.api.container_name(&event.id).await {
                    Ok(name) => registry.track(event.id.clone(), name),
                    Err(err) => self.reporter.report_failure(&err)?,
                },
                Transition::Other => {}
            }
        }
        Ok(())
    }

    /// Reports every lifecycle event whose container name can be resolved.
    ///
    /// Names are looked up in the registry as it was before the window was
    /// applied, then in the current registry, then at the runtime.
    async fn report_lifecycle(
        &mut self,
        registry: &Registry,
        known: &HashMap<ContainerID, String>,
        events: &[LifecycleEvent],
    ) -> report::Result<()> {
        for event in events {
            let tracked = known
                .get(&event.id)
                .map(String::as_str)
                .or_else(|| registry.name(&event.id));
            let name = match tracked {
                Some(name) => name.to_owned(),
                None => match self.api.container_name(&event.id).await {
                    Ok(name) => name,
                    Err(err) => {
                        self.reporter.report_failure(&err)?;
                        continue;
                    }
                },
            };

            self.reporter
                .report_no_ttl(lifecycle_event(&self.settings.events, event, name))?;
        }
        Ok(())
    }

    /// Fetches one stats snapshot, reports the enabled metric families and
    /// stores the snapshot's counters for the next tick.
    async fn poll_stats(&mut self, registry: &mut Registry, id: &ContainerID) -> report::Result<()> {
        let snapshot = match self.api.stats(id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(()),
            Err(err) => return self.reporter.report_failure(&err),
        };
        let Some(record) = registry.get_mut(id) else {
            return Ok(());
        };

        let samples = collect_samples(&self.settings, record, &snapshot);
        let time = snapshot.read_time();
        for (family, sample) in samples {
            self.reporter
                .report(metric_event(&record.name, family, sample, time))?;
        }
        Ok(())
    }
}

/// Derives the samples of every enabled family from `snapshot` and replaces
/// the previous counters of `record`.
///
/// Delta-based families only seed on the first snapshot of a container.
fn collect_samples(
    settings: &Settings,
    record: &mut ContainerRecord,
    snapshot: &StatsSnapshot,
) -> Vec<(&'static str, Sample)> {
    let mut samples = Vec::new();

    if settings.checks.network {
        let counters = snapshot.network_counters();
        if let Some(previous) = &record.last_network {
            samples.extend(
                metrics::network(previous, &counters, &settings.network)
                    .into_iter()
                    .map(|sample| ("network", sample)),
            );
        }
        record.last_network = Some(counters);
    }

    if settings.checks.memory {
        if snapshot.memory_stats.limit == Some(0) {
            log::warn!("container `{}` reports a zero memory limit", record.name);
        }
        samples.extend(
            metrics::memory(&snapshot.memory_stats, &settings.memory)
                .into_iter()
                .map(|sample| ("memory", sample)),
        );
    }

    if settings.checks.cpu {
        let usage = &snapshot.cpu_stats.cpu_usage;
        let system = snapshot.cpu_stats.system_cpu_usage;
        if let (Some(previous_usage), Some(previous_system), Some(system)) =
            (&record.last_cpu_usage, record.last_system_cpu_usage, system)
        {
            let previous = CpuCounters {
                usage: previous_usage,
                system: previous_system,
            };
            let current = CpuCounters { usage, system };
            match metrics::cpu(previous, current, &settings.cpu) {
                Some(cpu) => samples.extend(cpu.into_iter().map(|sample| ("cpu", sample))),
                None => log::debug!(
                    "no system cpu time elapsed for container `{}`; skipping cpu",
                    record.name
                ),
            }
        }
        record.last_cpu_usage = Some(usage.clone());
        record.last_system_cpu_usage = system;
    }

    samples
}

fn lifecycle_event(levels: &NameLevels, event: &LifecycleEvent, name: String) -> Event {
    let mut out = Event::new(
        EVENTS_SERVICE,
        levels.classify(&event.status),
        format!("Docker container {} event", event.status),
    )
    .with_tags(["docker", "container"])
    .with_attribute("container", name)
    .with_attribute("event", event.status.as_str());
    if let Some(image) = &event.image {
        out = out.with_attribute("image", image.as_str());
    }
    if let Some(time) = event.time {
        out = out.with_time(time);
    }
    out
}

fn metric_event(name: &str, family: &str, sample: Sample, time: i64) -> Event {
    let mut event = Event::new(
        format!("docker {} {}", name, sample.key),
        sample.severity,
        sample.description,
    )
    .with_tags(["docker", family])
    .with_attribute("container", name)
    .with_time(time);
    if let Some(metric) = sample.metric {
        event = event.with_metric(metric);
    }
    event
}
