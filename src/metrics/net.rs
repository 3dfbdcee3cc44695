use super::{NameLevels, Sample, Severity};
use crate::docker::models::NetworkCounters;

const DESCRIPTION: &str = "docker container network usage";

/// Returns the counter name of a (possibly interface-qualified) counter key.
fn counter_name(key: &str) -> &str {
    key.rsplit_once('.').map_or(key, |(_, counter)| counter)
}

/// Computes per-counter deltas between two network samples.
///
/// Only counters present in both samples are reported. A positive delta is
/// classified by the membership of the counter name in `levels`; a zero (or
/// negative, after a counter reset) delta is always `ok`.
pub fn network(
    previous: &NetworkCounters,
    current: &NetworkCounters,
    levels: &NameLevels,
) -> Vec<Sample> {
    current
        .iter()
        .filter_map(|(key, current)| {
            let previous = previous.get(key)?;
            let delta = i128::from(*current) - i128::from(*previous);
            let severity = if delta > 0 {
                levels.classify(counter_name(key))
            } else {
                Severity::Ok
            };
            Some(Sample {
                key: format!("network_{key}"),
                metric: Some(delta as f64),
                severity,
                description: DESCRIPTION,
            })
        })
        .collect()
}
