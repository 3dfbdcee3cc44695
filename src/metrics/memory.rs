use super::{Sample, Severity, Thresholds};
use crate::docker::models::MemoryStats;

const DESCRIPTION: &str = "docker container memory usage";
const ZERO_LIMIT_DESCRIPTION: &str = "docker container memory limit is zero";

/// Computes memory usage and peak usage as fractions of the memory limit.
///
/// Nothing is returned if the runtime did not report usage and limit. A zero
/// limit yields a single `critical` sample without a metric value.
///
/// # Examples
///
/// ```
/// # use docker_probe::docker::models::MemoryStats;
/// # use docker_probe::metrics::{memory, Severity, Thresholds};
/// let stats = MemoryStats { usage: Some(90), max_usage: Some(96), limit: Some(100) };
/// let limits = Thresholds { warning: 0.85, critical: 0.95 };
/// let samples = memory(&stats, &limits);
/// assert_eq!(samples[0].severity, Severity::Warning);
/// assert_eq!(samples[1].severity, Severity::Critical);
/// ```
pub fn memory(stats: &MemoryStats, limits: &Thresholds) -> Vec<Sample> {
    let (Some(usage), Some(limit)) = (stats.usage, stats.limit) else {
        return Vec::new();
    };

    if limit == 0 {
        return vec![Sample {
            key: "memory_usage".to_owned(),
            metric: None,
            severity: Severity::Critical,
            description: ZERO_LIMIT_DESCRIPTION,
        }];
    }

    let limit = limit as f64;
    [("memory_usage", Some(usage)), ("memory_max_usage", stats.max_usage)]
        .into_iter()
        .filter_map(|(key, value)| {
            let fraction = value? as f64 / limit;
            Some(Sample {
                key: key.to_owned(),
                metric: Some(fraction),
                severity: limits.classify(fraction),
                description: DESCRIPTION,
            })
        })
        .collect()
}
