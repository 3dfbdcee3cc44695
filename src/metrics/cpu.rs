use super::{Sample, Thresholds};
use crate::docker::models::CpuUsage;

const DESCRIPTION: &str = "docker container cpu usage";

/// Cumulative CPU counters of one stats sample.
#[derive(Debug, Clone, Copy)]
pub struct CpuCounters<'a> {
    pub usage: &'a CpuUsage,
    /// Cumulative CPU time of the whole host.
    pub system: u64,
}

fn fraction(current: u64, previous: u64, elapsed_system: i128) -> f64 {
    (i128::from(current) - i128::from(previous)) as f64 / elapsed_system as f64
}

/// Computes container and per-core CPU usage between two samples.
///
/// Each value is the consumed CPU time divided by the system CPU time that
/// elapsed between the samples. Per-core values pair cores index by index and
/// share the same denominator.
///
/// # Returns
///
/// `None` if no system CPU time elapsed, since nothing can be measured then.
pub fn cpu(
    previous: CpuCounters<'_>,
    current: CpuCounters<'_>,
    limits: &Thresholds,
) -> Option<Vec<Sample>> {
    let elapsed_system = i128::from(current.system) - i128::from(previous.system);
    if elapsed_system <= 0 {
        return None;
    }

    let total = fraction(
        current.usage.total_usage,
        previous.usage.total_usage,
        elapsed_system,
    );
    let mut samples = vec![Sample {
        key: "cpu_usage".to_owned(),
        metric: Some(total),
        severity: limits.classify(total),
        description: DESCRIPTION,
    }];

    let per_core = current
        .usage
        .percpu_usage
        .iter()
        .flatten()
        .zip(previous.usage.percpu_usage.iter().flatten());
    for (index, (now, before)) in per_core.enumerate() {
        let core = fraction(*now, *before, elapsed_system);
        samples.push(Sample {
            key: format!("cpu_{index}_usage"),
            metric: Some(core),
            severity: limits.classify(core),
            description: DESCRIPTION,
        });
    }

    Some(samples)
}
