//! Derivation and classification of per-container health metrics.
//!
//! All functions in this module are pure: they turn a previous/current pair of
//! runtime counters into [`Sample`]s, each already classified into a
//! [`Severity`]. Turning samples into reported events is up to the caller.
//!
//! # Families
//!
//! - [`memory`]: usage and peak usage as a fraction of the limit.
//! - [`cpu`]: container and per-core CPU time as a fraction of elapsed
//!   system CPU time.
//! - [`network`]: per-counter deltas, classified by counter name.
mod cpu;
mod memory;
mod net;
mod severity;

pub use cpu::{CpuCounters, cpu};
pub use memory::memory;
pub use net::network;
pub use severity::{NameLevels, Severity, Thresholds};

/// One derived, classified metric of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Metric family and sub-key, e.g. `memory_usage` or `cpu_3_usage`.
    pub key: String,
    /// Missing when the input did not allow a meaningful value.
    pub metric: Option<f64>,
    pub severity: Severity,
    pub description: &'static str,
}
