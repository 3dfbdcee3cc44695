use std::collections::BTreeSet;
use std::fmt;

/// Three-level health state attached to every reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractional limits of one metric family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Thresholds {
    /// Classifies a fraction. Limits are exclusive: a value equal to a limit
    /// stays at the lower severity.
    pub fn classify(&self, value: f64) -> Severity {
        if value > self.critical {
            Severity::Critical
        } else if value > self.warning {
            Severity::Warning
        } else {
            Severity::Ok
        }
    }
}

/// Name-membership based classification, used for network counters and
/// lifecycle statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameLevels {
    pub warning: BTreeSet<String>,
    pub critical: BTreeSet<String>,
}

impl NameLevels {
    pub fn new<W, C>(warning: W, critical: C) -> Self
    where
        W: IntoIterator,
        W::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            warning: warning.into_iter().map(Into::into).collect(),
            critical: critical.into_iter().map(Into::into).collect(),
        }
    }

    /// Classifies a name; critical membership wins over warning membership.
    pub fn classify(&self, name: &str) -> Severity {
        if self.critical.contains(name) {
            Severity::Critical
        } else if self.warning.contains(name) {
            Severity::Warning
        } else {
            Severity::Ok
        }
    }
}
