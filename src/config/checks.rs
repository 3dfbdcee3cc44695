use std::str::FromStr;

use super::Error;

/// A check family that can be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Cpu,
    Event,
    Network,
    Memory,
}

impl FromStr for Check {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Check::Cpu),
            "event" => Ok(Check::Event),
            "network" => Ok(Check::Network),
            "memory" => Ok(Check::Memory),
            other => Err(Error::UnknownCheck(other.to_owned())),
        }
    }
}

/// The set of enabled checks, resolved once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checks {
    pub events: bool,
    pub network: bool,
    pub cpu: bool,
    pub memory: bool,
}

impl Checks {
    pub fn all() -> Self {
        Self {
            events: true,
            network: true,
            cpu: true,
            memory: true,
        }
    }

    /// Whether any check requires polling container stats.
    pub fn any_stats(&self) -> bool {
        self.network || self.cpu || self.memory
    }
}

impl FromIterator<Check> for Checks {
    fn from_iter<I: IntoIterator<Item = Check>>(iter: I) -> Self {
        let mut checks = Checks::default();
        for check in iter {
            match check {
                Check::Cpu => checks.cpu = true,
                Check::Event => checks.events = true,
                Check::Network => checks.network = true,
                Check::Memory => checks.memory = true,
            }
        }
        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_from_iter() {
        let checks: Checks = [Check::Event, Check::Memory].into_iter().collect();
        assert!(checks.events);
        assert!(checks.memory);
        assert!(!checks.cpu);
        assert!(checks.any_stats());

        let checks: Checks = [Check::Event].into_iter().collect();
        assert!(!checks.any_stats());
    }

    #[test]
    fn test_parse_check() {
        assert_eq!("network".parse::<Check>().unwrap(), Check::Network);
        assert!(matches!(
            "disk".parse::<Check>(),
            Err(Error::UnknownCheck(name)) if name == "disk"
        ));
    }
}
