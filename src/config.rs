use std::time::Duration;

use crate::error::MonitorError;

/// Lowest interval the polling loop may run at. Initial values must be strictly above it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Step applied by the interval increase/decrease commands.
pub const INTERVAL_STEP: Duration = Duration::from_millis(500);

/// How port liveness is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PortProbeKind {
    /// `HEAD http://addr:port`, open when the response status is 2xx.
    #[default]
    Http,
    /// Plain TCP connect.
    Tcp,
}

/// Already-parsed runtime configuration for the orchestrator.
///
/// `interval` is the wait between probe cycles of one target. `probe_timeout`
/// bounds every single probe and is independent of the interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub port_probe: PortProbeKind,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            probe_timeout: Duration::from_millis(5000),
            port_probe: PortProbeKind::Http,
        }
    }
}

impl MonitorConfig {
    pub fn new(interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            interval,
            probe_timeout,
            ..Self::default()
        }
    }

    pub fn with_port_probe(mut self, kind: PortProbeKind) -> Self {
        self.port_probe = kind;
        self
    }

    /// Reject an initial interval at or below [`MIN_INTERVAL`].
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.interval <= MIN_INTERVAL {
            return Err(MonitorError::IntervalTooShort {
                got: self.interval,
                min: MIN_INTERVAL,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn interval_at_floor_is_rejected() {
        let cfg = MonitorConfig::new(Duration::from_millis(1000), Duration::from_millis(200));
        assert_eq!(
            cfg.validate(),
            Err(MonitorError::IntervalTooShort {
                got: Duration::from_millis(1000),
                min: MIN_INTERVAL,
            })
        );
    }

    #[test]
    fn short_probe_timeout_is_fine() {
        // The floor only applies to the interval.
        let cfg = MonitorConfig::new(Duration::from_millis(1500), Duration::from_millis(50));
        assert!(cfg.validate().is_ok());
    }
}
