use std::ops::RangeInclusive;
use std::time::Duration;

use crate::types::GuardPolicy;

pub const POWER_THRESHOLD_RANGE: RangeInclusive<f64> = 1.0..=500.0;
pub const GUARD_INTERVAL_RANGE: RangeInclusive<u32> = 1..=60;
/// Shortest polling period the monitor accepts.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// Session-scoped monitor settings: the working copy of the guard policy plus
/// the polling period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// Watts
    pub active_power_threshold: f64,
    pub guard_interval_minutes: u32,
    pub refresh_interval: Duration,
    pub auto_guard_enabled: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            active_power_threshold: 100.0,
            guard_interval_minutes: 5,
            refresh_interval: Duration::from_millis(5000),
            auto_guard_enabled: true,
        }
    }
}

impl MonitorSettings {
    /// Pull every field into its accepted range.
    pub fn clamped(self) -> Self {
        Self {
            active_power_threshold: clamp_threshold(self.active_power_threshold),
            guard_interval_minutes: clamp_guard_interval(self.guard_interval_minutes),
            refresh_interval: clamp_refresh_interval(self.refresh_interval),
            auto_guard_enabled: self.auto_guard_enabled,
        }
    }

    pub fn policy(&self) -> GuardPolicy {
        GuardPolicy {
            enabled: self.auto_guard_enabled,
            active_power_threshold: self.active_power_threshold,
            guard_interval_minutes: self.guard_interval_minutes,
        }
    }
}

pub fn clamp_threshold(watts: f64) -> f64 {
    if watts.is_nan() {
        return *POWER_THRESHOLD_RANGE.start();
    }
    watts.clamp(*POWER_THRESHOLD_RANGE.start(), *POWER_THRESHOLD_RANGE.end())
}

pub fn clamp_guard_interval(minutes: u32) -> u32 {
    minutes.clamp(*GUARD_INTERVAL_RANGE.start(), *GUARD_INTERVAL_RANGE.end())
}

pub fn clamp_refresh_interval(period: Duration) -> Duration {
    period.max(MIN_REFRESH_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_in_range() {
        let s = MonitorSettings::default();
        assert_eq!(s, s.clamped());
        assert!(s.auto_guard_enabled);
    }

    #[test]
    fn test_clamping() {
        let s = MonitorSettings {
            active_power_threshold: 9000.0,
            guard_interval_minutes: 0,
            refresh_interval: Duration::ZERO,
            auto_guard_enabled: false,
        }
        .clamped();

        assert_eq!(s.active_power_threshold, 500.0);
        assert_eq!(s.guard_interval_minutes, 1);
        assert_eq!(s.refresh_interval, MIN_REFRESH_INTERVAL);
        assert!(!s.auto_guard_enabled);

        assert_eq!(clamp_threshold(f64::NAN), 1.0);
        assert_eq!(clamp_guard_interval(90), 60);
        assert_eq!(
            clamp_refresh_interval(Duration::from_secs(600)),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_policy_mirrors_settings() {
        let s = MonitorSettings {
            active_power_threshold: 150.0,
            guard_interval_minutes: 10,
            refresh_interval: Duration::from_secs(3),
            auto_guard_enabled: false,
        };
        assert_eq!(
            s.policy(),
            GuardPolicy {
                enabled: false,
                active_power_threshold: 150.0,
                guard_interval_minutes: 10,
            }
        );
    }
}
