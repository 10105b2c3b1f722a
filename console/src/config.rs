use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::MonitorSettings;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings persisted between sessions. Unset fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub refresh_interval_ms: Option<u64>,
    pub active_power_threshold: Option<f64>,
    pub guard_interval_minutes: Option<u32>,
    pub auto_guard_enabled: Option<bool>,
    // Some backend builds report the online flag inverted.
    pub invert_online_flag: Option<bool>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).with_context(|| format!("Failed to read config {:?}", path))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        let bytes = serde_json::to_vec_pretty(self).context("Failed to serialize config")?;
        fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        let defaults = MonitorSettings::default();
        MonitorSettings {
            active_power_threshold: self
                .active_power_threshold
                .unwrap_or(defaults.active_power_threshold),
            guard_interval_minutes: self
                .guard_interval_minutes
                .unwrap_or(defaults.guard_interval_minutes),
            refresh_interval: self
                .refresh_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.refresh_interval),
            auto_guard_enabled: self.auto_guard_enabled.unwrap_or(defaults.auto_guard_enabled),
        }
        .clamped()
    }
}

pub fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("guardwatch");
    dir.push("config.json");
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.monitor_settings(), MonitorSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let cfg = Config {
            base_url: Some("http://gpu-head:5000".to_string()),
            refresh_interval_ms: Some(3000),
            guard_interval_minutes: Some(10),
            auto_guard_enabled: Some(false),
            ..Default::default()
        };

        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, cfg);

        let settings = loaded.monitor_settings();
        assert_eq!(settings.refresh_interval, Duration::from_secs(3));
        assert_eq!(settings.guard_interval_minutes, 10);
        assert_eq!(settings.active_power_threshold, 100.0);
        assert!(!settings.auto_guard_enabled);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let cfg = Config {
            active_power_threshold: Some(10_000.0),
            guard_interval_minutes: Some(0),
            ..Default::default()
        };
        let settings = cfg.monitor_settings();
        assert_eq!(settings.active_power_threshold, 500.0);
        assert_eq!(settings.guard_interval_minutes, 1);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
