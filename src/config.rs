//! Layered configuration.
//!
//! Layers, lowest first: built-in defaults, the `~/.kboard/rc` file, and the
//! per-display overrides stored with each display. Resolving a display yields
//! an immutable [`DisplayProfile`]; nothing is mutated in place afterwards.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::BoardError;
use crate::models::Display;
use crate::pipeline::WrapPolicy;
use crate::sla::SlaThresholds;

pub const DEFAULT_SLA_WARNING: i64 = 15;
pub const DEFAULT_SLA_CRITICAL: i64 = 30;
pub const DEFAULT_FETCH_LIMIT: usize = 20;
pub const DEFAULT_BUS_CHANNEL: &str = "kitchen_new_order";

/// Global settings (defaults overlaid with the rc file)
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Explicit database location, if the rc file names one
    pub data_location: Option<PathBuf>,
    pub sla: SlaThresholds,
    pub sound_enabled: bool,
    pub wrap_policy: WrapPolicy,
    pub fetch_limit: usize,
    /// Only orders younger than this are fetched (None = no lower bound)
    pub fetch_window_hours: Option<i64>,
    /// Upstream order states that belong on the board
    pub fetch_states: Vec<String>,
    pub bus_channel: String,
    pub bus_poll_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_location: None,
            sla: SlaThresholds {
                warning_minutes: DEFAULT_SLA_WARNING,
                critical_minutes: DEFAULT_SLA_CRITICAL,
            },
            sound_enabled: true,
            wrap_policy: WrapPolicy::Clamp,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            fetch_window_hours: None,
            fetch_states: vec!["paid".to_string(), "done".to_string(), "invoiced".to_string()],
            bus_channel: DEFAULT_BUS_CHANNEL.to_string(),
            bus_poll_ms: 500,
        }
    }
}

impl Settings {
    /// Directory holding the rc file, the database and the display identity
    pub fn config_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".kboard")
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("rc")
    }

    /// Load defaults overlaid with `~/.kboard/rc` (if it exists)
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content, path.parent())
    }

    /// Parse rc content on top of the defaults.
    ///
    /// Relative `data.location` values are resolved against `base_dir`.
    pub fn parse(content: &str, base_dir: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::debug!("Ignoring rc line without '=': {}", line);
                continue;
            };
            settings.apply(key.trim(), value.trim(), base_dir)?;
        }

        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str, base_dir: Option<&Path>) -> Result<(), BoardError> {
        let invalid = || BoardError::Config { key: key.to_string(), value: value.to_string() };

        match key {
            "data.location" => {
                let path = PathBuf::from(value);
                self.data_location = Some(match base_dir {
                    Some(base) if path.is_relative() => base.join(path),
                    _ => path,
                });
            }
            "sla.warning" => {
                self.sla.warning_minutes = parse_minutes(value).ok_or_else(invalid)?;
            }
            "sla.critical" => {
                self.sla.critical_minutes = parse_minutes(value).ok_or_else(invalid)?;
            }
            "sound.enabled" => {
                self.sound_enabled = parse_bool(value).ok_or_else(invalid)?;
            }
            "stage.wrap" => {
                self.wrap_policy = WrapPolicy::from_str(value).ok_or_else(invalid)?;
            }
            "fetch.limit" => {
                self.fetch_limit = value.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(invalid)?;
            }
            "fetch.window_hours" => {
                let hours = value.parse::<i64>().map_err(|_| invalid())?;
                self.fetch_window_hours = if hours > 0 { Some(hours) } else { None };
            }
            "fetch.states" => {
                self.fetch_states = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "bus.channel" => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.bus_channel = value.to_string();
            }
            "bus.poll_ms" => {
                self.bus_poll_ms = value.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(invalid)?;
            }
            _ => log::debug!("Ignoring unknown rc key '{}'", key),
        }
        Ok(())
    }

    /// Resolve the top layer for one display
    pub fn resolve_for(&self, display: &Display) -> DisplayProfile {
        DisplayProfile {
            display: display.clone(),
            sla: SlaThresholds {
                warning_minutes: display.sla_warning_minutes.unwrap_or(self.sla.warning_minutes),
                critical_minutes: display.sla_critical_minutes.unwrap_or(self.sla.critical_minutes),
            },
            sound_enabled: display.sound_enabled.unwrap_or(self.sound_enabled),
        }
    }
}

/// Fully resolved configuration for the active display
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayProfile {
    pub display: Display,
    pub sla: SlaThresholds,
    pub sound_enabled: bool,
}

fn parse_minutes(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|m| *m >= 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
