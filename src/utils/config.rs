use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::SyncResult;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV: &str = "GUNSYNC_CONFIG";

/// Session configuration - immutable after load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tick_rate_hz: u32,
    pub replication_rate_hz: u32,
    pub peer_count: u32,
    pub inbox_capacity: usize,
    pub run_secs: u64,
    pub log_level: String,
    pub log_file: String,
    pub trail_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate_hz: 50, // 20ms per tick
            replication_rate_hz: 10,
            peer_count: 3,
            inbox_capacity: 1000,
            run_secs: 10,
            log_level: "debug".to_string(),
            log_file: "gunsync.log".to_string(),
            trail_duration_ms: 30,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load from `GUNSYNC_CONFIG` when set, otherwise defaults.
    pub fn from_env() -> SyncResult<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn tick_interval_ms(&self) -> u64 {
        1000 / self.tick_rate_hz.max(1) as u64
    }

    /// How many simulation ticks elapse between two replication ticks
    pub fn ticks_per_replication(&self) -> u64 {
        let rate = self.replication_rate_hz.clamp(1, self.tick_rate_hz.max(1));
        (self.tick_rate_hz.max(1) / rate) as u64
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
