use std::time::Duration;

use shotguide_core::recording::DEFAULT_SCENE_DURATION_SECS;

/// Default recording clock period.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Recording workflow configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Limit applied to scenes that declare no duration (default: `30`).
    pub default_scene_duration_secs: u32,
    /// Period of the recording clock (default: 1 s).
    pub tick_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            default_scene_duration_secs: DEFAULT_SCENE_DURATION_SECS,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

impl RecorderConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `DEFAULT_SCENE_DURATION_SECS` | `30`    |
    /// | `TICK_INTERVAL_MS`            | `1000`  |
    ///
    /// Zero or unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let default_scene_duration_secs = positive_env(
            "DEFAULT_SCENE_DURATION_SECS",
            u64::from(DEFAULT_SCENE_DURATION_SECS),
        )
        .try_into()
        .unwrap_or(DEFAULT_SCENE_DURATION_SECS);

        let tick_ms = positive_env("TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS);

        Self {
            default_scene_duration_secs,
            tick_interval: Duration::from_millis(tick_ms),
        }
    }
}

fn positive_env(name: &str, default: u64) -> u64 {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            tracing::warn!(var = name, value = %raw, default, "Invalid setting, using default");
            default
        }
    }
}
