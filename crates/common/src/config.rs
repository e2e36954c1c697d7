//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default render settings, overridable per invocation.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Encoder binary (name on PATH or absolute path).
    pub ffmpeg_path: String,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate (`30`, `29.97`, `30000/1001`).
    pub fps: String,

    /// Video codec name (`h264`, `hevc`, `h264_nvenc`, `hevc_nvenc`).
    pub codec: String,

    /// Seconds each gap slate is shown.
    pub slate_duration_secs: f64,

    /// Empty spans shorter than this do not get a slate.
    pub min_gap_secs: f64,

    /// Maximum encoder inputs per batch.
    pub batch_size: usize,

    /// Argv length at which batch mode is forced.
    pub argv_threshold: usize,

    /// Number of batches encoded at once.
    pub parallelism: usize,

    /// Per-process timeout in seconds (0 disables).
    pub process_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "chronocam=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            width: 1920,
            height: 1080,
            fps: "30".to_string(),
            codec: "h264".to_string(),
            slate_duration_secs: 5.0,
            min_gap_secs: 1.0,
            batch_size: 150,
            argv_threshold: 29_000,
            parallelism: 1,
            process_timeout_secs: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("chronocam").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "render": { "batch_size": 40 } }"#).unwrap();
        assert_eq!(parsed.render.batch_size, 40);
        assert_eq!(parsed.render.width, 1920);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_config_path_is_namespaced() {
        assert!(config_file_path().ends_with("chronocam/config.json"));
    }
}
