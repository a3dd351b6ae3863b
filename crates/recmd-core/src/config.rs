//! Configuration types for recmd.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::format::Format;
use crate::{Error, Result};

/// Tool configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecmdConfig {
    /// Recording settings
    pub record: RecordSettings,
    /// Replay settings
    pub replay: ReplaySettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl RecmdConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RecmdConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.record.output.trim().is_empty() {
            return Err(Error::Config("record.output cannot be empty".to_string()));
        }

        if self.record.time_format.trim().is_empty() {
            return Err(Error::Config(
                "record.time_format cannot be empty".to_string(),
            ));
        }

        if self.replay.buffer_size == 0 {
            return Err(Error::Config("replay.buffer_size must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Recording settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSettings {
    /// Format new recordings are saved in
    pub format: Format,
    /// Output path template
    pub output: String,
    /// strftime format used for the `{{.Time}}` placeholder
    pub time_format: String,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            format: Format::Base64,
            output: "recmd-{{.Time}}.json".to_string(),
            time_format: "%Y%m%d_%H%M%S".to_string(),
        }
    }
}

/// Pacing used by structured replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacingMode {
    /// Wait each recorded inter-chunk delay
    #[default]
    RealTime,
    /// No waiting at all
    Quick,
    /// Wait until each chunk's offset from the replay start
    Background,
}

impl std::str::FromStr for PacingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real-time" | "realtime" => Ok(PacingMode::RealTime),
            "quick" => Ok(PacingMode::Quick),
            "background" | "drift-corrected" => Ok(PacingMode::Background),
            other => Err(Error::Config(format!("unknown pacing mode: {other}"))),
        }
    }
}

/// Replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Skip recorded delays
    pub ignore_delays: bool,
    /// Read buffer size for flat replay
    pub buffer_size: usize,
    /// Pacing for structured replay
    pub pacing: PacingMode,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            ignore_delays: false,
            buffer_size: 1024 * 1024,
            pacing: PacingMode::RealTime,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecmdConfig::default();
        assert_eq!(config.record.format, Format::Base64);
        assert_eq!(config.record.output, "recmd-{{.Time}}.json");
        assert_eq!(config.replay.buffer_size, 1024 * 1024);
        assert!(!config.replay.ignore_delays);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_config_validation() {
        let config = RecmdConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_buffer_size() {
        let mut config = RecmdConfig::default();
        config.replay.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_output_template() {
        let mut config = RecmdConfig::default();
        config.record.output = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
record:
  format: string
  output: "fixtures/{{.CmdBaseName}}-{{.Time}}.json"
  time_format: "%H%M"

replay:
  ignore_delays: true
  buffer_size: 4096
  pacing: background

logging:
  level: debug
"#;

        let config = RecmdConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.record.format, Format::String);
        assert_eq!(config.record.time_format, "%H%M");
        assert!(config.replay.ignore_delays);
        assert_eq!(config.replay.buffer_size, 4096);
        assert_eq!(config.replay.pacing, PacingMode::Background);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = RecmdConfig::from_yaml("replay:\n  ignore_delays: true\n").unwrap();
        assert!(config.replay.ignore_delays);
        assert_eq!(config.replay.buffer_size, 1024 * 1024);
        assert_eq!(config.record.format, Format::Base64);
    }

    #[test]
    fn test_unknown_format_in_yaml() {
        let result = RecmdConfig::from_yaml("record:\n  format: xml\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_pacing_mode_parse() {
        assert_eq!("quick".parse::<PacingMode>().unwrap(), PacingMode::Quick);
        assert_eq!(
            "real-time".parse::<PacingMode>().unwrap(),
            PacingMode::RealTime
        );
        assert_eq!(
            "drift-corrected".parse::<PacingMode>().unwrap(),
            PacingMode::Background
        );
        assert!("sometimes".parse::<PacingMode>().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recmd.yaml");
        std::fs::write(&path, "logging:\n  level: info\n").unwrap();

        let config = RecmdConfig::from_file(&path).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
