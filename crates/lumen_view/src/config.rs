//! View configuration - TOML to ViewConfig conversion
//!
//! # Config Format
//!
//! ```toml
//! [view]
//! platform = "android"
//! headset = "cardboard"
//! controller = "cardboard"
//! vr_mode = false
//! target_fps = 60
//!
//! [debug]
//! debug = false
//! hud = false
//!
//! [queue]
//! idle_timeout_ms = 5000
//! ```
//!
//! Every section and key is optional; missing values fall back to
//! [`ViewConfig::default`].

use crate::error::ConfigError;
use lumen_presenter::DebugFlags;
use lumen_xr::ModeDescriptor;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Highest accepted render loop rate
const MAX_TARGET_FPS: u32 = 240;

/// Initial configuration of a view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Hardware the first session renders to
    pub descriptor: ModeDescriptor,
    /// Start in VR mode
    pub vr_mode: bool,
    /// Render loop rate (0 = unpaced)
    pub target_fps: u32,
    /// Initial debug overlays
    pub debug: DebugFlags,
    /// Bound on lifecycle acknowledgements and idle waits
    pub idle_timeout: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            descriptor: ModeDescriptor::default(),
            vr_mode: false,
            target_fps: 60,
            debug: DebugFlags::default(),
            idle_timeout: Duration::from_millis(5000),
        }
    }
}

/// Raw TOML structure for view section
#[derive(Debug, Deserialize, Default)]
struct ViewToml {
    platform: Option<String>,
    headset: Option<String>,
    controller: Option<String>,
    vr_mode: Option<bool>,
    target_fps: Option<u32>,
}

/// Raw TOML structure for debug section
#[derive(Debug, Deserialize, Default)]
struct DebugToml {
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    hud: bool,
}

/// Raw TOML structure for queue section
#[derive(Debug, Deserialize, Default)]
struct QueueToml {
    idle_timeout_ms: Option<u64>,
}

/// Root TOML structure
#[derive(Debug, Deserialize, Default)]
struct ConfigToml {
    #[serde(default)]
    view: Option<ViewToml>,
    #[serde(default)]
    debug: Option<DebugToml>,
    #[serde(default)]
    queue: Option<QueueToml>,
}

impl ViewConfig {
    /// Parse a config from a TOML string
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: ConfigToml = toml::from_str(content)?;
        let defaults = Self::default();

        let view = raw.view.unwrap_or_default();
        let descriptor = ModeDescriptor::new(
            view.platform.unwrap_or_else(|| defaults.descriptor.platform().to_string()),
            view.headset.unwrap_or_else(|| defaults.descriptor.headset().to_string()),
            view.controller.unwrap_or_else(|| defaults.descriptor.controller().to_string()),
        );

        let debug = raw
            .debug
            .map(|d| DebugFlags::new(d.debug, d.hud))
            .unwrap_or(defaults.debug);

        let idle_timeout = raw
            .queue
            .and_then(|q| q.idle_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.idle_timeout);

        let config = Self {
            descriptor,
            vr_mode: view.vr_mode.unwrap_or(defaults.vr_mode),
            target_fps: view.target_fps.unwrap_or(defaults.target_fps),
            debug,
            idle_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        let fields = [
            ("platform", self.descriptor.platform()),
            ("headset", self.descriptor.headset()),
            ("controller", self.descriptor.controller()),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{} must not be empty", name)));
            }
        }

        if self.target_fps > MAX_TARGET_FPS {
            return Err(ConfigError::Validation(format!(
                "target_fps {} exceeds {}",
                self.target_fps, MAX_TARGET_FPS
            )));
        }

        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Validation("idle_timeout_ms must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = ViewConfig::from_toml_str("").unwrap();
        assert_eq!(config, ViewConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[view]
platform = "ovr-mobile"
headset = "gearvr"
controller = "gearvr-remote"
vr_mode = true
target_fps = 72

[debug]
debug = true
hud = true

[queue]
idle_timeout_ms = 250
"#;

        let config = ViewConfig::from_toml_str(content).unwrap();
        assert_eq!(config.descriptor, ModeDescriptor::new("ovr-mobile", "gearvr", "gearvr-remote"));
        assert!(config.vr_mode);
        assert_eq!(config.target_fps, 72);
        assert_eq!(config.debug, DebugFlags::new(true, true));
        assert_eq!(config.idle_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_partial_view_section() {
        let content = r#"
[view]
headset = "daydream"
"#;

        let config = ViewConfig::from_toml_str(content).unwrap();
        assert_eq!(config.descriptor.platform(), "android");
        assert_eq!(config.descriptor.headset(), "daydream");
        assert!(!config.vr_mode);
    }

    #[test]
    fn test_rejects_empty_platform() {
        let content = r#"
[view]
platform = ""
"#;

        let result = ViewConfig::from_toml_str(content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_excessive_fps() {
        let content = r#"
[view]
target_fps = 1000
"#;

        assert!(ViewConfig::from_toml_str(content).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let result = ViewConfig::from_toml_str("[view\nplatform = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ViewConfig::load("/nonexistent/lumen/view.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
