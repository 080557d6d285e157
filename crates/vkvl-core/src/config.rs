use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "VKVL_CONFIG";

/// Top-level layer configuration, loaded from vkvl.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Switches for whole families of checks. Record-time state tracking always
/// runs; these only decide whether a family reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Submit-time and execute-time image layout checks
    #[serde(default = "default_true")]
    pub image_layout: bool,
    /// Submit-time query state checks
    #[serde(default = "default_true")]
    pub queries: bool,
    /// Viewport/scissor inheritance checks in vkCmdExecuteCommands
    #[serde(default = "default_true")]
    pub viewport_inheritance: bool,
    /// VUIDs that are never reported
    #[serde(default)]
    pub disabled_messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Reports of one VUID beyond this count are suppressed (0 = unlimited)
    #[serde(default = "default_duplicate_limit")]
    pub duplicate_message_limit: u32,
    /// Log filter used when VKVL_LOG is unset
    pub log_filter: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            image_layout: true,
            queries: true,
            viewport_inheritance: true,
            disabled_messages: Vec::new(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            duplicate_message_limit: default_duplicate_limit(),
            log_filter: None,
        }
    }
}

impl ValidationConfig {
    pub fn is_disabled(&self, vuid: &str) -> bool {
        self.disabled_messages.iter().any(|m| m == vuid)
    }
}

impl LayerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, CoreError> {
        let config: LayerConfig = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(CoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("ignoring layer config {}: {}", path, e);
                Self::default()
            }
        }
    }

    fn check(&self) -> Result<(), CoreError> {
        if let Some(vuid) = self
            .validation
            .disabled_messages
            .iter()
            .find(|m| m.trim().is_empty())
        {
            return Err(CoreError::ConfigError(format!(
                "empty entry {:?} in validation.disabled_messages",
                vuid
            )));
        }
        Ok(())
    }
}

/// Returns the config file path based on platform conventions.
/// Search order:
/// 1. `VKVL_CONFIG` if set
/// 2. System-wide config: `%PROGRAMDATA%\VKVL\vkvl.toml` (Windows) or `/etc/vkvl/vkvl.toml` (Linux/macOS)
/// 3. Local fallback: `./vkvl.toml`
pub fn default_config_path() -> String {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return path;
        }
    }
    #[cfg(windows)]
    {
        let programdata = std::env::var("PROGRAMDATA")
            .unwrap_or_else(|_| r"C:\ProgramData".to_string());
        let system_path = format!(r"{}\VKVL\vkvl.toml", programdata);
        if std::path::Path::new(&system_path).exists() {
            return system_path;
        }
    }
    #[cfg(not(windows))]
    {
        let system_path = "/etc/vkvl/vkvl.toml";
        if std::path::Path::new(system_path).exists() {
            return system_path.to_string();
        }
    }
    "vkvl.toml".to_string()
}

fn default_duplicate_limit() -> u32 {
    10
}

fn default_true() -> bool {
    true
}
