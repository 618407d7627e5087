//! Configuration for ready
//!
//! Defaults for compute selection, the batch runner and render settings.
//! Loaded from TOML, by default from `<config dir>/ready/config.toml`.

use crate::factory::ComputeOptions;
use crate::properties::{Properties, PropertyValue};
use ready_io::DataFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadyConfig {
    /// Compute backend selection
    pub compute: ComputeConfig,
    /// Batch runner settings
    pub runner: RunnerConfig,
    /// Render settings applied before a file's own
    pub render: RenderConfig,
}

/// Which compute device formula and kernel rules use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Allow rules that need a compute backend
    pub available: bool,
    pub platform: usize,
    pub device: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            available: true,
            platform: 0,
            device: 0,
        }
    }
}

impl ComputeConfig {
    pub fn options(&self) -> ComputeOptions {
        ComputeOptions {
            available: self.available,
            platform: self.platform,
            device: self.device,
        }
    }
}

/// Batch runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Timesteps to run when none are given
    pub default_steps: usize,
    /// Timesteps between progress reports
    pub report_every: usize,
    /// Write binary (base64) data arrays instead of ascii
    pub binary_output: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_steps: 1000,
            report_every: 100,
            binary_output: false,
        }
    }
}

impl RunnerConfig {
    pub fn data_format(&self) -> DataFormat {
        if self.binary_output {
            DataFormat::Binary
        } else {
            DataFormat::Ascii
        }
    }
}

/// Render setting overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub timesteps_per_render: i64,
    pub show_color_scale: bool,
    pub use_image_interpolation: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timesteps_per_render: 100,
            show_color_scale: true,
            use_image_interpolation: true,
        }
    }
}

impl RenderConfig {
    /// Write these values into a render-settings set
    pub fn apply_to(&self, properties: &mut Properties) {
        properties.add(
            "timesteps_per_render",
            PropertyValue::Int(self.timesteps_per_render),
        );
        properties.add("show_color_scale", PropertyValue::Bool(self.show_color_scale));
        properties.add(
            "use_image_interpolation",
            PropertyValue::Bool(self.use_image_interpolation),
        );
    }

    /// Default render settings with these overrides applied
    pub fn render_settings(&self) -> Properties {
        let mut properties = Properties::render_settings();
        self.apply_to(&mut properties);
        properties
    }
}

impl ReadyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/ready/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ready").join("config.toml"))
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from the default path, falling back to defaults when absent
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.report_every == 0 {
            return Err(ConfigError::OutOfRange(
                "runner.report_every must be positive".to_string(),
            ));
        }
        if self.render.timesteps_per_render <= 0 {
            return Err(ConfigError::OutOfRange(
                "render.timesteps_per_render must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}
