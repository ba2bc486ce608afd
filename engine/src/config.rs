//! Runtime configuration.
//!
//! Loaded from a TOML file (`config.toml` by default) and then overridden from
//! the command line:
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "Vulkan extension samples"
//! resizable = true
//!
//! [graphics]
//! validation = true
//! vsync = true
//!
//! [logging]
//! level = "info"
//!
//! [assets]
//! shader_dir = "shaders"
//!
//! [sample]
//! name = "color_write_enable"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::samples;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub logging: LoggingConfig,
    pub assets: AssetConfig,
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub resizable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Enables `VK_LAYER_KHRONOS_validation` and the debug messenger.
    pub validation: bool,
    pub vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter, `RUST_LOG` takes precedence.
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the compiled `*.spv` shaders.
    pub shader_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub name: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Vulkan extension samples".to_string(),
            resizable: true,
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            vsync: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            name: samples::COLOR_WRITE_ENABLE.to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Falls back to the defaults when the file is missing or unreadable.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                log::debug!("Using default configuration: {}", err);
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Applies command line overrides.
    ///
    /// Supported: `--sample <name>`, `--width <n>`, `--height <n>`,
    /// `--no-validation`, `--no-vsync`. Unknown arguments are ignored.
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

        if let Some(name) = value_after(&args, "--sample") {
            self.sample.name = name.to_string();
        }
        if let Some(width) = value_after(&args, "--width").and_then(|v| v.parse().ok()) {
            self.window.width = width;
        }
        if let Some(height) = value_after(&args, "--height").and_then(|v| v.parse().ok()) {
            self.window.height = height;
        }
        if args.iter().any(|a| a == "--no-validation") {
            self.graphics.validation = false;
        }
        if args.iter().any(|a| a == "--no-vsync") {
            self.graphics.vsync = false;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height",
                reason: "window dimensions must be greater than 0".to_string(),
            });
        }

        if self.assets.shader_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "assets.shader_dir",
                reason: "shader directory must not be empty".to_string(),
            });
        }

        if !samples::NAMES.contains(&self.sample.name.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "sample.name",
                reason: format!(
                    "unknown sample `{}`, expected one of: {}",
                    self.sample.name,
                    samples::NAMES.join(", ")
                ),
            });
        }

        Ok(())
    }
}

/// Returns the value following `flag`, if present.
pub fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [window]
            width = 640

            [sample]
            name = "hello_triangle"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, WindowConfig::default().height);
        assert_eq!(config.sample.name, "hello_triangle");
        assert_eq!(config.assets.shader_dir, PathBuf::from("shaders"));
    }

    #[test]
    fn args_override_file_values() {
        let mut config = Config::default();
        config.apply_args([
            "extension-samples",
            "--sample",
            "hello_triangle",
            "--width",
            "800",
            "--height",
            "not-a-number",
            "--no-vsync",
        ]);

        assert_eq!(config.sample.name, "hello_triangle");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert!(!config.graphics.vsync);
    }

    #[test]
    fn unknown_sample_is_rejected() {
        let mut config = Config::default();
        config.sample.name = "subgroups_operations".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "sample.name",
                ..
            }
        ));
    }

    #[test]
    fn zero_extent_is_rejected() {
        let mut config = Config::default();
        config.window.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn flag_without_value() {
        let args = vec!["--sample".to_string()];
        assert_eq!(value_after(&args, "--sample"), None);
    }
}
