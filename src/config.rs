//! Configuration for the `imgio` command line.
//!
//! Handles loading, validating and merging `imgio.toml`. The file sets
//! default keyword options per format and direction; options given on the
//! command line override them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional
//!
//! [defaults.jpeg.write]
//! quality = 90              # Any JPEG write option
//!
//! [defaults.png.read]
//! ignoregamma = true
//!
//! [logging]
//! level = "warn"            # off, error, warn, info, debug, trace
//! ```
//!
//! Format keys are matched like format lookups: by name or extension,
//! case-insensitively (`[defaults.jpg.write]` works too). Option names and
//! values are validated against the format's option specs, and unknown keys
//! anywhere are rejected to catch typos early.

use crate::engine::engine;
use crate::format::Format;
use crate::options::{OptionValue, Options, ResolvedOptions};
use crate::request::IoMode;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "imgio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `imgio.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoConfig {
    /// Default options per format, keyed by format name or extension.
    pub defaults: BTreeMap<String, FormatDefaults>,
    pub logging: LoggingConfig,
}

/// Default read and write options for one format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatDefaults {
    pub read: BTreeMap<String, toml::Value>,
    pub write: BTreeMap<String, toml::Value>,
}

impl FormatDefaults {
    fn table(&self, io: IoMode) -> &BTreeMap<String, toml::Value> {
        match io {
            IoMode::Read => &self.read,
            IoMode::Write => &self.write,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset and no `-v` is given.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level).map_err(|_| {
            ConfigError::Validation(format!(
                "logging.level must be one of off, error, warn, info, debug, trace; got '{}'",
                self.level
            ))
        })
    }
}

impl IoConfig {
    /// Check the log level, every format key and every option against the
    /// registry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.level_filter()?;
        for (key, defaults) in &self.defaults {
            let format = engine().formats().get(key).ok_or_else(|| {
                ConfigError::Validation(format!("defaults.{key}: unknown format"))
            })?;
            for (io, dir) in [(IoMode::Read, "read"), (IoMode::Write, "write")] {
                let options = to_options(defaults.table(io))
                    .map_err(|e| ConfigError::Validation(format!("defaults.{key}.{dir}: {e}")))?;
                ResolvedOptions::resolve(format.name, format.options_for(io), &options)
                    .map_err(|e| ConfigError::Validation(format!("defaults.{key}.{dir}: {e}")))?;
            }
        }
        Ok(())
    }

    /// Configured defaults for `format` in direction `io`. When several keys
    /// name the same format, later keys (in sorted order) win.
    pub fn options_for(&self, format: &'static Format, io: IoMode) -> Options {
        let mut merged = Options::new();
        for (key, defaults) in &self.defaults {
            if engine().formats().get(key) != Some(format) {
                continue;
            }
            if let Ok(options) = to_options(defaults.table(io)) {
                merged = options.over(&merged);
            }
        }
        merged
    }
}

fn to_options(table: &BTreeMap<String, toml::Value>) -> Result<Options, String> {
    table
        .iter()
        .map(|(name, value)| {
            OptionValue::from_toml(value)
                .map(|v| (name.clone(), v))
                .ok_or_else(|| format!("option '{name}' must be a bool, number or string"))
        })
        .collect()
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(IoConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<IoConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: IoConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config: an explicit path must exist; otherwise `imgio.toml` in
/// the working directory is used if present.
pub fn load_config(explicit: Option<&Path>) -> Result<IoConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file {} not found", path.display()),
                )));
            }
            load_raw_config(path)?
        }
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `imgio.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgio Configuration
# ===================
# All settings are optional. Options given on the command line with
# -r/--read-option and -w/--write-option override these defaults.
# Unknown keys and invalid option values cause an error.

# ---------------------------------------------------------------------------
# Per-format default options
# ---------------------------------------------------------------------------
# Tables are [defaults.<format>.read] and [defaults.<format>.write], where
# <format> is a format name or extension (png, jpeg, jpg, gif, ...).
# Run 'imgio formats' to list formats and their options.

# [defaults.png.read]
# Skip gamma correction from the gAMA chunk.
# ignoregamma = false

# [defaults.png.write]
# Deflate effort, 0 (none) to 9 (best).
# compression = 9
# Reduce RGB images to a palette of this many colors (2-256, 0 = off).
# quantize = 0
# interlaced = false

# [defaults.jpeg.read]
# Apply the EXIF Orientation tag to decoded pixels (true/false or 0-2).
# exifrotate = true

# [defaults.jpeg.write]
# Encoding quality, 1 (worst) to 100 (best).
# quality = 75
# progressive = false
# optimize = false
# baseline = false

# [defaults.bmp.write]
# compression = false

# [defaults.gif.write]
# Animation repeat count, 0 = forever.
# loop = 0
# Default frame time in milliseconds.
# duration = 100

# [defaults.ico.read]
# Always return an alpha channel.
# makealpha = false

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# Default log level when RUST_LOG is unset: off, error, warn, info, debug,
# trace. Each -v on the command line raises it one step.
level = "warn"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_empty_with_warn_logging() {
        let config = IoConfig::default();
        assert!(config.defaults.is_empty());
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Warn);
    }

    #[test]
    fn parse_format_defaults() {
        let config: IoConfig = toml::from_str(
            r#"
[defaults.jpeg.write]
quality = 90

[defaults.png.read]
ignoregamma = true
"#,
        )
        .unwrap();
        config.validate().unwrap();
        let jpeg = engine().formats().lookup("JPEG").unwrap();
        let opts = config.options_for(jpeg, IoMode::Write);
        assert_eq!(opts.get("quality"), Some(&OptionValue::Int(90)));
        assert!(config.options_for(jpeg, IoMode::Read).is_empty());
    }

    #[test]
    fn extension_keys_name_the_same_format() {
        let config: IoConfig = toml::from_str(
            r#"
[defaults.jpg.write]
quality = 60
"#,
        )
        .unwrap();
        let jpeg = engine().formats().lookup("JPEG").unwrap();
        assert_eq!(
            config.options_for(jpeg, IoMode::Write).get("quality"),
            Some(&OptionValue::Int(60))
        );
    }

    #[test]
    fn validate_rejects_unknown_format() {
        let config: IoConfig = toml::from_str(
            r#"
[defaults.psd.read]
foo = 1
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("unknown format"));
    }

    #[test]
    fn validate_rejects_bad_options() {
        let unknown: IoConfig = toml::from_str("[defaults.png.write]\nqualty = 3\n").unwrap();
        assert!(unknown.validate().is_err());

        let out_of_range: IoConfig =
            toml::from_str("[defaults.png.write]\ncompression = 12\n").unwrap();
        let err = out_of_range.validate().unwrap_err().to_string();
        assert!(err.contains("defaults.png.write"));

        let not_scalar: IoConfig =
            toml::from_str("[defaults.png.write]\ncompression = [1]\n").unwrap();
        assert!(not_scalar.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let config: IoConfig = toml::from_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<IoConfig, _> = toml::from_str("[defaultz.png.write]\n");
        assert!(result.is_err());
        let result: Result<IoConfig, _> = toml::from_str("[defaults.png.both]\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"level = "warn""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"level = "debug""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("level").unwrap().as_str(), Some("debug"));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str(
            r#"
[defaults.jpeg.write]
quality = 90
optimize = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[defaults.jpeg.write]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let write = merged
            .get("defaults")
            .and_then(|d| d.get("jpeg"))
            .and_then(|j| j.get("write"))
            .unwrap();
        assert_eq!(write.get("quality").unwrap().as_integer(), Some(70));
        assert_eq!(write.get("optimize").unwrap().as_bool(), Some(true));
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgio.toml");
        fs::write(
            &path,
            r#"
[defaults.gif.write]
duration = 40

[logging]
level = "info"
"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Info);
        let gif = engine().formats().lookup("GIF").unwrap();
        assert_eq!(
            config.options_for(gif, IoMode::Write).get("duration"),
            Some(&OptionValue::Int(40))
        );
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("missing.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_raw_config_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(&tmp.path().join("nope.toml")).unwrap().is_none());
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgio.toml");
        fs::write(&path, "this is not [valid toml").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn stock_config_toml_is_valid() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value().unwrap(), Some(value)).unwrap();
        assert_eq!(config, IoConfig::default());
    }
}
