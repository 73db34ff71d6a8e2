//! Query engine configuration.
//!
//! Settings are read from `config.toml` in the platform config directory
//! (`~/.config/caldav-query/config.toml` on Linux). A missing file yields
//! the defaults.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current config file version.
const CONFIG_VERSION: u32 = 1;

/// Config filename inside the config directory.
const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable overriding the config file path.
pub const CONFIG_ENV_VAR: &str = "CALDAV_QUERY_CONFIG";

/// Default config file contents.
pub const DEFAULT_CONFIG: &str = r#"# caldav-query configuration

# Config schema version (do not modify)
version = 1

[post_filter]
# How prop-filters that cannot be pushed down are recombined:
# "honor-test" applies the comp-filter's allof/anyof, "legacy-any-of"
# always ORs them.
# mode = "honor-test"

# Only post-filter entities stored under this container component.
# container = "VCALENDAR"

[time_range]
# Timezone used to resolve floating date-times.
# floating_timezone = "UTC"
"#;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine the platform config directory.
    #[error("failed to determine config directory: no valid home directory found")]
    NoConfigDir,

    /// I/O error while reading the config file.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The config file was written by a newer version.
    #[error("unsupported config version {found} (expected at most {max})", max = CONFIG_VERSION)]
    UnsupportedVersion {
        /// The version found in the file.
        found: u32,
    },
}

/// How deferred prop-filters are split off and recombined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostFilterMode {
    /// Honor the comp-filter's `test` attribute in the post-filter path.
    #[default]
    HonorTest,
    /// OR every deferred filter of a kind, whatever the `test` attribute.
    LegacyAnyOf,
}

/// Post-filter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilterConfig {
    #[serde(default)]
    pub mode: PostFilterMode,

    /// If set, entities whose container is not this name are dropped when
    /// post-filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Time-range settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_timezone: Option<String>,
}

/// Configuration for the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub post_filter: PostFilterConfig,

    #[serde(default)]
    pub time_range: TimeRangeConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            post_filter: PostFilterConfig::default(),
            time_range: TimeRangeConfig::default(),
        }
    }
}

impl QueryConfig {
    /// Parses configuration from TOML text.
    ///
    /// `path` is only used for error reporting.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: QueryConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
            });
        }

        Ok(config)
    }

    /// Loads configuration from a file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse` if the file exists
    /// but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content, path)
    }

    /// Loads configuration from the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&Self::default_path()?)
    }

    /// Returns the config file path, honoring `CALDAV_QUERY_CONFIG`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }

        ProjectDirs::from("", "", "caldav-query")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
            .ok_or(ConfigError::NoConfigDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.post_filter.mode, PostFilterMode::HonorTest);
        assert!(config.post_filter.container.is_none());
        assert!(config.time_range.floating_timezone.is_none());
    }

    #[test]
    fn test_default_config_text_parses_to_defaults() {
        let config = QueryConfig::from_toml(DEFAULT_CONFIG, Path::new("default.toml")).unwrap();
        assert_eq!(config, QueryConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
version = 1

[post_filter]
mode = "legacy-any-of"
container = "VCALENDAR"

[time_range]
floating_timezone = "Europe/Berlin"
"#;
        let config = QueryConfig::from_toml(content, Path::new("c.toml")).unwrap();
        assert_eq!(config.post_filter.mode, PostFilterMode::LegacyAnyOf);
        assert_eq!(config.post_filter.container.as_deref(), Some("VCALENDAR"));
        assert_eq!(
            config.time_range.floating_timezone.as_deref(),
            Some("Europe/Berlin")
        );
    }

    #[test]
    fn test_missing_version_defaults() {
        let config = QueryConfig::from_toml("", Path::new("c.toml")).unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let err = QueryConfig::from_toml(
            "[post_filter]\nmode = \"sometimes\"\n",
            Path::new("c.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = QueryConfig::from_toml("version = 7\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 7 }));
    }
}
