//! Command implementations for the calq CLI.

pub mod compile;
pub mod config;
pub mod query;

use std::fs;
use std::path::{Path, PathBuf};

use caldav_query::filter::{CompFilter, FilterElement, FilterError};
use caldav_query::{ConfigError, QueryConfig, QueryError, StoreError};

use crate::cli::Cli;

/// Error type for command execution.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The filter could not be parsed or compiled.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// The query failed.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// The snapshot could not be loaded.
    #[error("snapshot error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An input file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The effective config could not be rendered.
    #[error("failed to render config: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CommandError {
    /// Returns true if the error was caused by the user's input.
    pub fn is_client_error(&self) -> bool {
        match self {
            CommandError::Filter(_)
            | CommandError::Config(_)
            | CommandError::Read { .. }
            | CommandError::Json(_) => true,
            CommandError::Query(err) => err.is_client_error(),
            CommandError::Store(err) => err.is_client_error(),
            CommandError::Toml(_) => false,
        }
    }
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Context for command execution, containing common dependencies.
pub struct CommandContext {
    /// Whether to output JSON.
    pub json_output: bool,
    /// Whether to be verbose.
    pub verbose: bool,
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Creates a new command context from CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            json_output: cli.json,
            verbose: cli.verbose,
            config_path: cli.config.clone(),
        }
    }

    /// Returns the config file in effect.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Ok(QueryConfig::default_path()?),
        }
    }

    /// Loads the configuration; a missing file yields the defaults.
    pub fn load_config(&self) -> Result<QueryConfig> {
        Ok(QueryConfig::load(&self.config_path()?)?)
    }
}

/// Reads a filter file holding a JSON element tree.
pub fn read_filter(path: &Path) -> Result<CompFilter> {
    let content = fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let element: FilterElement = serde_json::from_str(&content)?;
    Ok(CompFilter::from_element(&element)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::tempdir;

    #[test]
    fn test_read_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filter.json");
        fs::write(
            &path,
            r#"{"name":"filter","children":[
                {"name":"comp-filter","attributes":{"name":"VCALENDAR"}}
            ]}"#,
        )
        .unwrap();

        let filter = read_filter(&path).unwrap();
        assert_eq!(filter.name, "VCALENDAR");
        assert!(filter.is_match_all());
    }

    #[test]
    fn test_read_filter_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_filter(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CommandError::Read { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_read_filter_bad_structure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filter.json");
        fs::write(&path, r#"{"name":"prop-filter"}"#).unwrap();

        let err = read_filter(&path).unwrap_err();
        assert!(matches!(err, CommandError::Filter(FilterError::BadFilter { .. })));
    }

    #[test]
    fn test_internal_errors() {
        let err = CommandError::from(StoreError::Read {
            path: PathBuf::from("snapshot.json"),
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        });
        assert!(!err.is_client_error());

        let err = CommandError::from(QueryError::Retrieval(StoreError::Backend(
            "down".to_string(),
        )));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_context_prefers_explicit_config_path() {
        let ctx = CommandContext {
            json_output: false,
            verbose: false,
            config_path: Some(PathBuf::from("/tmp/calq.toml")),
        };
        assert_eq!(ctx.config_path().unwrap(), PathBuf::from("/tmp/calq.toml"));
    }
}
