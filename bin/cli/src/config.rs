//! Centralized CLI configuration.
//!
//! Loaded via the `config` crate from an optional `flowscribe.toml` in the
//! working directory, overridden by `FLOWSCRIBE__*` environment variables
//! (for example `FLOWSCRIBE__SOURCE_DIR=exports`).

use config::{ConfigError, Environment, Source};
use flowscribe_pipeline::{BatchOptions, SourceQuery, default_workers};
use serde::Deserialize;
use std::path::PathBuf;

/// Base name of the optional configuration file.
const CONFIG_FILE: &str = "flowscribe";
const ENV_PREFIX: &str = "FLOWSCRIBE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
    /// Directory of exported workflow JSON files.
    pub source_dir: PathBuf,

    /// Where documents are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Run-sample window in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Only document workflows in this resource group.
    #[serde(default)]
    pub scope: Option<String>,

    /// Only document this workflow.
    #[serde(default)]
    pub workflow: Option<String>,

    /// Skip diagram generation; the diagram section is omitted.
    #[serde(default)]
    pub no_diagrams: bool,

    /// Worker pool size.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_lookback_days() -> u32 {
    30
}

impl CliConfig {
    /// Loads configuration from `flowscribe.toml` (if present) and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `source_dir` is missing or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(
            config::File::with_name(CONFIG_FILE).required(false),
            environment(),
        )
    }

    fn from_sources<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// The source query for this configuration, windowed to end now.
    #[must_use]
    pub fn query(&self) -> SourceQuery {
        SourceQuery {
            scope: self.scope.clone(),
            workflow: self.workflow.clone(),
            ..SourceQuery::new(self.lookback_days)
        }
    }

    /// Batch settings for this configuration.
    #[must_use]
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            workers: self.workers.max(1),
            diagrams: !self.no_diagrams,
            lookback_days: Some(self.lookback_days),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn load(toml: &str, vars: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let vars = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        CliConfig::from_sources(
            File::from_str(toml, FileFormat::Toml),
            environment().source(Some(vars)),
        )
    }

    #[test]
    fn defaults_apply() {
        let config = load("", &[("FLOWSCRIBE__SOURCE_DIR", "exports")]).expect("config");
        assert_eq!(config.source_dir, PathBuf::from("exports"));
        assert_eq!(config.output_dir, PathBuf::from("docs"));
        assert_eq!(config.lookback_days, 30);
        assert_eq!(config.scope, None);
        assert_eq!(config.workflow, None);
        assert!(!config.no_diagrams);
        assert!(config.workers >= 1);
    }

    #[test]
    fn source_dir_is_required() {
        assert!(load("", &[]).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let toml = r#"
            source_dir = "exports"
            lookback_days = 7
            scope = "rg-dev"
        "#;
        let config = load(
            toml,
            &[
                ("FLOWSCRIBE__SCOPE", "rg-prod"),
                ("FLOWSCRIBE__NO_DIAGRAMS", "true"),
                ("FLOWSCRIBE__WORKERS", "3"),
            ],
        )
        .expect("config");

        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.scope.as_deref(), Some("rg-prod"));
        assert!(config.no_diagrams);
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn converts_to_batch_settings() {
        let config = load(
            "source_dir = \"exports\"\nworkflow = \"orders\"\nworkers = 0\n",
            &[],
        )
        .expect("config");

        let options = config.batch_options();
        assert_eq!(options.workers, 1);
        assert!(options.diagrams);
        assert_eq!(options.lookback_days, Some(30));

        let query = config.query();
        assert_eq!(query.workflow.as_deref(), Some("orders"));
        assert_eq!(query.lookback_days, 30);
    }
}
