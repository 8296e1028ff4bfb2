// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading.
//!
//! The configuration is a YAML document merged with `LGPSCAN_*` environment
//! variables (environment wins). Key names from earlier deployments
//! (`dblogpath`, `resultfile`, `logpath`) are accepted as aliases.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

use crate::exporters::file::ResultFormat;
use crate::receivers::lgp::config::ScannerConfig;
use crate::receivers::lgp::error::{Error, Result};
use crate::receivers::lgp::persistence::JsonFileCheckpointStore;

/// Prefix of environment variables overriding configuration keys
pub const ENV_PREFIX: &str = "LGPSCAN_";

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the dated log files
    #[serde(alias = "dblogpath")]
    pub log_directory: PathBuf,

    /// Append-only result file
    #[serde(alias = "resultfile")]
    pub result_file: PathBuf,

    /// Operational log file; stdout when absent
    #[serde(default, alias = "logpath")]
    pub log_output: Option<PathBuf>,

    /// Daily operational log files kept, including the current one
    #[serde(default = "default_log_max_files")]
    pub log_max_files: usize,

    /// Checkpoint file
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,

    /// YAML checkpoint of an earlier deployment, read until a new one is written
    #[serde(default)]
    pub legacy_checkpoint_file: Option<PathBuf>,

    /// Result file encoding: text or jsonl
    #[serde(default)]
    pub result_format: ResultFormat,

    /// Finish the previously checkpointed log file before a new one
    #[serde(default)]
    pub catch_up_previous: bool,
}

/// Default retention of daily operational log files
pub const DEFAULT_LOG_MAX_FILES: usize = 5;

fn default_log_max_files() -> usize {
    DEFAULT_LOG_MAX_FILES
}

fn default_checkpoint_file() -> PathBuf {
    PathBuf::from("workdata.json")
}

impl AppConfig {
    /// Load configuration from `path` and the environment.
    ///
    /// A missing file is a configuration error, as is any value that fails to
    /// deserialize or validate.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "configuration file {:?} does not exist",
                path
            )));
        }

        let figment = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        if config.log_max_files == 0 {
            return Err(Error::Config(
                "log_max_files must be at least 1".to_string(),
            ));
        }
        config.scanner_config().validate().map_err(Error::Config)?;
        Ok(config)
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            log_directory: self.log_directory.clone(),
            result_file: self.result_file.clone(),
            result_format: self.result_format,
            checkpoint_file: self.checkpoint_file.clone(),
            legacy_checkpoint_file: self.legacy_checkpoint_file.clone(),
            catch_up_previous: self.catch_up_previous,
        }
    }

    pub fn checkpoint_store(&self) -> JsonFileCheckpointStore {
        let store = JsonFileCheckpointStore::new(&self.checkpoint_file);
        match &self.legacy_checkpoint_file {
            Some(legacy) => store.with_legacy_path(legacy),
            None => store,
        }
    }
}
