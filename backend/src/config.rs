//! Runtime configuration from `.env` and environment variables.
//!
//! | Variable                   | Default              |
//! |----------------------------|----------------------|
//! | `ELECTION_PORT`            | `3000`               |
//! | `ELECTION_DATA_DIR`        | `.election-results`  |
//! | `ELECTION_CANDIDATES_FILE` | unset                |
//! | `ELECTION_CANDIDATES_URL`  | unset                |
//! | `ELECTION_IO_TIMEOUT_SECS` | `30`                 |
//! | `ELECTION_FAILURE_POLICY`  | `fail-fast`          |
//! | `ELECTION_PARSER_EVALUATION` | `sequential`       |

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::{DataAggregator, Evaluation, FailurePolicy};
use crate::enrich::{
    ElectionConfigurationSource, FileConfigurationSource, HttpConfigurationSource,
    StaticConfigurationSource,
};
use crate::error::ConfigError;
use crate::processor::{BlobProcessor, ProcessContext};
use crate::storage::{FileResultsRepository, DEFAULT_DATA_DIR};

/// Where the candidate roster is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterSource {
    /// No roster configured: every run sees an empty slate.
    None,
    File(PathBuf),
    Http(String),
}

/// Top-level configuration for the CLI and the server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub roster: RosterSource,
    pub io_timeout: Duration,
    pub failure_policy: FailurePolicy,
    pub parser_evaluation: Evaluation,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            roster: RosterSource::None,
            io_timeout: Duration::from_secs(30),
            failure_policy: FailurePolicy::FailFast,
            parser_evaluation: Evaluation::Sequential,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("ELECTION_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "ELECTION_PORT",
                message: format!("'{}' is not a valid port", raw),
            })?,
            None => defaults.port,
        };

        let data_dir = var("ELECTION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let roster = match (var("ELECTION_CANDIDATES_FILE"), var("ELECTION_CANDIDATES_URL")) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    name: "ELECTION_CANDIDATES_URL",
                    message: "set either ELECTION_CANDIDATES_FILE or ELECTION_CANDIDATES_URL, not both"
                        .to_string(),
                })
            }
            (Some(path), None) => RosterSource::File(PathBuf::from(path)),
            (None, Some(url)) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidValue {
                        name: "ELECTION_CANDIDATES_URL",
                        message: format!("'{}' is not an http(s) URL", url),
                    });
                }
                RosterSource::Http(url)
            }
            (None, None) => RosterSource::None,
        };

        let io_timeout = match var("ELECTION_IO_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "ELECTION_IO_TIMEOUT_SECS",
                        message: format!("'{}' is not a positive number of seconds", raw),
                    })
                }
            },
            None => defaults.io_timeout,
        };

        let failure_policy = match var("ELECTION_FAILURE_POLICY") {
            Some(raw) => FailurePolicy::from_name(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: "ELECTION_FAILURE_POLICY",
                message: format!("'{}' is not 'fail-fast' or 'skip-failed'", raw),
            })?,
            None => defaults.failure_policy,
        };

        let parser_evaluation = match var("ELECTION_PARSER_EVALUATION") {
            Some(raw) => Evaluation::from_name(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: "ELECTION_PARSER_EVALUATION",
                message: format!("'{}' is not 'sequential' or 'parallel'", raw),
            })?,
            None => defaults.parser_evaluation,
        };

        Ok(Self {
            port,
            data_dir,
            roster,
            io_timeout,
            failure_policy,
            parser_evaluation,
        })
    }

    pub fn configuration_source(&self) -> Arc<dyn ElectionConfigurationSource> {
        match &self.roster {
            RosterSource::None => Arc::new(StaticConfigurationSource::default()),
            RosterSource::File(path) => Arc::new(FileConfigurationSource::new(path)),
            RosterSource::Http(url) => {
                let source = HttpConfigurationSource::new(url.clone());
                match reqwest::Client::builder().timeout(self.io_timeout).build() {
                    Ok(client) => Arc::new(source.with_client(client)),
                    Err(_) => Arc::new(source),
                }
            }
        }
    }

    pub fn repository(&self) -> FileResultsRepository {
        FileResultsRepository::with_dir(&self.data_dir)
    }

    /// Processor wired with the built-in parsers and the configured collaborators.
    pub fn blob_processor(&self) -> BlobProcessor {
        let aggregator = DataAggregator::with_default_parsers()
            .with_policy(self.failure_policy)
            .with_evaluation(self.parser_evaluation);
        BlobProcessor::new(
            Arc::new(self.repository()),
            self.configuration_source(),
            Arc::new(aggregator),
        )
    }

    /// Context applying the configured I/O timeout.
    pub fn process_context(&self) -> ProcessContext {
        ProcessContext::new().with_timeout(self.io_timeout)
    }
}
