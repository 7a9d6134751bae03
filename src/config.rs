//! Config file and settings resolution
//!
//! Precedence is command line, then config file, then built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use podtail_logs::{AggregatorConfig, CompiledFilter};
use podtail_types::{ConfigError, FollowMode, LogOptions, TargetSelector};

use crate::cli::Args;

/// Environment variable pointing at the config file
const CONFIG_ENV: &str = "PODTAIL_CONFIG";

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_LOG_LEVEL: &str = "info";

/// How records are written to stdout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `[pod] line`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Contents of the TOML config file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub container: Option<String>,
    pub follow: Option<bool>,
    pub tail_lines: Option<i64>,
    pub timestamps: Option<bool>,
    pub output: Option<OutputFormat>,
    pub channel_capacity: Option<usize>,
    pub max_line_bytes: Option<usize>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => (PathBuf::from(path), true),
                None => match Self::default_path() {
                    Some(path) => (path, false),
                    None => return Ok(Self::default()),
                },
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("podtail").join("config.toml"))
    }
}

/// Everything a run needs, fully resolved
#[derive(Debug)]
pub struct Settings {
    pub selector: TargetSelector,
    pub namespace: String,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub options: LogOptions,
    pub output: OutputFormat,
    pub filter: Option<CompiledFilter>,
    pub aggregator: AggregatorConfig,
    pub log_level: String,
}

impl Settings {
    /// Merge flags over the config file.
    ///
    /// Selector validation comes first, so a bad invocation fails before
    /// anything else is looked at.
    pub fn resolve(args: Args, file: FileConfig, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let selector = TargetSelector::from_flags(args.pod.as_deref(), args.labels.as_deref())?;

        let defaults = AggregatorConfig::default();
        let channel_capacity = file.channel_capacity.unwrap_or(defaults.channel_capacity);
        if channel_capacity == 0 {
            return Err(ConfigError::ZeroLimit {
                key: "channel_capacity",
            });
        }
        let max_line_bytes = file.max_line_bytes.unwrap_or(defaults.max_line_bytes);
        if max_line_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                key: "max_line_bytes",
            });
        }

        let tail_lines = args.tail.or(file.tail_lines);
        if tail_lines.is_some_and(|n| n < 0) {
            return Err(ConfigError::InvalidValue {
                key: "--tail",
                reason: "must not be negative".to_string(),
            });
        }

        let since_seconds = match (args.since, args.since_time.as_deref()) {
            (Some(secs), _) if secs <= 0 => {
                return Err(ConfigError::InvalidValue {
                    key: "--since",
                    reason: "must be greater than zero".to_string(),
                });
            }
            (Some(secs), _) => Some(secs),
            (None, Some(time)) => Some(seconds_since(time, now)?),
            (None, None) => None,
        };

        let filter = match args.grep.as_deref() {
            None => None,
            Some(pattern) => {
                let filter = if args.ignore_case {
                    CompiledFilter::new_case_insensitive(pattern)
                } else {
                    CompiledFilter::new(pattern)
                }
                .map_err(|e| ConfigError::InvalidValue {
                    key: "--grep",
                    reason: e.to_string(),
                })?;
                let filter = if args.invert_match {
                    filter.inverted()
                } else {
                    filter
                };
                // An empty pattern passes everything through
                (!filter.is_empty()).then_some(filter)
            }
        };

        let follow = args.follow.or(file.follow).unwrap_or(false);

        Ok(Self {
            selector,
            namespace: args
                .namespace
                .or(file.namespace)
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            context: args.context.or(file.context),
            kubeconfig: args.kubeconfig.or(file.kubeconfig),
            options: LogOptions {
                follow: FollowMode::from(follow),
                container: args.container.or(file.container),
                tail_lines,
                since_seconds,
                timestamps: args.timestamps || file.timestamps.unwrap_or(false),
                previous: args.previous,
            },
            output: args.output.or(file.output).unwrap_or_default(),
            filter,
            aggregator: AggregatorConfig {
                channel_capacity,
                max_line_bytes,
            },
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

/// Seconds elapsed since an RFC3339 time, at least one
fn seconds_since(time: &str, now: DateTime<Utc>) -> Result<i64, ConfigError> {
    let start = DateTime::parse_from_rfc3339(time).map_err(|e| ConfigError::InvalidValue {
        key: "--since-time",
        reason: e.to_string(),
    })?;
    let elapsed = now.signed_duration_since(start.with_timezone(&Utc));
    Ok(elapsed.num_seconds().max(1))
}
