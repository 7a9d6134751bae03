use std::path::PathBuf;

use clap::Parser;

use crate::config::OutputFormat;

/// podtail - stream logs from one or many Kubernetes pods
#[derive(Parser, Debug)]
#[command(name = "podtail")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Pod name for logs streaming
    #[arg(long)]
    pub pod: Option<String>,

    /// Label selector for the pods (required when --pod is omitted)
    #[arg(short = 'l', long)]
    pub labels: Option<String>,

    /// Namespace name [default: default]
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Follow logs from the pods, or exit once current output is read
    #[arg(short = 'f', long, num_args = 0..=1, default_missing_value = "true")]
    pub follow: Option<bool>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Path to the kubeconfig file
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Path to the podtail config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Container to read in multi-container pods
    #[arg(short = 'c', long)]
    pub container: Option<String>,

    /// Number of historical log lines to fetch per pod
    #[arg(long, value_name = "LINES")]
    pub tail: Option<i64>,

    /// Only lines newer than this many seconds
    #[arg(long, value_name = "SECONDS", conflicts_with = "since_time")]
    pub since: Option<i64>,

    /// Only lines after this RFC3339 time
    #[arg(long, value_name = "TIME")]
    pub since_time: Option<String>,

    /// Prefix each line with the server timestamp
    #[arg(long)]
    pub timestamps: bool,

    /// Read the previous terminated container instance
    #[arg(long)]
    pub previous: bool,

    /// Only print lines matching this regex
    #[arg(long, value_name = "REGEX")]
    pub grep: Option<String>,

    /// Print lines NOT matching --grep
    #[arg(short = 'v', long, requires = "grep")]
    pub invert_match: bool,

    /// Case-insensitive --grep
    #[arg(short = 'i', long, requires = "grep")]
    pub ignore_case: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Diagnostics filter for stderr (e.g. "debug", "podtail_logs=trace")
    #[arg(long, value_name = "DIRECTIVE")]
    pub log_level: Option<String>,
}
