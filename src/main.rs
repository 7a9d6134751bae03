use std::io::{self, BufWriter};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use podtail_k8s::KubeClient;
use podtail_logs::{
    CompiledFilter, Controller, FilteredSink, JsonSink, LineSink, RunError, RunReport, RunRequest,
    TextSink,
};

mod cli;
mod config;
mod signals;

use cli::Args;
use config::{FileConfig, OutputFormat, Settings};

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;

/// Exit code for invalid invocations and config files
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // Diagnostics go to stderr; stdout carries the log lines
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run_app(settings).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(args: Args) -> Result<Settings> {
    let file = FileConfig::load(args.config.as_deref())?;
    Ok(Settings::resolve(args, file, chrono::Utc::now())?)
}

async fn run_app(settings: Settings) -> Result<ExitCode> {
    let client =
        KubeClient::connect(settings.kubeconfig.as_deref(), settings.context.as_deref()).await?;
    debug!(context = ?client.context(), namespace = %settings.namespace, "connected");

    let controller = Controller::new(Arc::new(client), settings.aggregator);
    signals::cancel_on_signal(controller.cancel_token());

    let sink = build_sink(settings.output, settings.filter);
    let request = RunRequest {
        namespace: settings.namespace,
        selector: settings.selector,
        options: settings.options,
    };

    let result = controller.run(request, sink).await;
    Ok(ExitCode::from(exit_code(result)))
}

/// Map the outcome of a run to the process exit code, reporting failures
fn exit_code(result: Result<RunReport, RunError>) -> u8 {
    match result {
        Ok(report) if report.all_failed() => {
            error!("No pod could be streamed");
            EXIT_FAILURE
        }
        Ok(report) => {
            debug!(records = report.records, cancelled = report.cancelled, "run complete");
            EXIT_SUCCESS
        }
        // Reader went away (e.g. piped into `head`)
        Err(RunError::Sink(e)) if e.kind() == io::ErrorKind::BrokenPipe => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", anyhow::Error::new(e));
            EXIT_FAILURE
        }
    }
}

/// Stdout sink for the selected format, behind the line filter if one is set
fn build_sink(output: OutputFormat, filter: Option<CompiledFilter>) -> Box<dyn LineSink> {
    let writer = BufWriter::new(io::stdout());
    let sink: Box<dyn LineSink> = match output {
        OutputFormat::Text => Box::new(TextSink::new(writer)),
        OutputFormat::Json => Box::new(JsonSink::new(writer)),
    };

    match filter {
        Some(filter) => Box::new(FilteredSink::new(sink, filter)),
        None => sink,
    }
}
