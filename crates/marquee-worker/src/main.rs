#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Worker binary: runs one job and prints its terminal message on stdout.

use std::process::ExitCode;

use clap::Parser;
use marquee_config::{LogStyle, WorkerConfig, load_worker_config};
use marquee_core::WorkerOutcome;
use marquee_telemetry::{LogFormat, LogTarget, LoggingConfig, build_sha, init_logging};
use marquee_worker::{WorkerArgs, emit, run_job};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let outcome = execute().await;
    let code = match outcome {
        WorkerOutcome::Success { .. } => ExitCode::SUCCESS,
        WorkerOutcome::Error { .. } => ExitCode::FAILURE,
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = emit(outcome, &mut stdout) {
        eprintln!("failed to write terminal message: {err:#}");
        return ExitCode::FAILURE;
    }
    code
}

async fn execute() -> WorkerOutcome {
    let args = match WorkerArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return WorkerOutcome::error("invalid invocation");
        }
    };
    let config = match load_worker_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid worker configuration: {err:?}");
            return WorkerOutcome::error(format!("invalid worker configuration: {err}"));
        }
    };
    install_logging(&config);

    let request = match args.into_request() {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, "invalid locator");
            return WorkerOutcome::error(format!("invalid locator: {err}"));
        }
    };
    let job_id = request.job_id;

    match tokio::spawn(run_job(config, request)).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(job_id = %job_id, error = %err, "worker task aborted");
            WorkerOutcome::error("worker crashed")
        }
    }
}

fn install_logging(config: &WorkerConfig) {
    let format = match config.logging.style {
        Some(LogStyle::Json) => LogFormat::Json,
        Some(LogStyle::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    let logging = LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: build_sha(),
        target: LogTarget::Stderr,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("failed to initialise logging: {err}");
    }
}
