//! Stitch CLI entrypoint.

use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;


use commands::Commands;
use config::StitchConfig;

#[derive(Parser)]
#[command(name = "stitch")]
#[command(author, version, about = "Stitches CI steps into one trace across process boundaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout is reserved for the context hand-off lines consumed by the CI
    // orchestrator; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StitchConfig::from_env();

    let output = match cli.command {
        Commands::Start { step } => {
            handlers::start(&config, &step).map(|ctx| Some(ctx.to_parent_lines()))
        }
        Commands::StartChild {
            step,
            trace_id,
            parent_span_id,
        } => handlers::start_child(&config, &step, trace_id, parent_span_id)
            .map(|ctx| Some(ctx.to_span_lines())),
        Commands::EndChild {
            step,
            trace_id,
            span_id,
            status,
            error,
            duration_ms,
        } => handlers::end_child(&config, &step, trace_id, span_id, status, error, duration_ms)
            .await
            .map(|_| None),
        Commands::End {
            step,
            trace_id,
            parent_span_id,
            status,
            error,
        } => handlers::end(&config, &step, trace_id, parent_span_id, status, error)
            .await
            .map(|_| None),
        Commands::Run {
            step,
            trace_id,
            parent_span_id,
            command,
        } => handlers::run(&config, &step, trace_id, parent_span_id, command)
            .await
            .map(|_| None),
    };

    match output {
        Ok(Some(lines)) => {
            println!("{lines}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            let code = u8::try_from(e.exit_code()).ok().filter(|c| *c != 0);
            ExitCode::from(code.unwrap_or(1))
        }
    }
}
