//! roster-server entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use roster::config::load_config;
use roster::http::server::default_deadline;
use roster::lifecycle::{shutdown_signal, App, InitOptions};
use roster::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "roster-server")]
#[command(about = "Staffing roster backend", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding schema migrations (overrides store.migrations.dir)
    #[arg(long)]
    migrations: Option<PathBuf>,

    /// Directory holding seed SQL files (overrides store.migrations.seed_dir)
    #[arg(long)]
    seed_data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // The subscriber must exist before init logs anything; the level is applied once loaded.
    let json = peek_json_logging(&args.config);
    let log = init_logging(json);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "roster-server starting");

    let mut opts = InitOptions::new(&args.config);
    opts.migrations_dir = args.migrations;
    opts.seed_dir = args.seed_data;
    opts.log = log;

    let app = match App::init(opts).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "Initialization failed");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = app.start().await {
        tracing::error!(error = %e, "Start failed");
        return ExitCode::FAILURE;
    }

    let mut fatal = app.take_fatal().await;
    let failed = tokio::select! {
        _ = shutdown_signal() => false,
        Some(e) = async {
            match fatal.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        } => {
            tracing::error!(error = %e, "Fatal transport failure");
            true
        }
    };

    let deadline = default_deadline(&app.graph().config.http);
    if let Err(e) = app.stop(deadline).await {
        tracing::error!(error = %e, "Stop failed");
        return ExitCode::FAILURE;
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn peek_json_logging(path: &Path) -> bool {
    load_config(path).map(|c| c.logging.json).unwrap_or(false)
}
