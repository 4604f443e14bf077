//! Krasiot CLI - manage your Krasiot account from the terminal.
//!
//! Sign in, sign up, view and edit your profile, and switch preferences.
//! The session is kept between runs and refreshed automatically when the
//! access token expires.

mod app;
mod args;
mod utils;
mod validation;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use args::Cli;

/// Optional log file, in addition to stderr
const LOG_FILE_ENV: &str = "KRASIOT_LOG_FILE";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard must stay alive for the file writer to flush.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.is_empty() => {
            let path = Path::new(&path);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "krasiot.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _log_guard = init_tracing();
    info!("Krasiot CLI starting");

    let mut app = App::new(cli.api_url)?;
    app.run(cli.command).await
}
