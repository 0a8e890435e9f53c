//! # Glove Link
//!
//! Streams finger joint angles from a flex-sensor glove to a robotic hand.
//!
//! ```bash
//! glove-link glove [config.toml]   # sample sensors and transmit
//! glove-link hand [config.toml]    # receive frames and drive joints
//! ```
//!
//! Expected output (hand):
//! ```text
//! INFO glove_link::runtime::hand: Hand running: 1 joint(s) at 250 Hz
//! INFO glove_link::link::state: Link state: idle -> discovering
//! INFO glove_link::link::serial: Found peer at /dev/ttyACM0
//! INFO glove_link::link::state: Link state: connecting -> linked
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use glove_link::config::{Config, TelemetryConfig};
use glove_link::runtime::{self, Role};

/// File name prefix of the rolling application log
const LOG_FILE_PREFIX: &str = "glove-link.log";

const USAGE: &str = "usage: glove-link <glove|hand> [config.toml]";

/// Parse `<role> [config]` from the command line (program name excluded)
fn parse_args(args: &[String]) -> Result<(Role, Option<PathBuf>)> {
    let (role, rest) = match args.split_first() {
        Some(split) => split,
        None => bail!(USAGE),
    };

    if rest.len() > 1 {
        bail!(USAGE);
    }

    let role = role.parse::<Role>().with_context(|| USAGE.to_string())?;
    Ok((role, rest.first().map(PathBuf::from)))
}

/// Console logging, plus a daily rolling file when telemetry is enabled
///
/// The returned guard must stay alive to flush the file writer.
fn init_logging(telemetry: &TelemetryConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let console = fmt::layer();

    if telemetry.enabled {
        let appender = tracing_appender::rolling::daily(&telemetry.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file = fmt::layer().with_ansi(false).with_writer(writer);

        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(file)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(filter).with(console).init();
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (role, config_path) = parse_args(&args)?;

    let config = Config::load_or_default(config_path.as_ref())
        .context("Failed to load configuration")?;

    let _guard = init_logging(&config.telemetry);

    info!("Glove Link v{} starting as {}", env!("CARGO_PKG_VERSION"), role);
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: defaults"),
    }
    info!("Press Ctrl+C to exit");

    runtime::run(role, config).await?;
    Ok(())
}
