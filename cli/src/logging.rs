//! Tracing setup: everything to stderr, action lines also to a rotating file.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use valuta_wallet::ACTIONS_TARGET;

use crate::config::{AppConfig, LogFormat};

const ACTIONS_FILE_PREFIX: &str = "actions";
const ACTIONS_MAX_FILES: usize = 5;

/// Install the global subscriber.
///
/// The returned guard flushes the action log on drop; keep it alive until
/// the process exits.
pub fn init(config: &AppConfig) -> Result<WorkerGuard> {
    let (actions_layer, guard) = actions_layer(&config.logs_dir)?;

    let env_filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );

    // stdout carries command output only
    let terminal_layer = fmt::layer().with_writer(std::io::stderr);
    let terminal_layer = match config.log_format {
        LogFormat::Json => terminal_layer.json().with_filter(env_filter).boxed(),
        LogFormat::Human => terminal_layer.with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(actions_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// Layer writing `valuta::actions` events to `<dir>/actions.<date>.log`.
///
/// Files rotate daily and the newest five are kept.
pub fn actions_layer<S>(dir: &Path) -> Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create logs directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(ACTIONS_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(ACTIONS_MAX_FILES)
        .build(dir)
        .with_context(|| format!("failed to open action log in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(Targets::new().with_target(ACTIONS_TARGET, LevelFilter::INFO));

    Ok((layer, guard))
}
