//! Structured logging setup shared by the `ikec` binary and its tests.
//!
//! Deliberately smaller than a telemetry-grade logging crate: no crash
//! reporting, no log-file shipping off the host. The daemon runs as a
//! long-lived process under a service manager, which already captures
//! stdout/stderr, so a `tracing_subscriber::fmt` layer pointed at stdout is
//! enough.

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::ParseError,
    fmt,
    layer::SubscriberExt as _,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Crates that are noisy at `debug` and below and almost never what you want
/// when chasing a connection-state bug.
const IRRELEVANT_CRATES: &str = "mio=warn,want=warn";

/// Install a global subscriber that writes to stdout, either as human-
/// readable lines or newline-delimited JSON.
pub fn setup_global_subscriber(directives: &str, stdout_json: bool) -> Result<()> {
    let filter = parse_filter(directives).context("failed to parse log directives")?;

    let subscriber = Registry::default().with(match stdout_json {
        true => fmt::layer().json().flatten_event(true).with_filter(filter).boxed(),
        false => fmt::layer().with_filter(filter).boxed(),
    });

    init(subscriber)
}

/// Sets up a bootstrap logger for use before configuration (and thus the
/// real filter directives) has been read.
pub fn setup_bootstrap() -> Result<tracing::subscriber::DefaultGuard> {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = parse_filter(&directives).context("failed to parse log directives")?;
    let subscriber = Registry::default().with(fmt::layer().with_filter(filter));

    Ok(tracing::dispatcher::set_default(&subscriber.into()))
}

pub fn init(subscriber: impl Subscriber + Send + Sync + 'static) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber).context("could not set global default subscriber")?;
    LogTracer::init().context("failed to init LogTracer")?;
    Ok(())
}

fn parse_filter(directives: &str) -> Result<EnvFilter, ParseError> {
    if directives.is_empty() {
        EnvFilter::try_new(IRRELEVANT_CRATES)
    } else {
        EnvFilter::try_new(format!("{IRRELEVANT_CRATES},{directives}"))
    }
}
