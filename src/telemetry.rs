//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,challenge=debug,stats=debug,fitchallenge_backend=debug,tower_http=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Event targets in use: `fitchallenge_backend` (startup, config, HTTP),
//! `challenge` (rotation and bank), `stats` (completions, resets) and
//! `reminder` (notification settings and the scheduler). TraceLayer adds
//! the per-request spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,challenge=debug,stats=debug,reminder=info,fitchallenge_backend=debug,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}
