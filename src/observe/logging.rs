//! Process-wide log subscriber setup

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a fmt subscriber honoring `RUST_LOG`, falling back to `default_directive`
///
/// With `log_span_close`, every repository span also produces a close event
/// carrying its duration.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_directive: &str, log_span_close: bool) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };

    let span_events = if log_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_span_events(span_events)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    tracing::debug!(directive = default_directive, "Logging initialized");
    Ok(())
}
