pub use tracing::{debug, error, info, instrument, trace, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
};

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Span close events carry per-stage timings, only worth the noise when debugging
    let span_events = if env_filter.to_string().contains("debug")
        || std::env::var("RUST_LOG").unwrap_or_default().contains("debug")
    {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
