//! Structured logging init.
//!
//! Grounded on the teacher's `src/tracing.rs::init_tracer`, stripped of the
//! SSE log-broadcast layer (`PublicTracerLayer`), which exists purely to
//! feed the teacher's own web UI's live log view and has no counterpart
//! here.

use tracing_subscriber::EnvFilter;

pub fn init_tracer() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
