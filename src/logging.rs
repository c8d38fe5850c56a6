//! Logging setup.
//!
//! Installs a global tracing subscriber writing to stderr, filtered by
//! `RUST_LOG`. Subsequent calls are no-ops so tests and embedding
//! binaries can all call it unconditionally.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber.
pub fn init() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
