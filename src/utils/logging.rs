//! Tracing initialization for binaries and integration harnesses embedding
//! this crate.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Install a formatted `tracing` subscriber filtered by `PONTON_LOG` (falling
/// back to `RUST_LOG`, then `warn`). Safe to call more than once; only the
/// first call installs.
pub fn init_tracing() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_env("PONTON_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
