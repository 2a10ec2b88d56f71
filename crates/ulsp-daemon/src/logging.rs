//! Process-wide logging setup (§4.L), installed once in `main` before any
//! other component starts.

use tracing_subscriber::EnvFilter;

use crate::config::{LogEncoding, LoggingConfig};

/// Install a global `tracing` subscriber per `logging`, falling back to
/// `RUST_LOG` for the filter directive if `logging.level` can't parse.
pub fn init(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match logging.encoding {
        LogEncoding::Pretty => subscriber.with_target(false).try_init(),
        LogEncoding::Json => subscriber.json().try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
