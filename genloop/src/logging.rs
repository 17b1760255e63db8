//! Development-time tracing for debugging genloop.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG` or `-v`, output
//!   to stderr. Not persisted, not part of product output.
//!
//! - **History (`io/history_store`)**: Product artifacts in the project
//!   directory. Always written, unaffected by log settings.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter for a `-v` count when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "genloop=info,warn",
        _ => "genloop=debug,info",
    }
}

/// Initialize tracing subscriber for development logging.
///
/// `RUST_LOG` wins when set; otherwise the level follows `verbosity`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=genloop=debug genloop run --preset api_server
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
