//! Structured logging for the block cache using `tracing`.
//!
//! The library only emits events; binaries call [`init`] once at startup.
//! `RUST_LOG` overrides the default filter:
//! ```bash
//! RUST_LOG=raster_block_cache=trace block-cache layout.txt script.txt out.txt
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::{DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER};

/// Install the global subscriber (stderr, compact format).
///
/// A second call is ignored.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(VERBOSE_LOG_FILTER)
        } else {
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .compact(),
    );

    // Ignore error if already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}
