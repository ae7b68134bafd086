//! Diagnostic tracing.
//!
//! Tracing is for debugging heddle itself and goes to stderr. What a run
//! did to each repository is reported through the [`Reporter`](crate::ports::Reporter)
//! and is unaffected by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `debug` for
/// heddle's own modules with `verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,heddle=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
