//! Tracing bootstrap.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initializes the global tracing subscriber with an env-filter.
///
/// Respects `RUST_LOG`, defaulting to `conveyor=info`. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init_tracing() {
    init_tracing_with_filter("conveyor=info");
}

/// Initializes tracing with an explicit default filter directive.
pub fn init_tracing_with_filter(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
        init_tracing_with_filter("conveyor=debug");
    }
}
