//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"sales_analytics=debug"`) when it is unset or
/// invalid.
///
/// Safe to call more than once: if a global subscriber is already set the
/// call is a no-op and returns `false`.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
    {
        Ok(()) => true,
        Err(_) => {
            tracing::debug!("global tracing subscriber already initialized");
            false
        }
    }
}
