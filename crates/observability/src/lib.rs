//! Process-wide tracing setup for catalog services.

/// Install the JSON tracing subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; only the first call installs anything.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Subscriber construction.
pub mod tracing;
