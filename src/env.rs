//! Environment variable names used by this crate for configuring the
//! handler without code changes.
//!
//! These are purely helpers; [`SentryHandler`](crate::handler::SentryHandler)
//! only reads the environment itself when no DSN was configured.

/// Service endpoint, e.g. `https://public@sentry.example.com/1`.
pub const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

/// Name of the client factory to use instead of resolving by scheme.
pub const SENTRY_CLIENT_FACTORY_ENV: &str = "SENTRY_CLIENT_FACTORY";

/// `true`/`false`: close the client connection when the handler closes.
pub const SENTRY_PROPAGATE_CLOSE_ENV: &str = "SENTRY_PROPAGATE_CLOSE";

/// Minimum severity forwarded, by name (`warn`) or ordinal (`900`).
pub const SENTRY_LEVEL_ENV: &str = "SENTRY_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a non-empty environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
