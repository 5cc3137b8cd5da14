//! Logger setup.
//!
//! Verbosity is selected by the `DMTLOGLEVEL` environment variable (with
//! `LOGLEVEL` as fallback), using the legacy ladder
//! `STUDY < DEBUG < DEVELOP/TEST < INFO < PROD` mapped onto tracing levels.

use tracing_subscriber::EnvFilter;

/// Map the legacy level names onto a tracing filter directive.
pub fn level_from_env() -> &'static str {
    let level = std::env::var("DMTLOGLEVEL")
        .or_else(|_| std::env::var("LOGLEVEL"))
        .unwrap_or_default();
    match level.to_uppercase().as_str() {
        "STUDY" => "trace",
        "DEBUG" | "DEVELOP" | "TEST" => "debug",
        "PROD" => "warn",
        _ => "info",
    }
}

/// Initialize the global subscriber from the environment. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level_from_env()))
        .try_init();
}
