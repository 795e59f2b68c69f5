//! Logging setup
//!
//! One subscriber for the whole process, installed by the binary before
//! any other component starts. `RUST_LOG` wins over the configured
//! default so a single run can be made verbose without touching the
//! config file.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn parse_directives(directives: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| crate::Error::Config(format!("invalid log filter '{}': {}", directives, e)))
}

/// Install the tracing subscriber.
///
/// `default_level` is any filter directive string, not just a bare
/// level, so a config can say `info,host=debug`. A malformed `RUST_LOG`
/// is an error rather than a silent fallback.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) => parse_directives(&env)?,
        Err(_) => parse_directives(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    Ok(())
}
