//! Logging initialization for the CLI.
//!
//! The core library only emits `tracing` events; the subscriber lives here.
//! Logs always go to stderr so stdout stays clean for listings.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbosity` - 0 = WARN, 1 = DEBUG, 2+ = TRACE for nmls crates
/// * `json` - If true, output JSON lines to stderr
///
/// JSON output format:
/// ```json
/// {"timestamp":"...","level":"DEBUG","fields":{"message":"loaded tree","nodes":4},"target":"nmls_core::pkg::load","span":{"name":"ls","root":"/path"}}
/// ```
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins for other targets; -v raises the nmls crates
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbosity > 0 {
        for target in ["nmls_core", "nmls"] {
            if let Ok(directive) = format!("{target}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
