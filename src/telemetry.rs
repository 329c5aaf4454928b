//! Process-wide tracing setup, following the same subscriber shape across
//! every binary that embeds this crate (pipeline runtime, agent router,
//! one-off CLI tools).

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; a second call returns an error which callers may ignore.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,marketpulse=debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .with_timer(ChronoUtc::rfc_3339())
        .pretty()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
