use std::sync::Once;

use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` wins over `level`; an
/// unparsable level falls back to `info`. Safe to call more than once.
pub fn init_tracing(level: &str) {
    TRACING_INIT.call_once(|| {
        let directive: Directive = format!("mealwallet={}", level)
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into());

        let filter = EnvFilter::builder()
            .with_default_directive(directive)
            .from_env_lossy();

        // Logs go to stderr so exported statements on stdout stay clean.
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
