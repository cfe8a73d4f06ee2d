//! Tracing/logging initialization shared by the CLI and embedding hosts.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive enabling `level` for every `permiso*` target.
pub fn default_directive(level: &str) -> String {
    format!("permiso={level}")
}

/// `RUST_LOG` when set and valid, otherwise `default_filter`.
fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so transcripts on stdout stay clean. With `log_json`
/// each event is one JSON line. Returns `false` when a global subscriber was
/// already installed, which embedding hosts commonly do themselves.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter(default_filter));
    let installed = if log_json {
        registry.with(fmt.json()).try_init()
    } else {
        registry.with(fmt).try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_covers_all_crates() {
        assert_eq!(default_directive("debug"), "permiso=debug");
    }

    #[test]
    fn second_install_is_refused() {
        init_tracing(&default_directive("info"), false);
        assert!(!init_tracing(&default_directive("info"), true));
    }
}
