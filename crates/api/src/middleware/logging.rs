//! Logging initialization and configuration.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Workspace crates that log at the configured level.
const TRACKER_CRATES: [&str; 4] = ["invite_tracker_api", "domain", "persistence", "shared"];

/// Initializes the logging subsystem based on configuration.
///
/// `RUST_LOG` replaces the configured directives entirely when set.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true);
            subscriber.with(json_layer).init();
        }
        "compact" => {
            subscriber.with(fmt::layer().compact().with_target(true)).init();
        }
        _ => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true);
            subscriber.with(pretty_layer).init();
        }
    }
}

/// Our crates log at `level`; dependencies (sqlx, hyper, reqwest) stay at warn.
fn default_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for krate in TRACKER_CRATES {
        directives.push_str(&format!(",{}={}", krate, level));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_workspace_crates() {
        let directives = default_directives("debug");

        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("domain=debug"));
        assert!(directives.contains("invite_tracker_api=debug"));
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
