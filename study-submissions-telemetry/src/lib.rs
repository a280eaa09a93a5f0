use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const DEFAULT_LOG_LEVEL: &str = "info,study_submissions_backend=debug,\
                                     study_submissions_database=debug,tokio_postgres=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into())
}

/// Installs the global subscriber. Filtering follows `RUST_LOG` and falls
/// back to [`DEFAULT_LOG_LEVEL`].
///
/// Returns `false` if a global subscriber was already set.
pub fn setup_telemetry() -> bool {
    let stdout_log = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(env_filter()))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_level_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_LEVEL).is_ok());
    }

    #[test]
    fn second_setup_is_refused() {
        setup_telemetry();
        assert!(!setup_telemetry());
    }
}
