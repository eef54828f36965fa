//! Tracing subscriber setup. Logs go to stderr so command output on stdout
//! stays machine-readable.

use board_feed::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(&config.level)))
        .map_err(|e| format!("logging.level: {e}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    // A subscriber may already be installed (tests, embedding); keep it.
    if let Err(err) = installed {
        tracing::debug!(error = %err, "tracing subscriber already set");
    }
    Ok(())
}

fn default_directive(level: &str) -> String {
    format!("board_feed={level},board_cli={level}")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_both_crates() {
        assert_eq!(
            default_directive("debug"),
            "board_feed=debug,board_cli=debug"
        );
    }

    #[test]
    fn repeated_init_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
    }
}
