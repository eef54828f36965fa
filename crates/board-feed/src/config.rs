//! Configuration for the board client.
//!
//! Root configuration struct and section types with full defaults,
//! validation, YAML file loading, and environment variable overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::trigger::GestureConfig;
use crate::types::DEFAULT_MAX_BODY_CHARS;

pub const ENV_BASE_URL: &str = "BOARD_BASE_URL";
pub const ENV_PAGE_SIZE: &str = "BOARD_PAGE_SIZE";
pub const ENV_LOG_LEVEL: &str = "BOARD_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "BOARD_LOG_FORMAT";

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub gesture: GestureSection,
    pub logging: LoggingConfig,
}

impl BoardConfig {
    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| format!("parse config: {e}"))
    }

    /// Load from `path` (or the first file found in the search paths), apply
    /// environment overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let source = match path {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };
        let mut cfg = match source {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("read config {}: {e}", path.display()))?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup(ENV_BASE_URL)) {
            self.server.base_url = url;
        }
        if let Some(size) = non_empty(lookup(ENV_PAGE_SIZE)) {
            self.feed.page_size = size
                .parse()
                .map_err(|_| format!("{ENV_PAGE_SIZE} must be a positive integer, got {size:?}"))?;
        }
        if let Some(level) = non_empty(lookup(ENV_LOG_LEVEL)) {
            self.logging.level = level;
        }
        if let Some(format) = non_empty(lookup(ENV_LOG_FORMAT)) {
            self.logging.format = format;
        }
        Ok(())
    }

    /// Validates the entire configuration, returning an error message on failure.
    pub fn validate(&self) -> Result<(), String> {
        // Server
        let url = self.server.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err("server.base_url must start with http:// or https://".into());
        }
        if self.server.connect_timeout_ms == 0 {
            return Err("server.connect_timeout_ms must be greater than 0".into());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("server.request_timeout_ms must be greater than 0".into());
        }

        // Feed
        if self.feed.page_size < 1 {
            return Err("feed.page_size must be at least 1".into());
        }
        if self.feed.proximity_margin.is_nan() || self.feed.proximity_margin < 0.0 {
            return Err("feed.proximity_margin must be zero or greater".into());
        }
        if self.feed.autofill_max_iterations < 1 {
            return Err("feed.autofill_max_iterations must be at least 1".into());
        }
        if self.feed.max_body_chars < 1 {
            return Err("feed.max_body_chars must be at least 1".into());
        }

        // Gesture
        let gesture = &self.gesture;
        if gesture.damping.is_nan() || gesture.damping <= 0.0 || gesture.damping >= 1.0 {
            return Err("gesture.damping must be between 0 and 1 (exclusive)".into());
        }
        if gesture.max_pull.is_nan() || gesture.max_pull <= 0.0 {
            return Err("gesture.max_pull must be greater than 0".into());
        }
        if gesture.threshold.is_nan()
            || gesture.threshold <= 0.0
            || gesture.threshold > gesture.max_pull
        {
            return Err("gesture.threshold must be greater than 0 and at most max_pull".into());
        }

        // Logging
        match self.logging.level.to_lowercase().trim() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(
                    "logging.level must be one of trace, debug, info, warn, error".into(),
                )
            }
        }
        match self.logging.format.to_lowercase().trim() {
            "console" | "json" => {}
            _ => return Err("logging.format must be one of console, json".into()),
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Section configs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: usize,
    /// Sentinel trigger zone, in presentation units from the viewport edge.
    pub proximity_margin: f64,
    pub autofill_max_iterations: usize,
    pub max_body_chars: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            proximity_margin: 300.0,
            autofill_max_iterations: 5,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GestureSection {
    pub damping: f64,
    pub max_pull: f64,
    pub threshold: f64,
}

impl Default for GestureSection {
    fn default() -> Self {
        let defaults = GestureConfig::default();
        Self {
            damping: defaults.damping,
            max_pull: defaults.max_pull,
            threshold: defaults.threshold,
        }
    }
}

impl From<&GestureSection> for GestureConfig {
    fn from(section: &GestureSection) -> Self {
        Self {
            damping: section.damping,
            max_pull: section.max_pull,
            threshold: section.threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "console".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// File discovery
// ---------------------------------------------------------------------------

/// Search for a configuration file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths()
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            paths.push(Path::new(&xdg).join("board").join("config.yaml"));
        }
    }
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config/board/config.yaml"));
    }
    paths.push(PathBuf::from("board.yaml"));

    paths
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn expect_err(cfg: &BoardConfig) -> String {
        match cfg.validate() {
            Ok(()) => panic!("expected error"),
            Err(err) => err,
        }
    }

    #[test]
    fn config_defaults() {
        let cfg = BoardConfig::default();
        assert_eq!(cfg.feed.page_size, 10);
        assert_eq!(cfg.feed.autofill_max_iterations, 5);
        assert_eq!(cfg.gesture.damping, 0.5);
        assert_eq!(cfg.gesture.max_pull, 120.0);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok(), "default config must validate");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = BoardConfig::from_yaml("feed:\n  page_size: 25\nlogging:\n  format: json\n")
            .unwrap();
        assert_eq!(cfg.feed.page_size, 25);
        assert_eq!(cfg.feed.proximity_margin, 300.0);
        assert_eq!(cfg.logging.format, "json");
        assert_eq!(cfg.server, ServerConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(BoardConfig::from_yaml("  \n").unwrap(), BoardConfig::default());
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let mut cfg = BoardConfig::default();
        cfg.feed.page_size = 0;
        assert!(expect_err(&cfg).contains("feed.page_size"));
    }

    #[test]
    fn validate_rejects_damping_out_of_range() {
        let mut cfg = BoardConfig::default();
        cfg.gesture.damping = 1.0;
        assert!(expect_err(&cfg).contains("gesture.damping"));
    }

    #[test]
    fn validate_rejects_threshold_above_cap() {
        let mut cfg = BoardConfig::default();
        cfg.gesture.threshold = 121.0;
        assert!(expect_err(&cfg).contains("gesture.threshold"));
    }

    #[test]
    fn validate_rejects_bad_scheme_and_log_format() {
        let mut cfg = BoardConfig::default();
        cfg.server.base_url = "ftp://board".into();
        assert!(expect_err(&cfg).contains("server.base_url"));

        let mut cfg = BoardConfig::default();
        cfg.logging.format = "xml".into();
        assert!(expect_err(&cfg).contains("logging.format"));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://board.example"),
            (ENV_PAGE_SIZE, "20"),
            (ENV_LOG_LEVEL, " debug "),
        ]
        .into_iter()
        .collect();
        let mut cfg = BoardConfig::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.server.base_url, "https://board.example");
        assert_eq!(cfg.feed.page_size, 20);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "console");
    }

    #[test]
    fn env_rejects_bad_page_size() {
        let mut cfg = BoardConfig::default();
        let err = cfg
            .apply_env(|key| (key == ENV_PAGE_SIZE).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.contains(ENV_PAGE_SIZE), "err={err}");
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gesture:\n  threshold: 60\nfeed:\n  proximity_margin: 250").unwrap();
        let cfg = BoardConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.gesture.threshold, 60.0);
        assert_eq!(cfg.feed.proximity_margin, 250.0);
        let gesture = GestureConfig::from(&cfg.gesture);
        assert_eq!(gesture.threshold, 60.0);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BoardConfig::load(Some(Path::new("/nonexistent/board.yaml"))).unwrap_err();
        assert!(err.contains("read config"), "err={err}");
    }
}
