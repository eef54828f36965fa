//! board-cli: command-line surface for the anonymous board feed.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use board_feed::config::BoardConfig;
use board_feed::http::{HttpFeedTransport, HttpTransportConfig};
use board_feed::service::FeedTransport;

pub mod feed;
pub mod logging;
pub mod post;

/// Stable crate label used by bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "board-cli"
}

static VERSION: OnceLock<String> = OnceLock::new();

/// Set the version string for `--version` output.
pub fn set_version(version: &str) {
    let _ = VERSION.set(version.to_string());
}

fn get_version() -> &'static str {
    VERSION.get().map(|s| s.as_str()).unwrap_or("dev")
}

fn help_text() -> String {
    "\
board reads and writes the anonymous message board.

Usage:
  board [--config PATH] [command]

Available Commands:
  feed        Show the most recent posts
  help        Help about any command
  post        Publish a post
  version     Print the version

Flags:
      --config PATH  config file (default: search XDG, ~/.config, ./board.yaml)
  -h, --help         help for board
  -v, --version      version for board

Environment:
  BOARD_BASE_URL, BOARD_PAGE_SIZE, BOARD_LOG_LEVEL, BOARD_LOG_FORMAT, RUST_LOG

Use \"board [command] --help\" for more information about a command.\n"
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub(crate) fn ok(stdout: String) -> Self {
        Self {
            stdout,
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub(crate) fn failure(exit_code: i32, message: impl std::fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("{message}\n"),
            exit_code,
        }
    }
}

impl From<(i32, String)> for CommandOutput {
    fn from((exit_code, message): (i32, String)) -> Self {
        if exit_code == 0 {
            return Self::ok(format!("{message}\n"));
        }
        Self::failure(exit_code, message)
    }
}

/// Flags accepted before the command name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    pub config_path: Option<PathBuf>,
    pub rest: Vec<String>,
}

/// Split leading global flags off the argument list.
pub fn parse_global(args: &[String]) -> Result<GlobalArgs, (i32, String)> {
    let mut parsed = GlobalArgs::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let token = args[idx].as_str();
        if token == "--config" {
            idx += 1;
            let value = take_flag_value(args, idx, "--config")?;
            parsed.config_path = Some(PathBuf::from(value));
        } else if let Some(value) = token.strip_prefix("--config=") {
            if value.is_empty() {
                return Err((2, "flag needs an argument: --config".to_string()));
            }
            parsed.config_path = Some(PathBuf::from(value));
        } else {
            break;
        }
        idx += 1;
    }
    parsed.rest = args[idx..].to_vec();
    Ok(parsed)
}

/// Full process entry: load config, start logging, build the HTTP transport,
/// dispatch.
pub async fn run_from_env(args: &[String]) -> CommandOutput {
    let global = match parse_global(args) {
        Ok(global) => global,
        Err(err) => return err.into(),
    };
    if let Some(out) = builtin(&global.rest) {
        return out;
    }

    let config = match BoardConfig::load(global.config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => return CommandOutput::failure(1, format!("Error: {err}")),
    };
    if let Err(err) = logging::init(&config.logging) {
        return CommandOutput::failure(1, format!("Error: {err}"));
    }
    let transport = match HttpFeedTransport::new(HttpTransportConfig::from(&config.server)) {
        Ok(transport) => transport,
        Err(err) => return CommandOutput::failure(1, format!("Error: {err}")),
    };
    tracing::debug!(base_url = transport.base_url(), "transport ready");
    run_cli(&global.rest, Arc::new(transport), &config).await
}

/// Dispatch a command against an already-built transport.
pub async fn run_cli(
    args: &[String],
    transport: Arc<dyn FeedTransport>,
    config: &BoardConfig,
) -> CommandOutput {
    if let Some(out) = builtin(args) {
        return out;
    }
    let Some((cmd, rest)) = args.split_first() else {
        return CommandOutput::ok(help_text());
    };

    match cmd.as_str() {
        "feed" => feed::run_feed(rest, transport, config).await,
        "post" => post::run_post(rest, transport, config).await,
        _ => CommandOutput::failure(1, format!("Error: unknown command \"{cmd}\" for \"board\"")),
    }
}

/// Commands answered without config or a server.
fn builtin(args: &[String]) -> Option<CommandOutput> {
    match args.first().map(String::as_str) {
        None | Some("--help" | "-h" | "help") => Some(CommandOutput::ok(help_text())),
        Some("version" | "--version" | "-v") => Some(CommandOutput::ok(format!(
            "board version {}\n",
            get_version()
        ))),
        Some(_) => None,
    }
}

pub(crate) fn take_flag_value(args: &[String], idx: usize, flag: &str) -> Result<String, (i32, String)> {
    args.get(idx)
        .cloned()
        .ok_or_else(|| (2, format!("flag needs an argument: {flag}")))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| (*a).to_string()).collect()
    }

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "board-cli");
    }

    #[test]
    fn global_config_flag_is_split_off() {
        let parsed = parse_global(&strings(&["--config", "/tmp/b.yaml", "feed", "-n", "5"])).unwrap();
        assert_eq!(parsed.config_path, Some(PathBuf::from("/tmp/b.yaml")));
        assert_eq!(parsed.rest, strings(&["feed", "-n", "5"]));

        let parsed = parse_global(&strings(&["--config=/etc/board.yaml", "post", "hi"])).unwrap();
        assert_eq!(parsed.config_path, Some(PathBuf::from("/etc/board.yaml")));
        assert_eq!(parsed.rest, strings(&["post", "hi"]));
    }

    #[test]
    fn global_config_flag_requires_value() {
        let err = parse_global(&strings(&["--config"])).unwrap_err();
        assert_eq!(err.0, 2);
    }

    #[test]
    fn help_and_version_need_no_backend() {
        assert!(builtin(&[]).unwrap().stdout.contains("Available Commands:"));
        assert!(builtin(&strings(&["-v"])).unwrap().stdout.starts_with("board version"));
        assert!(builtin(&strings(&["feed"])).is_none());
    }
}
