//! `board feed`: load the freshest page and optionally walk older pages.

use std::sync::Arc;

use board_feed::config::BoardConfig;
use board_feed::service::FeedTransport;
use board_feed::session::{FeedSession, FetchOutcome, SessionOptions};
use board_feed::types::FeedItem;

use crate::{take_flag_value, CommandOutput};

const HELP_TEXT_FEED: &str = "\
Show the most recent posts, newest first.

Usage:
  board feed [flags]

Flags:
  -n, --limit N   posts per page (default: feed.page_size)
      --pages P   pages to load, walking toward older posts (default 1)
      --json      one JSON object per line
  -h, --help      help for feed";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedFeedArgs {
    limit: Option<usize>,
    pages: usize,
    json: bool,
}

pub async fn run_feed(
    args: &[String],
    transport: Arc<dyn FeedTransport>,
    config: &BoardConfig,
) -> CommandOutput {
    match execute_feed(args, transport, config).await {
        Ok(output) => output,
        Err(err) => err.into(),
    }
}

async fn execute_feed(
    args: &[String],
    transport: Arc<dyn FeedTransport>,
    config: &BoardConfig,
) -> Result<CommandOutput, (i32, String)> {
    let parsed = parse_feed_args(args)?;

    let mut options = SessionOptions::from(config);
    if let Some(limit) = parsed.limit {
        options.page_size = limit;
    }
    let session = FeedSession::new(transport, options);

    session
        .load_initial()
        .await
        .map_err(|e| (1, format!("Error: {e}")))?;
    for _ in 1..parsed.pages {
        match session.request_older().await {
            Ok(FetchOutcome::Applied(_)) => {}
            Ok(FetchOutcome::Skipped(_)) => break,
            Err(e) => return Err((1, format!("Error: {e}"))),
        }
    }

    let mut out = String::new();
    for item in session.items() {
        write_item(&mut out, &item, parsed.json).map_err(|e| (1, format!("output: {e}")))?;
    }

    let mut stderr = String::new();
    if !parsed.json && session.exhaustion().more_older() {
        stderr.push_str("(older posts available: use --pages)\n");
    }
    Ok(CommandOutput {
        stdout: out,
        stderr,
        exit_code: 0,
    })
}

fn parse_feed_args(args: &[String]) -> Result<ParsedFeedArgs, (i32, String)> {
    let mut parsed = ParsedFeedArgs {
        limit: None,
        pages: 1,
        json: false,
    };

    let mut idx = 0usize;
    while idx < args.len() {
        let token = &args[idx];
        match token.as_str() {
            "-h" | "--help" | "help" => return Err((0, HELP_TEXT_FEED.to_string())),
            "--json" => parsed.json = true,
            "-n" | "--limit" => {
                idx += 1;
                let raw = take_flag_value(args, idx, "--limit")?;
                parsed.limit = Some(parse_positive(&raw, "limit")?);
            }
            "--pages" => {
                idx += 1;
                let raw = take_flag_value(args, idx, "--pages")?;
                parsed.pages = parse_positive(&raw, "pages")?;
            }
            flag if flag.starts_with('-') => {
                return Err((2, format!("unknown flag: {flag}")));
            }
            _ => return Err((2, "feed takes no arguments".to_string())),
        }
        idx += 1;
    }
    Ok(parsed)
}

fn parse_positive(raw: &str, name: &str) -> Result<usize, (i32, String)> {
    let value = raw
        .parse::<i64>()
        .map_err(|_| (2, format!("{name} must be an integer")))?;
    if value < 1 {
        return Err((2, format!("{name} must be >= 1")));
    }
    usize::try_from(value).map_err(|_| (2, format!("{name} out of range")))
}

fn write_item(out: &mut String, item: &FeedItem, json_output: bool) -> Result<(), String> {
    if json_output {
        let encoded = serde_json::to_string(item).map_err(|e| format!("encode item: {e}"))?;
        out.push_str(&encoded);
        out.push('\n');
        return Ok(());
    }

    out.push_str(&format!(
        "{} [{}] {}: {}\n",
        item.created_at.format("%Y-%m-%d %H:%M:%S"),
        item.fingerprint(),
        item.author_label,
        item.body
    ));
    Ok(())
}
