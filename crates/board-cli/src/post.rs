//! `board post`: publish one message.

use std::sync::Arc;

use board_feed::config::BoardConfig;
use board_feed::service::FeedTransport;
use board_feed::session::{FeedSession, SessionOptions};
use board_feed::types::encode_instant;

use crate::{take_flag_value, CommandOutput};

const HELP_TEXT_POST: &str = "\
Publish a post. Words after the flags are joined with spaces.

Usage:
  board post [flags] <message...>

Flags:
      --as NAME   author label (default: anonymous)
      --json      print the stored post as JSON
  -h, --help      help for post";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedPostArgs {
    author: Option<String>,
    body: String,
    json: bool,
}

pub async fn run_post(
    args: &[String],
    transport: Arc<dyn FeedTransport>,
    config: &BoardConfig,
) -> CommandOutput {
    match execute_post(args, transport, config).await {
        Ok(output) => output,
        Err(err) => err.into(),
    }
}

async fn execute_post(
    args: &[String],
    transport: Arc<dyn FeedTransport>,
    config: &BoardConfig,
) -> Result<CommandOutput, (i32, String)> {
    let parsed = parse_post_args(args)?;
    let session = FeedSession::new(transport, SessionOptions::from(config));

    let item = session
        .publish(parsed.author.as_deref(), &parsed.body)
        .await
        .map_err(|e| match e {
            board_feed::FeedError::InvalidArgument { message } => (2, message),
            other => (1, format!("Error: {other}")),
        })?;

    let stdout = if parsed.json {
        let mut encoded =
            serde_json::to_string(&item).map_err(|e| (1, format!("encode item: {e}")))?;
        encoded.push('\n');
        encoded
    } else {
        format!(
            "posted {} as {} at {}\n",
            item.id,
            item.author_label,
            encode_instant(item.created_at)
        )
    };
    Ok(CommandOutput::ok(stdout))
}

fn parse_post_args(args: &[String]) -> Result<ParsedPostArgs, (i32, String)> {
    let mut author = None;
    let mut json = false;
    let mut words: Vec<String> = Vec::new();

    let mut idx = 0usize;
    while idx < args.len() {
        let token = &args[idx];
        if !words.is_empty() {
            words.push(token.clone());
            idx += 1;
            continue;
        }
        match token.as_str() {
            "-h" | "--help" => return Err((0, HELP_TEXT_POST.to_string())),
            "--json" => json = true,
            "--as" => {
                idx += 1;
                author = Some(take_flag_value(args, idx, "--as")?);
            }
            "--" => {
                words.extend(args[idx + 1..].iter().cloned());
                break;
            }
            flag if flag.starts_with('-') => {
                return Err((2, format!("unknown flag: {flag}")));
            }
            word => words.push(word.to_string()),
        }
        idx += 1;
    }

    if words.is_empty() {
        return Err((2, "post requires a message".to_string()));
    }
    Ok(ParsedPostArgs {
        author,
        body: words.join(" "),
        json,
    })
}
