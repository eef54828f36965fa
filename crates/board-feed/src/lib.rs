//! board-feed: bidirectional cursor pagination for the anonymous board feed.
//!
//! The crate keeps a partially loaded, server-backed message log consistent
//! on the client:
//! - `loaded_set`: the deduplicated, newest-first working set and its merge
//! - `cursor`: oldest/newest boundary markers and per-direction exhaustion
//! - `guard`: single-flight permit shared by every fetch trigger
//! - `trigger`: proximity sentinel and damped pull-gesture recognizer
//! - `session`: `FeedSession`, which wires everything to a `FeedTransport`
//! - `autofill`: keeps loading older pages until the viewport overflows
//!
//! Transports implement `FeedTransport`: `HttpFeedTransport` talks to the
//! board server, `MockFeedTransport` is an in-memory log for tests.

pub mod autofill;
pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod guard;
pub mod http;
pub mod loaded_set;
pub mod mock;
pub mod service;
pub mod session;
pub mod trigger;
pub mod types;

pub use error::FeedError;
pub use session::{FeedSession, FeedView, FetchOutcome, PageReport, SessionOptions, SkipReason};
pub use types::{Direction, FeedItem, FetchKind, ItemId, RawItem};

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "board-feed"
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "board-feed");
    }
}
