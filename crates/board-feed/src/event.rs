//! Feed event recording for observability.
//!
//! Each guarded fetch, publish, and live ingest emits a [`FeedEvent`].
//! Failures surface here even when the caller ignores the returned error.

use chrono::{DateTime, Utc};

/// The operation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedEventKind {
    FetchFreshest,
    FetchOlder,
    FetchNewer,
    Publish,
    LiveIngest,
    Autofill,
}

impl std::fmt::Display for FeedEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FetchFreshest => "fetch_freshest",
            Self::FetchOlder => "fetch_older",
            Self::FetchNewer => "fetch_newer",
            Self::Publish => "publish",
            Self::LiveIngest => "live_ingest",
            Self::Autofill => "autofill",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEventOutcome {
    Success,
    /// Another fetch held the guard, or the direction was exhausted.
    Skipped,
    Error(String),
}

impl std::fmt::Display for FeedEventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Skipped => f.write_str("skipped"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: FeedEventKind,
    pub outcome: FeedEventOutcome,
    pub detail: String,
}

impl FeedEvent {
    pub fn new(kind: FeedEventKind, outcome: FeedEventOutcome, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            outcome,
            detail: detail.into(),
        }
    }
}

/// Receives feed events.
pub trait FeedEventSink: Send + Sync {
    fn record(&self, event: FeedEvent);
}

/// In-memory event sink for testing.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: std::sync::Mutex<Vec<FeedEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FeedEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self) -> usize {
        match self.events.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Events of one kind, in emission order.
    pub fn of_kind(&self, kind: FeedEventKind) -> Vec<FeedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }
}

impl FeedEventSink for InMemoryEventSink {
    fn record(&self, event: FeedEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// No-op event sink that discards all events.
pub struct NullEventSink;

impl FeedEventSink for NullEventSink {
    fn record(&self, _event: FeedEvent) {}
}

/// Forwards events to `tracing` at a level matching the outcome.
pub struct TracingEventSink;

impl FeedEventSink for TracingEventSink {
    fn record(&self, event: FeedEvent) {
        match &event.outcome {
            FeedEventOutcome::Success => tracing::debug!(
                kind = %event.kind,
                detail = %event.detail,
                "feed event"
            ),
            FeedEventOutcome::Skipped => tracing::trace!(
                kind = %event.kind,
                detail = %event.detail,
                "feed event skipped"
            ),
            FeedEventOutcome::Error(message) => tracing::warn!(
                kind = %event.kind,
                error = %message,
                detail = %event.detail,
                "feed event failed"
            ),
        }
    }
}
