//! Mock feed transport for unit testing.
//!
//! Holds an in-memory server log that honors the page contract, records every
//! call, and can be configured to fail, return malformed pages, or delay each
//! response so overlapping triggers can be exercised.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::FeedError;
use crate::service::FeedTransport;
use crate::types::{FeedItem, FetchKind, NewPost, PageRequest, RawItem, WireId, WireInstant};

/// A recorded call to the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FetchPage(PageRequest),
    Publish(NewPost),
}

/// Mock implementation of `FeedTransport` for testing.
pub struct MockFeedTransport {
    log: Mutex<Vec<FeedItem>>,
    calls: Mutex<Vec<MockCall>>,
    fetch_errors: Mutex<VecDeque<FeedError>>,
    publish_error: Mutex<Option<FeedError>>,
    malformed_next: Mutex<bool>,
    delay: Mutex<Duration>,
}

impl Default for MockFeedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFeedTransport {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fetch_errors: Mutex::new(VecDeque::new()),
            publish_error: Mutex::new(None),
            malformed_next: Mutex::new(false),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Pre-populate the server log.
    pub fn with_items(self, items: impl IntoIterator<Item = FeedItem>) -> Self {
        for item in items {
            self.push_remote(item);
        }
        self
    }

    /// Queue an error for the next page fetch. Errors are consumed in order.
    pub fn with_fetch_error(self, err: FeedError) -> Self {
        lock(&self.fetch_errors).push_back(err);
        self
    }

    /// Configure the next publish to fail.
    pub fn with_publish_error(self, err: FeedError) -> Self {
        *lock(&self.publish_error) = Some(err);
        self
    }

    /// Make the next page fetch return one undecodable item.
    pub fn with_malformed_page(self) -> Self {
        *lock(&self.malformed_next) = true;
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = delay;
        self
    }

    /// Insert an item server-side, as if another viewer had posted it.
    pub fn push_remote(&self, item: FeedItem) {
        let mut log = lock(&self.log);
        log.retain(|existing| existing.id != item.id);
        log.push(item);
        log.sort_by(FeedItem::feed_order);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Page requests only, in call order.
    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::FetchPage(request) => Some(request),
                MockCall::Publish(_) => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }

    async fn pause(&self) {
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn select(&self, request: &PageRequest) -> Vec<FeedItem> {
        let log = lock(&self.log);
        let limit = request.limit;
        match request.kind {
            FetchKind::Freshest => log.iter().take(limit).cloned().collect(),
            FetchKind::Older => log
                .iter()
                .filter(|item| request.before.map_or(true, |before| item.created_at < before))
                .skip(request.offset.unwrap_or(0))
                .take(limit)
                .cloned()
                .collect(),
            FetchKind::Newer => {
                let mut newer: Vec<FeedItem> = log
                    .iter()
                    .rev()
                    .filter(|item| request.after.map_or(true, |after| item.created_at > after))
                    .take(limit)
                    .cloned()
                    .collect();
                newer.reverse();
                newer
            }
        }
    }

    fn next_publish_instant(log: &[FeedItem]) -> DateTime<Utc> {
        match log.first() {
            Some(newest) => newest.created_at + chrono::Duration::seconds(1),
            None => base_instant(),
        }
    }

    fn next_publish_id(log: &[FeedItem]) -> String {
        let max = log
            .iter()
            .filter_map(|item| item.id.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }
}

#[async_trait]
impl FeedTransport for MockFeedTransport {
    async fn fetch_page(&self, request: PageRequest) -> Result<Vec<RawItem>, FeedError> {
        self.record(MockCall::FetchPage(request.clone()));
        self.pause().await;

        if let Some(err) = lock(&self.fetch_errors).pop_front() {
            return Err(err);
        }

        let mut page: Vec<RawItem> = self.select(&request).iter().map(RawItem::from).collect();

        let malformed = std::mem::take(&mut *lock(&self.malformed_next));
        if malformed {
            page.push(RawItem {
                id: WireId::Text(String::new()),
                author_label: None,
                body: "broken".into(),
                created_at: WireInstant::Text("not-a-time".into()),
            });
        }
        Ok(page)
    }

    async fn publish(&self, post: NewPost) -> Result<RawItem, FeedError> {
        self.record(MockCall::Publish(post.clone()));
        self.pause().await;

        if let Some(err) = lock(&self.publish_error).take() {
            return Err(err);
        }

        let item = {
            let log = lock(&self.log);
            FeedItem::new(
                Self::next_publish_id(&log),
                post.author_label.as_deref(),
                post.body,
                Self::next_publish_instant(&log),
            )
        };
        self.push_remote(item.clone());
        Ok(RawItem::from(&item))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn base_instant() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or_default()
}

/// Helper to create a test item `secs` seconds after a fixed base instant.
pub fn test_item(id: &str, secs: i64) -> FeedItem {
    FeedItem::new(
        id,
        None,
        format!("post {id}"),
        base_instant() + chrono::Duration::seconds(secs),
    )
}

/// `count` items with ids `1..=count`, item `n` posted `n` seconds after the
/// base instant, so higher ids are newer.
pub fn test_log(count: usize) -> Vec<FeedItem> {
    (1..=count)
        .map(|n| test_item(&n.to_string(), n as i64))
        .collect()
}
