//! Feed session: the single owner of the loaded window.
//!
//! A `FeedSession` is shared by reference between every trigger source. All
//! entry points take `&self`; the fetch guard is checked synchronously before
//! any I/O and the state mutex is only ever held between await points, so
//! mutations of the loaded set, cursors, and exhaustion flags are strictly
//! sequential.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::autofill::{self, AutofillReport, Viewport};
use crate::config::BoardConfig;
use crate::cursor::{CursorPair, Exhaustion};
use crate::error::FeedError;
use crate::event::{FeedEvent, FeedEventKind, FeedEventOutcome, FeedEventSink, TracingEventSink};
use crate::guard::FetchGuard;
use crate::loaded_set::{LoadedSet, MergeReport};
use crate::service::FeedTransport;
use crate::trigger::{
    GestureConfig, GestureRecognizer, ProximitySentinel, PullAxis, PullSnapshot, ViewportMetrics,
};
use crate::types::{decode_page, Direction, FeedItem, FetchKind, NewPost, PageRequest, RawItem};

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub page_size: usize,
    pub proximity_margin: f64,
    pub autofill_max_iterations: usize,
    pub max_body_chars: usize,
    pub gesture: GestureConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&BoardConfig::default())
    }
}

impl From<&BoardConfig> for SessionOptions {
    fn from(cfg: &BoardConfig) -> Self {
        Self {
            page_size: cfg.feed.page_size,
            proximity_margin: cfg.feed.proximity_margin,
            autofill_max_iterations: cfg.feed.autofill_max_iterations,
            max_body_chars: cfg.feed.max_body_chars,
            gesture: GestureConfig::from(&cfg.gesture),
        }
    }
}

/// Why a guarded operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch holds the guard.
    Busy,
    /// The direction is exhausted for this session.
    Exhausted,
    /// The trigger did not fire (sentinel already inside its zone, gesture
    /// released before ready).
    NoTrigger,
}

/// What one applied page did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    pub kind: FetchKind,
    pub requested: usize,
    pub received: usize,
    pub novel: usize,
    /// This page flipped its direction's exhaustion flag.
    pub exhausted: bool,
    /// A refresh came back full and entirely unseen, so items between it and
    /// the previously loaded window may be missing.
    pub gap_suspected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied(PageReport),
    Skipped(SkipReason),
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn page(&self) -> Option<&PageReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }
}

/// Read-only snapshot for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub items: Vec<FeedItem>,
    pub is_fetching_older: bool,
    pub is_fetching_newer: bool,
    pub more_older: bool,
    pub more_newer: bool,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub pull_older: PullSnapshot,
    pub pull_newer: PullSnapshot,
}

struct FeedState {
    loaded: LoadedSet,
    cursors: CursorPair,
    exhaustion: Exhaustion,
    sentinel: ProximitySentinel,
    pull_older: GestureRecognizer,
    pull_newer: GestureRecognizer,
    viewport: Option<Arc<dyn Viewport>>,
}

impl FeedState {
    fn new(options: &SessionOptions) -> Self {
        Self {
            loaded: LoadedSet::new(),
            cursors: CursorPair::new(),
            exhaustion: Exhaustion::new(),
            sentinel: ProximitySentinel::new(options.proximity_margin),
            pull_older: GestureRecognizer::new(PullAxis::Up, options.gesture),
            pull_newer: GestureRecognizer::new(PullAxis::Down, options.gesture),
            viewport: None,
        }
    }

    fn recognizer(&mut self, direction: Direction) -> &mut GestureRecognizer {
        match direction {
            Direction::Older => &mut self.pull_older,
            Direction::Newer => &mut self.pull_newer,
        }
    }
}

pub struct FeedSession {
    transport: Arc<dyn FeedTransport>,
    event_sink: Arc<dyn FeedEventSink>,
    options: SessionOptions,
    guard: FetchGuard,
    state: Mutex<FeedState>,
    gestures_bound: AtomicBool,
    shutdown: CancellationToken,
}

impl FeedSession {
    pub fn new(transport: Arc<dyn FeedTransport>, options: SessionOptions) -> Self {
        Self {
            transport,
            event_sink: Arc::new(TracingEventSink),
            state: Mutex::new(FeedState::new(&options)),
            options,
            guard: FetchGuard::new(),
            gestures_bound: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn FeedEventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    // -- reads ------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.lock_state().loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().loaded.is_empty()
    }

    pub fn items(&self) -> Vec<FeedItem> {
        self.lock_state().loaded.items().to_vec()
    }

    pub fn cursors(&self) -> CursorPair {
        self.lock_state().cursors
    }

    pub fn exhaustion(&self) -> Exhaustion {
        self.lock_state().exhaustion
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    pub fn view(&self) -> FeedView {
        let in_flight = self.guard.in_flight();
        let state = self.lock_state();
        FeedView {
            items: state.loaded.items().to_vec(),
            is_fetching_older: in_flight == Some(FetchKind::Older),
            is_fetching_newer: matches!(in_flight, Some(FetchKind::Newer | FetchKind::Freshest)),
            more_older: state.exhaustion.more_older(),
            more_newer: state.exhaustion.more_newer(),
            oldest: state.cursors.oldest(),
            newest: state.cursors.newest(),
            pull_older: state.pull_older.snapshot(),
            pull_newer: state.pull_newer.snapshot(),
        }
    }

    /// Level check used by the autofill loop: is the sentinel in its zone?
    pub fn sentinel_within(&self, metrics: &ViewportMetrics) -> bool {
        self.lock_state().sentinel.within(metrics)
    }

    // -- fetch entry points ------------------------------------------------

    /// Initial "freshest N" load.
    pub async fn load_initial(&self) -> Result<FetchOutcome, FeedError> {
        let outcome = self.fetch(FetchKind::Freshest).await?;
        self.settle(outcome.page().map_or(0, |page| page.novel)).await;
        Ok(outcome)
    }

    /// Attach the viewport the session keeps filled. Every later page or live
    /// batch that adds items re-runs the bounded autofill pass against it.
    pub fn attach_viewport(&self, viewport: Arc<dyn Viewport>) {
        self.lock_state().viewport = Some(viewport);
    }

    /// Attach `viewport`, load the freshest page, then run an autofill pass.
    pub async fn start(&self, viewport: Arc<dyn Viewport>) -> Result<AutofillReport, FeedError> {
        self.attach_viewport(viewport.clone());
        self.fetch(FetchKind::Freshest).await?;
        self.autofill(viewport.as_ref()).await
    }

    /// Fetch the page just older than the loaded window.
    pub async fn request_older(&self) -> Result<FetchOutcome, FeedError> {
        let outcome = self.fetch(FetchKind::Older).await?;
        self.settle(outcome.page().map_or(0, |page| page.novel)).await;
        Ok(outcome)
    }

    /// Fetch the page just newer than the loaded window.
    pub async fn request_newer(&self) -> Result<FetchOutcome, FeedError> {
        let outcome = self.fetch(FetchKind::Newer).await?;
        self.settle(outcome.page().map_or(0, |page| page.novel)).await;
        Ok(outcome)
    }

    /// Re-fetch the freshest page and fold it in. Not gated by `more_newer`.
    pub async fn refresh_newest(&self) -> Result<FetchOutcome, FeedError> {
        let outcome = self.fetch(FetchKind::Freshest).await?;
        self.settle(outcome.page().map_or(0, |page| page.novel)).await;
        Ok(outcome)
    }

    /// Keep loading older pages while the viewport is not filled.
    pub async fn autofill(&self, viewport: &dyn Viewport) -> Result<AutofillReport, FeedError> {
        let result = autofill::run(self, viewport).await;
        match &result {
            Ok(report) => self.emit(
                FeedEventKind::Autofill,
                FeedEventOutcome::Success,
                format!("pages={} novel={} stop={}", report.pages, report.novel, report.stop),
            ),
            Err(err) => self.emit(
                FeedEventKind::Autofill,
                FeedEventOutcome::Error(err.to_string()),
                "autofill pass aborted",
            ),
        }
        result
    }

    /// Proximity sentinel input: fires an older fetch on zone entry.
    ///
    /// A firing that fetched nothing (guard busy, transport error) rearms the
    /// sentinel, so the next observation inside the zone fires again.
    pub async fn on_scroll(&self, metrics: &ViewportMetrics) -> Result<FetchOutcome, FeedError> {
        let fired = self.lock_state().sentinel.observe(metrics);
        if !fired {
            return Ok(FetchOutcome::Skipped(SkipReason::NoTrigger));
        }
        let result = self.request_older().await;
        if matches!(result, Ok(FetchOutcome::Skipped(SkipReason::Busy)) | Err(_)) {
            self.lock_state().sentinel.rearm();
        }
        result
    }

    // -- writes outside the fetcher -----------------------------------------

    /// Publish a post and fold the server's copy in at the head.
    pub async fn publish(
        &self,
        author_label: Option<&str>,
        body: &str,
    ) -> Result<FeedItem, FeedError> {
        if self.is_closed() {
            return Err(FeedError::Closed);
        }
        let post = NewPost::new(author_label, body, self.options.max_body_chars)?;
        let result = self
            .transport
            .publish(post)
            .await
            .and_then(FeedItem::try_from);

        match result {
            Ok(item) => {
                let novel = {
                    let mut state = self.lock_state();
                    let report = state.loaded.merge(std::iter::once(item.clone()));
                    state.cursors.observe_published(item.created_at);
                    report.novel
                };
                tracing::debug!(id = %item.id, novel, "published item merged");
                self.emit(
                    FeedEventKind::Publish,
                    FeedEventOutcome::Success,
                    format!("id={} fp={}", item.id, item.fingerprint()),
                );
                Ok(item)
            }
            Err(err) => {
                tracing::warn!(error = %err, "publish failed");
                self.emit(
                    FeedEventKind::Publish,
                    FeedEventOutcome::Error(err.to_string()),
                    "publish failed",
                );
                Err(err)
            }
        }
    }

    /// Merge items pushed out-of-band by the live channel. Widens only the
    /// newest cursor, except on an empty window where the batch seeds both
    /// ends. Leaves exhaustion and the fetch guard alone.
    pub async fn ingest_live(&self, raw: Vec<RawItem>) -> Result<MergeReport, FeedError> {
        let items = match decode_page(raw) {
            Ok(items) => items,
            Err(err) => {
                self.emit(
                    FeedEventKind::LiveIngest,
                    FeedEventOutcome::Error(err.to_string()),
                    "live batch rejected",
                );
                return Err(err);
            }
        };
        let report = {
            let mut state = self.lock_state();
            if state.cursors.oldest().is_none() {
                state.cursors.observe(&items);
            } else {
                for item in &items {
                    state.cursors.observe_published(item.created_at);
                }
            }
            state.loaded.merge(items)
        };
        self.emit(
            FeedEventKind::LiveIngest,
            FeedEventOutcome::Success,
            format!("novel={} replaced={}", report.novel, report.replaced),
        );
        self.settle(report.novel).await;
        Ok(report)
    }

    // -- gestures and teardown ---------------------------------------------

    /// Attach the pull-gesture recognizers for the lifetime of the returned
    /// binding. Returns `None` if already bound or closed.
    pub fn bind_gestures(&self) -> Option<GestureBinding<'_>> {
        if self.is_closed() {
            return None;
        }
        self.gestures_bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GestureBinding { session: self })
    }

    pub fn gestures_bound(&self) -> bool {
        self.gestures_bound.load(Ordering::Acquire)
    }

    /// Shut the session down. An in-flight fetch is abandoned without
    /// merging; later guarded calls return `FeedError::Closed`.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // -- internals -----------------------------------------------------------

    /// Older fetch without the follow-up autofill pass; the autofill loop
    /// drives its own iterations.
    pub(crate) async fn fetch_older_unsettled(&self) -> Result<FetchOutcome, FeedError> {
        self.fetch(FetchKind::Older).await
    }

    /// Re-run the autofill pass after `novel` items landed, if a viewport is
    /// attached and the guard is free. Pass failures are reported through the
    /// event sink only.
    async fn settle(&self, novel: usize) {
        if novel == 0 || self.is_closed() || self.is_busy() {
            return;
        }
        let attached = self.lock_state().viewport.clone();
        let Some(viewport) = attached else {
            return;
        };
        if let Err(err) = self.autofill(viewport.as_ref()).await {
            tracing::debug!(error = %err, "autofill after merge did not finish");
        }
    }

    async fn fetch(&self, kind: FetchKind) -> Result<FetchOutcome, FeedError> {
        if self.is_closed() {
            return Err(FeedError::Closed);
        }
        let event_kind = event_kind_for(kind);

        if kind != FetchKind::Freshest {
            let direction = kind.exhausts();
            let has_more = self.lock_state().exhaustion.has_more(direction);
            if !has_more {
                self.emit(
                    event_kind,
                    FeedEventOutcome::Skipped,
                    format!("{direction} exhausted"),
                );
                return Ok(FetchOutcome::Skipped(SkipReason::Exhausted));
            }
        }

        let Some(permit) = self.guard.try_acquire(kind) else {
            self.emit(event_kind, FeedEventOutcome::Skipped, "fetch already in flight");
            return Ok(FetchOutcome::Skipped(SkipReason::Busy));
        };

        let request = self.next_request(kind);
        let fetched = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(FeedError::Closed),
            page = self.transport.fetch_page(request.clone()) => page,
        };
        let result = fetched
            .and_then(decode_page)
            .map(|items| self.apply_page(&request, items));
        drop(permit);

        match result {
            Ok(report) => {
                self.emit(
                    event_kind,
                    FeedEventOutcome::Success,
                    format!(
                        "requested={} received={} novel={}",
                        report.requested, report.received, report.novel
                    ),
                );
                Ok(FetchOutcome::Applied(report))
            }
            Err(err) => {
                tracing::warn!(kind = %request.kind, error = %err, "page fetch failed");
                self.emit(event_kind, FeedEventOutcome::Error(err.to_string()), "no state change");
                Err(err)
            }
        }
    }

    fn next_request(&self, kind: FetchKind) -> PageRequest {
        let limit = self.options.page_size;
        let state = self.lock_state();
        match kind {
            FetchKind::Freshest => PageRequest::freshest(limit),
            FetchKind::Older => match state.cursors.oldest() {
                Some(before) => PageRequest::older(before, limit),
                None => PageRequest::older_by_offset(state.loaded.len(), limit),
            },
            FetchKind::Newer => match state.cursors.newest() {
                Some(after) => PageRequest::newer(after, limit),
                None => PageRequest::freshest(limit),
            },
        }
    }

    fn apply_page(&self, request: &PageRequest, items: Vec<FeedItem>) -> PageReport {
        let received = items.len();
        let direction = request.kind.exhausts();
        let mut state = self.lock_state();
        let had_items = !state.loaded.is_empty();

        state.cursors.observe(&items);
        let merge = state.loaded.merge(items);
        let exhausted = state
            .exhaustion
            .update(direction, request.limit, received);

        let gap_suspected = request.kind == FetchKind::Freshest
            && had_items
            && received == request.limit
            && merge.novel == received;

        tracing::debug!(
            kind = %request.kind,
            received,
            novel = merge.novel,
            loaded = state.loaded.len(),
            "page merged"
        );
        if exhausted {
            tracing::info!(%direction, "feed exhausted");
        }
        if gap_suspected {
            tracing::warn!("refresh page entirely unseen; older items in between may be missing");
        }

        PageReport {
            kind: request.kind,
            requested: request.limit,
            received,
            novel: merge.novel,
            exhausted,
            gap_suspected,
        }
    }

    fn gesture_armable(&self, direction: Direction) -> bool {
        if self.is_closed() {
            return false;
        }
        match direction {
            Direction::Older => self.lock_state().exhaustion.more_older(),
            // Pulling at the top refreshes the freshest page, which never
            // runs out.
            Direction::Newer => true,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, kind: FeedEventKind, outcome: FeedEventOutcome, detail: impl Into<String>) {
        self.event_sink.record(FeedEvent::new(kind, outcome, detail));
    }
}

fn event_kind_for(kind: FetchKind) -> FeedEventKind {
    match kind {
        FetchKind::Freshest => FeedEventKind::FetchFreshest,
        FetchKind::Older => FeedEventKind::FetchOlder,
        FetchKind::Newer => FeedEventKind::FetchNewer,
    }
}

/// Scoped attachment of the pull-gesture recognizers to a session.
///
/// Pulling down at the top refreshes the freshest page; pulling up at the
/// bottom loads the next older page. Dropping the binding resets both
/// recognizers.
pub struct GestureBinding<'a> {
    session: &'a FeedSession,
}

impl GestureBinding<'_> {
    /// Whether a gesture in `direction` can currently arm.
    pub fn armed(&self, direction: Direction) -> bool {
        self.session.gesture_armable(direction)
    }

    /// Gesture start. Arms only at the matching edge with the guard free.
    pub fn begin(&self, direction: Direction, position: f64, metrics: &ViewportMetrics) -> bool {
        let at_edge = match direction {
            Direction::Newer => metrics.at_top(),
            Direction::Older => metrics.at_bottom(),
        };
        let can_fetch = self.armed(direction) && !self.session.is_busy();
        self.session
            .lock_state()
            .recognizer(direction)
            .begin(position, at_edge, can_fetch)
    }

    pub fn moved(&self, direction: Direction, position: f64) -> PullSnapshot {
        self.session
            .lock_state()
            .recognizer(direction)
            .moved(position)
    }

    pub fn cancel(&self, direction: Direction) {
        self.session.lock_state().recognizer(direction).cancel();
    }

    /// Gesture end. Fetches if the pull was ready on release.
    pub async fn release(&self, direction: Direction) -> Result<FetchOutcome, FeedError> {
        let fire = self.session.lock_state().recognizer(direction).release();
        if !fire {
            return Ok(FetchOutcome::Skipped(SkipReason::NoTrigger));
        }
        let result = match direction {
            Direction::Older => self.session.request_older().await,
            Direction::Newer => self.session.refresh_newest().await,
        };
        self.session.lock_state().recognizer(direction).finish();
        result
    }
}

impl Drop for GestureBinding<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.session.lock_state();
            state.pull_older.cancel();
            state.pull_newer.cancel();
        }
        self.session.gestures_bound.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{test_log, MockFeedTransport};

    fn session(mock: MockFeedTransport) -> (Arc<MockFeedTransport>, FeedSession) {
        let mock = Arc::new(mock);
        let session = FeedSession::new(mock.clone(), SessionOptions::default());
        (mock, session)
    }

    #[tokio::test]
    async fn older_without_cursor_uses_offset_fallback() {
        let (mock, session) = session(MockFeedTransport::new().with_items(test_log(3)));
        session.request_older().await.unwrap();
        let requests = mock.page_requests();
        assert_eq!(requests[0].offset, Some(0));
        assert_eq!(requests[0].before, None);
        assert_eq!(session.len(), 3);
    }

    #[tokio::test]
    async fn newer_without_cursor_falls_back_to_freshest() {
        let (mock, session) = session(MockFeedTransport::new().with_items(test_log(3)));
        session.request_newer().await.unwrap();
        assert_eq!(mock.page_requests()[0].kind, FetchKind::Freshest);
        assert!(!session.exhaustion().more_older());
        assert!(session.exhaustion().more_newer());
    }

    #[tokio::test]
    async fn closed_session_rejects_calls() {
        let (mock, session) = session(MockFeedTransport::new().with_items(test_log(3)));
        session.close();
        assert_eq!(session.request_older().await.unwrap_err(), FeedError::Closed);
        assert_eq!(
            session.publish(None, "hi").await.unwrap_err(),
            FeedError::Closed
        );
        assert!(session.bind_gestures().is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn view_reflects_state() {
        let (_mock, session) = session(MockFeedTransport::new().with_items(test_log(12)));
        session.load_initial().await.unwrap();
        let view = session.view();
        assert_eq!(view.items.len(), 10);
        assert!(view.more_older);
        assert!(!view.is_fetching_older);
        assert_eq!(view.newest, Some(view.items[0].created_at));
        assert_eq!(view.oldest, Some(view.items[9].created_at));
        assert!(!view.pull_newer.ready);
    }
}
