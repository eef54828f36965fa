#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Autofill tests: short first pages must not strand the feed.

use std::sync::Arc;
use std::time::Duration;

use board_feed::autofill::{AutofillStop, RowViewport, Viewport};
use board_feed::event::{FeedEventKind, InMemoryEventSink};
use board_feed::mock::{test_log, MockFeedTransport};
use board_feed::mock::test_item;
use board_feed::session::{FeedSession, FetchOutcome, SessionOptions, SkipReason};

fn session_with(count: usize, options: SessionOptions) -> (Arc<MockFeedTransport>, FeedSession) {
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(count)));
    let session = FeedSession::new(mock.clone(), options);
    (mock, session)
}

#[tokio::test]
async fn fills_until_sentinel_leaves_zone() {
    let (mock, session) = session_with(50, SessionOptions::default());
    // 40-unit rows in a 400-unit viewport: 10 rows leave the sentinel
    // visible, 20 rows push it 400 units away (margin is 300).
    let viewport = RowViewport::new(40.0, 400.0);

    let report = session.start(Arc::new(viewport)).await.unwrap();
    assert_eq!(report.stop, AutofillStop::Filled);
    assert_eq!(report.pages, 1);
    assert_eq!(report.novel, 10);
    assert_eq!(session.len(), 20);
    assert_eq!(mock.page_requests().len(), 2);
}

#[tokio::test]
async fn stops_when_older_is_exhausted() {
    let (mock, session) = session_with(13, SessionOptions::default());
    let viewport = RowViewport::new(40.0, 400.0);

    let report = session.start(Arc::new(viewport)).await.unwrap();
    assert_eq!(report.stop, AutofillStop::Exhausted);
    assert_eq!(report.pages, 1);
    assert_eq!(session.len(), 13);
    assert!(!session.exhaustion().more_older());
    assert_eq!(mock.page_requests().len(), 2);
}

#[tokio::test]
async fn respects_iteration_cap() {
    let options = SessionOptions {
        autofill_max_iterations: 2,
        ..SessionOptions::default()
    };
    let (mock, session) = session_with(100, options);
    // Rows so thin the viewport never fills.
    let viewport = RowViewport::new(1.0, 400.0);

    let report = session.start(Arc::new(viewport)).await.unwrap();
    assert_eq!(report.stop, AutofillStop::IterationCap);
    assert_eq!(report.pages, 2);
    assert_eq!(session.len(), 30);
    assert_eq!(mock.page_requests().len(), 3);
}

#[tokio::test]
async fn already_filled_viewport_fetches_nothing() {
    let (mock, session) = session_with(50, SessionOptions::default());
    session.load_initial().await.unwrap();

    let report = session.autofill(&RowViewport::new(100.0, 400.0)).await.unwrap();
    assert_eq!(report.stop, AutofillStop::Filled);
    assert_eq!(report.pages, 0);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn closed_session_stops_immediately() {
    let (mock, session) = session_with(50, SessionOptions::default());
    session.close();

    let report = session.autofill(&RowViewport::new(1.0, 400.0)).await.unwrap();
    assert_eq!(report.stop, AutofillStop::Closed);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn pass_is_recorded_as_event() {
    let sink = Arc::new(InMemoryEventSink::new());
    let mock = Arc::new(MockFeedTransport::new().with_items(test_log(50)));
    let session =
        FeedSession::new(mock, SessionOptions::default()).with_event_sink(sink.clone());

    session.start(Arc::new(RowViewport::new(40.0, 400.0))).await.unwrap();
    let events = sink.of_kind(FeedEventKind::Autofill);
    assert_eq!(events.len(), 1);
    assert!(events[0].detail.contains("stop=filled"));
}

#[tokio::test]
async fn attached_viewport_fills_after_initial_load() {
    let (mock, session) = session_with(50, SessionOptions::default());
    session.attach_viewport(Arc::new(RowViewport::new(40.0, 400.0)));

    let outcome = session.load_initial().await.unwrap();
    assert_eq!(outcome.page().unwrap().received, 10);
    assert_eq!(session.len(), 20);
    assert_eq!(mock.page_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn busy_scroll_is_refilled_when_the_blocking_fetch_lands() {
    let sink = Arc::new(InMemoryEventSink::new());
    let mock = Arc::new(
        MockFeedTransport::new()
            .with_items(test_log(40))
            .with_delay(Duration::from_millis(50)),
    );
    let session =
        FeedSession::new(mock.clone(), SessionOptions::default()).with_event_sink(sink.clone());
    session.load_initial().await.unwrap();

    let viewport = RowViewport::new(40.0, 400.0);
    session.attach_viewport(Arc::new(viewport));
    mock.push_remote(test_item("41", 41));

    // The scroll lands while the refresh holds the guard.
    let near = viewport.metrics(session.len());
    let (refresh, scrolled) = tokio::join!(session.refresh_newest(), session.on_scroll(&near));
    assert_eq!(refresh.unwrap().page().unwrap().novel, 1);
    assert_eq!(scrolled.unwrap(), FetchOutcome::Skipped(SkipReason::Busy));

    // The refresh re-ran the pass and loaded the older page the scroll lost.
    assert_eq!(session.len(), 21);
    assert!(!session.sentinel_within(&viewport.metrics(session.len())));
    assert_eq!(mock.page_requests().len(), 3);
    let passes = sink.of_kind(FeedEventKind::Autofill);
    assert_eq!(passes.len(), 1);
    assert!(passes[0].detail.contains("stop=filled"));
}

#[tokio::test]
async fn pages_without_new_items_do_not_rerun_the_pass() {
    let (mock, session) = session_with(50, SessionOptions::default());
    session.load_initial().await.unwrap();
    // Thin rows: the sentinel stays in its zone.
    session.attach_viewport(Arc::new(RowViewport::new(1.0, 400.0)));

    let outcome = session.refresh_newest().await.unwrap();
    assert_eq!(outcome.page().unwrap().novel, 0);
    assert_eq!(mock.page_requests().len(), 2);
}
