//! Viewport autofill.
//!
//! A short initial page may not overflow the viewport, in which case the
//! proximity sentinel starts inside its zone and its edge trigger never
//! fires. The autofill pass re-checks the sentinel as a level condition and
//! keeps requesting older pages until the viewport overflows, the feed runs
//! out, or the iteration cap is reached.

use crate::error::FeedError;
use crate::session::{FeedSession, FetchOutcome, SkipReason};
use crate::trigger::ViewportMetrics;

/// Layout measurement supplied by the presentation layer.
pub trait Viewport: Send + Sync {
    /// Metrics after rendering `rendered_items` rows.
    fn metrics(&self, rendered_items: usize) -> ViewportMetrics;
}

/// Fixed-height rows, scroll position held constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowViewport {
    pub row_extent: f64,
    pub viewport_extent: f64,
    pub scroll_offset: f64,
}

impl RowViewport {
    pub fn new(row_extent: f64, viewport_extent: f64) -> Self {
        Self {
            row_extent,
            viewport_extent,
            scroll_offset: 0.0,
        }
    }
}

impl Viewport for RowViewport {
    fn metrics(&self, rendered_items: usize) -> ViewportMetrics {
        ViewportMetrics::new(
            self.scroll_offset,
            self.viewport_extent,
            self.row_extent * rendered_items as f64,
        )
    }
}

/// Why an autofill pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillStop {
    /// The sentinel left its zone: the viewport is filled.
    Filled,
    /// No more older pages exist.
    Exhausted,
    /// Another fetch held the guard. When a viewport is attached, that fetch
    /// re-runs the pass once it lands new items; otherwise the next scroll
    /// observation does.
    Busy,
    /// `autofill_max_iterations` pages were requested.
    IterationCap,
    Closed,
}

impl std::fmt::Display for AutofillStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Filled => "filled",
            Self::Exhausted => "exhausted",
            Self::Busy => "busy",
            Self::IterationCap => "iteration_cap",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutofillReport {
    pub pages: usize,
    pub novel: usize,
    pub stop: AutofillStop,
}

pub(crate) async fn run(
    session: &FeedSession,
    viewport: &dyn Viewport,
) -> Result<AutofillReport, FeedError> {
    let mut pages = 0;
    let mut novel = 0;
    let max_iterations = session.options().autofill_max_iterations;

    let stop = loop {
        if session.is_closed() {
            break AutofillStop::Closed;
        }
        if pages >= max_iterations {
            break AutofillStop::IterationCap;
        }
        let metrics = viewport.metrics(session.len());
        if !session.sentinel_within(&metrics) {
            break AutofillStop::Filled;
        }
        match session.fetch_older_unsettled().await? {
            FetchOutcome::Applied(page) => {
                pages += 1;
                novel += page.novel;
                tracing::trace!(pages, received = page.received, "autofill page");
            }
            FetchOutcome::Skipped(SkipReason::Exhausted) => break AutofillStop::Exhausted,
            FetchOutcome::Skipped(_) => break AutofillStop::Busy,
        }
    };

    tracing::debug!(pages, novel, %stop, "autofill pass finished");
    Ok(AutofillReport { pages, novel, stop })
}
