//! Fetch trigger sources: the proximity sentinel and the pull gesture.
//!
//! Both are pure state machines fed with geometry by the presentation layer.
//! They only decide *whether* to fetch; the session routes the decision
//! through the fetch guard.

/// Scroll geometry along the feed axis, in presentation units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_offset: f64,
    pub viewport_extent: f64,
    pub content_extent: f64,
}

impl ViewportMetrics {
    const EDGE_SLOP: f64 = 1.0;

    pub fn new(scroll_offset: f64, viewport_extent: f64, content_extent: f64) -> Self {
        Self {
            scroll_offset,
            viewport_extent,
            content_extent,
        }
    }

    /// Distance from the bottom of the viewport to the sentinel anchored
    /// after the last item. Negative when the sentinel is already visible.
    pub fn sentinel_distance(&self) -> f64 {
        self.content_extent - (self.scroll_offset + self.viewport_extent)
    }

    pub fn at_top(&self) -> bool {
        self.scroll_offset <= Self::EDGE_SLOP
    }

    pub fn at_bottom(&self) -> bool {
        self.sentinel_distance() <= Self::EDGE_SLOP
    }
}

// ---------------------------------------------------------------------------
// Proximity sentinel
// ---------------------------------------------------------------------------

/// Edge-triggered "near the loading edge" detector.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximitySentinel {
    margin: f64,
    inside: bool,
}

impl ProximitySentinel {
    pub fn new(margin: f64) -> Self {
        Self {
            margin,
            inside: false,
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Level check: is the sentinel inside the trigger zone right now?
    pub fn within(&self, metrics: &ViewportMetrics) -> bool {
        metrics.sentinel_distance() <= self.margin
    }

    /// Feed a new viewport position. Fires only on the outside-to-inside
    /// transition, never while the sentinel sits inside the zone.
    pub fn observe(&mut self, metrics: &ViewportMetrics) -> bool {
        let inside = self.within(metrics);
        let fired = inside && !self.inside;
        self.inside = inside;
        fired
    }

    /// Forget the last position so the next in-zone observation fires again.
    pub fn rearm(&mut self) {
        self.inside = false;
    }
}

// ---------------------------------------------------------------------------
// Pull gesture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Raw drag distance is multiplied by this factor (< 1).
    pub damping: f64,
    /// Cap on the damped pull distance.
    pub max_pull: f64,
    /// Damped distance at which the gesture becomes ready.
    pub threshold: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            damping: 0.5,
            max_pull: 120.0,
            threshold: 80.0,
        }
    }
}

impl GestureConfig {
    /// Damped, capped visual pull for a raw drag distance.
    pub fn pull_distance(&self, raw: f64) -> f64 {
        if raw <= 0.0 {
            return 0.0;
        }
        (raw * self.damping).min(self.max_pull)
    }
}

/// Per-direction pull state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullState {
    Idle,
    /// Gesture started at the edge; no pull distance yet.
    Arming,
    Dragging,
    Ready,
    Fetching,
}

impl PullState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Arming => "arming",
            Self::Dragging => "dragging",
            Self::Ready => "ready",
            Self::Fetching => "fetching",
        }
    }

    fn tracking(self) -> bool {
        matches!(self, Self::Arming | Self::Dragging | Self::Ready)
    }
}

impl std::fmt::Display for PullState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the presentation layer needs to draw a pull indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullSnapshot {
    pub state: PullState,
    pub distance: f64,
    pub ready: bool,
}

/// Which way a drag has to travel to pull the given direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullAxis {
    /// Pull down at the top of the feed (fetch newer).
    Down,
    /// Pull up at the bottom of the feed (fetch older).
    Up,
}

/// Damped pull-to-fetch recognizer for one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureRecognizer {
    axis: PullAxis,
    config: GestureConfig,
    state: PullState,
    start: f64,
    last: f64,
    distance: f64,
}

impl GestureRecognizer {
    pub fn new(axis: PullAxis, config: GestureConfig) -> Self {
        Self {
            axis,
            config,
            state: PullState::Idle,
            start: 0.0,
            last: 0.0,
            distance: 0.0,
        }
    }

    pub fn state(&self) -> PullState {
        self.state
    }

    pub fn snapshot(&self) -> PullSnapshot {
        PullSnapshot {
            state: self.state,
            distance: self.distance,
            ready: self.state == PullState::Ready,
        }
    }

    /// Start tracking a gesture. Only arms when the feed is scrolled to this
    /// recognizer's edge and a fetch in its direction is still possible.
    pub fn begin(&mut self, position: f64, at_edge: bool, can_fetch: bool) -> bool {
        if self.state == PullState::Fetching || !at_edge || !can_fetch {
            return false;
        }
        self.state = PullState::Arming;
        self.start = position;
        self.last = position;
        self.distance = 0.0;
        true
    }

    pub fn moved(&mut self, position: f64) -> PullSnapshot {
        if !self.state.tracking() {
            return self.snapshot();
        }
        let raw = self.toward_pull(position - self.start);
        let step = self.toward_pull(position - self.last);
        self.last = position;

        self.distance = self.config.pull_distance(raw);
        self.state = if raw <= 0.0 {
            PullState::Arming
        } else if step < 0.0 {
            PullState::Dragging
        } else if self.distance >= self.config.threshold {
            PullState::Ready
        } else {
            PullState::Dragging
        };
        self.snapshot()
    }

    /// End the gesture. Returns `true` if it was released while ready, in
    /// which case the recognizer stays in `Fetching` until [`finish`].
    ///
    /// [`finish`]: Self::finish
    pub fn release(&mut self) -> bool {
        let fire = self.state == PullState::Ready;
        self.state = if fire {
            PullState::Fetching
        } else {
            PullState::Idle
        };
        self.distance = 0.0;
        fire
    }

    pub fn finish(&mut self) {
        if self.state == PullState::Fetching {
            self.state = PullState::Idle;
        }
    }

    pub fn cancel(&mut self) {
        self.state = PullState::Idle;
        self.distance = 0.0;
    }

    fn toward_pull(&self, delta: f64) -> f64 {
        match self.axis {
            PullAxis::Down => delta,
            PullAxis::Up => -delta,
        }
    }
}
