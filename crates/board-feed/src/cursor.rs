//! Window boundary cursors and per-direction exhaustion.
//!
//! Both only ever move one way: cursors widen, exhaustion flags go from
//! `true` to `false` and stay there for the session.

use chrono::{DateTime, Utc};

use crate::types::{Direction, FeedItem};

/// Oldest and newest `created_at` of the loaded window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorPair {
    oldest: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
}

impl CursorPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.oldest
    }

    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.newest
    }

    /// The boundary a fetch in `direction` continues from.
    pub fn edge(&self, direction: Direction) -> Option<DateTime<Utc>> {
        match direction {
            Direction::Older => self.oldest,
            Direction::Newer => self.newest,
        }
    }

    /// Widen both cursors to cover `items`.
    pub fn observe<'a, I>(&mut self, items: I)
    where
        I: IntoIterator<Item = &'a FeedItem>,
    {
        for item in items {
            self.widen_oldest(item.created_at);
            self.widen_newest(item.created_at);
        }
    }

    /// Widen only the newest side; seeds `oldest` when the window is empty.
    pub fn observe_published(&mut self, created_at: DateTime<Utc>) {
        self.widen_newest(created_at);
        if self.oldest.is_none() {
            self.oldest = Some(created_at);
        }
    }

    fn widen_oldest(&mut self, instant: DateTime<Utc>) {
        self.oldest = Some(match self.oldest {
            Some(current) => current.min(instant),
            None => instant,
        });
    }

    fn widen_newest(&mut self, instant: DateTime<Utc>) {
        self.newest = Some(match self.newest {
            Some(current) => current.max(instant),
            None => instant,
        });
    }
}

/// Whether more pages may exist in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhaustion {
    more_older: bool,
    more_newer: bool,
}

impl Default for Exhaustion {
    fn default() -> Self {
        Self {
            more_older: true,
            more_newer: true,
        }
    }
}

impl Exhaustion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn more_older(&self) -> bool {
        self.more_older
    }

    pub fn more_newer(&self) -> bool {
        self.more_newer
    }

    pub fn has_more(&self, direction: Direction) -> bool {
        match direction {
            Direction::Older => self.more_older,
            Direction::Newer => self.more_newer,
        }
    }

    /// Record a page result. Returns `true` when this call exhausted the
    /// direction; a flag that is already `false` is never reset.
    pub fn update(&mut self, direction: Direction, requested: usize, received: usize) -> bool {
        if received >= requested {
            return false;
        }
        let flag = match direction {
            Direction::Older => &mut self.more_older,
            Direction::Newer => &mut self.more_newer,
        };
        let transitioned = *flag;
        *flag = false;
        transitioned
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn item(id: &str, secs: i64) -> FeedItem {
        FeedItem::new(id, None, "x", at(secs))
    }

    #[test]
    fn empty_cursors_are_none() {
        let cursors = CursorPair::new();
        assert_eq!(cursors.oldest(), None);
        assert_eq!(cursors.newest(), None);
    }

    #[test]
    fn observe_only_widens() {
        let mut cursors = CursorPair::new();
        cursors.observe(&[item("a", 50), item("b", 60)]);
        assert_eq!(cursors.oldest(), Some(at(50)));
        assert_eq!(cursors.newest(), Some(at(60)));

        cursors.observe(&[item("c", 55)]);
        assert_eq!(cursors.oldest(), Some(at(50)));
        assert_eq!(cursors.newest(), Some(at(60)));

        cursors.observe(&[item("d", 10), item("e", 90)]);
        assert_eq!(cursors.edge(Direction::Older), Some(at(10)));
        assert_eq!(cursors.edge(Direction::Newer), Some(at(90)));
    }

    #[test]
    fn publish_widens_newest_only() {
        let mut cursors = CursorPair::new();
        cursors.observe(&[item("a", 50), item("b", 60)]);
        cursors.observe_published(at(40));
        assert_eq!(cursors.oldest(), Some(at(50)));
        assert_eq!(cursors.newest(), Some(at(60)));

        cursors.observe_published(at(70));
        assert_eq!(cursors.newest(), Some(at(70)));
    }

    #[test]
    fn publish_seeds_oldest_when_empty() {
        let mut cursors = CursorPair::new();
        cursors.observe_published(at(5));
        assert_eq!(cursors.oldest(), Some(at(5)));
        assert_eq!(cursors.newest(), Some(at(5)));
    }

    #[test]
    fn short_page_exhausts_direction() {
        let mut flags = Exhaustion::new();
        assert!(flags.update(Direction::Older, 10, 7));
        assert!(!flags.more_older());
        assert!(flags.more_newer());
    }

    #[test]
    fn full_page_keeps_direction_open() {
        let mut flags = Exhaustion::new();
        assert!(!flags.update(Direction::Newer, 10, 10));
        assert!(flags.more_newer());
    }

    #[test]
    fn exhaustion_is_never_reset() {
        let mut flags = Exhaustion::new();
        flags.update(Direction::Older, 10, 0);
        assert!(!flags.update(Direction::Older, 10, 10));
        assert!(!flags.update(Direction::Older, 10, 3));
        assert!(!flags.has_more(Direction::Older));
    }
}
