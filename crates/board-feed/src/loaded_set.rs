//! The loaded window and its merge/dedup reconciler.
//!
//! Every write path (older page, newer page, freshest refresh, publish, live
//! ingest) goes through [`LoadedSet::merge`], so the no-duplicate-id invariant
//! holds no matter how triggers interleave.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{FeedItem, ItemId};

/// Result of folding a batch into the loaded set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Incoming items whose id was not loaded before.
    pub novel: usize,
    /// Incoming items that replaced an already-loaded item with the same id.
    pub replaced: usize,
}

/// Items keyed by id plus the materialized newest-first sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedSet {
    by_id: HashMap<ItemId, FeedItem>,
    ordered: Vec<FeedItem>,
}

impl LoadedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &ItemId) -> Option<&FeedItem> {
        self.by_id.get(id)
    }

    /// Newest first; ties on `created_at` broken by id descending.
    pub fn items(&self) -> &[FeedItem] {
        &self.ordered
    }

    pub fn oldest_created_at(&self) -> Option<DateTime<Utc>> {
        self.ordered.last().map(|item| item.created_at)
    }

    pub fn newest_created_at(&self) -> Option<DateTime<Utc>> {
        self.ordered.first().map(|item| item.created_at)
    }

    /// Fold `incoming` into the set. Last write wins on duplicate ids.
    pub fn merge<I>(&mut self, incoming: I) -> MergeReport
    where
        I: IntoIterator<Item = FeedItem>,
    {
        let mut report = MergeReport::default();
        for item in incoming {
            match self.by_id.insert(item.id.clone(), item) {
                Some(_) => report.replaced += 1,
                None => report.novel += 1,
            }
        }
        self.rematerialize();
        report
    }

    /// Non-mutating form of [`merge`](Self::merge).
    pub fn merged<I>(&self, incoming: I) -> (Self, usize)
    where
        I: IntoIterator<Item = FeedItem>,
    {
        let mut next = self.clone();
        let report = next.merge(incoming);
        (next, report.novel)
    }

    fn rematerialize(&mut self) {
        let mut ordered: Vec<FeedItem> = self.by_id.values().cloned().collect();
        ordered.sort_by(FeedItem::feed_order);
        self.ordered = ordered;
    }
}
