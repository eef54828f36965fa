//! Transport-agnostic feed types.
//!
//! `RawItem` is what arrives on the wire; `FeedItem` is the validated form the
//! engine stores. Conversion between the two is the only place wire quirks
//! (numeric ids, epoch-millisecond timestamps, missing author labels) are
//! handled.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FeedError;

/// Author label used when a post carries none.
pub const ANONYMOUS_LABEL: &str = "anonymous";

/// Default upper bound on post body length, in characters.
pub const DEFAULT_MAX_BODY_CHARS: usize = 500;

/// Upper bound on author label length, in characters.
pub const MAX_AUTHOR_CHARS: usize = 40;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque, stable item identifier.
///
/// Ids that are both plain decimal integers compare numerically ("10" > "9");
/// anything else compares lexically, and numeric ids sort below non-numeric
/// ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric_digits(&self) -> Option<&str> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = self.0.trim_start_matches('0');
        Some(if trimmed.is_empty() { "0" } else { trimmed })
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric_digits(), other.numeric_digits()) {
            (Some(lhs), Some(rhs)) => lhs
                .len()
                .cmp(&rhs.len())
                .then_with(|| lhs.cmp(rhs))
                .then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Ids arrive as JSON strings from some servers and integers from others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(u64),
}

impl WireId {
    fn into_item_id(self) -> Result<ItemId, FeedError> {
        match self {
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(FeedError::malformed("item id is empty"));
                }
                Ok(ItemId::new(trimmed))
            }
            Self::Number(n) => Ok(ItemId::new(n.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamp codec
// ---------------------------------------------------------------------------

/// Creation instant as it appears on the wire: RFC 3339 text or epoch millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireInstant {
    Text(String),
    Millis(i64),
}

impl WireInstant {
    pub fn decode(&self) -> Result<DateTime<Utc>, FeedError> {
        match self {
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| FeedError::malformed(format!("bad created_at {text:?}: {e}"))),
            Self::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| FeedError::malformed(format!("created_at out of range: {ms}"))),
        }
    }
}

impl From<DateTime<Utc>> for WireInstant {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Text(encode_instant(value))
    }
}

/// Canonical wire form of an instant, used for `before`/`after` cursors.
/// Keeps every fractional digit the instant carries so a cursor round-trips
/// exactly against servers storing micro- or nanosecond timestamps.
pub fn encode_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One item exactly as the server returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: WireId,
    #[serde(default, alias = "authorLabel", alias = "nickname")]
    pub author_label: Option<String>,
    pub body: String,
    #[serde(alias = "createdAt")]
    pub created_at: WireInstant,
}

/// A validated board post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub id: ItemId,
    pub author_label: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl FeedItem {
    pub fn new(
        id: impl Into<String>,
        author_label: Option<&str>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ItemId::new(id),
            author_label: normalize_author(author_label),
            body: body.into(),
            created_at,
        }
    }

    /// Display accent index in `0..palette_len`, stable for a given id.
    pub fn accent(&self, palette_len: usize) -> usize {
        if palette_len == 0 {
            return 0;
        }
        let digest = Sha256::digest(self.id.as_str().as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(word) % palette_len as u64) as usize
    }

    /// Short hex fingerprint of the id, handy for log lines.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.id.as_str().as_bytes());
        hex::encode(&digest[..4])
    }

    /// Feed order: `created_at` descending, then id descending.
    pub fn feed_order(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl TryFrom<RawItem> for FeedItem {
    type Error = FeedError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let id = raw.id.into_item_id()?;
        let created_at = raw.created_at.decode()?;
        Ok(Self {
            id,
            author_label: normalize_author(raw.author_label.as_deref()),
            body: raw.body,
            created_at,
        })
    }
}

impl From<&FeedItem> for RawItem {
    fn from(item: &FeedItem) -> Self {
        Self {
            id: WireId::Text(item.id.as_str().to_string()),
            author_label: Some(item.author_label.clone()),
            body: item.body.clone(),
            created_at: WireInstant::from(item.created_at),
        }
    }
}

/// Convert a whole page, rejecting it entirely if any item is malformed.
pub fn decode_page(raw: Vec<RawItem>) -> Result<Vec<FeedItem>, FeedError> {
    raw.into_iter().map(FeedItem::try_from).collect()
}

fn normalize_author(label: Option<&str>) -> String {
    match label.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => ANONYMOUS_LABEL.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Direction of the lazily grown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Older,
    Newer,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Older => "older",
            Self::Newer => "newer",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// The `limit` most recent items, cursor ignored.
    Freshest,
    Older,
    Newer,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Freshest => "freshest",
            Self::Older => "older",
            Self::Newer => "newer",
        }
    }

    /// The exhaustion flag a page of this kind informs.
    ///
    /// A short freshest page means the log holds fewer than `limit` items,
    /// so nothing older exists either.
    pub fn exhausts(self) -> Direction {
        match self {
            Self::Freshest | Self::Older => Direction::Older,
            Self::Newer => Direction::Newer,
        }
    }
}

impl From<Direction> for FetchKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Older => Self::Older,
            Direction::Newer => Self::Newer,
        }
    }
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bounded list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub kind: FetchKind,
    pub limit: usize,
    /// Exclusive upper bound on `created_at`.
    pub before: Option<DateTime<Utc>>,
    /// Exclusive lower bound on `created_at`.
    pub after: Option<DateTime<Utc>>,
    /// Offset fallback, used only when no cursor exists yet.
    pub offset: Option<usize>,
}

impl PageRequest {
    pub fn freshest(limit: usize) -> Self {
        Self {
            kind: FetchKind::Freshest,
            limit,
            before: None,
            after: None,
            offset: None,
        }
    }

    pub fn older(before: DateTime<Utc>, limit: usize) -> Self {
        Self {
            kind: FetchKind::Older,
            limit,
            before: Some(before),
            after: None,
            offset: None,
        }
    }

    pub fn newer(after: DateTime<Utc>, limit: usize) -> Self {
        Self {
            kind: FetchKind::Newer,
            limit,
            before: None,
            after: Some(after),
            offset: None,
        }
    }

    /// Degraded older-page request by offset from the newest item.
    ///
    /// Offsets shift under concurrent writes; the reconciler absorbs the
    /// resulting overlap, but gaps are possible.
    pub fn older_by_offset(offset: usize, limit: usize) -> Self {
        Self {
            kind: FetchKind::Older,
            limit,
            before: None,
            after: None,
            offset: Some(offset),
        }
    }

    /// Query pairs in wire form.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if let Some(before) = self.before {
            pairs.push(("before", encode_instant(before)));
        }
        if let Some(after) = self.after {
            pairs.push(("after", encode_instant(after)));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

/// Body of a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub author_label: Option<String>,
    pub body: String,
}

impl NewPost {
    /// Validate and normalize a post before it is sent.
    pub fn new(
        author_label: Option<&str>,
        body: &str,
        max_body_chars: usize,
    ) -> Result<Self, FeedError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(FeedError::invalid("body is required"));
        }
        let body_chars = body.chars().count();
        if body_chars > max_body_chars {
            return Err(FeedError::invalid(format!(
                "body is {body_chars} chars, limit is {max_body_chars}"
            )));
        }
        let author_label = match author_label.map(str::trim) {
            Some(label) if !label.is_empty() => {
                if label.chars().count() > MAX_AUTHOR_CHARS {
                    return Err(FeedError::invalid(format!(
                        "author label exceeds {MAX_AUTHOR_CHARS} chars"
                    )));
                }
                Some(label.to_string())
            }
            _ => None,
        };
        Ok(Self {
            author_label,
            body: body.to_string(),
        })
    }
}
