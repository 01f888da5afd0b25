use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Canonical entities ---

/// Follower/following/post counts for an account. Missing counts are 0,
/// never null, so downstream arithmetic stays total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// The single stable account representation every recognized raw shape is
/// mapped into. Invariant: `id` and `handle` are never both empty — a record
/// that would violate this is dropped during normalization, not emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAccount {
    pub id: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub metrics: AccountMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounts {
    pub replies: u64,
    pub reposts: u64,
    pub quotes: u64,
    pub likes: u64,
}

/// A media attachment on a post. Deduplicated by URL when the same
/// attachment appears in overlapping entity blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    #[serde(default)]
    pub media_type: String,
}

/// The single stable post representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPost {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    #[serde(default)]
    pub counts: PostCounts,
}

// --- Pagination ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorKind {
    Top,
    Bottom,
}

/// Opaque continuation token from the source API. Only `Bottom` cursors
/// drive forward pagination; a `Bottom` cursor equal to the previous one,
/// or absent, signals end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorToken {
    pub value: String,
    pub kind: CursorKind,
}

/// An account or post recovered from one page. Pages on this platform can
/// interleave both (e.g. pinned-post modules inside a follow list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Entity {
    Account(CanonicalAccount),
    Post(CanonicalPost),
}

impl Entity {
    /// Key used for cumulative deduplication. Namespaced by entity kind so
    /// an account and a post that happen to share a numeric id never
    /// collide; falls back to the handle for account records the platform
    /// served without an id.
    pub fn dedup_key(&self) -> String {
        match self {
            Entity::Account(a) => {
                let id = if a.id.is_empty() { &a.handle } else { &a.id };
                format!("account:{id}")
            }
            Entity::Post(p) => format!("post:{}", p.id),
        }
    }
}

/// Everything recovered from one successful page fetch. Immutable once
/// produced; consumed by the pagination driver and then by persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub entities: Vec<Entity>,
    pub next_cursor: Option<CursorToken>,
    /// Raw entry count before normalization/dedup, for diagnostics.
    pub raw_page_size: usize,
    /// True when the page parsed as JSON but no recognizer matched anything.
    /// The caller decides whether that means "empty list" or "the extractor
    /// needs a new recognizer".
    pub nothing_recognized: bool,
}

// --- Run outcome ---

/// Why a pagination run stopped. Consumers must treat this as a first-class
/// signal: a non-`ExhaustedPages` termination with zero results is a failure
/// condition, distinct from "this account follows nobody".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    ExhaustedPages,
    NoCursor,
    EmptyPageLimit,
    FatalError,
    AntiAutomationDetected,
}

/// Final aggregate from one pagination run. Partial results accompany
/// failures: an aborted run still carries everything collected before the
/// failing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorOutcome {
    pub accounts: Vec<CanonicalAccount>,
    pub posts: Vec<CanonicalPost>,
    pub cursor: Option<CursorToken>,
    pub termination: TerminationReason,
    pub pages_fetched: u32,
    pub total_entities: usize,
    /// Human-readable detail when `termination` is `FatalError` or
    /// `AntiAutomationDetected`.
    pub error: Option<String>,
}

impl MirrorOutcome {
    /// A run that stopped for a non-exhaustion reason and collected nothing
    /// is a failure the caller must surface, not an empty list.
    pub fn is_empty_failure(&self) -> bool {
        self.total_entities == 0
            && !matches!(
                self.termination,
                TerminationReason::ExhaustedPages | TerminationReason::NoCursor
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keys_are_namespaced_per_entity_kind() {
        let account = Entity::Account(CanonicalAccount {
            id: "42".to_string(),
            handle: "wren".to_string(),
            ..CanonicalAccount::default()
        });
        let post = Entity::Post(CanonicalPost {
            id: "42".to_string(),
            ..CanonicalPost::default()
        });
        assert_ne!(account.dedup_key(), post.dedup_key());
    }

    #[test]
    fn account_dedup_key_falls_back_to_handle() {
        let account = Entity::Account(CanonicalAccount {
            handle: "wren".to_string(),
            ..CanonicalAccount::default()
        });
        assert_eq!(account.dedup_key(), "account:wren");
    }
}
