//! Mapping recognized raw records into canonical entities.
//!
//! Each entity kind has a mapper chain tried in priority order: direct
//! fields, then `legacy`-wrapped fields, then doubly-wrapped
//! `result.legacy`, then loosest-effort scraping of canonical-looking keys.
//! On conflicting sources the more specific/nested value wins — top-level
//! mirrors of `legacy` counts are observed to lag the authoritative nested
//! value. A record with no usable identity after the whole chain yields
//! `None`; callers drop it rather than emit a placeholder entity.

use chrono::{DateTime, Utc};
use serde_json::Value;

use rookery_common::{
    AccountMetrics, CanonicalAccount, CanonicalPost, CursorKind, CursorToken, MediaRef, PostCounts,
};

use crate::extract::{RawMatch, ShapeKind};

/// A canonical entity produced from one raw match.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Account(CanonicalAccount),
    Post(CanonicalPost),
    Cursor(CursorToken),
}

impl ShapeKind {
    /// The mapper paired with this recognizer. Wrapper shapes unwrap and
    /// re-enter the chain; concrete shapes map directly.
    pub fn map(&self, node: &Value) -> Option<Normalized> {
        match self {
            ShapeKind::UserResultWrapper | ShapeKind::GraphUser | ShapeKind::DirectUser => {
                normalize_account(node).map(Normalized::Account)
            }
            ShapeKind::TweetResultWrapper | ShapeKind::GraphPost | ShapeKind::DirectPost => {
                normalize_post(node).map(Normalized::Post)
            }
            ShapeKind::TimelineCursor | ShapeKind::DirectCursor => {
                normalize_cursor(node).map(Normalized::Cursor)
            }
        }
    }
}

/// Normalize one raw match through its shape's paired mapper.
pub fn normalize_match(raw: &RawMatch) -> Option<Normalized> {
    raw.shape.map(&raw.node)
}

// --- Accounts ---

/// Map any known account shape to the canonical account. Idempotent: a
/// canonical-shaped tree fed back in re-normalizes to an equivalent account.
pub fn normalize_account(raw: &Value) -> Option<CanonicalAccount> {
    let node = unwrap_result(raw, &["user_results", "userResults"]);

    // Field sources in precedence order: nested `legacy` first, then the
    // node itself (direct fields and canonical-key aliases).
    let legacy = node.get("legacy").filter(|v| v.is_object());
    let sources: Vec<&Value> = legacy.into_iter().chain(Some(node)).collect();

    let id = pick_id(node, &sources);
    let handle = pick_string(&sources, &["screen_name", "handle"]).unwrap_or_default();
    if id.is_empty() && handle.is_empty() {
        return None;
    }

    let metrics_node = node.get("metrics");
    let metrics = AccountMetrics {
        followers: pick_u64(&sources, &["followers_count", "normal_followers_count"])
            .or_else(|| metrics_node.and_then(|m| m.get("followers")).and_then(as_u64))
            .unwrap_or(0),
        following: pick_u64(&sources, &["friends_count", "following_count"])
            .or_else(|| metrics_node.and_then(|m| m.get("following")).and_then(as_u64))
            .unwrap_or(0),
        posts: pick_u64(&sources, &["statuses_count", "posts_count"])
            .or_else(|| metrics_node.and_then(|m| m.get("posts")).and_then(as_u64))
            .unwrap_or(0),
    };

    Some(CanonicalAccount {
        id,
        handle,
        display_name: pick_string(&sources, &["name", "displayName"]).unwrap_or_default(),
        avatar_url: pick_string(
            &sources,
            &["profile_image_url_https", "profile_image_url", "avatarUrl"],
        )
        .unwrap_or_default(),
        verified: pick_bool(&sources, &["verified", "is_blue_verified"]).unwrap_or(false),
        bio: pick_string(&sources, &["description", "bio"]).unwrap_or_default(),
        metrics,
    })
}

// --- Posts ---

/// Map any known post shape to the canonical post.
pub fn normalize_post(raw: &Value) -> Option<CanonicalPost> {
    let node = unwrap_result(raw, &["tweet_results", "tweetResults"]);

    let legacy = node.get("legacy").filter(|v| v.is_object());
    let sources: Vec<&Value> = legacy.into_iter().chain(Some(node)).collect();

    let id = pick_id(node, &sources);
    if id.is_empty() {
        return None;
    }

    let counts_node = node.get("counts");
    let counts = PostCounts {
        replies: pick_u64(&sources, &["reply_count"])
            .or_else(|| counts_node.and_then(|c| c.get("replies")).and_then(as_u64))
            .unwrap_or(0),
        reposts: pick_u64(&sources, &["retweet_count"])
            .or_else(|| counts_node.and_then(|c| c.get("reposts")).and_then(as_u64))
            .unwrap_or(0),
        quotes: pick_u64(&sources, &["quote_count"])
            .or_else(|| counts_node.and_then(|c| c.get("quotes")).and_then(as_u64))
            .unwrap_or(0),
        likes: pick_u64(&sources, &["favorite_count"])
            .or_else(|| counts_node.and_then(|c| c.get("likes")).and_then(as_u64))
            .unwrap_or(0),
    };

    Some(CanonicalPost {
        id,
        created_at: pick_string(&sources, &["created_at", "createdAt"])
            .as_deref()
            .and_then(parse_timestamp),
        text: pick_string(&sources, &["full_text", "text"]).unwrap_or_default(),
        author_id: pick_string(&sources, &["user_id_str", "authorId"]).unwrap_or_default(),
        media: collect_media(&sources),
        counts,
    })
}

/// Gather media refs from overlapping `entities` / `extended_entities`
/// blocks (and canonical `media` arrays), deduplicated by URL with source
/// order preserved.
fn collect_media(sources: &[&Value]) -> Vec<MediaRef> {
    let mut seen = std::collections::HashSet::new();
    let mut media = Vec::new();

    for source in sources {
        let blocks = [
            source.get("entities").and_then(|e| e.get("media")),
            source.get("extended_entities").and_then(|e| e.get("media")),
            source.get("media"),
        ];
        for items in blocks.into_iter().flatten().filter_map(Value::as_array) {
            for item in items {
                let Some(url) = item
                    .get("media_url_https")
                    .or_else(|| item.get("media_url"))
                    .or_else(|| item.get("url"))
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                if seen.insert(url.to_string()) {
                    media.push(MediaRef {
                        url: url.to_string(),
                        media_type: item
                            .get("type")
                            .or_else(|| item.get("mediaType"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }
        }
    }

    media
}

// --- Cursors ---

/// Map a cursor-shaped node to a token. Cursor types other than Top/Bottom
/// (e.g. "ShowMoreThreads" gap cursors) are not pagination cursors and map
/// to `None`.
pub fn normalize_cursor(raw: &Value) -> Option<CursorToken> {
    let value = raw.get("value").and_then(Value::as_str)?;
    if value.is_empty() {
        return None;
    }

    let declared = raw
        .get("cursorType")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase);

    let kind = match declared.as_deref() {
        Some("bottom") => CursorKind::Bottom,
        Some("top") => CursorKind::Top,
        _ => return None,
    };

    Some(CursorToken {
        value: value.to_string(),
        kind,
    })
}

// --- Field helpers ---

/// Follow wrapper keys (`user_results.result`, bare `result`) down to the
/// concrete record. Bounded: real payloads wrap at most twice.
fn unwrap_result<'a>(raw: &'a Value, wrapper_keys: &[&str]) -> &'a Value {
    let mut node = raw;
    for _ in 0..3 {
        if let Some(inner) = wrapper_keys
            .iter()
            .find_map(|k| node.get(*k))
            .and_then(|w| w.get("result"))
            .filter(|v| v.is_object())
        {
            node = inner;
            continue;
        }
        // GraphQL sometimes wraps once more: `result: { legacy: ... }`.
        if let Some(inner) = node
            .get("result")
            .filter(|v| v.get("legacy").is_some() || v.get("rest_id").is_some())
        {
            node = inner;
            continue;
        }
        break;
    }
    node
}

fn pick_id(node: &Value, sources: &[&Value]) -> String {
    // `rest_id` lives on the result node itself, never inside `legacy`.
    if let Some(id) = node.get("rest_id").and_then(id_to_string) {
        return id;
    }
    sources
        .iter()
        .find_map(|s| {
            ["id_str", "id"]
                .iter()
                .find_map(|k| s.get(*k).and_then(id_to_string))
        })
        .unwrap_or_default()
}

fn pick_string(sources: &[&Value], keys: &[&str]) -> Option<String> {
    sources.iter().find_map(|s| {
        keys.iter()
            .find_map(|k| s.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    })
}

fn pick_bool(sources: &[&Value], keys: &[&str]) -> Option<bool> {
    sources
        .iter()
        .find_map(|s| keys.iter().find_map(|k| s.get(*k).and_then(Value::as_bool)))
}

fn pick_u64(sources: &[&Value], keys: &[&str]) -> Option<u64> {
    sources
        .iter()
        .find_map(|s| keys.iter().find_map(|k| s.get(*k).and_then(as_u64)))
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

fn id_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The platform emits both its legacy timestamp format
/// (`Wed Oct 10 20:19:24 +0000 2018`) and RFC 3339.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_legacy_counts_win_over_top_level_mirrors() {
        // Top-level mirrors lag the authoritative nested value.
        let raw = json!({
            "rest_id": "4620451",
            "followers_count": 90,
            "legacy": {
                "screen_name": "wren",
                "name": "Wren",
                "followers_count": 120,
                "friends_count": 45
            }
        });
        let account = normalize_account(&raw).unwrap();
        assert_eq!(account.metrics.followers, 120);
        assert_eq!(account.metrics.following, 45);
    }

    #[test]
    fn numeric_fields_default_to_zero_never_null() {
        let raw = json!({"screen_name": "bare", "id_str": "77"});
        let account = normalize_account(&raw).unwrap();
        assert_eq!(account.metrics, AccountMetrics::default());
    }

    #[test]
    fn record_without_identity_is_dropped() {
        let raw = json!({"name": "Promoted Placement", "description": "not a real account"});
        assert!(normalize_account(&raw).is_none());
    }

    #[test]
    fn doubly_wrapped_result_is_unwrapped() {
        let raw = json!({
            "user_results": {
                "result": {
                    "rest_id": "991",
                    "legacy": {"screen_name": "deep", "followers_count": 3}
                }
            }
        });
        let account = normalize_account(&raw).unwrap();
        assert_eq!(account.id, "991");
        assert_eq!(account.handle, "deep");
        assert_eq!(account.metrics.followers, 3);
    }

    #[test]
    fn normalize_is_idempotent_on_canonical_shape() {
        let raw = json!({
            "rest_id": "8812",
            "legacy": {
                "screen_name": "finch",
                "name": "Finch",
                "description": "bird",
                "verified": true,
                "followers_count": 10,
                "friends_count": 20,
                "statuses_count": 30,
                "profile_image_url_https": "https://img.example/finch.jpg"
            }
        });
        let first = normalize_account(&raw).unwrap();
        let fed_back = serde_json::to_value(&first).unwrap();
        let second = normalize_account(&fed_back).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn media_deduplicated_by_url_in_source_order() {
        let raw = json!({
            "id_str": "5150",
            "full_text": "two photos",
            "entities": {"media": [
                {"media_url_https": "https://img.example/a.jpg", "type": "photo"}
            ]},
            "extended_entities": {"media": [
                {"media_url_https": "https://img.example/a.jpg", "type": "photo"},
                {"media_url_https": "https://img.example/b.jpg", "type": "photo"}
            ]}
        });
        let post = normalize_post(&raw).unwrap();
        let urls: Vec<&str> = post.media.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img.example/a.jpg", "https://img.example/b.jpg"]);
    }

    #[test]
    fn post_timestamps_parse_both_formats() {
        let legacy_format = json!({
            "id_str": "1", "full_text": "x",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018"
        });
        let rfc3339 = json!({
            "id_str": "2", "full_text": "y",
            "created_at": "2018-10-10T20:19:24Z"
        });
        let a = normalize_post(&legacy_format).unwrap().created_at.unwrap();
        let b = normalize_post(&rfc3339).unwrap().created_at.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn gap_cursors_are_not_pagination_cursors() {
        let raw = json!({"value": "gap-123", "cursorType": "ShowMoreThreads"});
        assert!(normalize_cursor(&raw).is_none());
    }

    #[test]
    fn cursor_without_declared_direction_is_ignored() {
        // Direction comes from cursorType only; surrounding entry metadata
        // is out of scope by the time a cursor node is mapped.
        let raw = json!({"entryId": "cursor-bottom-99", "value": "tok-99"});
        assert!(normalize_cursor(&raw).is_none());
    }
}
