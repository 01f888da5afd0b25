//! Recursive extraction over schema-inconsistent response trees.
//!
//! The platform serves the same timeline in several shapes: GraphQL results
//! with `rest_id` + `legacy`, wrapper objects (`user_results.result`), and
//! flat REST-era records (`screen_name` + `id_str` at the top level). Rather
//! than threading shape checks through every call site, each known shape is
//! one `ShapeKind` variant pairing a recognizer predicate with a mapper (see
//! `normalize`). Supporting a new response variant means adding one variant
//! and one entry in the priority list.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

/// What the caller is looking for in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Account,
    Post,
    Cursor,
}

/// One known historical shape of the source API's entity representation.
/// Listed most-specific first; the first match wins and stops descent into
/// that subtree for the kind being extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `{"user_results": {"result": {...}}}` (also camelCase `userResults`).
    UserResultWrapper,
    /// GraphQL user: `rest_id` sibling of a `legacy` object with `screen_name`.
    GraphUser,
    /// Flat REST-era user: `screen_name` and `id_str` directly on the node.
    DirectUser,
    /// `{"tweet_results": {"result": {...}}}`.
    TweetResultWrapper,
    /// GraphQL post: `rest_id` sibling of a `legacy` object with `full_text`.
    GraphPost,
    /// Flat REST-era post: `id_str` and `full_text` directly on the node.
    DirectPost,
    /// A `TimelineTimelineCursor` timeline entry.
    TimelineCursor,
    /// A bare `{value, cursorType}` object.
    DirectCursor,
}

impl ShapeKind {
    /// Recognizer priority list per entity kind. Order is the precedence
    /// rule: wrapper shapes before graph shapes before flat shapes.
    pub fn for_kind(kind: EntityKind) -> &'static [ShapeKind] {
        match kind {
            EntityKind::Account => &[
                ShapeKind::UserResultWrapper,
                ShapeKind::GraphUser,
                ShapeKind::DirectUser,
            ],
            EntityKind::Post => &[
                ShapeKind::TweetResultWrapper,
                ShapeKind::GraphPost,
                ShapeKind::DirectPost,
            ],
            EntityKind::Cursor => &[ShapeKind::TimelineCursor, ShapeKind::DirectCursor],
        }
    }

    /// Does `node` look like this shape? Recognizers require a real identity
    /// field so decoy/promoted nodes that mimic entity shape without one
    /// fall through.
    pub fn matches(&self, node: &Value) -> bool {
        let Some(obj) = node.as_object() else {
            return false;
        };
        match self {
            ShapeKind::UserResultWrapper => ["user_results", "userResults"]
                .iter()
                .any(|k| obj.get(*k).and_then(|w| w.get("result")).is_some_and(Value::is_object)),
            ShapeKind::GraphUser => {
                obj.get("rest_id").is_some_and(is_id_like)
                    && obj
                        .get("legacy")
                        .is_some_and(|l| l.get("screen_name").is_some())
            }
            ShapeKind::DirectUser => {
                obj.get("screen_name").is_some_and(Value::is_string)
                    && obj.get("id_str").is_some_and(is_id_like)
            }
            ShapeKind::TweetResultWrapper => obj
                .get("tweet_results")
                .and_then(|w| w.get("result"))
                .is_some_and(Value::is_object),
            ShapeKind::GraphPost => {
                obj.get("rest_id").is_some_and(is_id_like)
                    && obj
                        .get("legacy")
                        .is_some_and(|l| l.get("full_text").is_some())
            }
            ShapeKind::DirectPost => {
                obj.get("id_str").is_some_and(is_id_like)
                    && obj.get("full_text").is_some_and(Value::is_string)
                    && obj.get("screen_name").is_none()
            }
            ShapeKind::TimelineCursor => {
                let declares_cursor = ["entryType", "itemType", "__typename"]
                    .iter()
                    .any(|k| obj.get(*k).and_then(Value::as_str) == Some("TimelineTimelineCursor"));
                declares_cursor && obj.get("value").is_some_and(Value::is_string)
            }
            ShapeKind::DirectCursor => {
                obj.get("value").is_some_and(Value::is_string)
                    && obj.get("cursorType").is_some_and(Value::is_string)
            }
        }
    }
}

fn is_id_like(v: &Value) -> bool {
    v.is_string() || v.is_number()
}

/// A raw subtree recognized as one entity, with the shape that matched and
/// the path it was found at (diagnostics only).
#[derive(Debug, Clone)]
pub struct RawMatch {
    pub shape: ShapeKind,
    pub node: Value,
    pub path: String,
}

/// Guard against pathological or intentionally malformed payloads. Observed
/// real payloads sit at depth 6–12; anything deeper gets its subtree
/// abandoned without failing the extraction.
const MAX_DEPTH: usize = 12;

/// Transient state for one recursive walk. Owned by a single `extract`
/// call and discarded when it returns.
struct ExtractionContext {
    kind: EntityKind,
    include_promoted: bool,
    path: Vec<String>,
    visited: HashSet<usize>,
    matches: Vec<RawMatch>,
}

impl ExtractionContext {
    fn new(kind: EntityKind, include_promoted: bool) -> Self {
        Self {
            kind,
            include_promoted,
            path: Vec::new(),
            visited: HashSet::new(),
            matches: Vec::new(),
        }
    }

    fn path_string(&self) -> String {
        self.path.join(".")
    }
}

/// Locate every subtree matching a known shape for `kind`. An empty result
/// is a valid outcome (a private or empty list), never an error.
pub fn extract(node: &Value, kind: EntityKind) -> Vec<RawMatch> {
    extract_with(node, kind, false)
}

/// `extract` with promoted/decoy timeline entries included. Off by default:
/// promoted entries mimic organic records but are not part of the graph
/// being mirrored.
pub fn extract_with(node: &Value, kind: EntityKind, include_promoted: bool) -> Vec<RawMatch> {
    let mut ctx = ExtractionContext::new(kind, include_promoted);
    walk(node, &mut ctx, 0);
    ctx.matches
}

fn walk(node: &Value, ctx: &mut ExtractionContext, depth: usize) {
    if depth > MAX_DEPTH {
        debug!(
            path = ctx.path_string(),
            kind = ?ctx.kind,
            "Depth ceiling reached, abandoning subtree"
        );
        return;
    }
    if !ctx.visited.insert(node as *const Value as usize) {
        return;
    }

    match node {
        Value::Object(map) => {
            // First match wins and stops descent: a matched account node is
            // not re-scanned for accounts nested inside it.
            for shape in ShapeKind::for_kind(ctx.kind) {
                if shape.matches(node) {
                    ctx.matches.push(RawMatch {
                        shape: *shape,
                        node: node.clone(),
                        path: ctx.path_string(),
                    });
                    return;
                }
            }

            // Instruction containers are unpacked structurally instead of
            // blindly recursed: large instruction arrays carry promoted and
            // decoy entries that mimic entity shape.
            if let Some(Value::Array(instructions)) = map.get("instructions") {
                ctx.path.push("instructions".to_string());
                for (i, instruction) in instructions.iter().enumerate() {
                    ctx.path.push(format!("[{i}]"));
                    unpack_instruction(instruction, ctx, depth + 1);
                    ctx.path.pop();
                }
                ctx.path.pop();

                for (key, value) in map {
                    if key == "instructions" {
                        continue;
                    }
                    ctx.path.push(key.clone());
                    walk(value, ctx, depth + 1);
                    ctx.path.pop();
                }
                return;
            }

            for (key, value) in map {
                ctx.path.push(key.clone());
                walk(value, ctx, depth + 1);
                ctx.path.pop();
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                ctx.path.push(format!("[{i}]"));
                walk(item, ctx, depth + 1);
                ctx.path.pop();
            }
        }
        _ => {}
    }
}

/// Unpack one timeline instruction. Only entry-bearing operation types carry
/// records; pin/clear/terminate instructions are skipped entirely.
fn unpack_instruction(instruction: &Value, ctx: &mut ExtractionContext, depth: usize) {
    let op = instruction
        .get("type")
        .or_else(|| instruction.get("__typename"))
        .and_then(Value::as_str);

    let entries = match op {
        Some("TimelineAddEntries") => instruction.get("entries").and_then(Value::as_array),
        Some("TimelineAddToModule") => instruction.get("moduleItems").and_then(Value::as_array),
        _ => None,
    };

    let Some(entries) = entries else {
        return;
    };

    for (i, entry) in entries.iter().enumerate() {
        if !ctx.include_promoted && is_promoted_entry(entry) {
            debug!(
                path = ctx.path_string(),
                index = i,
                "Skipping promoted timeline entry"
            );
            continue;
        }
        ctx.path.push(format!("entries[{i}]"));
        // Entries wrap their payload in `content` (add-entries) or `item`
        // (add-to-module); fall back to the entry itself for older cohorts.
        let payload = entry
            .get("content")
            .or_else(|| entry.get("item"))
            .unwrap_or(entry);
        walk(payload, ctx, depth + 1);
        ctx.path.pop();
    }
}

fn is_promoted_entry(entry: &Value) -> bool {
    let flagged_id = entry
        .get("entryId")
        .and_then(Value::as_str)
        .is_some_and(|id| id.contains("promoted"));

    let promoted_metadata = ["content", "item"].iter().any(|k| {
        entry
            .get(*k)
            .and_then(|c| c.get("itemContent"))
            .and_then(|ic| ic.get("promotedMetadata"))
            .is_some()
    });

    flagged_id || promoted_metadata
}
