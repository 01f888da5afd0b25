//! Extraction tests over schema-inconsistent trees.
//!
//! `fixtures/following_page.json` is shaped like a real GraphQL following
//! timeline: nested result wrappers, an instruction array with a promoted
//! decoy entry, and top/bottom cursors.

use serde_json::{json, Value};

use rookery_common::CursorKind;
use rookery_engine::{
    extract, extract_with, normalize_cursor, normalize_match, EntityKind, Normalized, ShapeKind,
};

fn following_page() -> Value {
    let raw = include_str!("fixtures/following_page.json");
    serde_json::from_str(raw).expect("fixture parses")
}

#[test]
fn accounts_found_in_deeply_nested_timeline() {
    let page = following_page();
    let matches = extract(&page, EntityKind::Account);

    assert_eq!(matches.len(), 2, "promoted decoy entry must be skipped");
    for m in &matches {
        assert_eq!(m.shape, ShapeKind::UserResultWrapper);
        let Some(Normalized::Account(account)) = normalize_match(m) else {
            panic!("recognized account failed to normalize: {m:?}");
        };
        assert!(!account.id.is_empty() || !account.handle.is_empty());
    }

    let handles: Vec<String> = matches
        .iter()
        .filter_map(|m| match normalize_match(m) {
            Some(Normalized::Account(a)) => Some(a.handle),
            _ => None,
        })
        .collect();
    assert_eq!(handles, vec!["larkspur_maps", "quillfeather"]);
}

#[test]
fn promoted_entries_included_only_on_request() {
    let page = following_page();
    let matches = extract_with(&page, EntityKind::Account, true);
    assert_eq!(matches.len(), 3);
}

#[test]
fn bottom_cursor_recovered_and_top_cursor_ignored_for_pagination() {
    let page = following_page();
    let matches = extract(&page, EntityKind::Cursor);
    assert_eq!(matches.len(), 2);

    let bottoms: Vec<_> = matches
        .iter()
        .filter_map(|m| normalize_cursor(&m.node))
        .filter(|c| c.kind == CursorKind::Bottom)
        .collect();
    assert_eq!(bottoms.len(), 1);
    assert_eq!(bottoms[0].value, "DAABCgABGhq4xQk__9sKAAIWYn52ZhpQAAgAAwAAAAIAAA");
}

#[test]
fn unrecognizable_tree_yields_empty_not_error() {
    let tree = json!({
        "data": {
            "viewer": {"settings": {"theme": "dark", "lists": [1, 2, 3]}},
            "meta": null
        }
    });
    assert!(extract(&tree, EntityKind::Account).is_empty());
    assert!(extract(&tree, EntityKind::Post).is_empty());
    assert!(extract(&tree, EntityKind::Cursor).is_empty());
}

#[test]
fn matched_account_subtree_is_not_rescanned() {
    // A user result carrying another wrapped user (e.g. an affiliate badge
    // owner) must produce one match, not two.
    let tree = json!({
        "user_results": {
            "result": {
                "rest_id": "31",
                "legacy": {"screen_name": "outer"},
                "affiliates_highlighted_label": {
                    "user_results": {
                        "result": {
                            "rest_id": "32",
                            "legacy": {"screen_name": "inner"}
                        }
                    }
                }
            }
        }
    });
    let matches = extract(&tree, EntityKind::Account);
    assert_eq!(matches.len(), 1);
}

#[test]
fn flat_rest_era_records_still_recognized() {
    let tree = json!({
        "users": [
            {"screen_name": "heron", "id_str": "551", "followers_count": 12},
            {"screen_name": "bittern", "id_str": "552", "followers_count": 7}
        ],
        "next_cursor_str": "1593258342906214784"
    });
    let matches = extract(&tree, EntityKind::Account);
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m.shape == ShapeKind::DirectUser));
}

#[test]
fn depth_ceiling_abandons_subtree_without_failing() {
    let mut deep = json!({"screen_name": "buried", "id_str": "404"});
    for _ in 0..14 {
        deep = json!({"wrap": deep});
    }
    // The over-deep subtree is abandoned...
    assert!(extract(&deep, EntityKind::Account).is_empty());

    // ...but a sibling within bounds is still found.
    let mixed = json!({
        "too_deep": deep,
        "shallow": {"screen_name": "surface", "id_str": "200"}
    });
    let matches = extract(&mixed, EntityKind::Account);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].path, "shallow");
}

#[test]
fn posts_and_accounts_extracted_independently() {
    let tree = json!({
        "data": {
            "pinned": {
                "tweet_results": {
                    "result": {
                        "rest_id": "7401",
                        "legacy": {
                            "full_text": "migration season update",
                            "user_id_str": "551",
                            "favorite_count": 40
                        }
                    }
                }
            },
            "owner": {"screen_name": "heron", "id_str": "551"}
        }
    });

    let posts = extract(&tree, EntityKind::Post);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].shape, ShapeKind::TweetResultWrapper);
    match normalize_match(&posts[0]) {
        Some(Normalized::Post(p)) => {
            assert_eq!(p.id, "7401");
            assert_eq!(p.author_id, "551");
            assert_eq!(p.counts.likes, 40);
        }
        other => panic!("expected post, got {other:?}"),
    }

    let accounts = extract(&tree, EntityKind::Account);
    assert_eq!(accounts.len(), 1);
}

#[test]
fn add_to_module_instructions_are_unpacked() {
    let tree = json!({
        "data": {
            "timeline": {
                "instructions": [{
                    "type": "TimelineAddToModule",
                    "moduleItems": [{
                        "entryId": "followerslist-item-0",
                        "item": {
                            "itemContent": {
                                "itemType": "TimelineUser",
                                "user_results": {
                                    "result": {
                                        "rest_id": "8871",
                                        "legacy": {"screen_name": "moorhen"}
                                    }
                                }
                            }
                        }
                    }]
                }]
            }
        }
    });
    let matches = extract(&tree, EntityKind::Account);
    assert_eq!(matches.len(), 1);
}
