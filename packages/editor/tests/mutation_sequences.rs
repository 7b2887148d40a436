//! Tests for longer mutation sequences
//!
//! This tests:
//! - Undo/redo symmetry over many steps
//! - Id uniqueness and tree invariants under random edits
//! - Delete completeness for columns blocks
//! - Move preserving the order of everything else

use anvil_editor::anvil_blocks::{Document, IdGenerator, COLUMNS_TYPE, COLUMN_COUNT_KEY};
use anvil_editor::{EditorConfig, EditorSession, InsertTarget, MemoryTransport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

const REGISTRY: &str = r#"{
    "paragraph": {"label": "Paragraph", "icon": "p", "attributes": {"content": {"default": ""}}},
    "heading": {"label": "Heading", "icon": "h", "attributes": {"content": {"default": ""}, "level": {"default": 2, "type": "integer"}}},
    "columns": {"label": "Columns", "icon": "c", "attributes": {"columnCount": {"default": 2, "type": "integer"}}}
}"#;

fn session_with(blocks: &str, seed: &str) -> EditorSession {
    let mut config = EditorConfig::new(1);
    config.registry = serde_json::from_str(REGISTRY).unwrap();
    config.blocks = serde_json::from_str(blocks).unwrap();
    EditorSession::with_id_generator(
        config,
        Arc::new(MemoryTransport::new()),
        IdGenerator::sequential(seed),
    )
    .unwrap()
}

fn empty_session(seed: &str) -> EditorSession {
    session_with("[]", seed)
}

fn all_ids(doc: &Document) -> Vec<String> {
    let mut ids = Vec::new();
    for block in doc.blocks() {
        ids.push(block.id.clone());
        ids.extend(block.nested_blocks().map(|b| b.id.clone()));
    }
    ids
}

fn top_ids(session: &EditorSession) -> Vec<String> {
    session
        .document()
        .blocks()
        .iter()
        .map(|b| b.id.clone())
        .collect()
}

/// Every block a random edit may target: top-level and nested
fn pick_id(rng: &mut StdRng, doc: &Document) -> Option<String> {
    let ids = all_ids(doc);
    if ids.is_empty() {
        return None;
    }
    Some(ids[rng.gen_range(0..ids.len())].clone())
}

fn pick_target(rng: &mut StdRng, doc: &Document) -> InsertTarget {
    let columns: Vec<_> = doc.blocks().iter().filter(|b| b.is_columns()).collect();

    if !columns.is_empty() && rng.gen_bool(0.4) {
        let parent = columns[rng.gen_range(0..columns.len())];
        return InsertTarget::column(parent.id.clone(), rng.gen_range(0..parent.column_count()));
    }

    if rng.gen_bool(0.2) {
        InsertTarget::append()
    } else {
        InsertTarget::top_level(rng.gen_range(0..=doc.len() + 1))
    }
}

fn random_edit(rng: &mut StdRng, session: &mut EditorSession) {
    let doc = session.document().clone();

    match rng.gen_range(0..6) {
        0 => {
            let block_type = ["paragraph", "heading", COLUMNS_TYPE][rng.gen_range(0..3)];
            let target = pick_target(rng, &doc);
            session.insert_block(block_type, target).unwrap();
        }
        1 => {
            if let Some(id) = pick_id(rng, &doc) {
                let target = pick_target(rng, &doc);
                session.move_block(&id, target).unwrap();
            }
        }
        2 => {
            if let Some(id) = pick_id(rng, &doc) {
                session.duplicate_block(&id).unwrap();
            }
        }
        3 => {
            if let Some(id) = pick_id(rng, &doc) {
                session.delete_block(&id).unwrap();
            }
        }
        4 => {
            if let Some(columns) = doc.blocks().iter().find(|b| b.is_columns()) {
                let count = rng.gen_range(1..8i64);
                session
                    .update_attribute(&columns.id, COLUMN_COUNT_KEY, count)
                    .unwrap();
            }
        }
        _ => {
            if let Some(id) = pick_id(rng, &doc) {
                session
                    .update_attribute(&id, "content", format!("edit {}", rng.gen::<u16>()))
                    .unwrap();
            }
        }
    }
}

#[test]
fn test_random_edits_keep_invariants() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = empty_session("r");

        for step in 0..150 {
            random_edit(&mut rng, &mut session);

            let doc = session.document();
            let violations = doc.check_invariants();
            assert!(
                violations.is_empty(),
                "seed {} step {}: {:?}",
                seed,
                step,
                violations
            );

            let ids = all_ids(doc);
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(unique.len(), ids.len(), "seed {} step {}", seed, step);
            assert_eq!(ids.len(), doc.block_count());
        }
    }
}

#[test]
fn test_random_edits_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut session = empty_session("rt");

    for _ in 0..200 {
        random_edit(&mut rng, &mut session);
    }

    let json = session.document().to_json().unwrap();
    let parsed = Document::from_json(&json).unwrap();
    assert_eq!(&parsed, session.document());
}

#[test]
fn test_undo_redo_symmetry() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut session = empty_session("u");

    // Only count edits that were committed
    let mut committed = 0;
    while committed < 30 {
        let before = session.history().undo_levels();
        random_edit(&mut rng, &mut session);
        if session.history().undo_levels() > before {
            committed += 1;
        }
    }

    let final_state = session.document().clone();

    for _ in 0..committed {
        assert!(session.undo().unwrap());
    }
    assert!(session.document().is_empty());
    assert!(!session.undo().unwrap());

    for _ in 0..committed {
        assert!(session.redo().unwrap());
    }
    assert_eq!(session.document(), &final_state);
    assert!(!session.redo().unwrap());
}

#[test]
fn test_history_is_bounded() {
    let mut session = empty_session("h");

    for _ in 0..60 {
        session.insert_block("paragraph", InsertTarget::append()).unwrap();
    }

    let mut undone = 0;
    while session.undo().unwrap() {
        undone += 1;
    }

    assert_eq!(undone, 49);
    assert_eq!(session.document().len(), 11);
}

#[test]
fn test_delete_columns_completeness() {
    let mut session = session_with(
        r#"[
            {"id": "a", "type": "paragraph", "attributes": {}},
            {"id": "cols", "type": "columns", "attributes": {"columnCount": 3, "columns": [
                [{"id": "x1", "type": "paragraph", "attributes": {}}, {"id": "x2", "type": "paragraph", "attributes": {}}],
                [],
                [{"id": "z1", "type": "heading", "attributes": {"level": 3}}]
            ]}},
            {"id": "b", "type": "paragraph", "attributes": {}}
        ]"#,
        "d",
    );

    let before = session.document().block_count();
    let nested = session.document().find("cols").unwrap().nested_blocks().count();
    assert_eq!(nested, 3);

    session.delete_block("cols").unwrap();

    assert_eq!(session.document().block_count(), before - (1 + nested));
    for id in ["cols", "x1", "x2", "z1"] {
        assert!(!session.document().contains(id), "{} should be gone", id);
    }
}

#[test]
fn test_move_preserves_relative_order() {
    let mut session = session_with(
        r#"[
            {"id": "b0", "type": "paragraph", "attributes": {}},
            {"id": "b1", "type": "paragraph", "attributes": {}},
            {"id": "x", "type": "paragraph", "attributes": {}},
            {"id": "b3", "type": "paragraph", "attributes": {}},
            {"id": "b4", "type": "paragraph", "attributes": {}}
        ]"#,
        "m",
    );

    session.move_block("x", InsertTarget::top_level(0)).unwrap();

    assert_eq!(top_ids(&session), vec!["x", "b0", "b1", "b3", "b4"]);
}

#[test]
fn test_duplicate_then_move_into_column() {
    let mut session = empty_session("dm");

    let cols = session
        .insert_block(COLUMNS_TYPE, InsertTarget::append())
        .unwrap()
        .unwrap();
    let p = session
        .insert_block("paragraph", InsertTarget::column(cols.clone(), 0))
        .unwrap()
        .unwrap();
    let copy = session.duplicate_block(&p).unwrap().unwrap();

    session
        .move_block(&copy, InsertTarget::column(cols.clone(), 1))
        .unwrap();

    let columns = session.document().find(&cols).unwrap();
    assert_eq!(columns.column(0).unwrap()[0].id, p);
    assert_eq!(columns.column(1).unwrap()[0].id, copy);

    // Duplicating the container copies both nested blocks under new ids
    let cols_copy = session.duplicate_block(&cols).unwrap().unwrap();
    let ids = all_ids(session.document());
    assert_eq!(ids.len(), 6);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 6);
    assert_eq!(top_ids(&session), vec![cols.clone(), cols_copy]);
}
