//! Integration tests for the editor session

use anvil_editor::anvil_blocks::{IdGenerator, Value, COLUMNS_TYPE};
use anvil_editor::{
    DropTarget, EditorConfig, EditorSession, FocusTarget, InsertTarget, MemoryTransport,
    MutationError, MutationOutcome, Point, Rect, RegionInput, RenderedLayout, SaveStatus,
};
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r##"{
    "postId": 12,
    "postType": "page",
    "postTitle": "Landing",
    "authToken": "nonce",
    "registry": {
        "paragraph": {"label": "Paragraph", "icon": "p", "attributes": {"content": {"default": ""}}},
        "button": {"label": "Button", "icon": "b", "attributes": {"text": {"default": "Click"}, "url": {"default": "#"}}},
        "columns": {"label": "Columns", "icon": "c", "attributes": {"columnCount": {"default": 3, "type": "integer"}}}
    },
    "blocks": [
        {"id": "A", "type": "paragraph", "attributes": {"content": "First"}},
        {"id": "B", "type": "paragraph", "attributes": {"content": "Second"}}
    ]
}"##;

fn session_with_transport() -> (EditorSession, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let config = EditorConfig::from_json(CONFIG).unwrap();
    let session =
        EditorSession::with_id_generator(config, transport.clone(), IdGenerator::sequential("n"))
            .unwrap();
    (session, transport)
}

fn top_ids(session: &EditorSession) -> Vec<String> {
    session
        .document()
        .blocks()
        .iter()
        .map(|b| b.id.clone())
        .collect()
}

/// Rendered top-level blocks, 100px tall each, stacked from y=0
fn layout_for(session: &EditorSession) -> RenderedLayout {
    let mut layout = RenderedLayout::new(Rect::new(0.0, 0.0, 800.0, 2000.0));
    for (i, block) in session.document().blocks().iter().enumerate() {
        let top = i as f32 * 100.0;
        layout = layout.with_block(block.id.clone(), Rect::new(0.0, top, 800.0, 100.0));
        for column in 0..block.column_count() {
            let width = 800.0 / block.column_count() as f32;
            layout = layout.with_column(
                block.id.clone(),
                column,
                Rect::new(column as f32 * width, top, width, 100.0),
            );
        }
    }
    layout
}

#[test]
fn test_insert_move_undo_scenario() {
    let (mut session, _) = session_with_transport();

    let p = session
        .insert_block("paragraph", InsertTarget::top_level(1))
        .unwrap()
        .unwrap();
    assert_eq!(top_ids(&session), vec!["A", p.as_str(), "B"]);

    // Target 3 is "after B" counted before A is taken out
    session.move_block("A", InsertTarget::top_level(3)).unwrap();
    assert_eq!(top_ids(&session), vec![p.as_str(), "B", "A"]);

    session.undo().unwrap();
    assert_eq!(top_ids(&session), vec!["A", p.as_str(), "B"]);

    session.undo().unwrap();
    assert_eq!(top_ids(&session), vec!["A", "B"]);
}

#[test]
fn test_move_to_index_two_lands_above_b() {
    let (mut session, _) = session_with_transport();
    let p = session
        .insert_block("paragraph", InsertTarget::top_level(1))
        .unwrap()
        .unwrap();

    // Index 2 is "above B" in [A, P, B]; once A is removed that is index 1
    session.move_block("A", InsertTarget::top_level(2)).unwrap();
    assert_eq!(top_ids(&session), vec![p.as_str(), "A", "B"]);
}

#[test]
fn test_stale_mutations_are_noops() {
    let (mut session, _) = session_with_transport();

    let outcome = session.move_block("gone", InsertTarget::append()).unwrap();
    assert_eq!(
        outcome,
        MutationOutcome::Noop {
            reason: MutationError::BlockNotFound("gone".to_string())
        }
    );
    assert!(session.duplicate_block("gone").unwrap().is_none());
    assert!(!session.update_attribute("gone", "content", "x").unwrap().is_applied());
    assert!(!session.is_dirty());
}

#[test]
fn test_columns_insert_uses_registry_default() {
    let (mut session, _) = session_with_transport();
    let cols = session
        .insert_block(COLUMNS_TYPE, InsertTarget::append())
        .unwrap()
        .unwrap();

    let block = session.document().find(&cols).unwrap();
    assert_eq!(block.column_count(), 3);
    assert_eq!(block.attribute("columnCount"), Some(&Value::Integer(3)));

    // Columns never nest
    let outcome = session
        .insert_block(COLUMNS_TYPE, InsertTarget::column(cols.clone(), 0))
        .unwrap();
    assert!(outcome.is_none());
}

#[test]
fn test_drag_new_block_into_column() {
    let (mut session, _) = session_with_transport();
    let cols = session
        .insert_block(COLUMNS_TYPE, InsertTarget::append())
        .unwrap()
        .unwrap();
    let layout = layout_for(&session);

    session.start_drag_new("paragraph");
    // Third column of the columns block at y=200..300
    let target = session.drag_pointer(&layout, Point::new(700.0, 250.0)).cloned();
    assert_eq!(
        target,
        Some(DropTarget::Column {
            parent_id: cols.clone(),
            column_index: 2
        })
    );

    let outcome = session.end_drag(&layout).unwrap().unwrap();
    let created = outcome.created().unwrap().to_string();
    let slot = session.document().column_slot(&cols, 2).unwrap();
    assert_eq!(slot[0].id, created);
    assert!(session.drag().is_none());
}

#[test]
fn test_drag_move_reorders() {
    let (mut session, _) = session_with_transport();
    session.insert_block("paragraph", InsertTarget::append()).unwrap();
    // [A, B, n-1]
    let layout = layout_for(&session);

    assert!(session.start_drag_move("A"));
    // Below every midpoint: to the end
    session.drag_pointer(&layout, Point::new(10.0, 290.0));
    session.end_drag(&layout).unwrap();
    assert_eq!(top_ids(&session), vec!["B", "n-1", "A"]);

    let layout = layout_for(&session);
    assert!(session.start_drag_move("A"));
    // Above the midpoint of n-1 (y=150)
    session.drag_pointer(&layout, Point::new(10.0, 130.0));
    session.end_drag(&layout).unwrap();
    assert_eq!(top_ids(&session), vec!["B", "A", "n-1"]);
}

#[test]
fn test_abandoned_drag_changes_nothing() {
    let (mut session, _) = session_with_transport();
    let layout = layout_for(&session);

    session.start_drag_new("paragraph");
    session.drag_pointer(&layout, Point::new(-10.0, 50.0));
    assert!(session.end_drag(&layout).unwrap().is_none());
    assert_eq!(top_ids(&session), vec!["A", "B"]);
    assert!(!session.is_dirty());
}

#[test]
fn test_inline_edit_writes_button_text() {
    let (mut session, _) = session_with_transport();
    let button = session
        .insert_block("button", InsertTarget::append())
        .unwrap()
        .unwrap();

    session.inline_focus(&button).unwrap();
    session
        .inline_input(&button, &RegionInput::new("Buy now").with_align("right"))
        .unwrap();

    let block = session.document().find(&button).unwrap();
    assert_eq!(block.attribute("text"), Some(&Value::from("Buy now")));
    assert_eq!(block.attribute("align"), Some(&Value::from("right")));
    assert_eq!(block.attribute("content"), None);
}

#[test]
fn test_inline_edit_follows_moved_block() {
    let (mut session, _) = session_with_transport();
    let cols = session
        .insert_block(COLUMNS_TYPE, InsertTarget::append())
        .unwrap()
        .unwrap();

    session.inline_focus("B").unwrap();
    session
        .inline_input("B", &RegionInput::new("before move"))
        .unwrap();

    session
        .move_block("B", InsertTarget::column(cols.clone(), 1))
        .unwrap();
    session
        .inline_input("B", &RegionInput::new("after move"))
        .unwrap();

    let slot = session.document().column_slot(&cols, 1).unwrap();
    assert_eq!(slot[0].attribute("content"), Some(&Value::from("after move")));
}

#[tokio::test(start_paused = true)]
async fn test_inline_blur_grace_commits_once() {
    let (mut session, _) = session_with_transport();
    let levels = session.history().undo_levels();

    session.inline_focus("A").unwrap();
    session.inline_input("A", &RegionInput::new("F")).unwrap();
    session.inline_input("A", &RegionInput::new("Fi")).unwrap();

    // Toolbar use keeps the edit open
    session.inline_blur(FocusTarget::Toolbar);
    tokio::time::advance(Duration::from_secs(1)).await;
    session.tick().await.unwrap();
    assert!(session.inline_editor().is_editing());

    session.inline_blur(FocusTarget::Elsewhere);
    tokio::time::advance(Duration::from_millis(200)).await;
    session.tick().await.unwrap();

    assert!(!session.inline_editor().is_editing());
    assert_eq!(session.history().undo_levels(), levels + 1);
}

#[tokio::test]
async fn test_save_round_trip() -> anyhow::Result<()> {
    let (mut session, transport) = session_with_transport();
    session.insert_block("paragraph", InsertTarget::append())?;
    session.set_title("New landing");
    assert!(session.should_warn_before_leaving());

    session.save().await?;

    assert!(!session.is_dirty());
    assert!(matches!(session.save_status(), SaveStatus::Saved { .. }));

    let saved = transport.canonical().await.unwrap();
    assert_eq!(saved.post_id, 12);
    assert_eq!(saved.title.as_deref(), Some("New landing"));
    assert_eq!(&saved.blocks, session.document());
    assert!(transport.autosaved().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_save_surfaces_status() {
    let (mut session, transport) = session_with_transport();
    session.delete_block("A").unwrap();

    transport.set_failure(Some("503")).await;
    assert!(session.save().await.is_err());
    assert!(session.is_dirty());
    assert!(matches!(session.save_status(), SaveStatus::Failed { .. }));

    transport.set_failure(None).await;
    session.save().await.unwrap();
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn test_last_response_wins() {
    let (mut session, transport) = session_with_transport();

    session.delete_block("A").unwrap();
    let first = session.begin_save().unwrap();

    session.delete_block("B").unwrap();
    let second = session.begin_save().unwrap();

    // Second response arrives first, then the first
    let second = second.await;
    let first = first.await;
    session.complete_save(second).unwrap();
    assert!(!session.is_dirty());

    session.complete_save(first).unwrap();
    assert!(!session.is_dirty());
    assert_eq!(transport.save_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_after_quiet_period() {
    let (mut session, transport) = session_with_transport();

    session.insert_block("paragraph", InsertTarget::append()).unwrap();
    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(session.tick().await.unwrap().is_none());

    session.update_attribute("A", "content", "again").unwrap();
    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(session.tick().await.unwrap().is_none());
    assert_eq!(transport.autosave_count().await, 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(session.tick().await.unwrap().is_some());

    assert_eq!(transport.autosave_count().await, 1);
    assert!(transport.canonical().await.is_none());
    // Autosave is a recovery copy; the document is still unsaved
    assert!(session.is_dirty());

    // Nothing new to send until the next edit
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(session.tick().await.unwrap().is_none());
}

#[tokio::test]
async fn test_preview() {
    let (session, _) = session_with_transport();
    let response = session.preview("A").await.unwrap().unwrap();
    assert!(response.success);
    assert!(response.html.unwrap().contains("data-block-id=\"A\""));
    assert!(session.preview("missing").await.unwrap().is_none());
}

#[test]
fn test_legacy_content_is_wrapped() {
    let mut config = EditorConfig::new(3);
    config.blocks = serde_json::Value::String("<h1>Old page</h1>".to_string());

    let session = EditorSession::with_id_generator(
        config,
        Arc::new(MemoryTransport::new()),
        IdGenerator::sequential("l"),
    )
    .unwrap();

    assert!(session.converted_from_legacy());
    assert!(session.is_dirty());
    let block = &session.document().blocks()[0];
    assert_eq!(block.block_type, "html");
    assert_eq!(block.attribute("content"), Some(&Value::from("<h1>Old page</h1>")));
}
