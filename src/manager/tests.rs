use super::*;
use crate::models::ItemKind;
use crate::store::{MemoryStore, StoreOp};

fn fixture() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("Scores/a.pdf", b"first score".to_vec()),
        ("Scores/b.pdf", b"second score".to_vec()),
        ("Archive/.emptyFolderPlaceholder", Vec::new()),
        ("song.mp3", vec![7u8; 10]),
    ]
}

async fn open_manager(
    objects: Vec<(&'static str, Vec<u8>)>,
) -> (Arc<MemoryStore>, FileTreeManager<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_objects(objects));
    let manager = FileTreeManager::new(store.clone(), TreeConfig::default());
    manager.open(VirtualPath::root()).await.unwrap();
    store.reset_calls();
    (store, manager)
}

fn id_at(manager: &FileTreeManager<MemoryStore>, path: &str) -> ItemId {
    let path = VirtualPath::parse(path);
    manager
        .visible_items()
        .into_iter()
        .find(|row| row.path == path)
        .map(|row| row.id)
        .unwrap_or_else(|| panic!("{} is not visible", path))
}

fn visible_paths(manager: &FileTreeManager<MemoryStore>) -> Vec<String> {
    manager
        .visible_items()
        .into_iter()
        .map(|row| row.path.to_key())
        .collect()
}

#[tokio::test]
async fn test_create_folder_shows_up_in_tree() {
    let (store, manager) = open_manager(Vec::new()).await;

    let id = manager
        .create_folder(&VirtualPath::root(), "Scores")
        .await
        .unwrap()
        .unwrap();

    let visible = manager.visible_items();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, id);
    assert_eq!(visible[0].kind, ItemKind::Folder);

    let listed = store.list("").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_folder());
    // Creating folders is not undoable
    assert!(!manager.can_undo().await);
}

#[tokio::test]
async fn test_drop_on_current_parent_is_silent() {
    let (store, manager) = open_manager(fixture()).await;
    manager.toggle_expand(id_at(&manager, "Scores")).await.unwrap();
    store.reset_calls();

    manager.begin_drag(id_at(&manager, "Scores/a.pdf")).unwrap();
    manager.hover_drag(id_at(&manager, "Scores")).unwrap();
    let result = manager.drop_dragged(id_at(&manager, "Scores")).await;

    assert_eq!(result, Ok(None));
    assert_eq!(store.call_count(), 0);
    assert!(!manager.can_undo().await);
    assert_eq!(manager.drag_state(), DragState::Idle);
}

#[tokio::test]
async fn test_drop_on_invalid_target_makes_no_calls() {
    let (store, manager) = open_manager(fixture()).await;

    manager.begin_drag(id_at(&manager, "Scores")).unwrap();
    let result = manager.drop_dragged(id_at(&manager, "song.mp3")).await;
    assert!(matches!(result, Err(OpsError::InvalidTarget(_))));

    manager.begin_drag(id_at(&manager, "Scores")).unwrap();
    let result = manager.drop_dragged(id_at(&manager, "Scores")).await;
    assert!(matches!(result, Err(OpsError::InvalidTarget(_))));

    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_drag_move_records_like_dialog_move() {
    let (store, manager) = open_manager(fixture()).await;
    let song = id_at(&manager, "song.mp3");

    manager.begin_drag(song).unwrap();
    manager.hover_drag(id_at(&manager, "Archive")).unwrap();
    let relocation = manager
        .drop_dragged(id_at(&manager, "Archive"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(relocation.to, VirtualPath::parse("Archive/song.mp3"));
    assert!(store.contains("Archive/song.mp3"));
    assert_eq!(visible_paths(&manager), vec!["Archive", "Scores"]);

    manager.toggle_expand(id_at(&manager, "Scores")).await.unwrap();
    let pdf = id_at(&manager, "Scores/a.pdf");
    manager.move_item(pdf, &"Archive".into()).await.unwrap();

    assert_eq!(
        manager.undo_preview().await,
        vec!["Move Scores/a.pdf to Archive", "Move song.mp3 to Archive"]
    );
}

#[tokio::test]
async fn test_rename_keeps_id_through_undo() {
    let (store, manager) = open_manager(fixture()).await;
    let song = id_at(&manager, "song.mp3");

    manager.rename_item(song, "track.mp3").await.unwrap();
    assert_eq!(id_at(&manager, "track.mp3"), song);
    assert!(store.contains("track.mp3"));

    let result = manager.undo().await.unwrap().unwrap();
    assert_eq!(result.description, "Rename song.mp3 to track.mp3");
    assert_eq!(id_at(&manager, "song.mp3"), song);
    assert_eq!(store.get("song.mp3"), Some(vec![7u8; 10]));
    assert!(!store.contains("track.mp3"));
    assert!(manager.can_redo().await);
}

#[tokio::test]
async fn test_partial_move_resyncs_cache_without_history() {
    let (store, manager) = open_manager(fixture()).await;
    manager.toggle_expand(id_at(&manager, "Archive")).await.unwrap();
    store.fail_on(StoreOp::Upload, "Archive/Scores/b.pdf");

    let result = manager
        .move_item(id_at(&manager, "Scores"), &"Archive".into())
        .await;
    assert!(matches!(result, Err(OpsError::PartialFailure { .. })));

    let visible = visible_paths(&manager);
    assert!(visible.contains(&"Scores".to_string()));
    assert!(visible.contains(&"Archive/Scores".to_string()));
    assert!(!manager.can_undo().await);
}

#[tokio::test]
async fn test_delete_and_undo_refresh_tree() {
    let (_store, manager) = open_manager(fixture()).await;

    let deleted = manager.delete_item(id_at(&manager, "Scores")).await.unwrap();
    assert_eq!(deleted.snapshot.len(), 2);
    assert_eq!(visible_paths(&manager), vec!["Archive", "song.mp3"]);

    manager.undo().await.unwrap();
    assert_eq!(visible_paths(&manager), vec!["Archive", "Scores", "song.mp3"]);

    manager.redo().await.unwrap();
    assert_eq!(visible_paths(&manager), vec!["Archive", "song.mp3"]);
}

#[tokio::test]
async fn test_delete_selected_leaves_multi_select() {
    let (store, manager) = open_manager(fixture()).await;
    manager.toggle_select(id_at(&manager, "Scores"));
    manager.toggle_select(id_at(&manager, "song.mp3"));

    let result = manager.delete_selected().await.unwrap();
    assert!(result.is_complete());
    assert_eq!(result.deleted.len(), 2);
    assert_eq!(visible_paths(&manager), vec!["Archive"]);
    assert!(manager.selected_ids().is_empty());
    assert!(!manager.snapshot().await.selection.is_active());
    assert_eq!(store.keys(), vec!["Archive/.emptyFolderPlaceholder".to_string()]);
    assert_eq!(manager.undo_preview().await, vec!["Delete 2 items"]);
}

#[tokio::test]
async fn test_batch_delete_with_failure() {
    let (store, manager) = open_manager(fixture()).await;
    store.fail_on(StoreOp::Delete, "song.mp3");

    let ids = vec![id_at(&manager, "Scores"), id_at(&manager, "song.mp3")];
    let result = manager.batch_delete(&ids).await.unwrap();

    assert_eq!(result.deleted.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(visible_paths(&manager), vec!["Archive", "song.mp3"]);
    assert_eq!(manager.undo_preview().await, vec!["Delete Scores"]);
}

#[tokio::test]
async fn test_mutations_are_rejected_while_busy() {
    let (store, manager) = open_manager(fixture()).await;
    let song = id_at(&manager, "song.mp3");

    let guard = manager.gate.try_acquire().unwrap();
    assert!(manager.is_busy());
    assert_eq!(
        manager.create_folder(&VirtualPath::root(), "New").await,
        Err(OpsError::Busy)
    );
    assert!(matches!(
        manager.rename_item(song, "x.mp3").await,
        Err(OpsError::Busy)
    ));
    assert!(matches!(manager.delete_item(song).await, Err(OpsError::Busy)));
    assert!(matches!(manager.undo().await, Err(OpsError::Busy)));
    assert_eq!(store.call_count(), 0);

    // Browsing is not gated
    manager.refresh().await.unwrap();
    drop(guard);

    assert!(manager.rename_item(song, "x.mp3").await.is_ok());
    assert!(!manager.is_busy());
}

#[tokio::test]
async fn test_navigation_reloads_root() {
    let (_store, manager) = open_manager(fixture()).await;

    manager.navigate_into(id_at(&manager, "Scores")).await.unwrap();
    assert_eq!(manager.current_path(), VirtualPath::parse("Scores"));
    assert_eq!(visible_paths(&manager), vec!["Scores/a.pdf", "Scores/b.pdf"]);
    let crumbs: Vec<String> = manager.breadcrumbs().into_iter().map(|c| c.name).collect();
    assert_eq!(crumbs, vec!["Home", "Scores"]);

    let file = id_at(&manager, "Scores/a.pdf");
    assert!(matches!(
        manager.navigate_into(file).await,
        Err(OpsError::InvalidTarget(_))
    ));
    assert!(matches!(
        manager.navigate_to_breadcrumb(&"Archive".into()).await,
        Err(OpsError::InvalidTarget(_))
    ));

    assert!(manager.navigate_up().await.unwrap());
    assert!(manager.current_path().is_root());
    assert!(!manager.navigate_up().await.unwrap());
    assert_eq!(visible_paths(&manager).len(), 3);
}

#[tokio::test]
async fn test_renamed_folder_can_be_browsed() {
    let (_store, manager) = open_manager(fixture()).await;

    manager
        .rename_item(id_at(&manager, "Scores"), "Sheets")
        .await
        .unwrap();
    assert!(visible_paths(&manager).contains(&"Sheets".to_string()));

    manager.navigate_into(id_at(&manager, "Sheets")).await.unwrap();
    assert_eq!(visible_paths(&manager), vec!["Sheets/a.pdf", "Sheets/b.pdf"]);
}

#[tokio::test]
async fn test_cursor_and_selection_follow_refresh() {
    let (store, manager) = open_manager(fixture()).await;

    manager.cursor_last();
    assert_eq!(
        manager.focused().map(|row| row.path),
        Some(VirtualPath::parse("song.mp3"))
    );

    manager.toggle_select(id_at(&manager, "song.mp3"));
    store.delete("song.mp3").await.unwrap();
    manager.refresh().await.unwrap();

    assert!(manager.selected_ids().is_empty());
    assert_eq!(
        manager.focused().map(|row| row.path),
        Some(VirtualPath::parse("Scores"))
    );
}

#[tokio::test]
async fn test_snapshot_serializes() {
    let (_store, manager) = open_manager(fixture()).await;
    manager.rename_item(id_at(&manager, "song.mp3"), "b.mp3").await.unwrap();

    let snapshot = manager.snapshot().await;
    assert!(snapshot.can_undo);
    assert!(!snapshot.busy);
    assert_eq!(snapshot.visible.len(), 3);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["tree"]["items"][0]["type"], "folder");
    assert_eq!(json["drag"]["state"], "idle");
}

#[tokio::test]
async fn test_snapshot_does_not_wait_for_history_replay() {
    let (_store, manager) = open_manager(fixture()).await;
    manager.rename_item(id_at(&manager, "song.mp3"), "b.mp3").await.unwrap();

    let held = manager.history.lock().await;
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(1), manager.snapshot())
        .await
        .expect("snapshot waited on the history lock");
    assert!(snapshot.busy);
    assert!(!snapshot.can_undo);
    assert_eq!(snapshot.visible.len(), 3);

    drop(held);
    let snapshot = manager.snapshot().await;
    assert!(!snapshot.busy);
    assert!(snapshot.can_undo);
}

#[tokio::test]
async fn test_move_into_file_path_is_rejected() {
    let (store, manager) = open_manager(fixture()).await;
    manager.toggle_expand(id_at(&manager, "Scores")).await.unwrap();
    store.reset_calls();

    let result = manager
        .move_item(id_at(&manager, "Scores/a.pdf"), &"song.mp3".into())
        .await;
    assert!(matches!(result, Err(OpsError::InvalidTarget(_))));
    assert!(store.contains("Scores/a.pdf"));
    assert!(!store.contains("song.mp3/a.pdf"));
    assert!(!manager.can_undo().await);
}

#[tokio::test]
async fn test_update_config_trims_history() {
    let (_store, mut manager) = open_manager(fixture()).await;
    manager.rename_item(id_at(&manager, "song.mp3"), "a.mp3").await.unwrap();
    manager.rename_item(id_at(&manager, "a.mp3"), "b.mp3").await.unwrap();

    let mut config = manager.get_config().clone();
    config.history_limit = Some(1);
    manager.update_config(config);

    assert_eq!(manager.undo_preview().await, vec!["Rename a.mp3 to b.mp3"]);
}
