use super::*;
use crate::models::{FileCategory, FileItem, FolderItem, Item, ItemKind, ItemRef};
use crate::path::VirtualPath;

fn row(id: u64, path: &str) -> VisibleItem {
    let path = VirtualPath::parse(path);
    VisibleItem {
        id: ItemId(id),
        name: path.name().unwrap_or_default().to_string(),
        depth: path.depth().saturating_sub(1),
        kind: ItemKind::File,
        detail: None,
        path,
    }
}

fn folder(id: u64, path: &str) -> Item {
    let path = VirtualPath::parse(path);
    Item::Folder(FolderItem {
        id: ItemId(id),
        name: path.name().unwrap_or_default().to_string(),
        path,
        updated_at: None,
        expanded: false,
        children: None,
    })
}

fn file(id: u64, path: &str) -> Item {
    let path = VirtualPath::parse(path);
    let name = path.name().unwrap_or_default().to_string();
    Item::File(FileItem {
        id: ItemId(id),
        category: FileCategory::from_name(&name),
        name,
        path,
        updated_at: None,
        size: 0,
    })
}

#[test]
fn test_toggle_enters_multi_select() {
    let mut selection = SelectionSet::new();
    assert!(!selection.is_active());

    assert!(selection.toggle(ItemId(1)));
    assert!(selection.is_active());
    assert!(selection.contains(ItemId(1)));

    assert!(!selection.toggle(ItemId(1)));
    assert!(selection.is_empty());
    assert!(selection.is_active());
}

#[test]
fn test_select_all_clear_and_exit() {
    let visible = vec![row(1, "a.txt"), row(2, "b.txt"), row(3, "c.txt")];
    let mut selection = SelectionSet::new();

    selection.select_all(&visible);
    assert_eq!(selection.ids(), vec![ItemId(1), ItemId(2), ItemId(3)]);

    selection.clear();
    assert!(selection.is_empty());
    assert!(selection.is_active());

    selection.toggle(ItemId(2));
    selection.exit();
    assert!(selection.is_empty());
    assert!(!selection.is_active());
}

#[test]
fn test_retain_visible_drops_stale_ids() {
    let mut selection = SelectionSet::new();
    selection.toggle(ItemId(1));
    selection.toggle(ItemId(2));

    selection.retain_visible(&[row(2, "b.txt")]);
    assert_eq!(selection.ids(), vec![ItemId(2)]);
}

#[test]
fn test_cursor_moves_and_clamps() {
    let visible = vec![row(1, "a.txt"), row(2, "b.txt"), row(3, "c.txt")];
    let mut cursor = Cursor::default();
    assert!(cursor.current(&visible).is_none());

    cursor.next(visible.len());
    assert_eq!(cursor.index(), Some(0));
    cursor.prev(visible.len());
    assert_eq!(cursor.index(), Some(0));

    cursor.last(visible.len());
    cursor.next(visible.len());
    assert_eq!(cursor.current(&visible).map(|r| r.id), Some(ItemId(3)));

    cursor.clamp(1);
    assert_eq!(cursor.index(), Some(0));
    cursor.clamp(0);
    assert_eq!(cursor.index(), None);
}

#[test]
fn test_navigate_into_only_accepts_folders() {
    let mut nav = Navigator::new();
    nav.navigate_into(&folder(1, "Scores")).unwrap();
    assert_eq!(nav.current_path(), &VirtualPath::parse("Scores"));

    let err = nav.navigate_into(&file(2, "Scores/a.pdf")).unwrap_err();
    assert_eq!(err, NavError::NotAFolder("Scores/a.pdf".into()));
    assert_eq!(nav.current_path(), &VirtualPath::parse("Scores"));
}

#[test]
fn test_navigate_up_stops_at_root() {
    let mut nav = Navigator::at("Scores/2024".into());
    assert!(nav.navigate_up());
    assert!(nav.navigate_up());
    assert!(nav.current_path().is_root());
    assert!(!nav.navigate_up());
}

#[test]
fn test_breadcrumbs_and_jumps() {
    let mut nav = Navigator::at("Scores/2024/Spring".into());
    let crumbs: Vec<String> = nav.breadcrumbs().into_iter().map(|c| c.name).collect();
    assert_eq!(crumbs, vec!["Home", "Scores", "2024", "Spring"]);

    assert_eq!(
        nav.navigate_to_breadcrumb(&"Archive".into()),
        Err(NavError::NotOnPath("Archive".into()))
    );
    nav.navigate_to_breadcrumb(&"Scores".into()).unwrap();
    assert_eq!(nav.current_path(), &VirtualPath::parse("Scores"));

    let err: crate::ops::OpsError = NavError::NotOnPath("x".into()).into();
    assert!(matches!(err, crate::ops::OpsError::InvalidTarget(_)));
}

#[test]
fn test_navigator_follows_relocation_and_removal() {
    let mut nav = Navigator::at("Scores/2024".into());
    nav.rebase(&"Scores".into(), &"Archive/Scores".into());
    assert_eq!(nav.current_path(), &VirtualPath::parse("Archive/Scores/2024"));

    nav.leave(&"Archive/Scores".into());
    assert_eq!(nav.current_path(), &VirtualPath::parse("Archive"));
}

#[test]
fn test_drag_hover_only_on_folders() {
    let mut drag = DragState::default();
    drag.begin(ItemRef::file("song.mp3"));

    drag.hover(&ItemRef::file("other.mp3"));
    assert!(matches!(drag, DragState::Dragging { .. }));

    drag.hover(&ItemRef::folder("Archive"));
    assert!(matches!(drag, DragState::HoveringTarget { .. }));

    drag.leave();
    assert!(matches!(drag, DragState::Dragging { .. }));
}

#[test]
fn test_drop_resolution() {
    let mut drag = DragState::default();
    assert!(matches!(
        drag.drop_on(&ItemRef::folder("Archive")),
        DropOutcome::Rejected(_)
    ));

    drag.begin(ItemRef::file("Scores/a.pdf"));
    assert_eq!(drag.drop_on(&ItemRef::folder("Scores")), DropOutcome::NoOp);
    assert_eq!(drag, DragState::Idle);

    drag.begin(ItemRef::file("Scores/a.pdf"));
    assert!(matches!(
        drag.drop_on(&ItemRef::file("b.pdf")),
        DropOutcome::Rejected(_)
    ));

    drag.begin(ItemRef::folder("Scores"));
    assert!(matches!(
        drag.drop_on(&ItemRef::folder("Scores")),
        DropOutcome::Rejected(_)
    ));
    drag.begin(ItemRef::folder("Scores"));
    assert!(matches!(
        drag.drop_on(&ItemRef::folder("Scores/2024")),
        DropOutcome::Rejected(_)
    ));

    drag.begin(ItemRef::folder("Scores"));
    assert_eq!(
        drag.drop_on(&ItemRef::folder("Archive")),
        DropOutcome::Move {
            item: ItemRef::folder("Scores"),
            destination: "Archive".into(),
        }
    );
    assert!(matches!(drag, DragState::Dropped { .. }));
    assert!(!drag.is_dragging());
    drag.reset();
    assert!(drag.dragged_item().is_none());
}
