use crate::models::Item;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    UpdatedAt,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Name,
            direction: SortDirection::Asc,
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn compare(a: &Item, b: &Item, spec: SortSpec) -> Ordering {
    match (a, b) {
        (Item::Folder(_), Item::File(_)) => Ordering::Less,
        (Item::File(_), Item::Folder(_)) => Ordering::Greater,
        // Folders only ever sort by name; the direction follows the name column.
        (Item::Folder(x), Item::Folder(y)) => {
            let ordering = compare_names(&x.name, &y.name);
            if spec.field == SortField::Name {
                spec.direction.apply(ordering)
            } else {
                ordering
            }
        }
        (Item::File(x), Item::File(y)) => {
            let ordering = match spec.field {
                SortField::Name => compare_names(&x.name, &y.name),
                SortField::UpdatedAt => x.updated_at.cmp(&y.updated_at),
                SortField::Size => x.size.cmp(&y.size),
            };
            spec.direction.apply(ordering)
        }
    }
}

/// Stable in-place sort: folders first, then files by `spec`.
///
/// `Desc` reverses the comparator rather than the output, so items with equal
/// keys keep their prior relative order in both directions.
pub fn sort_items(items: &mut [Item], spec: SortSpec) {
    items.sort_by(|a, b| compare(a, b, spec));
}

/// Sort a folder level and every loaded level beneath it.
pub fn sort_recursive(items: &mut [Item], spec: SortSpec) {
    sort_items(items, spec);
    for item in items.iter_mut() {
        if let Item::Folder(folder) = item {
            if let Some(children) = folder.children.as_mut() {
                sort_recursive(children, spec);
            }
        }
    }
}
