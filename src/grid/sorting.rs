//! Header-click sort state

use crate::datatable::{ColumnSpec, SortDirection, SortKey, SortOrder};

/// Single-column sort, cycled by header clicks: asc, desc, none
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortState {
    keys: Vec<SortKey>,
    initialized: bool,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Seed from the first sortable column that declares a direction
    ///
    /// Only the first call has any effect; returns true if it set a sort.
    pub fn initialize_from(&mut self, columns: &[ColumnSpec]) -> bool {
        if self.initialized {
            return false;
        }
        self.initialized = true;
        let seeded = columns.iter().find_map(|c| {
            let direction = match c.sort_direction {
                SortDirection::Asc => SortOrder::Asc,
                SortDirection::Desc => SortOrder::Desc,
                SortDirection::None => return None,
            };
            c.sortable.then(|| SortKey {
                column: c.name.clone(),
                direction,
            })
        });
        match seeded {
            Some(key) => {
                self.keys = vec![key];
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, column: &str) {
        self.initialized = true;
        let current = self
            .keys
            .iter()
            .find(|k| k.column == column)
            .map(|k| k.direction);
        self.keys = match current {
            None => vec![SortKey::asc(column)],
            Some(SortOrder::Asc) => vec![SortKey::desc(column)],
            Some(SortOrder::Desc) => Vec::new(),
        };
    }

    pub fn direction_of(&self, column: &str) -> SortDirection {
        match self.keys.iter().find(|k| k.column == column) {
            Some(SortKey {
                direction: SortOrder::Asc,
                ..
            }) => SortDirection::Asc,
            Some(SortKey {
                direction: SortOrder::Desc,
                ..
            }) => SortDirection::Desc,
            None => SortDirection::None,
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
