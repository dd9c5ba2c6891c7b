//! Display order, visibility and widths of declared columns
//!
//! The permutation maps display slots to logical indices (positions in the
//! declared list) and covers hidden columns too; hidden columns simply keep
//! their slot and are skipped when display positions are counted.

use crate::config::{DataTableConfig, ViewportConfig};
use crate::datatable::size::{ColumnSize, DEFAULT_COLUMN_WIDTH};
use crate::datatable::{ColumnInfo, ColumnSpec, HIDDEN_KEY_COLUMN};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ColumnArrangement {
    declared: Vec<ColumnSpec>,
    permutation: Vec<usize>,
    width_overrides: HashMap<String, f64>,
    hidden_overrides: HashMap<String, bool>,
    calculated_widths: HashMap<String, f64>,
    container_width: f64,
    settle: Duration,
    settle_until: Option<Instant>,
    pending: Option<Vec<ColumnSpec>>,
    allow_reordering: bool,
    allow_resizing: bool,
    freeze_columns: usize,
}

impl ColumnArrangement {
    pub fn new(config: &DataTableConfig, viewport: &ViewportConfig) -> Self {
        ColumnArrangement {
            declared: Vec::new(),
            permutation: Vec::new(),
            width_overrides: HashMap::new(),
            hidden_overrides: HashMap::new(),
            calculated_widths: HashMap::new(),
            container_width: 0.0,
            settle: viewport.reorder_settle,
            settle_until: None,
            pending: None,
            allow_reordering: config.allow_column_reordering,
            allow_resizing: config.allow_column_resizing,
            freeze_columns: config.freeze_columns.unwrap_or(0),
        }
    }

    /// Accept a new column declaration
    ///
    /// While a reorder is settling the declaration is parked and applied by
    /// [`ColumnArrangement::settle`].
    pub fn declare(&mut self, columns: Vec<ColumnSpec>, now: Instant) {
        if self.is_settling(now) {
            debug!(columns = columns.len(), "declaration deferred until reorder settles");
            self.pending = Some(columns);
            return;
        }
        self.apply(columns);
    }

    pub fn is_settling(&self, now: Instant) -> bool {
        self.settle_until.is_some_and(|until| now < until)
    }

    /// Close the settle window if it has passed; true if a parked
    /// declaration was applied
    pub fn settle(&mut self, now: Instant) -> bool {
        if self.is_settling(now) {
            return false;
        }
        self.settle_until = None;
        match self.pending.take() {
            Some(columns) => {
                self.apply(columns);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, mut columns: Vec<ColumnSpec>) {
        columns.retain(|c| c.name != HIDDEN_KEY_COLUMN);
        columns.sort_by_key(|c| c.order);

        let old_names: Vec<&str> = self.declared.iter().map(|c| c.name.as_str()).collect();
        let new_names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let same_set = old_names.len() == new_names.len()
            && old_names.iter().collect::<HashSet<_>>() == new_names.iter().collect::<HashSet<_>>();

        if !same_set {
            debug!(columns = columns.len(), "column structure changed, arrangement reset");
            self.permutation = (0..columns.len()).collect();
            self.width_overrides.clear();
            self.hidden_overrides.clear();
        } else if old_names != new_names {
            let index_of: HashMap<&str, usize> =
                new_names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
            self.permutation = self
                .permutation
                .iter()
                .map(|&logical| index_of[old_names[logical]])
                .collect();
        }

        self.declared = columns;
    }

    pub fn declared(&self) -> &[ColumnSpec] {
        &self.declared
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        match self.hidden_overrides.get(name) {
            Some(hidden) => *hidden,
            None => self
                .declared
                .iter()
                .find(|c| c.name == name)
                .is_some_and(|c| c.hidden),
        }
    }

    /// User hide/show; false for unknown columns
    pub fn set_hidden(&mut self, name: &str, hidden: bool) -> bool {
        if !self.declared.iter().any(|c| c.name == name) {
            return false;
        }
        self.hidden_overrides.insert(name.to_string(), hidden);
        true
    }

    /// Logical indices of visible columns in display order
    fn visible_logical(&self) -> Vec<usize> {
        self.permutation
            .iter()
            .copied()
            .filter(|&l| !self.is_hidden(&self.declared[l].name))
            .collect()
    }

    pub fn visible_columns(&self) -> Vec<&ColumnSpec> {
        self.visible_logical()
            .into_iter()
            .map(|l| &self.declared[l])
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.visible_logical().len()
    }

    pub fn column_at(&self, display_pos: usize) -> Option<&ColumnSpec> {
        let logical = *self.visible_logical().get(display_pos)?;
        self.declared.get(logical)
    }

    pub fn display_position(&self, name: &str) -> Option<usize> {
        self.visible_logical()
            .iter()
            .position(|&l| self.declared[l].name == name)
    }

    /// Move one visible column; hidden columns stay in their slots
    pub fn reorder(&mut self, from: usize, to: usize, now: Instant) -> bool {
        if !self.allow_reordering {
            return false;
        }
        let slots: Vec<usize> = self
            .permutation
            .iter()
            .enumerate()
            .filter(|&(_, &l)| !self.is_hidden(&self.declared[l].name))
            .map(|(slot, _)| slot)
            .collect();
        if from >= slots.len() || to >= slots.len() {
            return false;
        }

        let mut visible: Vec<usize> = slots.iter().map(|&s| self.permutation[s]).collect();
        let moved = visible.remove(from);
        visible.insert(to, moved);
        for (slot, logical) in slots.into_iter().zip(visible) {
            self.permutation[slot] = logical;
        }

        self.settle_until = Some(now + self.settle);
        debug!(from, to, "column reordered");
        true
    }

    /// Set a user width for the column at `display_pos`
    pub fn resize(&mut self, display_pos: usize, width: f64) -> bool {
        if !self.allow_resizing || !width.is_finite() || width <= 0.0 {
            return false;
        }
        let Some(name) = self.column_at(display_pos).map(|c| c.name.clone()) else {
            return false;
        };
        self.width_overrides.insert(name, width);
        true
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.container_width = width;
    }

    /// Widths calculated by the server, used for fit-content columns
    pub fn set_calculated_widths(&mut self, columns: &[ColumnInfo]) {
        for info in columns {
            if let Some(px) = info.width.as_deref().and_then(ColumnSize::parse) {
                let px = px.to_pixels(self.container_width, None);
                self.calculated_widths.insert(info.name.clone(), px);
            }
        }
    }

    /// User override, then declared width, then the default
    pub fn width_of(&self, spec: &ColumnSpec) -> f64 {
        if let Some(w) = self.width_overrides.get(&spec.name) {
            return *w;
        }
        spec.width
            .as_deref()
            .and_then(ColumnSize::parse)
            .map(|size| {
                size.to_pixels(
                    self.container_width,
                    self.calculated_widths.get(&spec.name).copied(),
                )
            })
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn width_at(&self, display_pos: usize) -> Option<f64> {
        self.column_at(display_pos).map(|c| self.width_of(c))
    }

    /// Widths per display position
    pub fn widths(&self) -> Vec<f64> {
        self.visible_columns()
            .into_iter()
            .map(|c| self.width_of(c))
            .collect()
    }

    /// Number of leading display columns that stay pinned
    pub fn frozen_count(&self) -> usize {
        self.freeze_columns.min(self.visible_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::ColType;
    use proptest::prelude::*;

    fn specs(names: &[&str]) -> Vec<ColumnSpec> {
        names
            .iter()
            .map(|n| ColumnSpec::new(*n, ColType::Text))
            .collect()
    }

    fn arrangement(names: &[&str]) -> ColumnArrangement {
        let mut a = ColumnArrangement::new(&DataTableConfig::default(), &ViewportConfig::default());
        a.declare(specs(names), Instant::now());
        a
    }

    fn visible_names(a: &ColumnArrangement) -> Vec<String> {
        a.visible_columns().iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn test_reorder_then_metadata_change_keeps_permutation() {
        let t0 = Instant::now();
        let mut a = arrangement(&["a", "b", "c"]);
        assert!(a.reorder(0, 2, t0));
        assert_eq!(visible_names(&a), vec!["b", "c", "a"]);
        a.resize(2, 220.0);

        let mut changed = specs(&["a", "b", "c"]);
        changed[1].header = Some("Bee".into());
        a.declare(changed, t0 + Duration::from_secs(1));

        assert_eq!(visible_names(&a), vec!["b", "c", "a"]);
        assert_eq!(a.column_at(0).unwrap().title(), "Bee");
        assert_eq!(a.width_at(2), Some(220.0));
    }

    #[test]
    fn test_structural_change_resets() {
        let t0 = Instant::now();
        let mut a = arrangement(&["a", "b", "c"]);
        a.reorder(0, 2, t0);
        a.resize(0, 300.0);
        a.set_hidden("c", true);

        a.declare(specs(&["a", "b", "c", "d"]), t0 + Duration::from_secs(1));
        assert_eq!(a.permutation(), &[0, 1, 2, 3]);
        assert_eq!(visible_names(&a), vec!["a", "b", "c", "d"]);
        assert_eq!(a.width_at(0), Some(DEFAULT_COLUMN_WIDTH));
    }

    #[test]
    fn test_removed_column_resets() {
        let t0 = Instant::now();
        let mut a = arrangement(&["a", "b", "c"]);
        a.reorder(0, 2, t0);
        // Display order is now b, c, a
        a.resize(1, 300.0);
        a.set_hidden("a", true);

        a.declare(specs(&["a", "c"]), t0 + Duration::from_secs(1));
        assert_eq!(a.permutation(), &[0, 1]);
        assert_eq!(visible_names(&a), vec!["a", "c"]);
        assert_eq!(a.widths(), vec![DEFAULT_COLUMN_WIDTH, DEFAULT_COLUMN_WIDTH]);
    }

    #[test]
    fn test_same_set_new_order_remaps_by_name() {
        let t0 = Instant::now();
        let mut a = arrangement(&["a", "b", "c"]);
        a.reorder(2, 0, t0);
        assert_eq!(visible_names(&a), vec!["c", "a", "b"]);

        a.declare(specs(&["c", "b", "a"]), t0 + Duration::from_secs(1));
        assert_eq!(visible_names(&a), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_declaration_during_settle_is_deferred() {
        let t0 = Instant::now();
        let mut a = arrangement(&["a", "b"]);
        a.reorder(0, 1, t0);

        a.declare(specs(&["a", "b", "c"]), t0 + Duration::from_millis(10));
        assert_eq!(a.declared().len(), 2);
        assert!(!a.settle(t0 + Duration::from_millis(50)));

        assert!(a.settle(t0 + Duration::from_millis(150)));
        assert_eq!(a.declared().len(), 3);
        assert_eq!(visible_names(&a), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_hidden_columns_keep_slots_on_reorder() {
        let t0 = Instant::now();
        let mut a = arrangement(&["a", "b", "c", "d"]);
        a.set_hidden("b", true);
        assert_eq!(visible_names(&a), vec!["a", "c", "d"]);

        // Move "a" to the end of the visible sequence
        a.reorder(0, 2, t0);
        assert_eq!(visible_names(&a), vec!["c", "d", "a"]);
        // Slot 1 still holds "b"
        assert_eq!(a.permutation()[1], 1);
        assert_eq!(a.display_position("a"), Some(2));
        assert_eq!(a.display_position("b"), None);
    }

    #[test]
    fn test_resize_targets_name_not_header() {
        let mut a = ColumnArrangement::new(&DataTableConfig::default(), &ViewportConfig::default());
        let mut cols = specs(&["x", "y"]);
        cols[0].header = Some("Same".into());
        cols[1].header = Some("Same".into());
        a.declare(cols, Instant::now());

        assert!(a.resize(1, 90.0));
        assert_eq!(a.widths(), vec![DEFAULT_COLUMN_WIDTH, 90.0]);
        assert!(!a.resize(5, 90.0));
        assert!(!a.resize(0, -1.0));
    }

    #[test]
    fn test_width_precedence_and_units() {
        let mut a = ColumnArrangement::new(&DataTableConfig::default(), &ViewportConfig::default());
        let mut cols = specs(&["px", "rem", "frac", "fit", "none"]);
        cols[0].width = Some("Px:120".into());
        cols[1].width = Some("Rem:10".into());
        cols[2].width = Some("Fraction:0.5".into());
        cols[3].width = Some("Fit".into());
        a.declare(cols, Instant::now());
        a.set_container_width(1000.0);
        a.set_calculated_widths(&[ColumnInfo {
            name: "fit".into(),
            width: Some("Px:96".into()),
        }]);

        assert_eq!(a.widths(), vec![120.0, 160.0, 500.0, 96.0, DEFAULT_COLUMN_WIDTH]);
        a.resize(0, 300.0);
        assert_eq!(a.width_at(0), Some(300.0));
    }

    #[test]
    fn test_gates_and_frozen_count() {
        let config = DataTableConfig {
            allow_column_reordering: false,
            allow_column_resizing: false,
            freeze_columns: Some(5),
            ..Default::default()
        };
        let mut a = ColumnArrangement::new(&config, &ViewportConfig::default());
        a.declare(specs(&["a", "b"]), Instant::now());
        assert!(!a.reorder(0, 1, Instant::now()));
        assert!(!a.resize(0, 100.0));
        assert_eq!(a.frozen_count(), 2);
    }

    #[test]
    fn test_hidden_key_never_declared() {
        let a = arrangement(&["id", HIDDEN_KEY_COLUMN]);
        assert_eq!(visible_names(&a), vec!["id"]);
    }

    proptest! {
        #[test]
        fn prop_reorders_preserve_permutation(
            hidden in prop::collection::vec(any::<bool>(), 6),
            moves in prop::collection::vec((0usize..6, 0usize..6), 0..20),
        ) {
            let names = ["a", "b", "c", "d", "e", "f"];
            let mut a = arrangement(&names);
            for (name, h) in names.iter().zip(&hidden) {
                a.set_hidden(name, *h);
            }
            let t0 = Instant::now();
            for (from, to) in moves {
                a.reorder(from, to, t0);
            }

            let mut sorted = a.permutation().to_vec();
            sorted.sort();
            prop_assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);

            for (slot, h) in hidden.iter().enumerate() {
                if *h {
                    prop_assert_eq!(a.permutation()[slot], slot);
                }
            }
            prop_assert_eq!(a.visible_count(), hidden.iter().filter(|h| !**h).count());
        }
    }
}
