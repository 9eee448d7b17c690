//! Flattening of the update forest into visible rows.
//!
//! The collapsible outline is rendered from a flat row list: each row
//! knows its node, depth, and whether it is the last sibling at its
//! level (for branch connectors). Children contribute rows only when
//! their parent is expanded, so collapse/expand is purely a function of
//! the forest and the [`ExpansionState`], with no per-row state.

use crate::updates::expansion::ExpansionState;
use crate::updates::tree::{UpdateForest, UpdateNode};

/// One visible row of the rendered tree.
#[derive(Debug, Clone, Copy)]
pub struct FlatRow<'a> {
    /// The tree node this row displays.
    pub node: &'a UpdateNode,
    /// Nesting depth; roots are at 0.
    pub depth: usize,
    /// Whether this node is currently expanded.
    pub expanded: bool,
    /// True when no sibling follows at the same level.
    pub last_sibling: bool,
}

impl FlatRow<'_> {
    /// Last path segment, the label shown for the row.
    #[must_use]
    pub fn label(&self) -> &str {
        self.node
            .full_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.node.full_path)
    }

    /// Fold indicator: open/closed glyph for expandable rows, blank for
    /// leaves, which render without an expand affordance.
    #[must_use]
    pub fn fold_glyph(&self) -> &'static str {
        if self.node.is_leaf() {
            "  "
        } else if self.expanded {
            "▼ "
        } else {
            "▶ "
        }
    }

    /// Branch connector for the row's depth/sibling position.
    #[must_use]
    pub fn connector(&self) -> &'static str {
        if self.depth == 0 {
            ""
        } else if self.last_sibling {
            "└─ "
        } else {
            "├─ "
        }
    }
}

/// Flatten the forest into visible rows, honoring expansion state.
///
/// An empty forest produces an empty row list.
#[must_use]
pub fn flatten<'a>(forest: &'a UpdateForest, expansion: &ExpansionState) -> Vec<FlatRow<'a>> {
    let mut rows = Vec::new();
    let root_count = forest.roots.len();
    for (i, root) in forest.roots.values().enumerate() {
        push_visible(root, 0, i + 1 == root_count, expansion, &mut rows);
    }
    rows
}

fn push_visible<'a>(
    node: &'a UpdateNode,
    depth: usize,
    last_sibling: bool,
    expansion: &ExpansionState,
    rows: &mut Vec<FlatRow<'a>>,
) {
    let expanded = expansion.is_expanded(&node.full_path);
    rows.push(FlatRow {
        node,
        depth,
        expanded,
        last_sibling,
    });
    if expanded {
        let child_count = node.children.len();
        for (i, child) in node.children.values().enumerate() {
            push_visible(child, depth + 1, i + 1 == child_count, expansion, rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::tree::{PathEntry, UpdateMeta};

    fn forest(paths: &[&str]) -> UpdateForest {
        let entries: Vec<PathEntry> = paths
            .iter()
            .map(|p| PathEntry::new(*p, UpdateMeta::new("m", None)))
            .collect();
        UpdateForest::from_entries(&entries)
    }

    fn paths<'a>(rows: &[FlatRow<'a>]) -> Vec<&'a str> {
        rows.iter().map(|r| r.node.full_path.as_str()).collect()
    }

    #[test]
    fn empty_forest_flattens_to_nothing() {
        let empty = UpdateForest::default();
        let rows = flatten(&empty, &ExpansionState::new());
        assert!(rows.is_empty());
    }

    #[test]
    fn collapsed_forest_shows_only_roots() {
        let f = forest(&["A-1/f1/o1", "B-2/f3"]);
        let rows = flatten(&f, &ExpansionState::new());
        assert_eq!(paths(&rows), vec!["A-1", "B-2"]);
        assert_eq!(rows[0].depth, 0);
        assert!(!rows[0].last_sibling);
        assert!(rows[1].last_sibling);
    }

    #[test]
    fn expanding_a_node_reveals_its_children_only() {
        let f = forest(&["A-1/f1/o1", "A-1/f2"]);
        let mut exp = ExpansionState::new();
        exp.expand("A-1");
        let rows = flatten(&f, &exp);
        // f1 is collapsed, so o1 stays hidden.
        assert_eq!(paths(&rows), vec!["A-1", "A-1/f1", "A-1/f2"]);

        exp.expand("A-1/f1");
        let rows = flatten(&f, &exp);
        assert_eq!(paths(&rows), vec!["A-1", "A-1/f1", "A-1/f1/o1", "A-1/f2"]);
        assert_eq!(rows[2].depth, 2);
    }

    #[test]
    fn leaf_rows_have_no_fold_affordance() {
        let f = forest(&["A-1/f1"]);
        let mut exp = ExpansionState::new();
        exp.expand("A-1");
        let rows = flatten(&f, &exp);
        assert_eq!(rows[0].fold_glyph(), "▼ ");
        assert_eq!(rows[1].fold_glyph(), "  ");
    }

    #[test]
    fn collapsed_expandable_row_shows_closed_glyph() {
        let f = forest(&["A-1/f1"]);
        let rows = flatten(&f, &ExpansionState::new());
        assert_eq!(rows[0].fold_glyph(), "▶ ");
    }

    #[test]
    fn connectors_follow_sibling_position() {
        let f = forest(&["A-1/f1", "A-1/f2"]);
        let mut exp = ExpansionState::new();
        exp.expand("A-1");
        let rows = flatten(&f, &exp);
        assert_eq!(rows[0].connector(), "");
        assert_eq!(rows[1].connector(), "├─ ");
        assert_eq!(rows[2].connector(), "└─ ");
    }

    #[test]
    fn labels_are_final_segments() {
        let f = forest(&["A-1/f1/o1"]);
        let mut exp = ExpansionState::new();
        exp.expand("A-1");
        exp.expand("A-1/f1");
        let rows = flatten(&f, &exp);
        let labels: Vec<&str> = rows.iter().map(FlatRow::label).collect();
        assert_eq!(labels, vec!["A-1", "f1", "o1"]);
    }
}
