//! Expansion state for the collapsible updates tree.
//!
//! The view rebuilds its tree from scratch on every data refresh, so
//! which nodes are open is tracked here, keyed by full path string, and
//! carried across rebuilds. After a rebuild the state is pruned against
//! the new forest: a path that vanished (for example because its record
//! was resolved) is silently dropped rather than treated as an error.

use std::collections::HashSet;

use crate::updates::tree::UpdateForest;

/// Set of expanded node paths, owned by the view model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    open: HashSet<String>,
}

impl ExpansionState {
    /// Empty state: everything collapsed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the node at `path` is expanded.
    #[must_use]
    pub fn is_expanded(&self, path: &str) -> bool {
        self.open.contains(path)
    }

    /// Flip the state of `path`. Returns the new state (`true` = open).
    pub fn toggle(&mut self, path: &str) -> bool {
        if self.open.remove(path) {
            false
        } else {
            self.open.insert(path.to_owned());
            true
        }
    }

    /// Expand `path` unconditionally.
    pub fn expand(&mut self, path: &str) {
        self.open.insert(path.to_owned());
    }

    /// Collapse `path` unconditionally.
    pub fn collapse(&mut self, path: &str) {
        self.open.remove(path);
    }

    /// Collapse everything.
    pub fn clear(&mut self) {
        self.open.clear();
    }

    /// Drop records for paths no longer present in `forest`.
    pub fn prune(&mut self, forest: &UpdateForest) {
        self.open.retain(|path| forest.contains(path));
    }

    /// Number of expanded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// True when nothing is expanded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Iterate over expanded paths (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.open.iter().map(String::as_str)
    }
}
