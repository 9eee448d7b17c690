//! Path tree for unresolved updates.
//!
//! The update-tracking API reports unresolved changes as a flat list of
//! `(path, metadata)` pairs where `path` is a slash-separated hierarchy
//! key (`ARCHIVE-SUB/fond/opus/case`). [`UpdateForest`] folds that list
//! into a nested tree keyed by path segment so the view layer can render
//! a collapsible outline.
//!
//! Structure is deterministic regardless of input order: two paths that
//! share a prefix share the ancestor nodes, and every node carries its
//! own full path as a stable key; there is no per-render identifier and
//! no side lookup table. A node holds metadata iff some input path
//! terminates exactly at it; nodes created only as waypoints for a deeper
//! path have none.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Change metadata attached to an unresolved record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMeta {
    /// Modification timestamp reported by the upstream archive.
    pub modified: String,
    /// When the user last resolved this record, if ever. The service
    /// sends an empty string for "never"; [`UpdateMeta::last_resolved`]
    /// normalizes that to `None`.
    #[serde(default)]
    pub last_resolved: Option<String>,
}

impl UpdateMeta {
    /// Create metadata with an optional last-resolved timestamp.
    #[must_use]
    pub fn new(modified: impl Into<String>, last_resolved: Option<String>) -> Self {
        Self {
            modified: modified.into(),
            last_resolved,
        }
    }

    /// Last-resolved timestamp with empty strings treated as absent.
    #[must_use]
    pub fn last_resolved(&self) -> Option<&str> {
        self.last_resolved.as_deref().filter(|s| !s.is_empty())
    }
}

/// One `(path, metadata)` pair from an `unresolved` response.
///
/// The wire shape is a two-element JSON array, `[path, meta]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, UpdateMeta)", into = "(String, UpdateMeta)")]
pub struct PathEntry {
    /// Slash-separated hierarchy key.
    pub path: String,
    /// Change metadata for the record at `path`.
    pub meta: UpdateMeta,
}

impl PathEntry {
    /// Create an entry from a path and its metadata.
    #[must_use]
    pub fn new(path: impl Into<String>, meta: UpdateMeta) -> Self {
        Self {
            path: path.into(),
            meta,
        }
    }
}

impl From<(String, UpdateMeta)> for PathEntry {
    fn from((path, meta): (String, UpdateMeta)) -> Self {
        Self { path, meta }
    }
}

impl From<PathEntry> for (String, UpdateMeta) {
    fn from(entry: PathEntry) -> Self {
        (entry.path, entry.meta)
    }
}

/// A node in the unresolved-updates tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateNode {
    /// Full slash-joined path from the root to this node.
    pub full_path: String,
    /// Metadata if an input entry terminates exactly here.
    pub meta: Option<UpdateMeta>,
    /// Child nodes keyed by segment name, in deterministic order.
    pub children: BTreeMap<String, UpdateNode>,
}

impl UpdateNode {
    fn new(full_path: String) -> Self {
        Self {
            full_path,
            meta: None,
            children: BTreeMap::new(),
        }
    }

    /// True when no input path strictly extends this node's path.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, self included.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.values().map(UpdateNode::subtree_len).sum::<usize>()
    }
}

/// Nested view over a flat list of [`PathEntry`] values.
///
/// Rebuilt from scratch on every refresh of the unresolved-updates view;
/// never mutated incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateForest {
    /// Top-level nodes keyed by first path segment (the branch key).
    pub roots: BTreeMap<String, UpdateNode>,
}

impl UpdateForest {
    /// Build a forest from a flat entry list. Input order is irrelevant
    /// to the result; duplicate paths keep the later entry's metadata
    /// (last write wins, matching the service contract).
    #[must_use]
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a PathEntry>,
    {
        let mut forest = Self::default();
        for entry in entries {
            forest.insert(entry);
        }
        forest
    }

    /// Insert one entry, creating waypoint nodes as needed and attaching
    /// metadata at the terminal segment.
    pub fn insert(&mut self, entry: &PathEntry) {
        let mut segments = entry.path.split('/').filter(|s| !s.is_empty());
        let Some(head) = segments.next() else {
            return;
        };
        let mut node = self
            .roots
            .entry(head.to_owned())
            .or_insert_with(|| UpdateNode::new(head.to_owned()));
        for segment in segments {
            let child_path = format!("{}/{}", node.full_path, segment);
            node = node
                .children
                .entry(segment.to_owned())
                .or_insert_with(|| UpdateNode::new(child_path));
        }
        node.meta = Some(entry.meta.clone());
    }

    /// True when the forest has no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total node count across all roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.values().map(UpdateNode::subtree_len).sum()
    }

    /// Look up a node by its full path.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&UpdateNode> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut node = self.roots.get(segments.next()?)?;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// True when a node exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Full paths of all leaf nodes, in deterministic order.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for root in self.roots.values() {
            collect_leaves(root, &mut out);
        }
        out
    }
}

fn collect_leaves<'a>(node: &'a UpdateNode, out: &mut Vec<&'a str>) {
    if node.is_leaf() {
        out.push(&node.full_path);
    } else {
        for child in node.children.values() {
            collect_leaves(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(modified: &str) -> UpdateMeta {
        UpdateMeta::new(modified, None)
    }

    fn entry(path: &str, modified: &str) -> PathEntry {
        PathEntry::new(path, meta(modified))
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        let forest = UpdateForest::from_entries(&[]);
        assert!(forest.is_empty());
        assert_eq!(forest.len(), 0);
        assert!(forest.leaf_paths().is_empty());
    }

    #[test]
    fn nested_entries_share_ancestors() {
        let entries = vec![entry("A-1/f1", "2024-01-01"), entry("A-1/f1/o1", "2024-01-02")];
        let forest = UpdateForest::from_entries(&entries);

        let root = forest.find("A-1").unwrap();
        assert!(root.meta.is_none(), "waypoint root must carry no meta");
        assert_eq!(root.children.len(), 1);

        let f1 = forest.find("A-1/f1").unwrap();
        assert_eq!(f1.meta.as_ref().unwrap().modified, "2024-01-01");
        assert!(!f1.is_leaf(), "f1 has a child and is not a leaf");

        let o1 = forest.find("A-1/f1/o1").unwrap();
        assert_eq!(o1.meta.as_ref().unwrap().modified, "2024-01-02");
        assert!(o1.is_leaf());
    }

    #[test]
    fn single_segment_path_is_direct_root_child() {
        let entries = vec![entry("A-1", "2024-01-01")];
        let forest = UpdateForest::from_entries(&entries);
        let root = forest.find("A-1").unwrap();
        assert!(root.is_leaf());
        assert!(root.meta.is_some());
        assert_eq!(forest.len(), 1);
    }

    #[test]
    fn duplicate_path_keeps_last_metadata() {
        let entries = vec![entry("A-1/f1", "m1"), entry("A-1/f1", "m2")];
        let forest = UpdateForest::from_entries(&entries);
        let node = forest.find("A-1/f1").unwrap();
        assert_eq!(node.meta.as_ref().unwrap().modified, "m2");
        // No duplicate node was created.
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn structure_is_order_independent() {
        let forward = vec![
            entry("A-1/f1", "m1"),
            entry("A-1/f1/o1", "m2"),
            entry("A-1/f2", "m3"),
            entry("B-2/f9/o3/c7", "m4"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(
            UpdateForest::from_entries(&forward),
            UpdateForest::from_entries(&reversed)
        );
    }

    #[test]
    fn leaves_are_paths_with_no_extension() {
        let entries = vec![
            entry("A-1/f1", "m1"),
            entry("A-1/f1/o1", "m2"),
            entry("A-1/f2", "m3"),
        ];
        let forest = UpdateForest::from_entries(&entries);
        assert_eq!(forest.leaf_paths(), vec!["A-1/f1/o1", "A-1/f2"]);
    }

    #[test]
    fn every_input_path_becomes_a_node() {
        let entries = vec![
            entry("A-1/f1", "m1"),
            entry("A-1/f1/o1", "m2"),
            entry("B-2", "m3"),
        ];
        let forest = UpdateForest::from_entries(&entries);
        for e in &entries {
            let node = forest.find(&e.path).unwrap();
            assert_eq!(node.full_path, e.path);
            assert!(node.meta.is_some(), "terminating path {} must carry meta", e.path);
        }
    }

    #[test]
    fn find_misses_unknown_and_partial_paths() {
        let forest = UpdateForest::from_entries(&[entry("A-1/f1/o1", "m")]);
        assert!(forest.contains("A-1/f1"));
        assert!(!forest.contains("A-1/f2"));
        assert!(!forest.contains("C-9"));
        assert!(!forest.contains("A-1/f1/o1/c1"));
    }

    #[test]
    fn waypoint_node_full_path_is_reconstructed() {
        let forest = UpdateForest::from_entries(&[entry("A-1/f1/o1/c1", "m")]);
        assert_eq!(forest.find("A-1/f1").unwrap().full_path, "A-1/f1");
        assert_eq!(forest.find("A-1/f1/o1").unwrap().full_path, "A-1/f1/o1");
    }

    #[test]
    fn children_order_is_deterministic() {
        let forest = UpdateForest::from_entries(&[
            entry("A-1/f9", "m"),
            entry("A-1/f1", "m"),
            entry("A-1/f5", "m"),
        ]);
        let keys: Vec<&String> = forest.find("A-1").unwrap().children.keys().collect();
        assert_eq!(keys, vec!["f1", "f5", "f9"]);
    }

    #[test]
    fn path_entry_decodes_from_wire_tuple() {
        let json = r#"[["A-1/f1", {"modified": "2024-05-01", "last_resolved": ""}]]"#;
        let entries: Vec<PathEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "A-1/f1");
        assert_eq!(entries[0].meta.modified, "2024-05-01");
        // Empty string normalizes to absent.
        assert_eq!(entries[0].meta.last_resolved(), None);
    }

    #[test]
    fn path_entry_decodes_missing_last_resolved() {
        let json = r#"[["A-1", {"modified": "2024-05-01"}]]"#;
        let entries: Vec<PathEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].meta.last_resolved, None);
    }

    #[test]
    fn meta_last_resolved_passes_real_values() {
        let m = UpdateMeta::new("2024-05-02", Some("2024-04-30".to_owned()));
        assert_eq!(m.last_resolved(), Some("2024-04-30"));
    }
}
