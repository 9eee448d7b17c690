//! Elm-style state model for the terminal client.
//!
//! All display state lives in [`Model`]. Input and data events arrive as
//! [`Msg`] values; side-effects are represented as [`Cmd`] values
//! returned from the update function.
//!
//! **Design invariant:** the model is deterministic and testable: no I/O
//! happens here.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::time::Duration;

use crossterm::event::KeyEvent;

use crate::api::client::PageRequest;
use crate::api::types::{PageData, PathEntry, TranslationTask, WatchlistEntry};
use crate::core::config::PollingConfig;
use crate::core::record::{Branch, RecordPath};
use crate::updates::expansion::ExpansionState;
use crate::updates::flatten::{FlatRow, flatten};
use crate::updates::tree::UpdateForest;

// ──────────────────── screens ────────────────────

/// Top-level screens of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Record page browser with breadcrumbs and history.
    #[default]
    Page,
    /// Watched branches and their check status.
    Watchlist,
    /// Collapsible tree of unresolved updates.
    Updates,
}

impl Screen {
    /// 1-based screen number for hotkey mapping (keys `1`–`3`).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Page => 1,
            Self::Watchlist => 2,
            Self::Updates => 3,
        }
    }

    /// Resolve a 1-based number key to a screen.
    #[must_use]
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Page),
            2 => Some(Self::Watchlist),
            3 => Some(Self::Updates),
            _ => None,
        }
    }

    /// Title shown in the tab bar.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Page => "Page",
            Self::Watchlist => "Watchlist",
            Self::Updates => "Updates",
        }
    }
}

// ──────────────────── overlays ────────────────────

/// Floating surfaces that overlay the current screen.
///
/// Only one overlay can be active at a time; overlays have input
/// precedence over screen-level keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    /// Contextual key map (`?`).
    Help,
    /// Compare-version picker fed by the current page's history.
    History,
    /// Modal confirmation for mutating actions.
    Confirmation(ConfirmAction),
}

/// Actions that require modal confirmation before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    /// Resolve the record at `path`. `cascade` is set when the node has
    /// children, in which case the whole subtree is resolved; the prompt
    /// wording differs accordingly, but a prompt is shown either way.
    Resolve { path: String, cascade: bool },
    /// Stop watching a branch.
    RemoveWatch(Branch),
}

impl ConfirmAction {
    /// Prompt text for the confirmation overlay.
    #[must_use]
    pub fn prompt(&self) -> String {
        match self {
            Self::Resolve { path, cascade: true } => format!(
                "Resolve {path} and all of its subsidiary pages? This marks every update below it as acknowledged."
            ),
            Self::Resolve {
                path,
                cascade: false,
            } => format!("Resolve {path}? This marks the update as acknowledged."),
            Self::RemoveWatch(branch) => {
                format!("Stop watching {branch}? Its unresolved updates will be discarded.")
            }
        }
    }
}

// ──────────────────── notifications ────────────────────

/// Alert toast shown over the status bar.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Monotonic ID for expiry tracking.
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Maximum number of visible notification toasts.
const MAX_NOTIFICATIONS: usize = 3;

// ──────────────────── model ────────────────────

/// Complete display state for the client.
///
/// This struct is the single source of truth for the view layer. The
/// update function mutates it; the render function reads it immutably.
#[derive(Debug)]
pub struct Model {
    /// Active screen.
    pub screen: Screen,
    /// Currently active overlay, if any.
    pub active_overlay: Option<Overlay>,
    /// Terminal dimensions (columns, rows).
    pub terminal_size: (u16, u16),
    /// Count of in-flight service requests (drives the loading marker).
    pub in_flight: usize,
    /// Whether the user has requested quit.
    pub quit: bool,
    /// Active notification toasts (oldest first).
    pub notifications: Vec<Notification>,
    /// Monotonic counter for notification IDs.
    pub next_notification_id: u64,
    /// Polling policy for translation progress.
    pub polling: PollingConfig,

    // ── Page screen state ──
    /// Currently displayed page, if one has loaded.
    pub page: Option<PageData>,
    /// Cursor position in the page's child-row table.
    pub page_selected: usize,
    /// Comparison version in effect for the current page, if any.
    pub compare: Option<String>,
    /// Cursor position in the history overlay.
    pub history_selected: usize,

    // ── Watchlist screen state ──
    /// Watched branches as last fetched.
    pub watchlist: Vec<WatchlistEntry>,
    /// Cursor position in the watchlist table.
    pub watchlist_selected: usize,

    // ── Updates screen state ──
    /// Flat unresolved sets keyed by branch key; the forest is rebuilt
    /// wholesale from these after every change.
    pub unresolved: BTreeMap<String, Vec<PathEntry>>,
    /// Nested view over `unresolved`, rebuilt on every refresh.
    pub forest: UpdateForest,
    /// Which tree paths are expanded; survives rebuilds by path identity.
    pub expansion: ExpansionState,
    /// Cursor position in the flattened visible rows.
    pub updates_selected: usize,

    // ── Translation state ──
    /// Active translation tasks from the last poll.
    pub translations: Vec<TranslationTask>,
    /// Poll generation; bumping it cancels in-flight poll chains.
    pub poll_generation: u64,
}

impl Model {
    /// Create a new model with the given polling policy and terminal size.
    #[must_use]
    pub fn new(polling: PollingConfig, terminal_size: (u16, u16)) -> Self {
        Self {
            screen: Screen::default(),
            active_overlay: None,
            terminal_size,
            in_flight: 0,
            quit: false,
            notifications: Vec::new(),
            next_notification_id: 0,
            polling,
            page: None,
            page_selected: 0,
            compare: None,
            history_selected: 0,
            watchlist: Vec::new(),
            watchlist_selected: 0,
            unresolved: BTreeMap::new(),
            forest: UpdateForest::default(),
            expansion: ExpansionState::new(),
            updates_selected: 0,
            translations: Vec::new(),
            poll_generation: 0,
        }
    }

    /// Push a notification, evicting the oldest if at capacity.
    /// Returns the assigned notification ID.
    pub fn push_notification(&mut self, level: NotificationLevel, message: String) -> u64 {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push(Notification { id, level, message });
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.remove(0);
        }
        id
    }

    /// Rebuild the forest from the per-branch unresolved sets, prune the
    /// expansion state against it, and clamp the tree cursor.
    ///
    /// The previous forest is discarded wholesale; the tree is never
    /// mutated incrementally.
    pub fn rebuild_forest(&mut self) {
        let entries: Vec<&PathEntry> = self.unresolved.values().flatten().collect();
        self.forest = UpdateForest::from_entries(entries.iter().copied());
        self.expansion.prune(&self.forest);
        let visible = self.visible_rows().len();
        if visible == 0 {
            self.updates_selected = 0;
        } else if self.updates_selected >= visible {
            self.updates_selected = visible - 1;
        }
    }

    /// Visible tree rows under the current expansion state.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<FlatRow<'_>> {
        flatten(&self.forest, &self.expansion)
    }

    /// The tree row under the cursor, if any.
    #[must_use]
    pub fn selected_row(&self) -> Option<SelectedRow> {
        let rows = self.visible_rows();
        let row = rows.get(self.updates_selected)?;
        Some(SelectedRow {
            full_path: row.node.full_path.clone(),
            has_children: !row.node.is_leaf(),
            last_resolved: row
                .node
                .meta
                .as_ref()
                .and_then(|m| m.last_resolved().map(str::to_owned)),
        })
    }

    /// The watchlist entry under the cursor, if any.
    #[must_use]
    pub fn selected_watch(&self) -> Option<&WatchlistEntry> {
        self.watchlist.get(self.watchlist_selected)
    }

    /// Branch of the watchlist entry under the cursor.
    #[must_use]
    pub fn selected_branch(&self) -> Option<Branch> {
        self.selected_watch()
            .map(|w| Branch::new(w.archive.clone(), w.subarchive.clone()))
    }

    /// Total unresolved entries across all branches.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.values().map(Vec::len).sum()
    }

    /// True while any translation task reports running.
    #[must_use]
    pub fn translation_running(&self) -> bool {
        self.translations.iter().any(|t| t.running)
    }
}

/// Owned snapshot of the tree row under the cursor, used by action
/// handlers without holding a borrow of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedRow {
    pub full_path: String,
    pub has_children: bool,
    pub last_resolved: Option<String>,
}

// ──────────────────── messages ────────────────────

/// Events that drive state transitions in the model.
#[derive(Debug, Clone)]
pub enum Msg {
    /// Terminal key press event.
    Key(KeyEvent),
    /// Terminal was resized.
    Resize { cols: u16, rows: u16 },
    /// A page finished loading.
    PageLoaded(Box<PageData>),
    /// The watchlist finished loading.
    WatchlistLoaded(Vec<WatchlistEntry>),
    /// One branch's check (or resolve) returned its unresolved set.
    BranchUpdated {
        branch_key: String,
        entries: Vec<PathEntry>,
    },
    /// Every branch of a check-all settled; one combined delivery.
    AllBranchesChecked(Vec<CheckOutcome>),
    /// A watch was removed on the server.
    WatchRemoved(Branch),
    /// Translation progress arrived from a poll.
    TranslationsUpdate {
        tasks: Vec<TranslationTask>,
        generation: u64,
        attempt: u32,
    },
    /// A service call failed; surfaced as an alert, nothing retried.
    /// `tracked` is set when the originating command counted toward
    /// `in_flight`; translation calls do not, since the poll chain runs
    /// in the background.
    ApiFailure {
        context: String,
        message: String,
        tracked: bool,
    },
    /// A notification's auto-dismiss timer expired.
    NotificationExpired(u64),
}

/// Result of checking one branch during a check-all fan-out.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub branch_key: String,
    pub result: std::result::Result<Vec<PathEntry>, String>,
}

// ──────────────────── commands ────────────────────

/// Side-effects returned by the update function for the runtime to
/// execute. The update function never performs I/O directly.
#[derive(Debug, PartialEq, Eq)]
pub enum Cmd {
    /// No side-effect.
    None,
    /// Execute multiple commands.
    Batch(Vec<Self>),
    /// Fetch a record page.
    FetchPage(PageRequest),
    /// Fetch the watchlist.
    FetchWatchlist,
    /// Re-check a single branch for updates.
    CheckBranch(Branch),
    /// Check every branch concurrently; deliver one combined message
    /// after all of them settle.
    CheckAll(Vec<Branch>),
    /// Resolve a record, cascading to its subtree when `deep`.
    Resolve { path: RecordPath, deep: bool },
    /// Remove a branch from the watchlist.
    RemoveWatch(Branch),
    /// Start translating a record and begin the poll chain under the
    /// given generation.
    StartTranslation { path: RecordPath, generation: u64 },
    /// Poll translation progress after `after`; stale generations are
    /// dropped by the update function when the answer arrives.
    PollTranslations {
        generation: u64,
        attempt: u32,
        after: Duration,
    },
    /// Schedule a notification auto-dismiss after the given duration.
    ScheduleNotificationExpiry { id: u64, after: Duration },
    /// Terminate the event loop.
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::tree::UpdateMeta;

    fn entry(path: &str) -> PathEntry {
        PathEntry::new(path, UpdateMeta::new("2024-06-01", None))
    }

    fn test_model() -> Model {
        Model::new(PollingConfig::default(), (80, 24))
    }

    #[test]
    fn screen_number_round_trip() {
        for n in 1..=3 {
            assert_eq!(Screen::from_number(n).unwrap().number(), n);
        }
        assert_eq!(Screen::from_number(0), None);
        assert_eq!(Screen::from_number(4), None);
    }

    #[test]
    fn new_model_is_idle() {
        let model = test_model();
        assert_eq!(model.screen, Screen::Page);
        assert!(model.page.is_none());
        assert!(model.forest.is_empty());
        assert_eq!(model.in_flight, 0);
        assert!(!model.quit);
    }

    #[test]
    fn push_notification_evicts_oldest() {
        let mut model = test_model();
        model.push_notification(NotificationLevel::Info, "a".into());
        model.push_notification(NotificationLevel::Info, "b".into());
        model.push_notification(NotificationLevel::Info, "c".into());
        let id = model.push_notification(NotificationLevel::Error, "d".into());
        assert_eq!(model.notifications.len(), 3);
        assert_eq!(model.notifications[0].message, "b");
        assert_eq!(model.notifications[2].id, id);
    }

    #[test]
    fn rebuild_forest_combines_branches() {
        let mut model = test_model();
        model
            .unresolved
            .insert("A-1".into(), vec![entry("A-1/f1")]);
        model
            .unresolved
            .insert("B-2".into(), vec![entry("B-2/f3/o1")]);
        model.rebuild_forest();
        assert_eq!(model.forest.roots.len(), 2);
        assert!(model.forest.contains("A-1/f1"));
        assert!(model.forest.contains("B-2/f3/o1"));
    }

    #[test]
    fn rebuild_forest_prunes_expansion_and_clamps_cursor() {
        let mut model = test_model();
        model
            .unresolved
            .insert("A-1".into(), vec![entry("A-1/f1"), entry("A-1/f2")]);
        model.rebuild_forest();
        model.expansion.expand("A-1");
        model.updates_selected = 2; // A-1 → f1 → f2

        // f2 resolved away; f1 remains.
        model.unresolved.insert("A-1".into(), vec![entry("A-1/f1")]);
        model.rebuild_forest();

        assert!(model.expansion.is_expanded("A-1"));
        assert_eq!(model.visible_rows().len(), 2);
        assert_eq!(model.updates_selected, 1, "cursor clamped to last row");

        // Everything resolved.
        model.unresolved.remove("A-1");
        model.rebuild_forest();
        assert!(model.expansion.is_empty());
        assert_eq!(model.updates_selected, 0);
    }

    #[test]
    fn selected_row_reports_children_and_last_resolved() {
        let mut model = test_model();
        model.unresolved.insert(
            "A-1".into(),
            vec![
                PathEntry::new("A-1/f1", UpdateMeta::new("m", Some("2024-05-01".into()))),
                entry("A-1/f1/o1"),
            ],
        );
        model.rebuild_forest();
        model.expansion.expand("A-1");
        model.updates_selected = 1; // A-1/f1
        let row = model.selected_row().unwrap();
        assert_eq!(row.full_path, "A-1/f1");
        assert!(row.has_children);
        assert_eq!(row.last_resolved.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn selected_row_none_on_empty_tree() {
        let model = test_model();
        assert!(model.selected_row().is_none());
    }

    #[test]
    fn confirm_prompt_wording_depends_on_cascade() {
        let deep = ConfirmAction::Resolve {
            path: "A-1/f1".into(),
            cascade: true,
        };
        let shallow = ConfirmAction::Resolve {
            path: "A-1/f1".into(),
            cascade: false,
        };
        assert!(deep.prompt().contains("subsidiary"));
        assert!(!shallow.prompt().contains("subsidiary"));
        // Both wordings prompt; leaves are confirmed too.
        assert!(deep.prompt().starts_with("Resolve"));
        assert!(shallow.prompt().starts_with("Resolve"));
    }

    #[test]
    fn unresolved_count_sums_branches() {
        let mut model = test_model();
        model
            .unresolved
            .insert("A-1".into(), vec![entry("A-1/f1"), entry("A-1/f2")]);
        model.unresolved.insert("B-2".into(), vec![entry("B-2")]);
        assert_eq!(model.unresolved_count(), 3);
    }

    #[test]
    fn translation_running_tracks_tasks() {
        let mut model = test_model();
        assert!(!model.translation_running());
        model.translations = vec![TranslationTask {
            page_name: "p".into(),
            progress: 1,
            total: 10,
            running: true,
        }];
        assert!(model.translation_running());
        model.translations[0].running = false;
        assert!(!model.translation_running());
    }
}
