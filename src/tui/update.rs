//! Pure state transitions: `(Model, Msg) -> Cmd`.
//!
//! No I/O happens here. Every side-effect is returned as a [`Cmd`] for
//! the runtime to execute, which keeps the whole interaction model
//! unit-testable without a terminal or a server.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::api::client::PageRequest;
use crate::core::record::{Branch, RecordPath};
use crate::tui::model::{
    Cmd, ConfirmAction, Model, Msg, NotificationLevel, Overlay, Screen, SelectedRow,
};

/// How long notification toasts stay on screen.
const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Apply one message to the model, returning the side-effects to run.
pub fn update(model: &mut Model, msg: Msg) -> Cmd {
    match msg {
        Msg::Key(key) => on_key(model, key),
        Msg::Resize { cols, rows } => {
            model.terminal_size = (cols, rows);
            Cmd::None
        }
        Msg::PageLoaded(page) => {
            model.in_flight = model.in_flight.saturating_sub(1);
            model.compare = page.refmod.clone();
            model.page = Some(*page);
            model.page_selected = 0;
            model.history_selected = 0;
            model.screen = Screen::Page;
            Cmd::None
        }
        Msg::WatchlistLoaded(entries) => {
            model.in_flight = model.in_flight.saturating_sub(1);
            model.watchlist = entries;
            if model.watchlist_selected >= model.watchlist.len() {
                model.watchlist_selected = model.watchlist.len().saturating_sub(1);
            }
            Cmd::None
        }
        Msg::BranchUpdated { branch_key, entries } => {
            model.in_flight = model.in_flight.saturating_sub(1);
            let count = entries.len();
            if entries.is_empty() {
                model.unresolved.remove(&branch_key);
            } else {
                model.unresolved.insert(branch_key.clone(), entries);
            }
            model.rebuild_forest();
            notify(
                model,
                NotificationLevel::Info,
                format!("{branch_key}: {count} unresolved"),
            )
        }
        Msg::AllBranchesChecked(outcomes) => {
            model.in_flight = model.in_flight.saturating_sub(1);
            // One combined delivery replaces the whole map; the tree is
            // rebuilt exactly once no matter how many branches settled.
            // A branch whose check failed keeps what was known before,
            // same as a failed single-branch check.
            let mut previous = std::mem::take(&mut model.unresolved);
            let mut cmds = Vec::new();
            let mut checked = 0_usize;
            for outcome in outcomes {
                match outcome.result {
                    Ok(entries) => {
                        checked += 1;
                        if !entries.is_empty() {
                            model.unresolved.insert(outcome.branch_key, entries);
                        }
                    }
                    Err(message) => {
                        if let Some(entries) = previous.remove(&outcome.branch_key) {
                            model.unresolved.insert(outcome.branch_key.clone(), entries);
                        }
                        cmds.push(notify(
                            model,
                            NotificationLevel::Error,
                            format!("check {} failed: {message}", outcome.branch_key),
                        ));
                    }
                }
            }
            model.rebuild_forest();
            cmds.push(notify(
                model,
                NotificationLevel::Info,
                format!(
                    "checked {checked} branches, {} unresolved",
                    model.unresolved_count()
                ),
            ));
            Cmd::Batch(cmds)
        }
        Msg::WatchRemoved(branch) => {
            model.in_flight = model.in_flight.saturating_sub(1);
            let key = branch.key();
            model.watchlist
                .retain(|w| !(w.archive == branch.archive && w.subarchive == branch.subarchive));
            if model.watchlist_selected >= model.watchlist.len() {
                model.watchlist_selected = model.watchlist.len().saturating_sub(1);
            }
            model.unresolved.remove(&key);
            model.rebuild_forest();
            notify(model, NotificationLevel::Info, format!("stopped watching {key}"))
        }
        Msg::TranslationsUpdate {
            tasks,
            generation,
            attempt,
        } => {
            // Stale generation: the user navigated away since this poll
            // was scheduled. Drop it; the chain ends here.
            if generation != model.poll_generation {
                return Cmd::None;
            }
            model.translations = tasks;
            if model.translation_running() {
                if attempt >= model.polling.max_attempts {
                    return notify(
                        model,
                        NotificationLevel::Error,
                        "translation still running, stopped polling".to_owned(),
                    );
                }
                return Cmd::PollTranslations {
                    generation,
                    attempt: attempt + 1,
                    after: model.polling.delay_for_attempt(attempt),
                };
            }
            // All tasks settled: reload the current page to pick up the
            // translated text.
            let reload = current_page_request(model).map_or(Cmd::None, |request| {
                model.in_flight += 1;
                Cmd::FetchPage(request)
            });
            Cmd::Batch(vec![
                notify(model, NotificationLevel::Info, "translation finished".to_owned()),
                reload,
            ])
        }
        Msg::ApiFailure {
            context,
            message,
            tracked,
        } => {
            // Untracked failures (the translation chain) never counted
            // toward in_flight, so decrementing would steal the slot of
            // a request that is still outstanding.
            if tracked {
                model.in_flight = model.in_flight.saturating_sub(1);
            }
            notify(
                model,
                NotificationLevel::Error,
                format!("{context}: {message}"),
            )
        }
        Msg::NotificationExpired(id) => {
            model.notifications.retain(|n| n.id != id);
            Cmd::None
        }
    }
}

// ──────────────────── key routing ────────────────────

fn on_key(model: &mut Model, key: KeyEvent) -> Cmd {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        model.quit = true;
        return Cmd::Quit;
    }

    // Overlays take input precedence over screens.
    if let Some(overlay) = model.active_overlay.clone() {
        return on_overlay_key(model, &overlay, key);
    }

    match key.code {
        KeyCode::Char('q') => {
            model.quit = true;
            Cmd::Quit
        }
        KeyCode::Char('?') => {
            model.active_overlay = Some(Overlay::Help);
            Cmd::None
        }
        KeyCode::Char(c @ '1'..='3') => {
            if let Some(screen) = Screen::from_number(c as u8 - b'0') {
                switch_screen(model, screen);
            }
            Cmd::None
        }
        _ => match model.screen {
            Screen::Page => on_page_key(model, key),
            Screen::Watchlist => on_watchlist_key(model, key),
            Screen::Updates => on_updates_key(model, key),
        },
    }
}

fn on_overlay_key(model: &mut Model, overlay: &Overlay, key: KeyEvent) -> Cmd {
    match overlay {
        Overlay::Help => {
            model.active_overlay = None;
            Cmd::None
        }
        Overlay::History => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                model.active_overlay = None;
                Cmd::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = model.page.as_ref().map_or(0, |p| p.history.len());
                if len > 0 && model.history_selected + 1 < len {
                    model.history_selected += 1;
                }
                Cmd::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                model.history_selected = model.history_selected.saturating_sub(1);
                Cmd::None
            }
            KeyCode::Enter => {
                model.active_overlay = None;
                let version = model
                    .page
                    .as_ref()
                    .and_then(|p| p.history.get(model.history_selected))
                    .map(|h| h.modified.clone());
                match (current_page_request(model), version) {
                    (Some(mut request), Some(modified)) => {
                        request.compare = Some(modified);
                        fetch_page(model, request)
                    }
                    _ => Cmd::None,
                }
            }
            _ => Cmd::None,
        },
        Overlay::Confirmation(action) => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                model.active_overlay = None;
                confirm(model, action)
            }
            // Declining closes the prompt and changes nothing else.
            KeyCode::Char('n') | KeyCode::Esc => {
                model.active_overlay = None;
                Cmd::None
            }
            _ => Cmd::None,
        },
    }
}

fn confirm(model: &mut Model, action: &ConfirmAction) -> Cmd {
    match action {
        ConfirmAction::Resolve { path, cascade } => match RecordPath::parse(path) {
            Ok(record) => {
                model.in_flight += 1;
                Cmd::Resolve {
                    path: record,
                    deep: *cascade,
                }
            }
            Err(e) => notify(model, NotificationLevel::Error, e.to_string()),
        },
        ConfirmAction::RemoveWatch(branch) => {
            model.in_flight += 1;
            Cmd::RemoveWatch(branch.clone())
        }
    }
}

// ──────────────────── screens ────────────────────

fn on_page_key(model: &mut Model, key: KeyEvent) -> Cmd {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            let len = model.page.as_ref().map_or(0, |p| p.children.len());
            if len > 0 && model.page_selected + 1 < len {
                model.page_selected += 1;
            }
            Cmd::None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            model.page_selected = model.page_selected.saturating_sub(1);
            Cmd::None
        }
        KeyCode::Enter => descend(model),
        KeyCode::Backspace | KeyCode::Char('b') => ascend(model),
        KeyCode::Char('h') => {
            let has_history = model.page.as_ref().is_some_and(|p| !p.history.is_empty());
            if has_history {
                model.history_selected = 0;
                model.active_overlay = Some(Overlay::History);
            }
            Cmd::None
        }
        KeyCode::Char('x') => {
            // Leave comparison mode by refetching the live version.
            if model.compare.is_some() {
                match current_page_request(model) {
                    Some(request) => fetch_page(model, request),
                    None => Cmd::None,
                }
            } else {
                Cmd::None
            }
        }
        KeyCode::Char('t') => start_translation(model),
        KeyCode::Char('R') => match current_page_request(model) {
            Some(request) => fetch_page(model, request),
            None => Cmd::None,
        },
        _ => Cmd::None,
    }
}

fn on_watchlist_key(model: &mut Model, key: KeyEvent) -> Cmd {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            if !model.watchlist.is_empty()
                && model.watchlist_selected + 1 < model.watchlist.len()
            {
                model.watchlist_selected += 1;
            }
            Cmd::None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            model.watchlist_selected = model.watchlist_selected.saturating_sub(1);
            Cmd::None
        }
        KeyCode::Enter => match model.selected_branch() {
            Some(branch) => fetch_page(
                model,
                PageRequest::branch(branch.archive, branch.subarchive),
            ),
            None => Cmd::None,
        },
        KeyCode::Char('c') => match model.selected_branch() {
            Some(branch) => {
                model.in_flight += 1;
                Cmd::CheckBranch(branch)
            }
            None => Cmd::None,
        },
        KeyCode::Char('C') => check_all(model),
        KeyCode::Char('d') => {
            if let Some(branch) = model.selected_branch() {
                model.active_overlay = Some(Overlay::Confirmation(ConfirmAction::RemoveWatch(branch)));
            }
            Cmd::None
        }
        KeyCode::Char('R') => {
            model.in_flight += 1;
            Cmd::FetchWatchlist
        }
        _ => Cmd::None,
    }
}

fn on_updates_key(model: &mut Model, key: KeyEvent) -> Cmd {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            let len = model.visible_rows().len();
            if len > 0 && model.updates_selected + 1 < len {
                model.updates_selected += 1;
            }
            Cmd::None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            model.updates_selected = model.updates_selected.saturating_sub(1);
            Cmd::None
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            // Toggling a leaf is a no-op; only fold points react.
            if let Some(row) = model.selected_row() {
                if row.has_children {
                    model.expansion.toggle(&row.full_path);
                    let visible = model.visible_rows().len();
                    if model.updates_selected >= visible {
                        model.updates_selected = visible.saturating_sub(1);
                    }
                }
            }
            Cmd::None
        }
        KeyCode::Char('v') => match model.selected_row() {
            Some(row) => view_changes(model, &row),
            None => Cmd::None,
        },
        KeyCode::Char('r') => {
            // Resolving always prompts, leaves included; only the wording
            // differs when the whole subtree would be affected.
            if let Some(row) = model.selected_row() {
                model.active_overlay = Some(Overlay::Confirmation(ConfirmAction::Resolve {
                    path: row.full_path,
                    cascade: row.has_children,
                }));
            }
            Cmd::None
        }
        KeyCode::Char('R') => check_all(model),
        _ => Cmd::None,
    }
}

// ──────────────────── actions ────────────────────

fn switch_screen(model: &mut Model, screen: Screen) {
    if model.screen == Screen::Page && screen != Screen::Page {
        // Navigation away from the page cancels any in-flight poll chain.
        model.poll_generation += 1;
    }
    model.screen = screen;
    model.active_overlay = None;
}

fn fetch_page(model: &mut Model, request: PageRequest) -> Cmd {
    // A new page supersedes any translation poll for the old one.
    model.poll_generation += 1;
    model.in_flight += 1;
    model.compare = request.compare.clone();
    Cmd::FetchPage(request)
}

fn check_all(model: &mut Model) -> Cmd {
    let branches: Vec<Branch> = model
        .watchlist
        .iter()
        .map(|w| Branch::new(w.archive.clone(), w.subarchive.clone()))
        .collect();
    if branches.is_empty() {
        return notify(
            model,
            NotificationLevel::Info,
            "watchlist is empty, nothing to check".to_owned(),
        );
    }
    model.in_flight += 1;
    Cmd::CheckAll(branches)
}

/// Open the page a tree row points at, comparing against the version the
/// user last resolved so the changes are highlighted.
fn view_changes(model: &mut Model, row: &SelectedRow) -> Cmd {
    match RecordPath::parse(&row.full_path) {
        Ok(record) => {
            let request = PageRequest::for_record(&record, row.last_resolved.clone());
            fetch_page(model, request)
        }
        Err(e) => notify(model, NotificationLevel::Error, e.to_string()),
    }
}

/// Follow the selected child row one hierarchy level down.
fn descend(model: &mut Model) -> Cmd {
    let Some(page) = &model.page else {
        return Cmd::None;
    };
    // Case pages have no children to descend into.
    if page.case.as_deref().is_some_and(|c| !c.is_empty()) {
        return Cmd::None;
    }
    let Some(row) = page.children.get(model.page_selected) else {
        return Cmd::None;
    };
    let Some(first) = row.first() else {
        return Cmd::None;
    };
    // Rows whose first cell carries a dead link are not navigable.
    if !first.is_linked() {
        return Cmd::None;
    }
    let name = first.text.get().trim().to_owned();
    if name.is_empty() {
        return Cmd::None;
    }
    let Some(mut request) = current_page_request(model) else {
        return Cmd::None;
    };
    if request.fond.is_none() {
        request.fond = Some(name);
    } else if request.opus.is_none() {
        request.opus = Some(name);
    } else {
        request.case = Some(name);
    }
    request.compare = None;
    fetch_page(model, request)
}

/// Go one hierarchy level up from the current page.
fn ascend(model: &mut Model) -> Cmd {
    let Some(mut request) = current_page_request(model) else {
        return Cmd::None;
    };
    // Pop the deepest populated level; at the branch landing page there
    // is nowhere further up to go.
    if request.case.take().is_none()
        && request.opus.take().is_none()
        && request.fond.take().is_none()
    {
        return Cmd::None;
    }
    request.compare = None;
    fetch_page(model, request)
}

fn start_translation(model: &mut Model) -> Cmd {
    let Some(page) = &model.page else {
        return Cmd::None;
    };
    if !page.needs_translation {
        return notify(
            model,
            NotificationLevel::Info,
            "page is already translated".to_owned(),
        );
    }
    let Some(record) = record_path_of(model) else {
        return Cmd::None;
    };
    Cmd::StartTranslation {
        path: record,
        generation: model.poll_generation,
    }
}

/// The hierarchy position of the current page, if one is loaded.
fn current_page_request(model: &Model) -> Option<PageRequest> {
    let page = model.page.as_ref()?;
    let archive = page.archive.clone().filter(|s| !s.is_empty())?;
    Some(PageRequest {
        archive,
        subarchive: page.subarchive.clone().unwrap_or_default(),
        fond: page.fond.clone().filter(|s| !s.is_empty()),
        opus: page.opus.clone().filter(|s| !s.is_empty()),
        case: page.case.clone().filter(|s| !s.is_empty()),
        translate: false,
        compare: None,
    })
}

fn record_path_of(model: &Model) -> Option<RecordPath> {
    let request = current_page_request(model)?;
    Some(RecordPath {
        branch: Branch::new(request.archive, request.subarchive),
        fond: request.fond,
        opus: request.opus,
        case: request.case,
    })
}

fn notify(model: &mut Model, level: NotificationLevel, message: String) -> Cmd {
    let id = model.push_notification(level, message);
    Cmd::ScheduleNotificationExpiry {
        id,
        after: NOTIFICATION_TTL,
    }
}
