//! View layer: draws the model onto a ratatui frame.
//!
//! Rendering is a pure function of the model; nothing here mutates
//! state except the transient `ListState`/`TableState` cursors that
//! ratatui needs for scrolling.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Tabs,
    Wrap,
};

use crate::api::types::{Cell as PageCell, ChangeMark, PageData, Text};
use crate::tui::model::{
    ConfirmAction, Model, Notification, NotificationLevel, Overlay, Screen,
};

const ACCENT: Color = Color::Cyan;
const CHANGED: Color = Color::Yellow;
const ADDED: Color = Color::Green;
const DIM: Color = Color::DarkGray;

/// Draw one full frame.
pub fn draw(frame: &mut Frame<'_>, model: &Model) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // tab bar
            Constraint::Min(3),    // body
            Constraint::Length(1), // status bar
        ])
        .split(frame.area());

    draw_tabs(frame, chunks[0], model);
    match model.screen {
        Screen::Page => draw_page(frame, chunks[1], model),
        Screen::Watchlist => draw_watchlist(frame, chunks[1], model),
        Screen::Updates => draw_updates(frame, chunks[1], model),
    }
    draw_status(frame, chunks[2], model);
    draw_notifications(frame, chunks[1], &model.notifications);

    match &model.active_overlay {
        Some(Overlay::Help) => draw_help(frame),
        Some(Overlay::History) => draw_history(frame, model),
        Some(Overlay::Confirmation(action)) => draw_confirmation(frame, action),
        None => {}
    }
}

fn draw_tabs(frame: &mut Frame<'_>, area: Rect, model: &Model) {
    let titles: Vec<Line<'_>> = [Screen::Page, Screen::Watchlist, Screen::Updates]
        .iter()
        .map(|s| {
            let extra = match s {
                Screen::Updates if model.unresolved_count() > 0 => {
                    format!(" ({})", model.unresolved_count())
                }
                _ => String::new(),
            };
            Line::from(format!("[{}] {}{extra}", s.number(), s.title()))
        })
        .collect();
    let selected = match model.screen {
        Screen::Page => 0,
        Screen::Watchlist => 1,
        Screen::Updates => 2,
    };
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);

    if model.in_flight > 0 {
        let marker = Paragraph::new("… loading").alignment(Alignment::Right).style(
            Style::default().fg(DIM),
        );
        frame.render_widget(marker, area);
    }
}

// ──────────────────── page screen ────────────────────

fn draw_page(frame: &mut Frame<'_>, area: Rect, model: &Model) {
    let Some(page) = &model.page else {
        let hint = Paragraph::new("No page loaded. Open a branch from the watchlist ([2]).")
            .style(Style::default().fg(DIM))
            .block(Block::default().borders(Borders::ALL).title(" Page "));
        frame.render_widget(hint, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(area);

    let mut header_lines = vec![
        Line::from(vec![
            Span::styled(
                page.breadcrumb_parts().join(" / "),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  [{}]", page.kind.label()), Style::default().fg(DIM)),
        ]),
        styled_text_line(&page.title),
    ];
    let mut meta = vec![Span::styled(
        format!("modified {}", page.lastmod),
        Style::default().fg(DIM),
    )];
    if let Some(compare) = &model.compare {
        meta.push(Span::styled(
            format!("  comparing against {compare} (x to leave)"),
            Style::default().fg(CHANGED),
        ));
    }
    if page.needs_translation {
        meta.push(Span::styled(
            "  untranslated (t to translate)",
            Style::default().fg(ACCENT),
        ));
    }
    header_lines.push(Line::from(meta));

    let header = Paragraph::new(header_lines)
        .block(Block::default().borders(Borders::ALL).title(" Page "))
        .wrap(Wrap { trim: true });
    frame.render_widget(header, chunks[0]);

    draw_children_table(frame, chunks[1], model, page);
}

fn draw_children_table(frame: &mut Frame<'_>, area: Rect, model: &Model, page: &PageData) {
    let columns = page
        .header
        .len()
        .max(page.children.iter().map(Vec::len).max().unwrap_or(0))
        .max(1);

    let header_row = Row::new(
        (0..columns)
            .map(|i| {
                page.header
                    .get(i)
                    .map(|t| t.get().to_owned())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row<'_>> = page
        .children
        .iter()
        .map(|cells| {
            Row::new(
                (0..columns)
                    .map(|i| cells.get(i).map_or_else(ratatui::text::Text::default, cell_text))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    let widths = vec![Constraint::Ratio(1, columns as u32); columns];
    let table = Table::new(rows, widths)
        .header(header_row)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(Block::default().borders(Borders::ALL).title(format!(
            " {} rows · {} versions ",
            page.children.len(),
            page.history.len()
        )));

    let mut state = TableState::default();
    state.select((!page.children.is_empty()).then_some(model.page_selected));
    frame.render_stateful_widget(table, area, &mut state);
}

fn cell_text(cell: &PageCell) -> ratatui::text::Text<'static> {
    let mut style = match cell.edit.or(cell.link_edit) {
        Some(ChangeMark::Changed) => Style::default().fg(CHANGED),
        Some(ChangeMark::Added) => Style::default().fg(ADDED),
        None => Style::default(),
    };
    if !cell.is_linked() && cell.link.is_some() {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    ratatui::text::Text::from(Span::styled(cell.text.get().to_owned(), style))
}

fn styled_text_line(text: &Text) -> Line<'static> {
    let style = match text.edit {
        Some(ChangeMark::Changed) => Style::default().fg(CHANGED),
        Some(ChangeMark::Added) => Style::default().fg(ADDED),
        None => Style::default(),
    };
    Line::from(Span::styled(text.get().to_owned(), style))
}

// ──────────────────── watchlist screen ────────────────────

fn draw_watchlist(frame: &mut Frame<'_>, area: Rect, model: &Model) {
    if model.watchlist.is_empty() {
        let hint = Paragraph::new("Watchlist is empty. Add branches with `bd watch add`.")
            .style(Style::default().fg(DIM))
            .block(Block::default().borders(Borders::ALL).title(" Watchlist "));
        frame.render_widget(hint, area);
        return;
    }

    let rows: Vec<Row<'_>> = model
        .watchlist
        .iter()
        .map(|w| {
            let key = format!("{}-{}", w.archive, w.subarchive);
            let unresolved = model
                .unresolved
                .get(&key)
                .map_or(0, Vec::len);
            let count_style = if unresolved > 0 {
                Style::default().fg(CHANGED)
            } else {
                Style::default().fg(DIM)
            };
            Row::new(vec![
                ratatui::text::Text::from(key),
                ratatui::text::Text::from(w.last_checked_date.clone()),
                ratatui::text::Text::from(w.cutoff_date.clone()),
                ratatui::text::Text::from(Span::styled(unresolved.to_string(), count_style)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(18),
            Constraint::Length(12),
            Constraint::Length(10),
        ],
    )
    .header(
        Row::new(vec!["Branch", "Last checked", "Cutoff", "Unresolved"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .block(Block::default().borders(Borders::ALL).title(" Watchlist "));

    let mut state = TableState::default();
    state.select(Some(model.watchlist_selected));
    frame.render_stateful_widget(table, area, &mut state);
}

// ──────────────────── updates screen ────────────────────

fn draw_updates(frame: &mut Frame<'_>, area: Rect, model: &Model) {
    let rows = model.visible_rows();
    if rows.is_empty() {
        let hint = Paragraph::new("No unresolved updates. Check branches with C.")
            .style(Style::default().fg(DIM))
            .block(Block::default().borders(Borders::ALL).title(" Updates "));
        frame.render_widget(hint, area);
        return;
    }

    let items: Vec<ListItem<'_>> = rows
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let mut spans = vec![
                Span::raw(indent),
                Span::styled(row.connector().to_owned(), Style::default().fg(DIM)),
                Span::styled(row.fold_glyph().to_owned(), Style::default().fg(ACCENT)),
                Span::raw(row.label().to_owned()),
            ];
            if let Some(meta) = &row.node.meta {
                spans.push(Span::styled(
                    format!("  · updated {}", meta.modified),
                    Style::default().fg(CHANGED),
                ));
                if let Some(resolved) = meta.last_resolved() {
                    spans.push(Span::styled(
                        format!(" (resolved {resolved})"),
                        Style::default().fg(DIM),
                    ));
                }
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Updates · {} unresolved ",
            model.unresolved_count()
        )));

    let mut state = ListState::default();
    state.select(Some(model.updates_selected));
    frame.render_stateful_widget(list, area, &mut state);
}

// ──────────────────── chrome ────────────────────

fn draw_status(frame: &mut Frame<'_>, area: Rect, model: &Model) {
    let hints = match (&model.active_overlay, model.screen) {
        (Some(Overlay::Confirmation(_)), _) => "y confirm · n cancel",
        (Some(Overlay::History), _) => "↑↓ select · ⏎ compare · esc close",
        (Some(Overlay::Help), _) => "any key to close",
        (None, Screen::Page) => "⏎ open · b up · h history · t translate · x live · R reload · ? help",
        (None, Screen::Watchlist) => "⏎ open · c check · C check all · d unwatch · R reload · ? help",
        (None, Screen::Updates) => "⏎ fold · v view changes · r resolve · R check all · ? help",
    };
    let mut spans = vec![Span::styled(hints, Style::default().fg(DIM))];
    if model.translation_running() {
        let (done, total) = model
            .translations
            .iter()
            .fold((0, 0), |(d, t), task| (d + task.progress, t + task.total));
        spans.push(Span::styled(
            format!("  translating {done}/{total}"),
            Style::default().fg(ACCENT),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_notifications(frame: &mut Frame<'_>, body: Rect, notifications: &[Notification]) {
    for (i, notification) in notifications.iter().rev().enumerate() {
        let width = (notification.message.len() as u16 + 4).min(body.width);
        let y = body.bottom().saturating_sub(2 + i as u16);
        if y < body.y {
            break;
        }
        let area = Rect::new(body.right().saturating_sub(width), y, width, 1);
        let style = match notification.level {
            NotificationLevel::Info => Style::default().fg(ACCENT),
            NotificationLevel::Error => Style::default().fg(Color::Red),
        };
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(format!(" {} ", notification.message)).style(style),
            area,
        );
    }
}

// ──────────────────── overlays ────────────────────

fn draw_help(frame: &mut Frame<'_>) {
    let lines = vec![
        Line::from(Span::styled("Keys", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("1/2/3      switch screen"),
        Line::from("j/k ↑↓     move cursor"),
        Line::from("⏎ / space  open row / toggle fold"),
        Line::from("b          page: go up one level"),
        Line::from("h          page: pick a version to compare"),
        Line::from("x          page: leave comparison mode"),
        Line::from("t          page: translate"),
        Line::from("c / C      watchlist: check one / all branches"),
        Line::from("d          watchlist: stop watching"),
        Line::from("v          updates: view changes since resolve"),
        Line::from("r          updates: mark resolved"),
        Line::from("R          reload current screen"),
        Line::from("q          quit"),
    ];
    let height = lines.len() as u16 + 2;
    let area = centered(frame.area(), 46, height);
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Help ")),
        area,
    );
}

fn draw_history(frame: &mut Frame<'_>, model: &Model) {
    let Some(page) = &model.page else { return };
    let items: Vec<ListItem<'_>> = page
        .history
        .iter()
        .map(|h| ListItem::new(h.modified.clone()))
        .collect();
    let height = (items.len() as u16 + 2).min(frame.area().height.saturating_sub(4));
    let area = centered(frame.area(), 36, height.max(3));
    let list = List::new(items)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Compare against version "),
        );
    let mut state = ListState::default();
    state.select(Some(model.history_selected));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_confirmation(frame: &mut Frame<'_>, action: &ConfirmAction) {
    let prompt = action.prompt();
    let area = centered(frame.area(), 60, 6);
    let body = Paragraph::new(vec![
        Line::from(prompt),
        Line::from(""),
        Line::from(Span::styled(
            "[y] yes    [n] no",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title(" Confirm "));
    frame.render_widget(Clear, area);
    frame.render_widget(body, area);
}

fn centered(outer: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(outer.width);
    let height = height.min(outer.height);
    Rect::new(
        outer.x + (outer.width.saturating_sub(width)) / 2,
        outer.y + (outer.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PollingConfig;
    use crate::updates::tree::{PathEntry, UpdateMeta};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(model: &Model) -> String {
        let backend = TestBackend::new(90, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| draw(frame, model)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn model() -> Model {
        Model::new(PollingConfig::default(), (90, 30))
    }

    #[test]
    fn empty_model_renders_hints() {
        let screen = render(&model());
        assert!(screen.contains("No page loaded"));
        assert!(screen.contains("[1] Page"));
    }

    #[test]
    fn updates_tree_shows_fold_glyphs_and_meta() {
        let mut m = model();
        m.screen = Screen::Updates;
        m.unresolved.insert(
            "DAZHO-R".to_owned(),
            vec![
                PathEntry::new("DAZHO-R/177", UpdateMeta::new("2024-06-01", None)),
                PathEntry::new("DAZHO-R/177/1", UpdateMeta::new("2024-06-02", None)),
            ],
        );
        m.rebuild_forest();

        let collapsed = render(&m);
        assert!(collapsed.contains("▶ DAZHO-R"));
        assert!(!collapsed.contains("177"), "collapsed children stay hidden");

        m.expansion.expand("DAZHO-R");
        let expanded = render(&m);
        assert!(expanded.contains("▼ DAZHO-R"));
        assert!(expanded.contains("└─ "));
        assert!(expanded.contains("updated 2024-06-01"));
    }

    #[test]
    fn confirmation_overlay_renders_prompt() {
        let mut m = model();
        m.screen = Screen::Updates;
        m.active_overlay = Some(Overlay::Confirmation(ConfirmAction::Resolve {
            path: "DAZHO-R/177".to_owned(),
            cascade: true,
        }));
        let screen = render(&m);
        assert!(screen.contains("Confirm"));
        assert!(screen.contains("subsidiary"));
        assert!(screen.contains("[y] yes"));
    }

    #[test]
    fn watchlist_renders_unresolved_counts() {
        let mut m = model();
        m.screen = Screen::Watchlist;
        m.watchlist = vec![crate::api::types::WatchlistEntry {
            archive: "DAZHO".to_owned(),
            subarchive: "R".to_owned(),
            last_checked_date: "2024,06,01".to_owned(),
            cutoff_date: "2023".to_owned(),
        }];
        m.unresolved.insert(
            "DAZHO-R".to_owned(),
            vec![PathEntry::new("DAZHO-R/1", UpdateMeta::new("m", None))],
        );
        m.rebuild_forest();
        let screen = render(&m);
        assert!(screen.contains("DAZHO-R"));
        assert!(screen.contains("Unresolved"));
    }

    #[test]
    fn notifications_overlay_bottom_corner() {
        let mut m = model();
        m.push_notification(NotificationLevel::Error, "check failed".to_owned());
        let screen = render(&m);
        assert!(screen.contains("check failed"));
    }
}
