//! Event-loop runtime: terminal lifecycle, input thread, and command
//! execution.
//!
//! All state transitions flow through [`crate::tui::update::update`];
//! this module only executes the returned [`Cmd`] values. Service calls
//! run on short-lived worker threads and deliver their results back to
//! the single UI thread over a crossbeam channel, so the model is never
//! touched concurrently.

use std::io;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::execute;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::api::client::{ApiClient, PageRequest};
use crate::core::config::Config;
use crate::core::errors::{BdError, Result};
use crate::logger::{EventType, JsonlLogger, LogEntry, Severity};
use crate::tui::model::{CheckOutcome, Cmd, Model, Msg};
use crate::tui::render::draw;
use crate::tui::update::update;

/// How long the render loop waits for a message before redrawing anyway.
const RENDER_IDLE: Duration = Duration::from_millis(250);

static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// RAII guard: raw mode plus alternate screen, restored on drop and on
/// panic. The panic hook restores the terminal before the default hook
/// prints, so backtraces stay readable.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);

        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal_best_effort();
            prev(info);
        }));

        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal_best_effort();
        let _ = panic::take_hook();
    }
}

fn restore_terminal_best_effort() {
    if RAW_MODE_ACTIVE.swap(false, Ordering::SeqCst) {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Run the interactive client until the user quits.
pub fn run(config: &Config) -> Result<()> {
    let client = ApiClient::new(config)?;
    let logger = JsonlLogger::new(&config.paths.jsonl_log);
    logger.log(&LogEntry::new(EventType::ClientStart, Severity::Info));

    // Authenticate up front so the first fetches carry the session
    // cookie. A missing password is allowed: the service rejects the
    // fetches with 401 and the failure surfaces as a notification.
    if !config.session.email.is_empty() && !config.session.password.is_empty() {
        match client.login(&config.session.email, &config.session.password) {
            Ok(_) => logger.log(&LogEntry::new(EventType::Login, Severity::Info)),
            Err(e) => logger.log(
                &LogEntry::new(EventType::Error, Severity::Error)
                    .with_error(e.code(), e.to_string()),
            ),
        }
    }

    let guard = TerminalGuard::new().map_err(|e| BdError::Runtime {
        details: format!("terminal setup failed: {e}"),
    })?;
    let result = run_event_loop(config, client, &logger);
    drop(guard);

    logger.log(&LogEntry::new(EventType::ClientStop, Severity::Info));
    result
}

fn run_event_loop(config: &Config, client: ApiClient, logger: &JsonlLogger) -> Result<()> {
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).map_err(|e| BdError::Runtime {
        details: format!("terminal init failed: {e}"),
    })?;

    let size = terminal
        .size()
        .map(|s| (s.width, s.height))
        .unwrap_or((80, 24));
    let mut model = Model::new(config.polling.clone(), size);

    let (tx, rx) = unbounded::<Msg>();
    spawn_input_thread(tx.clone());

    let executor = Executor {
        client,
        logger: logger.clone(),
        tx,
    };

    // Seed the session: watchlist plus the configured home page.
    model.in_flight += 2;
    executor.execute(Cmd::FetchWatchlist);
    executor.execute(Cmd::FetchPage(PageRequest::branch(
        config.service.home_archive.clone(),
        config.service.home_subarchive.clone(),
    )));

    loop {
        terminal
            .draw(|frame| draw(frame, &model))
            .map_err(|e| BdError::Runtime {
                details: format!("render failed: {e}"),
            })?;

        let msg = match rx.recv_timeout(RENDER_IDLE) {
            Ok(msg) => msg,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return Err(BdError::ChannelClosed {
                    component: "ui event channel",
                });
            }
        };

        log_delivery(logger, &msg);
        let cmd = update(&mut model, msg);
        executor.execute(cmd);

        if model.quit {
            return Ok(());
        }
    }
}

fn spawn_input_thread(tx: Sender<Msg>) {
    thread::spawn(move || {
        loop {
            // A poll timeout keeps the thread responsive to channel
            // disconnection when the UI loop exits.
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => return,
            }
            let msg = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Msg::Key(key),
                Ok(Event::Resize(cols, rows)) => Msg::Resize { cols, rows },
                Ok(_) => continue,
                Err(_) => return,
            };
            if tx.send(msg).is_err() {
                return;
            }
        }
    });
}

/// Log service-result deliveries before they reach the update function.
fn log_delivery(logger: &JsonlLogger, msg: &Msg) {
    match msg {
        Msg::BranchUpdated { branch_key, entries } => logger.log(
            &LogEntry::new(EventType::CheckComplete, Severity::Info)
                .with_path(branch_key.clone())
                .with_unresolved(entries.len()),
        ),
        Msg::AllBranchesChecked(outcomes) => {
            let unresolved: usize = outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().ok().map(Vec::len))
                .sum();
            logger.log(
                &LogEntry::new(EventType::CheckComplete, Severity::Info)
                    .with_unresolved(unresolved)
                    .with_details(format!("{} branches", outcomes.len())),
            );
        }
        Msg::ApiFailure {
            context, message, ..
        } => logger.log(
            &LogEntry::new(EventType::Error, Severity::Error)
                .with_details(context.clone())
                .with_error("BD-2001", message.clone()),
        ),
        _ => {}
    }
}

/// Executes commands on worker threads, delivering results as messages.
struct Executor {
    client: ApiClient,
    logger: JsonlLogger,
    tx: Sender<Msg>,
}

impl Executor {
    fn execute(&self, cmd: Cmd) {
        match cmd {
            Cmd::None | Cmd::Quit => {}
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd);
                }
            }
            Cmd::FetchPage(request) => {
                self.logger.log(
                    &LogEntry::new(EventType::PageLoad, Severity::Info)
                        .with_path(page_path(&request)),
                );
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let msg = match client.page(&request) {
                        Ok(page) => Msg::PageLoaded(Box::new(page)),
                        Err(e) => failure("load page", &e, true),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::FetchWatchlist => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let msg = match client.watchlist() {
                        Ok(entries) => Msg::WatchlistLoaded(entries),
                        Err(e) => failure("load watchlist", &e, true),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::CheckBranch(branch) => {
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let msg = match client.check(&branch) {
                        Ok(entries) => Msg::BranchUpdated {
                            branch_key: branch.key(),
                            entries,
                        },
                        Err(e) => failure(&format!("check {branch}"), &e, true),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::CheckAll(branches) => {
                // Fan out one worker per branch, fan in to one combined
                // delivery so the tree rebuilds exactly once.
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let handles: Vec<_> = branches
                        .into_iter()
                        .map(|branch| {
                            let client = client.clone();
                            thread::spawn(move || CheckOutcome {
                                branch_key: branch.key(),
                                result: client.check(&branch).map_err(|e| e.to_string()),
                            })
                        })
                        .collect();
                    let outcomes: Vec<CheckOutcome> = handles
                        .into_iter()
                        .filter_map(|h| h.join().ok())
                        .collect();
                    let _ = tx.send(Msg::AllBranchesChecked(outcomes));
                });
            }
            Cmd::Resolve { path, deep } => {
                self.logger.log(
                    &LogEntry::new(EventType::Resolve, Severity::Info)
                        .with_path(path.to_key())
                        .with_deep(deep),
                );
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let branch_key = path.branch.key();
                    let msg = match client.resolve(&path, deep) {
                        Ok(entries) => Msg::BranchUpdated { branch_key, entries },
                        Err(e) => failure("resolve", &e, true),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::RemoveWatch(branch) => {
                self.logger.log(
                    &LogEntry::new(EventType::WatchRemove, Severity::Info)
                        .with_path(branch.key()),
                );
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let msg = match client.remove_watch(&branch) {
                        Ok(()) => Msg::WatchRemoved(branch),
                        Err(e) => failure("remove watch", &e, true),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::StartTranslation { path, generation } => {
                self.logger.log(
                    &LogEntry::new(EventType::TranslateStart, Severity::Info)
                        .with_path(path.to_key()),
                );
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let msg = match client.translate(&path) {
                        Ok(tasks) => Msg::TranslationsUpdate {
                            tasks,
                            generation,
                            attempt: 0,
                        },
                        Err(e) => failure("translate", &e, false),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::PollTranslations {
                generation,
                attempt,
                after,
            } => {
                self.logger.log(
                    &LogEntry::new(EventType::TranslatePoll, Severity::Info)
                        .with_details(format!("attempt {attempt}")),
                );
                let client = self.client.clone();
                let tx = self.tx.clone();
                thread::spawn(move || {
                    thread::sleep(after);
                    let msg = match client.translate_poll() {
                        Ok(tasks) => Msg::TranslationsUpdate {
                            tasks,
                            generation,
                            attempt,
                        },
                        Err(e) => failure("translation poll", &e, false),
                    };
                    let _ = tx.send(msg);
                });
            }
            Cmd::ScheduleNotificationExpiry { id, after } => {
                let tx = self.tx.clone();
                thread::spawn(move || {
                    thread::sleep(after);
                    let _ = tx.send(Msg::NotificationExpired(id));
                });
            }
        }
    }
}

fn failure(context: &str, error: &BdError, tracked: bool) -> Msg {
    Msg::ApiFailure {
        context: context.to_owned(),
        message: error.to_string(),
        tracked,
    }
}

fn page_path(request: &PageRequest) -> String {
    let mut path = format!("{}-{}", request.archive, request.subarchive);
    for level in [&request.fond, &request.opus, &request.case] {
        if let Some(part) = level {
            path.push('/');
            path.push_str(part);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Branch;
    use crossbeam_channel::Receiver;

    #[test]
    fn raw_mode_flag_starts_false() {
        assert!(!RAW_MODE_ACTIVE.load(Ordering::SeqCst));
    }

    #[test]
    fn restore_terminal_is_idempotent() {
        restore_terminal_best_effort();
        restore_terminal_best_effort();
        assert!(!RAW_MODE_ACTIVE.load(Ordering::SeqCst));
    }

    #[test]
    fn page_path_joins_populated_levels() {
        let request = PageRequest {
            archive: "DAZHO".to_owned(),
            subarchive: "R".to_owned(),
            fond: Some("177".to_owned()),
            opus: None,
            case: None,
            translate: false,
            compare: None,
        };
        assert_eq!(page_path(&request), "DAZHO-R/177");
    }

    #[test]
    fn scheduled_expiry_arrives_after_delay() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx): (Sender<Msg>, Receiver<Msg>) = unbounded();
        let executor = Executor {
            client: ApiClient::with_base_url("http://localhost:1", Duration::from_millis(100))
                .unwrap(),
            logger: JsonlLogger::new(dir.path().join("activity.jsonl")),
            tx,
        };
        executor.execute(Cmd::ScheduleNotificationExpiry {
            id: 7,
            after: Duration::from_millis(10),
        });
        let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(msg, Msg::NotificationExpired(7)));
    }

    #[test]
    fn check_all_delivers_one_combined_message() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx): (Sender<Msg>, Receiver<Msg>) = unbounded();
        let executor = Executor {
            // Nothing listens on this port; every check fails fast and the
            // failures still arrive as one combined delivery.
            client: ApiClient::with_base_url("http://127.0.0.1:1", Duration::from_millis(200))
                .unwrap(),
            logger: JsonlLogger::new(dir.path().join("activity.jsonl")),
            tx,
        };
        executor.execute(Cmd::CheckAll(vec![
            Branch::new("DAZHO", "R"),
            Branch::new("DAKrO", "P"),
        ]));
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        match msg {
            Msg::AllBranchesChecked(outcomes) => {
                assert_eq!(outcomes.len(), 2);
                assert!(outcomes.iter().all(|o| o.result.is_err()));
            }
            other => panic!("expected AllBranchesChecked, got {other:?}"),
        }
        assert!(
            rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "no per-branch deliveries"
        );
    }

    #[test]
    fn failure_message_carries_context_and_tracking() {
        let err = BdError::NotLoggedIn;
        match failure("resolve", &err, true) {
            Msg::ApiFailure {
                context,
                message,
                tracked,
            } => {
                assert_eq!(context, "resolve");
                assert!(message.contains("BD-3001"));
                assert!(tracked);
            }
            other => panic!("unexpected {other:?}"),
        }
        match failure("translation poll", &err, false) {
            Msg::ApiFailure { tracked, .. } => assert!(!tracked),
            other => panic!("unexpected {other:?}"),
        }
    }
}
