//! Non-interactive command implementations behind the `bd` subcommands.
//!
//! Each function takes an already-configured [`ApiClient`], prints
//! human-oriented output with `colored`, and returns the shared
//! [`Result`]. Session and configuration plumbing live in the binary's
//! dispatch layer, not here.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;

use colored::Colorize;

use crate::api::client::{ApiClient, PageRequest};
use crate::api::types::{ApiAck, ChangeMark, PageData, PathEntry};
use crate::core::config::PollingConfig;
use crate::core::errors::{BdError, Result};
use crate::core::record::{Branch, RecordPath};
use crate::updates::expansion::ExpansionState;
use crate::updates::flatten::flatten;
use crate::updates::tree::{UpdateForest, UpdateNode};

// ──────────────────── session ────────────────────

/// Log in and report the outcome.
pub fn login(client: &ApiClient, email: &str, password: &str) -> Result<()> {
    expect_ack("login", client.login(email, password)?)?;
    println!("{} logged in as {email}", "ok:".green().bold());
    Ok(())
}

/// Create an account (the service logs the new user in).
pub fn signup(client: &ApiClient, name: &str, email: &str, password: &str) -> Result<()> {
    expect_ack("signup", client.signup(name, email, password)?)?;
    println!("{} account created for {email}", "ok:".green().bold());
    Ok(())
}

/// Change the session password.
pub fn change_password(client: &ApiClient, current: &str, new: &str) -> Result<()> {
    expect_ack("change password", client.change_password(current, new)?)?;
    println!("{} password changed", "ok:".green().bold());
    Ok(())
}

/// Request a password-reset email.
pub fn reset_password(client: &ApiClient, email: &str) -> Result<()> {
    expect_ack("reset password", client.reset_password(email)?)?;
    println!("{} reset email sent to {email}", "ok:".green().bold());
    Ok(())
}

/// End the current session.
pub fn logout(client: &ApiClient) -> Result<()> {
    client.logout()?;
    println!("{} logged out", "ok:".green().bold());
    Ok(())
}

// ──────────────────── archives and watchlist ────────────────────

/// List every archive/subarchive pair the service knows about.
pub fn archives(client: &ApiClient) -> Result<()> {
    for (archive, subarchive) in client.archives()? {
        if subarchive.is_empty() {
            println!("{archive}");
        } else {
            println!("{archive}-{subarchive}");
        }
    }
    Ok(())
}

/// Print the watchlist as a table.
pub fn watch_list(client: &ApiClient) -> Result<()> {
    let entries = client.watchlist()?;
    if entries.is_empty() {
        println!("watchlist is empty");
        return Ok(());
    }
    println!(
        "{:<16} {:<20} {:<12}",
        "BRANCH".bold(),
        "LAST CHECKED".bold(),
        "CUTOFF".bold()
    );
    for entry in entries {
        println!(
            "{:<16} {:<20} {:<12}",
            format!("{}-{}", entry.archive, entry.subarchive),
            entry.last_checked_date,
            entry.cutoff_date
        );
    }
    Ok(())
}

/// Start watching a branch.
pub fn watch_add(client: &ApiClient, branch: &Branch, cutoff_date: &str) -> Result<()> {
    expect_ack("add watch", client.add_watch(branch, cutoff_date)?)?;
    println!("{} watching {branch}", "ok:".green().bold());
    Ok(())
}

/// Stop watching a branch.
pub fn watch_remove(client: &ApiClient, branch: &Branch) -> Result<()> {
    client.remove_watch(branch)?;
    println!("{} stopped watching {branch}", "ok:".green().bold());
    Ok(())
}

// ──────────────────── checks and resolution ────────────────────

/// Check one branch, or every watched branch, for unresolved updates.
pub fn check(client: &ApiClient, branch: Option<&Branch>, tree: bool) -> Result<()> {
    let branches = match branch {
        Some(branch) => vec![branch.clone()],
        None => client
            .watchlist()?
            .into_iter()
            .map(|w| Branch::new(w.archive, w.subarchive))
            .collect(),
    };
    if branches.is_empty() {
        println!("watchlist is empty, nothing to check");
        return Ok(());
    }

    let mut all = Vec::new();
    for branch in &branches {
        let entries = client.check(branch)?;
        println!(
            "{}: {} unresolved",
            branch.key().bold(),
            colored_count(entries.len())
        );
        all.extend(entries);
    }
    print_entries(&all, tree);
    Ok(())
}

/// Resolve a record, cascading when `deep`. Prompts before acting unless
/// `assume_yes`; the prompt is shown for leaves too.
pub fn resolve(client: &ApiClient, path: &RecordPath, deep: bool, assume_yes: bool) -> Result<()> {
    if !assume_yes {
        let prompt = if deep {
            format!("Resolve {path} and all of its subsidiary pages? [y/N] ")
        } else {
            format!("Resolve {path}? [y/N] ")
        };
        if !confirm(&prompt)? {
            println!("aborted");
            return Ok(());
        }
    }
    let remaining = client.resolve(path, deep)?;
    println!(
        "{} resolved {path}, {} still unresolved in {}",
        "ok:".green().bold(),
        colored_count(remaining.len()),
        path.branch.key()
    );
    print_entries(&remaining, true);
    Ok(())
}

// ──────────────────── pages and translation ────────────────────

/// Fetch and print a record page.
pub fn page(client: &ApiClient, request: &PageRequest) -> Result<()> {
    let page = client.page(request)?;
    print_page(&page);
    Ok(())
}

/// Export a record page as a spreadsheet file.
pub fn download(client: &ApiClient, request: &PageRequest, output: &Path) -> Result<()> {
    let bytes = client.download(request)?;
    fs::write(output, &bytes).map_err(|e| BdError::io(output, e))?;
    println!(
        "{} wrote {} bytes to {}",
        "ok:".green().bold(),
        bytes.len(),
        output.display()
    );
    Ok(())
}

/// Start a translation and optionally block until it finishes.
pub fn translate(
    client: &ApiClient,
    path: &RecordPath,
    wait: bool,
    polling: &PollingConfig,
) -> Result<()> {
    let mut tasks = client.translate(path)?;
    println!("translation started for {path}");
    if !wait {
        return Ok(());
    }
    let mut attempt = 0_u32;
    while tasks.iter().any(|t| t.running) {
        if attempt >= polling.max_attempts {
            return Err(BdError::Runtime {
                details: format!(
                    "translation still running after {attempt} polls, giving up"
                ),
            });
        }
        thread::sleep(polling.delay_for_attempt(attempt));
        attempt += 1;
        tasks = client.translate_poll()?;
        for task in &tasks {
            println!(
                "  {}: {}/{}{}",
                task.page_name,
                task.progress,
                task.total,
                if task.running { "" } else { " done" }
            );
        }
    }
    println!("{} translation finished", "ok:".green().bold());
    Ok(())
}

// ──────────────────── rendering helpers ────────────────────

fn print_page(page: &PageData) {
    println!("{}", page.breadcrumb_parts().join(" / ").bold());
    let title = page.title.get();
    if !title.is_empty() {
        println!("{title}");
    }
    let description = page.description.get();
    if !description.is_empty() {
        println!("{description}");
    }
    print!("modified {}", page.lastmod);
    if let Some(refmod) = &page.refmod {
        print!(", compared against {refmod}");
    }
    println!();
    if page.needs_translation {
        println!("{}", "page is untranslated".yellow());
    }

    if !page.header.is_empty() {
        let header: Vec<String> = page.header.iter().map(|t| t.get().to_owned()).collect();
        println!("{}", header.join(" | ").bold());
    }
    for row in &page.children {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                let text = cell.text.get();
                match cell.edit.or(cell.link_edit) {
                    Some(ChangeMark::Changed) => text.yellow().to_string(),
                    Some(ChangeMark::Added) => text.green().to_string(),
                    None => text.to_owned(),
                }
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    if !page.history.is_empty() {
        println!("{} stored versions", page.history.len());
    }
}

fn print_entries(entries: &[PathEntry], tree: bool) {
    if entries.is_empty() {
        return;
    }
    if tree {
        for line in tree_lines(entries) {
            println!("{line}");
        }
    } else {
        for entry in entries {
            println!("  {}  updated {}", entry.path, entry.meta.modified);
        }
    }
}

/// Render a flat unresolved set as fully expanded outline text.
fn tree_lines(entries: &[PathEntry]) -> Vec<String> {
    let forest = UpdateForest::from_entries(entries);
    let expansion = expand_all(&forest);
    flatten(&forest, &expansion)
        .iter()
        .map(|row| {
            let mut line = format!(
                "{}{}{}",
                "  ".repeat(row.depth),
                row.connector(),
                row.label()
            );
            if let Some(meta) = &row.node.meta {
                line.push_str(&format!("  updated {}", meta.modified));
                if let Some(resolved) = meta.last_resolved() {
                    line.push_str(&format!(" (resolved {resolved})"));
                }
            }
            line
        })
        .collect()
}

fn expand_all(forest: &UpdateForest) -> ExpansionState {
    fn open(node: &UpdateNode, state: &mut ExpansionState) {
        if !node.is_leaf() {
            state.expand(&node.full_path);
            for child in node.children.values() {
                open(child, state);
            }
        }
    }
    let mut state = ExpansionState::new();
    for root in forest.roots.values() {
        open(root, &mut state);
    }
    state
}

fn colored_count(count: usize) -> String {
    if count == 0 {
        count.to_string().green().to_string()
    } else {
        count.to_string().yellow().to_string()
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush().map_err(|e| BdError::Runtime {
        details: format!("stdout unavailable: {e}"),
    })?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| BdError::Runtime {
            details: format!("stdin unavailable: {e}"),
        })?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn expect_ack(context: &str, ack: ApiAck) -> Result<()> {
    if ack.success {
        Ok(())
    } else {
        Err(BdError::Runtime {
            details: format!(
                "{context} rejected: {}",
                ack.message.unwrap_or_else(|| "no reason given".to_owned())
            ),
        })
    }
}
