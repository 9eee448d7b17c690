//! Top-level CLI definition and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::control;

use birddog::api::client::{ApiClient, PageRequest};
use birddog::cli;
use birddog::core::config::Config;
use birddog::core::errors::{BdError, Result};
use birddog::core::record::{Branch, RecordPath};
use birddog::tui;

/// Birddog: terminal client for watching archival record updates.
#[derive(Debug, Parser)]
#[command(
    name = "bd",
    author,
    version,
    about = "Birddog - archival records watcher",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the interactive terminal client.
    Tui,
    /// Log in and verify the stored credentials.
    Login(LoginArgs),
    /// End the current session on the server.
    Logout,
    /// Create an account.
    Signup(SignupArgs),
    /// Change the password of the configured account.
    ChangePassword(ChangePasswordArgs),
    /// Request a password-reset email.
    ResetPassword(ResetPasswordArgs),
    /// List known archives.
    Archives,
    /// Manage the watchlist.
    Watch(WatchArgs),
    /// Check branches for unresolved updates.
    Check(CheckArgs),
    /// Mark a record's updates as resolved.
    Resolve(ResolveArgs),
    /// Fetch and print a record page.
    Page(PageArgs),
    /// Translate a record page.
    Translate(TranslateArgs),
}

#[derive(Debug, Clone, Args)]
struct LoginArgs {
    /// Email; defaults to the configured session email.
    #[arg(long)]
    email: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct SignupArgs {
    /// Display name.
    #[arg(long)]
    name: String,
    /// Account email.
    #[arg(long)]
    email: String,
}

#[derive(Debug, Clone, Args)]
struct ChangePasswordArgs {
    /// Current password; defaults to the configured one.
    #[arg(long)]
    current: Option<String>,
    /// New password.
    #[arg(long)]
    new: String,
}

#[derive(Debug, Clone, Args)]
struct ResetPasswordArgs {
    /// Email; defaults to the configured session email.
    #[arg(long)]
    email: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct WatchArgs {
    #[command(subcommand)]
    action: WatchAction,
}

#[derive(Debug, Clone, Subcommand)]
enum WatchAction {
    /// List watched branches.
    List,
    /// Watch a branch (e.g. DAZHO-R) from a cutoff date onward.
    Add {
        /// Branch key, ARCHIVE-SUBARCHIVE.
        branch: String,
        /// Ignore versions older than this date.
        #[arg(long, default_value = "")]
        cutoff: String,
    },
    /// Stop watching a branch.
    Remove {
        /// Branch key, ARCHIVE-SUBARCHIVE.
        branch: String,
    },
}

#[derive(Debug, Clone, Args)]
struct CheckArgs {
    /// Branch key to check; omit to check the whole watchlist.
    branch: Option<String>,
    /// Print the unresolved set as an outline instead of a flat list.
    #[arg(long)]
    tree: bool,
}

#[derive(Debug, Clone, Args)]
struct ResolveArgs {
    /// Record path, e.g. DAZHO-R/177/1.
    path: String,
    /// Also resolve everything below the record.
    #[arg(long)]
    deep: bool,
    /// Skip the confirmation prompt.
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Debug, Clone, Args)]
struct PageArgs {
    /// Record path, e.g. DAZHO-R or DAZHO-R/177/1.
    path: String,
    /// Compare against the version with this modification date.
    #[arg(long, value_name = "DATE")]
    compare: Option<String>,
    /// Request machine translation of the page.
    #[arg(long)]
    translate: bool,
    /// Export the page as a spreadsheet to this file instead of printing.
    #[arg(long, value_name = "FILE")]
    download: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct TranslateArgs {
    /// Record path, e.g. DAZHO-R/177.
    path: String,
    /// Block until the translation finishes.
    #[arg(long)]
    wait: bool,
}

/// Execute the parsed command line.
pub fn run(args: &Cli) -> Result<()> {
    if args.no_color {
        control::set_override(false);
    }
    let config = Config::load(args.config.as_deref())?;

    if matches!(args.command, Command::Tui) {
        return tui::run(&config);
    }

    let client = ApiClient::new(&config)?;
    match &args.command {
        Command::Tui => unreachable!("handled above"),
        Command::Login(login) => {
            let email = email_or_configured(login.email.as_deref(), &config)?;
            cli::login(&client, &email, &configured_password(&config)?)
        }
        Command::Logout => {
            ensure_session(&client, &config)?;
            cli::logout(&client)
        }
        Command::Signup(signup) => {
            cli::signup(&client, &signup.name, &signup.email, &configured_password(&config)?)
        }
        Command::ResetPassword(reset) => {
            let email = email_or_configured(reset.email.as_deref(), &config)?;
            cli::reset_password(&client, &email)
        }
        Command::ChangePassword(change) => {
            ensure_session(&client, &config)?;
            let current = match &change.current {
                Some(current) => current.clone(),
                None => configured_password(&config)?,
            };
            cli::change_password(&client, &current, &change.new)
        }
        Command::Archives => cli::archives(&client),
        Command::Watch(watch) => {
            ensure_session(&client, &config)?;
            match &watch.action {
                WatchAction::List => cli::watch_list(&client),
                WatchAction::Add { branch, cutoff } => {
                    cli::watch_add(&client, &parse_branch(branch)?, cutoff)
                }
                WatchAction::Remove { branch } => {
                    cli::watch_remove(&client, &parse_branch(branch)?)
                }
            }
        }
        Command::Check(check) => {
            ensure_session(&client, &config)?;
            let branch = check.branch.as_deref().map(parse_branch).transpose()?;
            cli::check(&client, branch.as_ref(), check.tree)
        }
        Command::Resolve(resolve) => {
            ensure_session(&client, &config)?;
            let path = RecordPath::parse(&resolve.path)?;
            cli::resolve(&client, &path, resolve.deep, resolve.yes)
        }
        Command::Page(page) => {
            ensure_session(&client, &config)?;
            let path = RecordPath::parse(&page.path)?;
            let mut request = PageRequest::for_record(&path, page.compare.clone());
            request.translate = page.translate;
            match &page.download {
                Some(output) => cli::download(&client, &request, output),
                None => cli::page(&client, &request),
            }
        }
        Command::Translate(translate) => {
            ensure_session(&client, &config)?;
            let path = RecordPath::parse(&translate.path)?;
            cli::translate(&client, &path, translate.wait, &config.polling)
        }
    }
}

/// Log in with the configured credentials when present. Commands run
/// unauthenticated otherwise and surface the service's 401.
fn ensure_session(client: &ApiClient, config: &Config) -> Result<()> {
    if config.session.email.is_empty() || config.session.password.is_empty() {
        return Ok(());
    }
    client.login(&config.session.email, &config.session.password)?;
    Ok(())
}

fn email_or_configured(arg: Option<&str>, config: &Config) -> Result<String> {
    match arg {
        Some(email) => Ok(email.to_owned()),
        None if !config.session.email.is_empty() => Ok(config.session.email.clone()),
        None => Err(BdError::InvalidConfig {
            details: "no email given and session.email is not configured".to_owned(),
        }),
    }
}

fn configured_password(config: &Config) -> Result<String> {
    if config.session.password.is_empty() {
        return Err(BdError::InvalidConfig {
            details: "session.password is not configured (set BIRDDOG_PASSWORD)".to_owned(),
        });
    }
    Ok(config.session.password.clone())
}

fn parse_branch(key: &str) -> Result<Branch> {
    let (archive, subarchive) = key.split_once('-').ok_or_else(|| BdError::Runtime {
        details: format!("branch key must look like ARCHIVE-SUBARCHIVE, got {key:?}"),
    })?;
    Ok(Branch::new(archive, subarchive))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_branch_splits_on_first_dash() {
        let branch = parse_branch("DAZHO-R").unwrap();
        assert_eq!(branch.archive, "DAZHO");
        assert_eq!(branch.subarchive, "R");
        // Subarchives may themselves contain dashes.
        let branch = parse_branch("DAKrO-P-2").unwrap();
        assert_eq!(branch.subarchive, "P-2");
        assert!(parse_branch("DAZHO").is_err());
    }

    #[test]
    fn check_subcommand_parses_tree_flag() {
        let cli = Cli::parse_from(["bd", "check", "DAZHO-R", "--tree"]);
        match cli.command {
            Command::Check(args) => {
                assert_eq!(args.branch.as_deref(), Some("DAZHO-R"));
                assert!(args.tree);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn resolve_subcommand_parses_deep_and_yes() {
        let cli = Cli::parse_from(["bd", "resolve", "DAZHO-R/177", "--deep", "-y"]);
        match cli.command {
            Command::Resolve(args) => {
                assert_eq!(args.path, "DAZHO-R/177");
                assert!(args.deep);
                assert!(args.yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn page_subcommand_parses_download_target() {
        let cli = Cli::parse_from(["bd", "page", "DAZHO-R/177", "--download", "fond.xlsx"]);
        match cli.command {
            Command::Page(args) => {
                assert_eq!(args.download.as_deref(), Some(Path::new("fond.xlsx")));
                assert!(!args.translate);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn email_fallback_uses_config() {
        let mut config = Config::default();
        config.session.email = "user@example.org".to_owned();
        assert_eq!(
            email_or_configured(None, &config).unwrap(),
            "user@example.org"
        );
        assert_eq!(
            email_or_configured(Some("other@example.org"), &config).unwrap(),
            "other@example.org"
        );
        config.session.email.clear();
        assert!(email_or_configured(None, &config).is_err());
    }
}
