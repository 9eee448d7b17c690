#![forbid(unsafe_code)]

//! Birddog client (bd): terminal front end for the Birddog
//! archival-records monitoring service.
//!
//! Three surfaces:
//! 1. **Record browser**: archive/fond/opus/case pages with breadcrumbs,
//!    history, and version comparison
//! 2. **Watchlist**: archive-subarchive branches monitored for changes
//! 3. **Unresolved updates**: a collapsible path tree of detected changes,
//!    resolvable per record or per subtree
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use birddog::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use birddog::core::config::Config;
//! use birddog::updates::tree::{UpdateForest, PathEntry};
//! ```

pub mod prelude;

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod logger;
#[cfg(feature = "tui")]
pub mod tui;
pub mod updates;
