//! Wire types for the Birddog service API.
//!
//! Shapes mirror the service's JSON responses; unknown fields are
//! ignored so the client tolerates additive server changes.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

pub use crate::updates::tree::{PathEntry, UpdateMeta};

/// Bilingual text: original Ukrainian plus optional English translation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Text {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    /// Comparison marker set when the page was fetched with `compare`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<ChangeMark>,
}

impl Text {
    /// Translated text if present, otherwise the original.
    #[must_use]
    pub fn get(&self) -> &str {
        self.en
            .as_deref()
            .or(self.uk.as_deref())
            .unwrap_or_default()
    }
}

/// Diff marker attached to cells and captions during version comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeMark {
    Changed,
    Added,
}

/// A single table cell of a record page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub text: Text,
    /// Upstream wiki link; rows whose first cell has a dead link
    /// ("redlink") are not navigable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<ChangeMark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_edit: Option<ChangeMark>,
}

impl Cell {
    /// Whether the cell's link is present and live.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.link
            .as_deref()
            .is_some_and(|l| !l.contains("redlink"))
    }
}

/// Hierarchy level of a record page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Archive,
    Fond,
    Opus,
    Case,
}

impl PageKind {
    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Fond => "fond",
            Self::Opus => "opus",
            Self::Case => "case",
        }
    }
}

/// One entry of a page's (server-side compressed) version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub modified: String,
}

/// A record page as returned by `GET /page`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    #[serde(default)]
    pub title: Text,
    #[serde(default)]
    pub description: Text,
    #[serde(default)]
    pub lastmod: String,
    /// Modification date of the comparison reference, when comparing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refmod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub kind: PageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subarchive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fond: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    #[serde(default)]
    pub needs_translation: bool,
    #[serde(default)]
    pub header: Vec<Text>,
    #[serde(default)]
    pub children: Vec<Vec<Cell>>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl PageData {
    /// Hierarchy identifiers present on this page, broadest first.
    /// Drives breadcrumb construction; levels below the first absent
    /// one are ignored.
    #[must_use]
    pub fn breadcrumb_parts(&self) -> Vec<&str> {
        let mut parts = Vec::new();
        let levels = [&self.archive, &self.fond, &self.opus, &self.case];
        for level in levels {
            match level.as_deref().filter(|s| !s.is_empty()) {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        parts
    }
}

/// One watched archive branch from `GET /watchlist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub archive: String,
    pub subarchive: String,
    #[serde(default)]
    pub last_checked_date: String,
    #[serde(default)]
    pub cutoff_date: String,
}

/// Response of check/resolve calls: the branch's unresolved set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnresolvedResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub unresolved: Vec<PathEntry>,
}

/// Progress of one in-flight translation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationTask {
    pub page_name: String,
    #[serde(default)]
    pub progress: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub running: bool,
}

/// Response of `GET /translate[...]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub translations: Vec<TranslationTask>,
}

/// Generic success/message envelope for auth and watchlist mutations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
