//! Record addressing: hierarchy levels and slash-separated record paths.
//!
//! A record path is the hierarchical key used by the update-tracking API:
//! `ARCHIVE-SUB/fond/opus/case`, broadest level first. The first segment
//! is an archive tag and a subarchive tag joined by `-`; deeper segments
//! are plain identifiers and may be absent (a path may stop at any level).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{BdError, Result};

/// An archive-subarchive pair, the unit a watchlist entry monitors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Branch {
    /// Archive tag, e.g. `DAZHO`.
    pub archive: String,
    /// Subarchive tag within the archive.
    pub subarchive: String,
}

impl Branch {
    /// Create a branch from its two tags.
    #[must_use]
    pub fn new(archive: impl Into<String>, subarchive: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            subarchive: subarchive.into(),
        }
    }

    /// The `ARCHIVE-SUB` key used as the first path segment.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.archive, self.subarchive)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.archive, self.subarchive)
    }
}

/// A fully parsed record path: branch plus up to three deeper levels.
///
/// Equality and ordering follow the canonical slash-joined string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordPath {
    /// Monitored branch the record belongs to.
    pub branch: Branch,
    /// Fond identifier, if the path descends past the branch.
    pub fond: Option<String>,
    /// Opus identifier, requires `fond`.
    pub opus: Option<String>,
    /// Case identifier, requires `opus`.
    pub case: Option<String>,
}

impl RecordPath {
    /// Parse a slash-separated path such as `DAZHO-R/177/1/203`.
    ///
    /// The first segment must contain a `-` separating archive and
    /// subarchive tags; at most three further segments are accepted.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let head = segments.next().ok_or_else(|| BdError::Runtime {
            details: format!("empty record path: {path:?}"),
        })?;
        let (archive, subarchive) = head.split_once('-').ok_or_else(|| BdError::Runtime {
            details: format!("record path head {head:?} has no archive-subarchive separator"),
        })?;
        let fond = segments.next().map(str::to_owned);
        let opus = segments.next().map(str::to_owned);
        let case = segments.next().map(str::to_owned);
        if segments.next().is_some() {
            return Err(BdError::Runtime {
                details: format!("record path {path:?} has more than four levels"),
            });
        }
        Ok(Self {
            branch: Branch::new(archive, subarchive),
            fond,
            opus,
            case,
        })
    }

    /// Path segments below the branch, in order, for URL construction.
    #[must_use]
    pub fn descent(&self) -> Vec<&str> {
        [self.fond.as_deref(), self.opus.as_deref(), self.case.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Depth of the path: 0 for a bare branch, 3 for a full case path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.descent().len()
    }

    /// Canonical slash-joined form, `ARCHIVE-SUB/fond/opus/case`.
    #[must_use]
    pub fn to_key(&self) -> String {
        let mut key = self.branch.key();
        for seg in self.descent() {
            key.push('/');
            key.push_str(seg);
        }
        key
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}
