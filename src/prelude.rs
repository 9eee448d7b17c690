//! Convenience re-exports for library consumers.

pub use crate::api::client::{ApiClient, PageRequest};
pub use crate::api::types::{PageData, TranslationTask, WatchlistEntry};
pub use crate::core::config::Config;
pub use crate::core::errors::{BdError, Result};
pub use crate::core::record::{Branch, RecordPath};
pub use crate::logger::{EventType, JsonlLogger, LogEntry, Severity};
pub use crate::updates::expansion::ExpansionState;
pub use crate::updates::flatten::{FlatRow, flatten};
pub use crate::updates::tree::{PathEntry, UpdateForest, UpdateMeta, UpdateNode};
