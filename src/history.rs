//! Applied change set history.
//!
//! Records which change sets ran, when, and with which checksum. The JSON file
//! store rewrites the whole file on every mutation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::changelog::{ChangeSet, ChangeSetKey, ExecType};
use crate::error::HistoryError;

/// One applied change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RanChangeSet {
    #[serde(flatten)]
    pub key: ChangeSetKey,
    pub checksum: String,
    pub exec_type: ExecType,
    pub date_executed: DateTime<Utc>,
    pub order_executed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Storage for applied change sets.
pub trait ChangeLogHistory {
    /// Entries in execution order.
    fn ran_change_sets(&self) -> Result<Vec<RanChangeSet>, HistoryError>;

    fn lookup(
        &self,
        key: &ChangeSetKey,
        ignore_classpath_prefix: bool,
    ) -> Result<Option<RanChangeSet>, HistoryError> {
        Ok(self
            .ran_change_sets()?
            .into_iter()
            .find(|ran| ran.key.matches(key, ignore_classpath_prefix)))
    }

    /// Record `change_set` as applied, replacing an earlier entry for the same key.
    fn mark_ran(&mut self, change_set: &ChangeSet, exec_type: ExecType) -> Result<(), HistoryError>;

    fn remove(&mut self, key: &ChangeSetKey) -> Result<(), HistoryError>;
}

/// History kept in memory only.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    entries: Vec<RanChangeSet>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(mut entries: Vec<RanChangeSet>) -> Self {
        entries.sort_by_key(|e| e.order_executed);
        Self { entries }
    }

    pub fn entries(&self) -> &[RanChangeSet] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ChangeLogHistory for InMemoryHistory {
    fn ran_change_sets(&self) -> Result<Vec<RanChangeSet>, HistoryError> {
        Ok(self.entries.clone())
    }

    fn lookup(
        &self,
        key: &ChangeSetKey,
        ignore_classpath_prefix: bool,
    ) -> Result<Option<RanChangeSet>, HistoryError> {
        Ok(self
            .entries
            .iter()
            .find(|ran| ran.key.matches(key, ignore_classpath_prefix))
            .cloned())
    }

    fn mark_ran(
        &mut self,
        change_set: &ChangeSet,
        exec_type: ExecType,
    ) -> Result<(), HistoryError> {
        let key = change_set.key();
        let next_order = self.entries.iter().map(|e| e.order_executed).max().unwrap_or(0) + 1;
        let entry = RanChangeSet {
            key: key.clone(),
            checksum: change_set.checksum(),
            exec_type,
            date_executed: Utc::now(),
            order_executed: next_order,
            tag: change_set.tag().map(str::to_string),
        };
        self.entries.retain(|e| e.key != key);
        self.entries.push(entry);
        Ok(())
    }

    fn remove(&mut self, key: &ChangeSetKey) -> Result<(), HistoryError> {
        self.entries.retain(|e| &e.key != key);
        Ok(())
    }
}

/// History persisted as a JSON array.
#[derive(Debug)]
pub struct JsonFileHistory {
    path: PathBuf,
    inner: InMemoryHistory,
}

impl JsonFileHistory {
    /// Open the history at `path`; a missing file is an empty history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| HistoryError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| HistoryError::Json {
                path: path.clone(),
                source,
            })?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), "opened history");
        Ok(Self {
            path,
            inner: InMemoryHistory::from_entries(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| HistoryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self.inner.entries())
            .map_err(|source| HistoryError::Json {
                path: self.path.clone(),
                source,
            })?;
        fs::write(&self.path, json).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ChangeLogHistory for JsonFileHistory {
    fn ran_change_sets(&self) -> Result<Vec<RanChangeSet>, HistoryError> {
        self.inner.ran_change_sets()
    }

    fn lookup(
        &self,
        key: &ChangeSetKey,
        ignore_classpath_prefix: bool,
    ) -> Result<Option<RanChangeSet>, HistoryError> {
        self.inner.lookup(key, ignore_classpath_prefix)
    }

    fn mark_ran(
        &mut self,
        change_set: &ChangeSet,
        exec_type: ExecType,
    ) -> Result<(), HistoryError> {
        self.inner.mark_ran(change_set, exec_type)?;
        self.save()
    }

    fn remove(&mut self, key: &ChangeSetKey) -> Result<(), HistoryError> {
        self.inner.remove(key)?;
        self.save()
    }
}
