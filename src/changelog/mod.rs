//! Changelog model.
//!
//! A [`Changelog`] owns an ordered list of [`ChangeSet`]s. Order is execution
//! order; rollback walks it backwards. Change sets are identified by their
//! [`ChangeSetKey`], never by position, because positions shift when revisions
//! are inserted.

pub mod changes;
mod changeset;

pub use changes::{Change, Database};
pub use changeset::{ChangeSet, Execution, ExecType};

use serde::{Deserialize, Serialize};

/// `id + author + file path`, unique within a changelog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeSetKey {
    pub id: String,
    pub author: String,
    pub file_path: String,
}

impl ChangeSetKey {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            file_path: file_path.into(),
        }
    }

    /// Compare keys, optionally ignoring a `classpath:` prefix on the path.
    pub fn matches(&self, other: &ChangeSetKey, ignore_classpath_prefix: bool) -> bool {
        if ignore_classpath_prefix {
            self.id == other.id
                && self.author == other.author
                && strip_classpath(&self.file_path) == strip_classpath(&other.file_path)
        } else {
            self == other
        }
    }
}

fn strip_classpath(path: &str) -> &str {
    path.strip_prefix("classpath:").unwrap_or(path)
}

impl std::fmt::Display for ChangeSetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}::{}", self.file_path, self.id, self.author)
    }
}

/// An ordered, owned list of change sets.
#[derive(Debug, Clone, Default)]
pub struct Changelog {
    /// Path of the root changelog file
    pub physical_path: String,
    change_sets: Vec<ChangeSet>,
}

impl Changelog {
    pub fn new(physical_path: impl Into<String>) -> Self {
        Self {
            physical_path: physical_path.into(),
            change_sets: Vec::new(),
        }
    }

    pub fn change_set(mut self, change_set: ChangeSet) -> Self {
        self.push(change_set);
        self
    }

    pub fn push(&mut self, change_set: ChangeSet) {
        self.change_sets.push(change_set);
    }

    pub fn insert(&mut self, index: usize, change_set: ChangeSet) {
        self.change_sets.insert(index, change_set);
    }

    pub fn remove(&mut self, index: usize) -> ChangeSet {
        self.change_sets.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&ChangeSet> {
        self.change_sets.get(index)
    }

    /// Position of the change set with `key`.
    pub fn position(&self, key: &ChangeSetKey) -> Option<usize> {
        self.change_sets.iter().position(|cs| cs.has_key(key))
    }

    pub fn find(&self, key: &ChangeSetKey, ignore_classpath_prefix: bool) -> Option<&ChangeSet> {
        self.change_sets
            .iter()
            .find(|cs| cs.key().matches(key, ignore_classpath_prefix))
    }

    pub fn contains(&self, key: &ChangeSetKey) -> bool {
        self.position(key).is_some()
    }

    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeSet> {
        self.change_sets.iter()
    }

    pub fn keys(&self) -> Vec<ChangeSetKey> {
        self.change_sets.iter().map(ChangeSet::key).collect()
    }

    pub fn len(&self) -> usize {
        self.change_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }
}

impl<'a> IntoIterator for &'a Changelog {
    type Item = &'a ChangeSet;
    type IntoIter = std::slice::Iter<'a, ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.change_sets.iter()
    }
}
