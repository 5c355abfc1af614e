//! Build revision change sets from the template and insert them.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::scanner::Boundary;
use super::templated::TemplatedChange;
use super::{RunGuard, UNRELEASED_VERSION};
use crate::changelog::{Change, ChangeSet, ChangeSetKey, Changelog};
use crate::parser::LoadError;
use crate::placeholder::VersionPair;

/// Insert one revision per qualifying boundary interval.
///
/// Returns the keys of the inserted revisions in insertion order. A revision
/// whose key is already taken fails with [`LoadError::DuplicateChangeSet`].
pub fn synthesize(
    changelog: &mut Changelog,
    boundaries: &[Boundary],
    tail_has_followers: bool,
    template: &ChangeSet,
) -> Result<Vec<ChangeSetKey>, LoadError> {
    let mut inserted = Vec::new();

    for (i, boundary) in boundaries.iter().enumerate() {
        let current = match boundaries.get(i + 1) {
            Some(next) => next.tag.clone(),
            None if tail_has_followers => UNRELEASED_VERSION.to_string(),
            None => {
                debug!(tag = %boundary.tag, "last boundary has no followers, no revision");
                continue;
            }
        };
        let versions = VersionPair::new(boundary.tag.clone(), current);

        // Looked up per insertion: earlier insertions shift positions
        let Some(owner_index) = changelog.position(&boundary.owner) else {
            warn!(owner = %boundary.owner, "boundary owner vanished from changelog");
            continue;
        };
        let owner_path = changelog
            .get(owner_index)
            .map(|owner| owner.file_path.clone())
            .unwrap_or_default();

        let revision = build_revision(template, &versions, owner_path);
        let key = revision.key();
        if changelog.contains(&key) {
            return Err(LoadError::DuplicateChangeSet {
                path: PathBuf::from(&changelog.physical_path),
                key,
            });
        }
        debug!(revision = %key, versions = %versions, "inserting revision");
        inserted.push(key);
        changelog.insert(owner_index + 1, revision);
    }

    Ok(inserted)
}

/// A revision change set for one interval.
pub fn build_revision(
    template: &ChangeSet,
    versions: &VersionPair,
    file_path: String,
) -> ChangeSet {
    let id = versions.apply(&template.id);
    let mut revision = ChangeSet::new(id, template.author.clone(), file_path)
        .always_run(template.always_run)
        .run_on_change(template.run_on_change)
        .run_in_transaction(template.run_in_transaction)
        .quoting(template.quoting)
        .dbms_list(&template.dbms_string())
        .guarded(RunGuard);
    revision.contexts = template.contexts.clone();

    for change in &template.changes {
        revision = revision.shared_change(wrap(change, versions));
    }
    for change in &template.rollback {
        revision = revision.shared_rollback_change(wrap(change, versions));
    }
    revision
}

fn wrap(change: &Arc<dyn Change>, versions: &VersionPair) -> Arc<dyn Change> {
    Arc::new(TemplatedChange::new(Arc::clone(change), versions.clone()))
}
