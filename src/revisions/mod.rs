//! Audit revision synthesis.
//!
//! A changelog opts in by declaring one template change set authored by
//! [`TEMPLATE_AUTHOR`]. Every tag database change after it opens a version
//! interval. Each interval gets a revision built from the template, inserted
//! right after the tag, with `@PREVIOUS_VERSION@` / `@CURRENT_VERSION@`
//! replaced by the interval's labels.
//!
//! ```text
//! template            (removed)
//! Test 1
//! Tag 1.0.0
//!   -> revision 1.0.0 .. 1.0.1   (inserted)
//! Test 2
//! Tag 1.0.1
//! Test 3
//!   ... revision 1.0.1 .. develop is inserted after Tag 1.0.1
//! ```

mod guard;
pub mod scanner;
pub mod synthesizer;
pub mod templated;

pub use guard::RunGuard;
pub use scanner::{Boundary, Scan, scan};
pub use synthesizer::{build_revision, synthesize};
pub use templated::TemplatedChange;

use std::path::Path;

use tracing::info;

use crate::changelog::{ChangeSetKey, Changelog};
use crate::parser::{ChangelogLoader, LoadError};

/// Author value that marks the revision template.
pub const TEMPLATE_AUTHOR: &str = "liquibase-envers-support plugin";

/// Label used as current version after the last tag.
pub const UNRELEASED_VERSION: &str = "develop";

/// What [`add_revisions`] did to a changelog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionReport {
    pub template: Option<ChangeSetKey>,
    pub boundaries: Vec<Boundary>,
    pub inserted: Vec<ChangeSetKey>,
}

/// Scan `changelog` and insert revisions in place.
///
/// Without a template or without boundaries this only removes the template.
/// Fails when a revision key is already taken, which happens when the
/// template id carries no version placeholder.
pub fn add_revisions(changelog: &mut Changelog) -> Result<RevisionReport, LoadError> {
    let result = scan(changelog);
    let Some(template) = result.template else {
        return Ok(RevisionReport::default());
    };

    let inserted =
        synthesize(changelog, &result.boundaries, result.tail_has_followers, &template)?;
    Ok(RevisionReport {
        template: Some(template.key()),
        boundaries: result.boundaries,
        inserted,
    })
}

/// Loader that adds revisions to whatever its delegate loads.
///
/// The delegate is called exactly once per load. Includes are resolved by the
/// delegate, so the revision pass never sees a partial changelog.
#[derive(Debug, Clone)]
pub struct RevisionLoader<L> {
    delegate: L,
}

impl<L: ChangelogLoader> RevisionLoader<L> {
    pub fn new(delegate: L) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &L {
        &self.delegate
    }

    /// Load through the delegate and report what was inserted.
    pub fn load_with_report(
        &self,
        path: &Path,
    ) -> Result<(Changelog, RevisionReport), LoadError> {
        let mut changelog = self.delegate.load(path)?;
        let report = add_revisions(&mut changelog)?;
        match &report.template {
            Some(template) => info!(
                template = %template,
                boundaries = report.boundaries.len(),
                revisions = report.inserted.len(),
                "added audit revisions"
            ),
            None => info!(path = %path.display(), "no revision template, changelog unchanged"),
        }
        Ok((changelog, report))
    }
}

impl<L: ChangelogLoader> ChangelogLoader for RevisionLoader<L> {
    fn supports(&self, path: &Path) -> bool {
        self.delegate.supports(path)
    }

    fn load(&self, path: &Path) -> Result<Changelog, LoadError> {
        self.load_with_report(path).map(|(changelog, _)| changelog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ChangeSet;
    use crate::changelog::changes::{RawSql, TagDatabase};

    struct Fixed(Changelog);

    impl ChangelogLoader for Fixed {
        fn supports(&self, path: &Path) -> bool {
            path.extension().is_some_and(|e| e == "fixed")
        }

        fn load(&self, _path: &Path) -> Result<Changelog, LoadError> {
            Ok(self.0.clone())
        }
    }

    fn test_set(id: &str) -> ChangeSet {
        ChangeSet::new(id, "JUnit", "master.toml").change(RawSql::new("SELECT 1"))
    }

    fn tag(version: &str) -> ChangeSet {
        ChangeSet::new(format!("Tag {}", version), "release", "master.toml")
            .change(TagDatabase::new(version))
    }

    fn base() -> Changelog {
        Changelog::new("master.toml")
            .change_set(ChangeSet::new(
                "Revision @CURRENT_VERSION@",
                TEMPLATE_AUTHOR,
                "master.toml",
            ))
            .change_set(test_set("Test 1"))
            .change_set(tag("1.0.0"))
    }

    #[test]
    fn test_add_revisions_without_template() {
        let mut log = Changelog::new("master.toml")
            .change_set(tag("1.0.0"))
            .change_set(ChangeSet::new("Test 1", "JUnit", "master.toml"));
        let report = add_revisions(&mut log).unwrap();
        assert_eq!(report, RevisionReport::default());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_add_revisions_without_followers() {
        let mut log = base();
        let report = add_revisions(&mut log).unwrap();
        assert!(report.template.is_some());
        assert_eq!(report.boundaries.len(), 1);
        assert!(report.inserted.is_empty());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_loader_wraps_delegate() {
        let log = base().change_set(ChangeSet::new("Test 2", "JUnit", "master.toml"));
        let loader = RevisionLoader::new(Fixed(log));
        assert!(loader.supports(Path::new("x.fixed")));
        assert!(!loader.supports(Path::new("x.toml")));

        let (loaded, report) = loader.load_with_report(Path::new("x.fixed")).unwrap();
        assert_eq!(
            report.inserted,
            vec![ChangeSetKey::new("Revision develop", TEMPLATE_AUTHOR, "master.toml")]
        );
        assert_eq!(loaded.get(2).unwrap().id, "Revision develop");
    }

    #[test]
    fn test_loader_rejects_colliding_revisions() {
        let log = Changelog::new("master.toml")
            .change_set(ChangeSet::new("Envers revision", TEMPLATE_AUTHOR, "master.toml"))
            .change_set(tag("A"))
            .change_set(test_set("x"))
            .change_set(tag("B"))
            .change_set(test_set("y"));
        let loader = RevisionLoader::new(Fixed(log));

        let err = loader.load(Path::new("x.fixed")).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DuplicateChangeSet { ref key, .. } if key.id == "Envers revision"
        ));
    }
}
