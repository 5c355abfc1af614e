//! Locate the revision template and the version boundaries.

use tracing::{debug, trace};

use super::TEMPLATE_AUTHOR;
use crate::changelog::{ChangeSet, ChangeSetKey, Changelog};

/// A tag boundary and the change set carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub tag: String,
    pub owner: ChangeSetKey,
}

/// Result of [`scan`].
#[derive(Debug, Clone)]
pub struct Scan {
    /// The removed template change set
    pub template: Option<ChangeSet>,
    /// Boundaries in changelog order
    pub boundaries: Vec<Boundary>,
    /// Whether an ordinary change set follows the last boundary
    pub tail_has_followers: bool,
}

/// Walk the changelog once, removing the template and collecting boundaries.
///
/// Only boundaries after the template are collected. A boundary is committed
/// once an ordinary change set follows it; consecutive boundaries keep only the
/// last one. A boundary still pending at the end is committed too, and then
/// `tail_has_followers` is false.
pub fn scan(changelog: &mut Changelog) -> Scan {
    let mut template: Option<ChangeSet> = None;
    let mut boundaries = Vec::new();
    let mut pending: Option<Boundary> = None;

    let mut index = 0;
    while index < changelog.len() {
        let Some(change_set) = changelog.get(index) else {
            break;
        };

        if template.is_none() {
            if change_set.author == TEMPLATE_AUTHOR {
                let removed = changelog.remove(index);
                debug!(template = %removed.key(), "found revision template");
                template = Some(removed);
                continue;
            }
        } else if let Some(tag) = change_set.tag() {
            if let Some(superseded) = &pending {
                trace!(tag = %superseded.tag, "boundary superseded by adjacent tag {}", tag);
            }
            pending = Some(Boundary {
                tag: tag.to_string(),
                owner: change_set.key(),
            });
        } else if let Some(boundary) = pending.take() {
            boundaries.push(boundary);
        }

        index += 1;
    }

    let tail_has_followers = match pending {
        Some(boundary) => {
            boundaries.push(boundary);
            false
        }
        None => true,
    };

    Scan {
        template,
        boundaries,
        tail_has_followers,
    }
}
