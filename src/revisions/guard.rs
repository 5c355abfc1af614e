//! Execution-time guard for revision change sets.

use tracing::{debug, warn};

use crate::changelog::{ChangeSet, Changelog};
use crate::error::ExecError;
use crate::filter::WouldRun;

/// Lets a revision run only when some later change set will run too.
///
/// Without it, every update would end with an audit revision that covers no
/// change at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunGuard;

impl RunGuard {
    /// Whether `revision` should execute.
    ///
    /// Every change set after the revision's position is checked with
    /// `oracle`. A failure to evaluate the oracle is fatal.
    pub fn permits(
        &self,
        revision: &ChangeSet,
        changelog: &Changelog,
        oracle: &dyn WouldRun,
    ) -> Result<bool, ExecError> {
        let Some(position) = changelog.position(&revision.key()) else {
            warn!(change_set = %revision.key(), "revision is not part of the changelog");
            return Ok(false);
        };

        for later in &changelog.change_sets()[position + 1..] {
            let runs = oracle
                .would_run(later)
                .map_err(|source| ExecError::Applicability {
                    change_set: later.key(),
                    source,
                })?;
            if runs {
                debug!(
                    revision = %revision.key(),
                    follower = %later.key(),
                    "revision has a follower"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}
