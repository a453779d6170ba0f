//! Three-way merge of a source reference into a destination branch.
//!
//! The merge never rewrites history: it applies everything the source
//! contributed relative to the merge base onto the destination's
//! committed tree and records a two-parent commit. Conflict *detection*
//! is the whole story here — resolution belongs to the caller, who gets
//! the full difference list back with the error.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::dag;
use crate::error::IndexError;
use crate::ident::{RecordKind, address_of};
use crate::merkle::{Merkle, diff3};
use crate::model::diff::{DiffKind, DiffSide, Difference};
use crate::model::records::{Branch, Commit, StagedChange, WorkspaceEntry};
use crate::model::types::Address;
use crate::store::{RepoOps, RepoReadOps, Store};

use super::{
    Index, check_ref, parse_branch_name, parse_repo_id, read_branch_record, read_repo_record,
    resolve_ref,
};

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// A successful merge: the new commit and the differences that were
/// applied.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// Address of the merge commit.
    pub address: Address,
    /// The merge commit (parents: destination tip first, then source).
    pub commit: Commit,
    /// The full three-way difference list the merge was computed from.
    pub differences: Vec<Difference>,
}

impl<S: Store> Index<S> {
    /// Merge `source_ref` into the branch `destination`.
    ///
    /// The destination must have no uncommitted work. Everything the
    /// source contributed relative to the merge base (every non-right
    /// difference) is applied to the destination's committed tree;
    /// removals become tombstones, additions and changes carry the entry
    /// read from the source tree.
    ///
    /// # Errors
    /// - [`IndexError::DestinationNotCommitted`] when the destination has
    ///   staged or folded-but-uncommitted changes;
    /// - [`IndexError::NoMergeBase`] when the histories are disjoint;
    /// - [`IndexError::MergeConflict`] carrying the complete difference
    ///   list when both sides touched a path differently;
    /// - [`IndexError::MergeUpdateFailed`] when applying the operations to
    ///   the destination tree fails.
    #[instrument(skip(self), fields(repo = repo_id, source = source_ref))]
    pub fn merge(
        &self,
        repo_id: &str,
        source_ref: &str,
        destination: &str,
        committer: &str,
    ) -> Result<MergeOutcome, IndexError> {
        let id = parse_repo_id(repo_id)?;
        check_ref(source_ref)?;
        let dest_name = parse_branch_name(destination)?;
        self.check_cancel()?;

        let now = self.now();
        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;

            let dest = read_branch_record(tx, &dest_name)?;
            if dest.commit_root != dest.workspace_root || !tx.list_workspace(&dest_name)?.is_empty()
            {
                return Err(IndexError::DestinationNotCommitted {
                    branch: dest_name.as_str().to_owned(),
                });
            }

            let source = resolve_ref(tx, source_ref)?;
            let source_commit = source.commit_address().clone();
            let source_tree = source.read_tree(true);
            let dest_tree = Merkle::at(dest.commit_root.clone());

            let Some((_, base)) =
                dag::find_lowest_common_ancestor(tx, &source_commit, &dest.commit)?
            else {
                return Err(IndexError::NoMergeBase);
            };

            let differences = diff3(tx, &source_tree, &dest_tree, &Merkle::at(base.tree))?;
            if differences.iter().any(Difference::is_conflict) {
                return Err(IndexError::MergeConflict { differences });
            }

            // Everything the source contributes: every difference that is
            // not purely the destination's own.
            let mut operations = Vec::new();
            for diff in differences.iter().filter(|d| d.side != DiffSide::Right) {
                let change = match diff.kind {
                    DiffKind::Removed => StagedChange::Delete {
                        name: diff.path.basename().to_owned(),
                        timestamp: now,
                    },
                    DiffKind::Added | DiffKind::Changed => {
                        let entry = source_tree
                            .get_entry(tx, &diff.path, diff.path_kind)
                            .map_err(|e| IndexError::MergeUpdateFailed {
                                detail: format!(
                                    "source entry for '{}' could not be read: {e}",
                                    diff.path
                                ),
                            })?;
                        StagedChange::Put { entry }
                    }
                };
                operations.push(WorkspaceEntry { path: diff.path.clone(), change });
            }

            let merged = dest_tree
                .update(tx, &operations)
                .map_err(|e| IndexError::MergeUpdateFailed { detail: e.to_string() })?;

            let commit = Commit {
                tree: merged.root().clone(),
                parents: vec![dest.commit.clone(), source_commit],
                committer: committer.to_owned(),
                message: format!("Merge branch '{source_ref}' into '{destination}'"),
                timestamp: now,
                metadata: BTreeMap::new(),
            };
            let address = address_of(RecordKind::Commit, &commit)?;
            tx.write_commit(&address, &commit)?;
            tx.write_branch(&dest_name, &Branch {
                commit: address.clone(),
                commit_root: commit.tree.clone(),
                workspace_root: commit.tree.clone(),
            })?;

            Ok(MergeOutcome { address, commit, differences })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
