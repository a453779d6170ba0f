//! Commit operations: commit, read, and the paged log.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::dag;
use crate::error::IndexError;
use crate::ident::{RecordKind, address_of};
use crate::model::records::{Branch, Commit};
use crate::model::types::Address;
use crate::store::{Page, RepoOps, RepoReadOps, Store};

use super::{
    Index, check_ref, parse_branch_name, parse_commit_id, parse_repo_id, partial_commit,
    read_repo_record, require_message, resolve_ref,
};

impl<S: Store> Index<S> {
    /// Commit a branch: fold the workspace, snapshot `workspace_root` as a
    /// new commit with the previous tip as sole parent, and advance the
    /// branch. Returns the new commit and its address.
    ///
    /// # Errors
    /// [`IndexError::EmptyCommitMessage`] before any transaction;
    /// [`IndexError::BranchNotFound`] if the branch does not exist.
    #[instrument(skip(self, metadata), fields(repo = repo_id))]
    pub fn commit(
        &self,
        repo_id: &str,
        branch: &str,
        message: &str,
        committer: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<(Address, Commit), IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        require_message(message)?;
        self.check_cancel()?;

        let now = self.now();
        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let folded = partial_commit(tx, &name)?;

            let commit = Commit {
                tree: folded.workspace_root.clone(),
                parents: vec![folded.commit.clone()],
                committer: committer.to_owned(),
                message: message.to_owned(),
                timestamp: now,
                metadata,
            };
            let address = address_of(RecordKind::Commit, &commit)?;
            tx.write_commit(&address, &commit)?;

            let advanced = Branch {
                commit: address.clone(),
                commit_root: commit.tree.clone(),
                workspace_root: commit.tree.clone(),
            };
            tx.write_branch(&name, &advanced)?;
            Ok((address, commit))
        })
    }

    /// Read a commit by address.
    ///
    /// # Errors
    /// [`IndexError::InvalidCommitId`] for malformed input,
    /// [`IndexError::CommitNotFound`] if nothing is stored there.
    pub fn get_commit(&self, repo_id: &str, commit_id: &str) -> Result<Commit, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let address = parse_commit_id(commit_id)?;
        self.check_cancel()?;
        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            tx.read_commit(&address).map_err(|e| {
                if e.is_not_found() {
                    IndexError::CommitNotFound { id: address.as_str().to_owned() }
                } else {
                    IndexError::Store(e)
                }
            })
        })
    }

    /// A breadth-first page of the commit log starting at `reference`.
    ///
    /// `after` is the continuation token: the last commit address of the
    /// previous page.
    ///
    /// # Errors
    /// Validation, reference, and store failures.
    pub fn get_commit_log(
        &self,
        repo_id: &str,
        reference: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<Page<(Address, Commit)>, IndexError> {
        let id = parse_repo_id(repo_id)?;
        check_ref(reference)?;
        let after = after.map(parse_commit_id).transpose()?;
        self.check_cancel()?;

        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let resolved = resolve_ref(tx, reference)?;
            dag::bfs_scan(tx, resolved.commit_address(), limit, after.as_ref())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
