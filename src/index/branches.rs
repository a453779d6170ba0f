//! Branch operations: create, get, list, delete, reset.

use tracing::instrument;

use crate::error::IndexError;
use crate::model::records::Branch;
use crate::model::types::BranchName;
use crate::store::{Page, RepoOps, RepoReadOps, Store};

use super::{
    Index, check_ref, parse_branch_name, parse_repo_id, read_branch_record, read_repo_record,
    resolve_ref,
};

impl<S: Store> Index<S> {
    /// Create a branch at the commit `reference` resolves to.
    ///
    /// The new branch's `commit_root` and `workspace_root` both start at
    /// that commit's tree.
    ///
    /// # Errors
    /// [`IndexError::BranchAlreadyExists`] if the name is taken;
    /// [`IndexError::ReferenceNotFound`] if `reference` resolves to
    /// nothing.
    #[instrument(skip(self), fields(repo = repo_id, branch = name))]
    pub fn create_branch(
        &self,
        repo_id: &str,
        name: &str,
        reference: &str,
    ) -> Result<Branch, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(name)?;
        check_ref(reference)?;
        self.check_cancel()?;

        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            if tx.read_branch(&name).is_ok() {
                return Err(IndexError::BranchAlreadyExists {
                    name: name.as_str().to_owned(),
                });
            }
            let resolved = resolve_ref(tx, reference)?;
            let tree = resolved.commit().tree.clone();
            let branch = Branch {
                commit: resolved.commit_address().clone(),
                commit_root: tree.clone(),
                workspace_root: tree,
            };
            tx.write_branch(&name, &branch)?;
            Ok(branch)
        })
    }

    /// Read a branch record.
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if it does not exist.
    pub fn get_branch(&self, repo_id: &str, name: &str) -> Result<Branch, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(name)?;
        self.check_cancel()?;
        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            read_branch_record(tx, &name)
        })
    }

    /// List branches by name prefix, starting strictly after `after`.
    ///
    /// # Errors
    /// Validation errors for a malformed `after`; store failures.
    pub fn list_branches(
        &self,
        repo_id: &str,
        prefix: &str,
        amount: usize,
        after: Option<&str>,
    ) -> Result<Page<(BranchName, Branch)>, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let after = after.map(parse_branch_name).transpose()?;
        self.check_cancel()?;
        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            Ok(tx.list_branches(prefix, amount, after.as_ref())?)
        })
    }

    /// Delete a branch: clear its workspace, hand its tree root to the
    /// reclaim hook, drop the record.
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if it does not exist.
    #[instrument(skip(self), fields(repo = repo_id, branch = name))]
    pub fn delete_branch(&self, repo_id: &str, name: &str) -> Result<(), IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(name)?;
        self.check_cancel()?;
        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let branch = read_branch_record(tx, &name)?;
            tx.clear_workspace(&name)?;
            tx.reclaim(&branch.workspace_root)?;
            tx.delete_branch(&name)?;
            Ok(())
        })
    }

    /// Discard all uncommitted work: clear the workspace and move
    /// `workspace_root` back to `commit_root`.
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if the branch does not exist.
    #[instrument(skip(self), fields(repo = repo_id, branch = name))]
    pub fn reset_branch(&self, repo_id: &str, name: &str) -> Result<Branch, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(name)?;
        self.check_cancel()?;
        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let branch = read_branch_record(tx, &name)?;
            tx.clear_workspace(&name)?;
            if branch.workspace_root != branch.commit_root {
                tx.reclaim(&branch.workspace_root)?;
            }
            let reset = Branch { workspace_root: branch.commit_root.clone(), ..branch };
            tx.write_branch(&name, &reset)?;
            Ok(reset)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
