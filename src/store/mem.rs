//! In-memory reference implementation of the [`Store`] contract.
//!
//! One mutex guards a snapshot of the whole keyspace. A write transaction
//! clones the snapshot, runs the closure against the clone, and swaps the
//! clone back in on success — an error discards the clone, so no partial
//! state ever reaches the store. The lock is held for the duration of the
//! transaction, which makes isolation trivially serializable.
//!
//! This backend exists for tests, examples, and as the executable
//! specification of the contract; a production deployment implements the
//! same traits over its own KV database.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::IndexError;
use crate::model::records::{Branch, Commit, ObjectRecord, Repository, TreeNode, WorkspaceEntry};
use crate::model::types::{Address, BranchName, RepoId};
use crate::path::RepoPath;

use super::{ClientOps, ClientReadOps, Page, RepoOps, RepoReadOps, Store, StoreError};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The whole keyspace. Everything below the repository map is scoped by
/// repo id so `delete_repo` can drop a repository wholesale.
#[derive(Clone, Debug, Default)]
struct State {
    repos: BTreeMap<RepoId, Repository>,
    branches: BTreeMap<(RepoId, BranchName), Branch>,
    commits: BTreeMap<(RepoId, Address), Commit>,
    objects: BTreeMap<(RepoId, Address), ObjectRecord>,
    trees: BTreeMap<(RepoId, Address), TreeNode>,
    workspaces: BTreeMap<(RepoId, BranchName, RepoPath), WorkspaceEntry>,
}

impl State {
    fn drop_repo_scope(&mut self, id: &RepoId) {
        self.branches.retain(|(r, _), _| r != id);
        self.commits.retain(|(r, _), _| r != id);
        self.objects.retain(|(r, _), _| r != id);
        self.trees.retain(|(r, _), _| r != id);
        self.workspaces.retain(|(r, _, _), _| r != id);
    }
}

/// Paginate a sorted iterator: skip until strictly after `after`, take
/// `amount`, flag whether anything remains.
fn paginate<K: Ord + Clone, V: Clone>(
    iter: impl Iterator<Item = (K, V)>,
    amount: usize,
    after: Option<&K>,
) -> Page<(K, V)> {
    let mut items = Vec::new();
    let mut has_more = false;
    for (k, v) in iter.filter(|(k, _)| after.is_none_or(|a| k > a)) {
        if items.len() == amount {
            has_more = true;
            break;
        }
        items.push((k, v));
    }
    Page { items, has_more }
}

// ---------------------------------------------------------------------------
// MemStore
// ---------------------------------------------------------------------------

/// The in-memory store handle. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<State>,
}

impl MemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    type ReadTx = ClientView;
    type WriteTx = ClientView;
    type RepoReadTx = RepoView;
    type RepoWriteTx = RepoView;

    fn read_transact<R>(
        &self,
        op: impl FnOnce(&Self::ReadTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let view = ClientView { state: guard.clone() };
        op(&view)
    }

    fn transact<R>(
        &self,
        op: impl FnOnce(&mut Self::WriteTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut view = ClientView { state: guard.clone() };
        let out = op(&mut view)?;
        *guard = view.state;
        Ok(out)
    }

    fn repo_read_transact<R>(
        &self,
        repo: &RepoId,
        op: impl FnOnce(&Self::RepoReadTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let view = RepoView { repo: repo.clone(), state: guard.clone() };
        op(&view)
    }

    fn repo_transact<R>(
        &self,
        repo: &RepoId,
        op: impl FnOnce(&mut Self::RepoWriteTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut view = RepoView { repo: repo.clone(), state: guard.clone() };
        let out = op(&mut view)?;
        *guard = view.state;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Client-scope view
// ---------------------------------------------------------------------------

/// A client-scope transaction view over a state snapshot.
#[derive(Debug)]
pub struct ClientView {
    state: State,
}

impl ClientReadOps for ClientView {
    fn read_repo(&self, id: &RepoId) -> Result<Repository, StoreError> {
        self.state
            .repos
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("repo", id.as_str()))
    }

    fn list_repos(
        &self,
        amount: usize,
        after: Option<&RepoId>,
    ) -> Result<Page<(RepoId, Repository)>, StoreError> {
        Ok(paginate(
            self.state.repos.iter().map(|(k, v)| (k.clone(), v.clone())),
            amount,
            after,
        ))
    }
}

impl ClientOps for ClientView {
    fn write_repo(&mut self, id: &RepoId, repo: &Repository) -> Result<(), StoreError> {
        self.state.repos.insert(id.clone(), repo.clone());
        Ok(())
    }

    fn delete_repo(&mut self, id: &RepoId) -> Result<(), StoreError> {
        self.state
            .repos
            .remove(id)
            .ok_or_else(|| StoreError::not_found("repo", id.as_str()))?;
        self.state.drop_repo_scope(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Repo-scope view
// ---------------------------------------------------------------------------

/// A repo-scope transaction view over a state snapshot.
#[derive(Debug)]
pub struct RepoView {
    repo: RepoId,
    state: State,
}

impl RepoReadOps for RepoView {
    fn read_repo(&self) -> Result<Repository, StoreError> {
        self.state
            .repos
            .get(&self.repo)
            .cloned()
            .ok_or_else(|| StoreError::not_found("repo", self.repo.as_str()))
    }

    fn read_branch(&self, name: &BranchName) -> Result<Branch, StoreError> {
        self.state
            .branches
            .get(&(self.repo.clone(), name.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("branch", name.as_str()))
    }

    fn list_branches(
        &self,
        prefix: &str,
        amount: usize,
        after: Option<&BranchName>,
    ) -> Result<Page<(BranchName, Branch)>, StoreError> {
        Ok(paginate(
            self.state
                .branches
                .iter()
                .filter(|((r, n), _)| r == &self.repo && n.as_str().starts_with(prefix))
                .map(|((_, n), b)| (n.clone(), b.clone())),
            amount,
            after,
        ))
    }

    fn read_commit(&self, addr: &Address) -> Result<Commit, StoreError> {
        self.state
            .commits
            .get(&(self.repo.clone(), addr.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("commit", addr.as_str()))
    }

    fn read_object(&self, addr: &Address) -> Result<ObjectRecord, StoreError> {
        self.state
            .objects
            .get(&(self.repo.clone(), addr.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("object", addr.as_str()))
    }

    fn read_tree_node(&self, addr: &Address) -> Result<TreeNode, StoreError> {
        self.state
            .trees
            .get(&(self.repo.clone(), addr.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("tree", addr.as_str()))
    }

    fn read_from_workspace(
        &self,
        branch: &BranchName,
        path: &RepoPath,
    ) -> Result<WorkspaceEntry, StoreError> {
        self.state
            .workspaces
            .get(&(self.repo.clone(), branch.clone(), path.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("workspace", path.as_str()))
    }

    fn list_workspace(&self, branch: &BranchName) -> Result<Vec<WorkspaceEntry>, StoreError> {
        Ok(self
            .state
            .workspaces
            .iter()
            .filter(|((r, b, _), _)| r == &self.repo && b == branch)
            .map(|(_, we)| we.clone())
            .collect())
    }
}

impl RepoOps for RepoView {
    fn write_repo(&mut self, repo: &Repository) -> Result<(), StoreError> {
        self.state.repos.insert(self.repo.clone(), repo.clone());
        Ok(())
    }

    fn delete_repo(&mut self) -> Result<(), StoreError> {
        let id = self.repo.clone();
        self.state
            .repos
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("repo", id.as_str()))?;
        self.state.drop_repo_scope(&id);
        Ok(())
    }

    fn write_branch(&mut self, name: &BranchName, branch: &Branch) -> Result<(), StoreError> {
        self.state
            .branches
            .insert((self.repo.clone(), name.clone()), branch.clone());
        Ok(())
    }

    fn delete_branch(&mut self, name: &BranchName) -> Result<(), StoreError> {
        self.state
            .branches
            .remove(&(self.repo.clone(), name.clone()))
            .ok_or_else(|| StoreError::not_found("branch", name.as_str()))?;
        Ok(())
    }

    fn write_commit(&mut self, addr: &Address, commit: &Commit) -> Result<(), StoreError> {
        self.state
            .commits
            .insert((self.repo.clone(), addr.clone()), commit.clone());
        Ok(())
    }

    fn write_object(&mut self, addr: &Address, object: &ObjectRecord) -> Result<(), StoreError> {
        self.state
            .objects
            .insert((self.repo.clone(), addr.clone()), object.clone());
        Ok(())
    }

    fn write_tree_node(&mut self, addr: &Address, node: &TreeNode) -> Result<(), StoreError> {
        self.state
            .trees
            .insert((self.repo.clone(), addr.clone()), node.clone());
        Ok(())
    }

    fn write_to_workspace(
        &mut self,
        branch: &BranchName,
        entry: &WorkspaceEntry,
    ) -> Result<(), StoreError> {
        self.state.workspaces.insert(
            (self.repo.clone(), branch.clone(), entry.path.clone()),
            entry.clone(),
        );
        Ok(())
    }

    fn delete_workspace_path(
        &mut self,
        branch: &BranchName,
        path: &RepoPath,
    ) -> Result<(), StoreError> {
        self.state
            .workspaces
            .remove(&(self.repo.clone(), branch.clone(), path.clone()))
            .ok_or_else(|| StoreError::not_found("workspace", path.as_str()))?;
        Ok(())
    }

    fn clear_workspace(&mut self, branch: &BranchName) -> Result<(), StoreError> {
        self.state
            .workspaces
            .retain(|(r, b, _), _| !(r == &self.repo && b == branch));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
