//! The transactional store contract the index consumes.
//!
//! The index never talks to a database directly: every operation runs
//! inside one of four transaction scopes exposed by [`Store`], each handing
//! the operation the narrowest capability set it needs (read-only client
//! ops, read-write client ops, read-only repo ops, read-write repo ops).
//!
//! The store guarantees serializable isolation per transaction: concurrent
//! writers see consistent snapshots and the first error aborts the
//! transaction with no partial state reaching the store. Retries, if any,
//! happen below this interface.
//!
//! [`StoreError::NotFound`] is a distinct, recognizable kind — the write
//! path's case analyses depend on telling "missing" apart from "broken".

pub mod mem;

use std::fmt;

use crate::error::IndexError;
use crate::ident::HashError;
use crate::model::records::{Branch, Commit, ObjectRecord, Repository, TreeNode, WorkspaceEntry};
use crate::model::types::{Address, BranchName, RepoId};
use crate::path::RepoPath;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors surfaced by a store implementation.
#[derive(Debug)]
pub enum StoreError {
    /// The requested record does not exist.
    NotFound {
        /// The record family (`"repo"`, `"branch"`, `"commit"`, `"object"`,
        /// `"tree"`, `"workspace"`).
        kind: &'static str,
        /// The key that was not found.
        key: String,
    },

    /// Serializing a record to its canonical form failed.
    Serialize(HashError),

    /// A stored record could not be decoded or violated an invariant.
    Corrupt {
        /// Human-readable description of the corruption.
        detail: String,
    },

    /// The backing database failed.
    Backend {
        /// Human-readable description of the failure.
        detail: String,
    },
}

impl StoreError {
    /// Construct a [`StoreError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound { kind, key: key.into() }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, key } => write!(f, "{kind} '{key}' not found in store"),
            Self::Serialize(e) => write!(f, "{e}"),
            Self::Corrupt { detail } => write!(f, "store record corrupt: {detail}"),
            Self::Backend { detail } => write!(f, "store backend failed: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HashError> for StoreError {
    fn from(e: HashError) -> Self {
        Self::Serialize(e)
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// One page of a listing, with a continuation flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// The page's items, in the listing's natural order.
    pub items: Vec<T>,
    /// `true` if more items exist past the end of this page.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// An empty, exhausted page.
    #[must_use]
    pub const fn empty() -> Self {
        Self { items: Vec::new(), has_more: false }
    }
}

// ---------------------------------------------------------------------------
// Client-scoped capabilities
// ---------------------------------------------------------------------------

/// Read-only operations across all repositories.
pub trait ClientReadOps {
    /// Read a repository record by id.
    ///
    /// # Errors
    /// `NotFound` if no repository has this id.
    fn read_repo(&self, id: &RepoId) -> Result<Repository, StoreError>;

    /// List repositories in id order, starting strictly after `after`.
    ///
    /// # Errors
    /// Backend failures only; an empty listing is not an error.
    fn list_repos(
        &self,
        amount: usize,
        after: Option<&RepoId>,
    ) -> Result<Page<(RepoId, Repository)>, StoreError>;
}

/// Read-write operations across all repositories.
pub trait ClientOps: ClientReadOps {
    /// Write (create or replace) a repository record.
    ///
    /// # Errors
    /// Backend failures only.
    fn write_repo(&mut self, id: &RepoId, repo: &Repository) -> Result<(), StoreError>;

    /// Delete a repository and everything scoped under it.
    ///
    /// # Errors
    /// `NotFound` if no repository has this id.
    fn delete_repo(&mut self, id: &RepoId) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Repo-scoped capabilities
// ---------------------------------------------------------------------------

/// Read-only operations scoped to a single repository.
///
/// Reading the repo record also arms the store's optimistic conflict
/// detection for the transaction; every index operation does it first.
pub trait RepoReadOps {
    /// Read this repository's record.
    ///
    /// # Errors
    /// `NotFound` if the repository was deleted.
    fn read_repo(&self) -> Result<Repository, StoreError>;

    /// Read a branch by name.
    ///
    /// # Errors
    /// `NotFound` if the branch does not exist.
    fn read_branch(&self, name: &BranchName) -> Result<Branch, StoreError>;

    /// List branches whose name starts with `prefix`, in name order,
    /// starting strictly after `after`.
    ///
    /// # Errors
    /// Backend failures only.
    fn list_branches(
        &self,
        prefix: &str,
        amount: usize,
        after: Option<&BranchName>,
    ) -> Result<Page<(BranchName, Branch)>, StoreError>;

    /// Read a commit by address.
    ///
    /// # Errors
    /// `NotFound` if no commit has this address.
    fn read_commit(&self, addr: &Address) -> Result<Commit, StoreError>;

    /// Read an object record by address.
    ///
    /// # Errors
    /// `NotFound` if no object record has this address.
    fn read_object(&self, addr: &Address) -> Result<ObjectRecord, StoreError>;

    /// Read a tree node by address.
    ///
    /// # Errors
    /// `NotFound` if no tree node has this address.
    fn read_tree_node(&self, addr: &Address) -> Result<TreeNode, StoreError>;

    /// Read the workspace entry staged under `(branch, path)`.
    ///
    /// # Errors
    /// `NotFound` if nothing is staged there.
    fn read_from_workspace(
        &self,
        branch: &BranchName,
        path: &RepoPath,
    ) -> Result<WorkspaceEntry, StoreError>;

    /// List every workspace entry staged for `branch`, in path order.
    ///
    /// # Errors
    /// Backend failures only; an empty workspace is an empty list.
    fn list_workspace(&self, branch: &BranchName) -> Result<Vec<WorkspaceEntry>, StoreError>;
}

/// Read-write operations scoped to a single repository.
pub trait RepoOps: RepoReadOps {
    /// Write this repository's record.
    ///
    /// # Errors
    /// Backend failures only.
    fn write_repo(&mut self, repo: &Repository) -> Result<(), StoreError>;

    /// Delete this repository and everything scoped under it.
    ///
    /// # Errors
    /// `NotFound` if the repository was already deleted.
    fn delete_repo(&mut self) -> Result<(), StoreError>;

    /// Write (create or replace) a branch record.
    ///
    /// # Errors
    /// Backend failures only.
    fn write_branch(&mut self, name: &BranchName, branch: &Branch) -> Result<(), StoreError>;

    /// Delete a branch record. The caller clears the workspace first.
    ///
    /// # Errors
    /// `NotFound` if the branch does not exist.
    fn delete_branch(&mut self, name: &BranchName) -> Result<(), StoreError>;

    /// Write a commit at its content address. Writing the same commit
    /// twice is a no-op (content-addressed records are immutable).
    ///
    /// # Errors
    /// Backend failures only.
    fn write_commit(&mut self, addr: &Address, commit: &Commit) -> Result<(), StoreError>;

    /// Write an object record at its content address.
    ///
    /// # Errors
    /// Backend failures only.
    fn write_object(&mut self, addr: &Address, object: &ObjectRecord) -> Result<(), StoreError>;

    /// Write a tree node at its content address.
    ///
    /// # Errors
    /// Backend failures only.
    fn write_tree_node(&mut self, addr: &Address, node: &TreeNode) -> Result<(), StoreError>;

    /// Stage a workspace entry under `(branch, entry.path)`, replacing any
    /// previous entry at that path.
    ///
    /// # Errors
    /// Backend failures only.
    fn write_to_workspace(
        &mut self,
        branch: &BranchName,
        entry: &WorkspaceEntry,
    ) -> Result<(), StoreError>;

    /// Remove the workspace entry at `(branch, path)`.
    ///
    /// # Errors
    /// `NotFound` if nothing is staged there.
    fn delete_workspace_path(
        &mut self,
        branch: &BranchName,
        path: &RepoPath,
    ) -> Result<(), StoreError>;

    /// Remove every workspace entry staged for `branch`.
    ///
    /// # Errors
    /// Backend failures only; clearing an empty workspace is a no-op.
    fn clear_workspace(&mut self, branch: &BranchName) -> Result<(), StoreError>;

    /// Garbage-collection intent hook: `root` is being discarded and its
    /// unreferenced subtrees become eligible for reclamation.
    ///
    /// The default implementation leaks: tree nodes are content-addressed
    /// and shared, so reclaiming them safely needs a store-side
    /// mark-and-sweep that this interface deliberately does not specify.
    ///
    /// # Errors
    /// Implementation-defined; the default never fails.
    fn reclaim(&mut self, root: &Address) -> Result<(), StoreError> {
        let _ = root;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A transactional store: four scopes, least privilege per operation.
///
/// Implementations must guarantee serializable isolation per transaction
/// and discard all writes when the closure returns an error.
pub trait Store {
    /// Read-only client-scope transaction view.
    type ReadTx: ClientReadOps;
    /// Read-write client-scope transaction view.
    type WriteTx: ClientOps;
    /// Read-only repo-scope transaction view.
    type RepoReadTx: RepoReadOps;
    /// Read-write repo-scope transaction view.
    type RepoWriteTx: RepoOps;

    /// Run a read-only transaction over all repositories.
    ///
    /// # Errors
    /// Whatever the closure returns, plus store-level failures.
    fn read_transact<R>(
        &self,
        op: impl FnOnce(&Self::ReadTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError>;

    /// Run a read-write transaction over all repositories.
    ///
    /// # Errors
    /// Whatever the closure returns, plus store-level failures. On error
    /// no write performed by the closure is visible.
    fn transact<R>(
        &self,
        op: impl FnOnce(&mut Self::WriteTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError>;

    /// Run a read-only transaction scoped to one repository.
    ///
    /// # Errors
    /// Whatever the closure returns, plus store-level failures.
    fn repo_read_transact<R>(
        &self,
        repo: &RepoId,
        op: impl FnOnce(&Self::RepoReadTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError>;

    /// Run a read-write transaction scoped to one repository.
    ///
    /// # Errors
    /// Whatever the closure returns, plus store-level failures. On error
    /// no write performed by the closure is visible.
    fn repo_transact<R>(
        &self,
        repo: &RepoId,
        op: impl FnOnce(&mut Self::RepoWriteTx) -> Result<R, IndexError>,
    ) -> Result<R, IndexError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_recognizable() {
        let err = StoreError::not_found("branch", "dev");
        assert!(err.is_not_found());
        let msg = format!("{err}");
        assert!(msg.contains("branch"));
        assert!(msg.contains("dev"));
    }

    #[test]
    fn backend_error_is_not_not_found() {
        let err = StoreError::Backend { detail: "connection reset".to_owned() };
        assert!(!err.is_not_found());
        assert!(format!("{err}").contains("connection reset"));
    }

    #[test]
    fn empty_page() {
        let page: Page<u32> = Page::empty();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }
}
