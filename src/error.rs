//! Index error types.
//!
//! Defines [`IndexError`], the unified error type for all index operations.
//! Error messages are designed to be operator-friendly: each variant
//! includes a clear description of what went wrong and, where a next step
//! exists, actionable guidance on how to fix it.
//!
//! The taxonomy has four families: validation errors (raised before any
//! transaction is opened), not-found errors (all answering
//! [`IndexError::is_not_found`] for pattern matching), state errors, and
//! storage errors propagated from the store layer.

use std::fmt;

use crate::model::diff::Difference;
use crate::store::StoreError;

// ---------------------------------------------------------------------------
// IndexError
// ---------------------------------------------------------------------------

/// Unified error type for versioned-index operations.
#[derive(Debug)]
pub enum IndexError {
    // -- validation (pre-transaction) --
    /// A repository id failed validation.
    InvalidRepoId {
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A reference was neither a valid branch name nor a commit address.
    InvalidRef {
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    /// An object path failed validation.
    InvalidPath {
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A commit id was not syntactically a content address.
    InvalidCommitId {
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A commit message was empty.
    EmptyCommitMessage,

    // -- not found --
    /// The repository does not exist.
    RepoNotFound {
        /// The repository id that was not found.
        id: String,
    },

    /// The branch does not exist in this repository.
    BranchNotFound {
        /// The branch name that was not found.
        name: String,
    },

    /// No commit exists at this address.
    CommitNotFound {
        /// The commit address that was not found.
        id: String,
    },

    /// The path does not exist in the resolved tree (or is tombstoned in
    /// the workspace).
    PathNotFound {
        /// The path that was not found.
        path: String,
    },

    /// A reference resolved to neither a commit nor a branch.
    ReferenceNotFound {
        /// The reference that could not be resolved.
        reference: String,
    },

    // -- state --
    /// A repository with this id already exists.
    RepoExists {
        /// The repository id that already exists.
        id: String,
    },

    /// A branch with this name already exists.
    BranchAlreadyExists {
        /// The branch name that already exists.
        name: String,
    },

    /// The merge destination has uncommitted workspace changes.
    DestinationNotCommitted {
        /// The destination branch.
        branch: String,
    },

    /// The two references share no common ancestor commit.
    NoMergeBase,

    /// The three-way diff found conflicting changes.
    ///
    /// Carries the full difference list so callers can display every
    /// conflict rather than just the first.
    MergeConflict {
        /// All differences, including the conflicting ones.
        differences: Vec<Difference>,
    },

    /// Applying the merge operations to the destination tree failed.
    MergeUpdateFailed {
        /// Human-readable description of the failure.
        detail: String,
    },

    // -- ambient --
    /// The operation's cancellation token fired.
    Cancelled,

    /// An error surfaced by the store, propagated unchanged.
    Store(StoreError),
}

impl IndexError {
    /// Returns `true` for every not-found variant, giving callers the
    /// common-kind pattern match the case analyses in the write path need.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::RepoNotFound { .. }
            | Self::BranchNotFound { .. }
            | Self::CommitNotFound { .. }
            | Self::PathNotFound { .. }
            | Self::ReferenceNotFound { .. } => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Returns `true` for validation errors (never retried, raised before
    /// any transaction).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRepoId { .. }
                | Self::InvalidRef { .. }
                | Self::InvalidPath { .. }
                | Self::InvalidCommitId { .. }
                | Self::EmptyCommitMessage
        )
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRepoId { value, reason } => {
                write!(f, "invalid repository id {value:?}: {reason}")
            }
            Self::InvalidRef { value, reason } => {
                write!(f, "invalid reference {value:?}: {reason}")
            }
            Self::InvalidPath { value, reason } => {
                write!(f, "invalid path {value:?}: {reason}")
            }
            Self::InvalidCommitId { value, reason } => {
                write!(f, "invalid commit id {value:?}: {reason}")
            }
            Self::EmptyCommitMessage => {
                write!(f, "commit message must not be empty")
            }
            Self::RepoNotFound { id } => {
                write!(f, "repository '{id}' not found")
            }
            Self::BranchNotFound { name } => {
                write!(f, "branch '{name}' not found")
            }
            Self::CommitNotFound { id } => {
                write!(f, "commit '{id}' not found")
            }
            Self::PathNotFound { path } => {
                write!(f, "path '{path}' not found")
            }
            Self::ReferenceNotFound { reference } => {
                write!(
                    f,
                    "reference '{reference}' not found: it names neither a commit nor a branch"
                )
            }
            Self::RepoExists { id } => {
                write!(
                    f,
                    "repository '{id}' already exists.\n  To fix: use a different id, or delete the existing repository first."
                )
            }
            Self::BranchAlreadyExists { name } => {
                write!(
                    f,
                    "branch '{name}' already exists.\n  To fix: use a different name, or delete the existing branch first."
                )
            }
            Self::DestinationNotCommitted { branch } => {
                write!(
                    f,
                    "destination branch '{branch}' has uncommitted changes.\n  To fix: commit or reset the destination before merging."
                )
            }
            Self::NoMergeBase => {
                write!(f, "the references share no common ancestor commit")
            }
            Self::MergeConflict { differences } => {
                let conflicts = differences.iter().filter(|d| d.is_conflict()).count();
                write!(f, "merge conflict in {conflicts} path(s):")?;
                for d in differences.iter().filter(|d| d.is_conflict()) {
                    write!(f, "\n  - {d}")?;
                }
                write!(
                    f,
                    "\n  To fix: resolve the conflicting paths on the source branch, commit, and retry."
                )
            }
            Self::MergeUpdateFailed { detail } => {
                write!(f, "applying merge operations failed: {detail}")
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<StoreError> for IndexError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<crate::ident::HashError> for IndexError {
    fn from(e: crate::ident::HashError) -> Self {
        Self::Store(StoreError::from(e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
