//! Persistent records: repositories, branches, commits, tree nodes,
//! objects, and workspace entries.
//!
//! Commits, tree nodes, and object records are content-addressed: their
//! identity is the SHA-256 of their canonical JSON form (see
//! [`crate::ident`]). Canonical JSON rules:
//! - struct fields serialize in declaration order (do not reorder fields);
//! - all user metadata is a `BTreeMap`, so keys are sorted;
//! - timestamps are `i64` Unix seconds, never floats.
//!
//! Serializing the same record twice therefore produces identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::types::{Address, BranchName};
use crate::path::RepoPath;

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// The repository record: one per logical dataset, bound to a blockstore
/// bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// The blockstore bucket holding this repository's object bytes.
    pub bucket: String,
    /// Creation time, Unix seconds.
    pub created_at: i64,
    /// The branch new clients land on.
    pub default_branch: BranchName,
    /// Probability in `[0, 1]` that a mutation folds the workspace into
    /// the tree immediately (the partial-commit trial).
    pub partial_commit_ratio: f64,
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// A branch: a named mutable pointer to a commit plus a pending workspace.
///
/// `commit_root` always equals the tree of `commit`. `workspace_root`
/// equals `commit_root` exactly when the workspace is empty after a clean
/// partial commit; otherwise it carries folded-but-uncommitted changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Address of the commit this branch points at.
    pub commit: Address,
    /// Root address of that commit's tree.
    pub commit_root: Address,
    /// Root address of the tree including partial-committed workspace state.
    pub workspace_root: Address,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// An immutable, content-addressed snapshot: tree + parents + metadata.
///
/// A commit's address is the hash of this record's canonical form, so
/// commits are deduplicated by content and addressable forever.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Root address of the committed tree.
    pub tree: Address,
    /// Parent commit addresses, in order. Empty for a repository's initial
    /// commit; two entries for a merge (destination first).
    pub parents: Vec<Address>,
    /// Who created the commit.
    pub committer: String,
    /// The commit message (non-empty).
    pub message: String,
    /// Commit time, Unix seconds.
    pub timestamp: i64,
    /// Arbitrary user metadata. `BTreeMap` keeps canonical JSON stable.
    pub metadata: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Entries and tree nodes
// ---------------------------------------------------------------------------

/// What an [`Entry`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A leaf object (its address names an [`ObjectRecord`]).
    Object,
    /// A subdirectory (its address names a [`TreeNode`]).
    Tree,
}

impl EntryKind {
    /// Returns `true` for [`EntryKind::Tree`].
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }
}

/// A single child of a tree node.
///
/// For tree-kind entries `size` is the child count, `checksum` repeats the
/// node address, and `timestamp` is the maximum child timestamp, keeping
/// tree updates a pure function of their inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The entry name within its directory (a path basename).
    pub name: String,
    /// Content address of the object record or subtree node.
    pub address: Address,
    /// Object or tree.
    pub kind: EntryKind,
    /// Object size in bytes, or child count for a tree.
    pub size: i64,
    /// Object checksum as recorded by the blockstore, or the node address
    /// for a tree.
    pub checksum: String,
    /// Last-modified time, Unix seconds.
    pub timestamp: i64,
}

/// An immutable directory node: children sorted by name.
///
/// Content-addressed and structurally shared — two branches whose subtrees
/// are identical reference the same node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Child entries in ascending name order.
    pub entries: Vec<Entry>,
}

impl TreeNode {
    /// Binary-search for a child by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }
}

// ---------------------------------------------------------------------------
// ObjectRecord
// ---------------------------------------------------------------------------

/// Metadata describing a stored blob. The bytes live in the blockstore;
/// the index stores only this record, keyed by its content address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Where the bytes live in the blockstore (bucket-relative key).
    pub physical_address: String,
    /// Blob size in bytes.
    pub size: i64,
    /// Blob checksum as reported by the blockstore.
    pub checksum: String,
    /// Arbitrary user metadata.
    pub metadata: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Workspace entries
// ---------------------------------------------------------------------------

/// The mutation a workspace entry stages, tagged for canonical JSON:
/// `{"op":"put",…}` or `{"op":"delete",…}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StagedChange {
    /// Insert or replace the entry at the workspace entry's path.
    Put {
        /// The entry to install.
        entry: Entry,
    },
    /// A tombstone: remove the entry at the path on the next partial
    /// commit. Carries only a name and timestamp, per the deletion
    /// contract.
    Delete {
        /// Basename of the path being removed.
        name: String,
        /// When the delete was staged, Unix seconds.
        timestamp: i64,
    },
}

impl StagedChange {
    /// Returns `true` if this change is a tombstone.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// A staged, not-yet-folded mutation under `(branch, path)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    /// The object path the change applies to.
    pub path: RepoPath,
    /// The staged mutation.
    pub change: StagedChange,
}

impl WorkspaceEntry {
    /// Returns `true` if this entry is a tombstone.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.change.is_tombstone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
