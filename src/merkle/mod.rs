//! The immutable, content-addressed Merkle tree engine.
//!
//! A [`Merkle`] is nothing but a root address; every operation takes a
//! store capability and walks nodes on demand. Trees are never mutated:
//! [`Merkle::update`] writes new nodes bottom-up and returns a new root,
//! leaving the old tree fully intact (branches that still reference it are
//! unaffected, and identical subtrees keep their address — structural
//! sharing falls out of content addressing).
//!
//! Entry iteration is lexicographic by name everywhere.

mod diff;
mod scan;
mod update;

pub use diff::diff3;

use crate::error::IndexError;
use crate::ident::empty_tree_address;
use crate::model::records::{Entry, EntryKind, ObjectRecord, TreeNode};
use crate::model::types::Address;
use crate::path::{RepoPath, join_under};
use crate::store::{RepoReadOps, StoreError};

// ---------------------------------------------------------------------------
// Merkle
// ---------------------------------------------------------------------------

/// A tree identified by its root address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merkle {
    root: Address,
}

impl Merkle {
    /// A tree rooted at `root`.
    #[must_use]
    pub const fn at(root: Address) -> Self {
        Self { root }
    }

    /// The empty tree.
    #[must_use]
    pub fn empty() -> Self {
        Self::at(empty_tree_address().clone())
    }

    /// The root address.
    #[must_use]
    pub const fn root(&self) -> &Address {
        &self.root
    }

    /// Materialize the root node.
    ///
    /// # Errors
    /// Propagates store failures; a missing root node is store corruption.
    pub fn root_node(&self, tx: &impl RepoReadOps) -> Result<TreeNode, IndexError> {
        Ok(tx.read_tree_node(&self.root)?)
    }

    /// Look up the entry at `path`, requiring it to have the given kind.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] if any segment is missing, a non-final
    /// segment is not a tree, or the terminal entry has the wrong kind.
    pub fn get_entry(
        &self,
        tx: &impl RepoReadOps,
        path: &RepoPath,
        kind: EntryKind,
    ) -> Result<Entry, IndexError> {
        let not_found = || IndexError::PathNotFound { path: path.as_str().to_owned() };

        let mut node = self.root_node(tx)?;
        let mut segments = path.segments().peekable();
        while let Some(segment) = segments.next() {
            let entry = node.find(segment).ok_or_else(not_found)?;
            if segments.peek().is_none() {
                if entry.kind == kind {
                    return Ok(entry.clone());
                }
                return Err(not_found());
            }
            if entry.kind != EntryKind::Tree {
                return Err(not_found());
            }
            node = tx.read_tree_node(&entry.address)?;
        }
        Err(not_found())
    }

    /// Look up the object record at `path`.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] if the path is missing or names a tree.
    pub fn get_object(
        &self,
        tx: &impl RepoReadOps,
        path: &RepoPath,
    ) -> Result<ObjectRecord, IndexError> {
        let entry = self.get_entry(tx, path, EntryKind::Object)?;
        Ok(tx.read_object(&entry.address)?)
    }

    /// Resolve the node at a directory prefix (`""` is the root).
    ///
    /// Returns `None` when the prefix does not exist or names an object.
    pub(crate) fn node_at_dir(
        &self,
        tx: &impl RepoReadOps,
        dir: &str,
    ) -> Result<Option<TreeNode>, IndexError> {
        let mut node = self.root_node(tx)?;
        if dir.is_empty() {
            return Ok(Some(node));
        }
        for segment in dir.split(crate::path::SEPARATOR) {
            let Some(entry) = node.find(segment) else {
                return Ok(None);
            };
            if entry.kind != EntryKind::Tree {
                return Ok(None);
            }
            node = tx.read_tree_node(&entry.address)?;
        }
        Ok(Some(node))
    }

    /// Visit every reachable node, parents before children, passing the
    /// directory prefix (`""` for the root), the node's address, and the
    /// node itself. Diagnostic listing; also exercised by tests to check
    /// structural sharing.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn walk(
        &self,
        tx: &impl RepoReadOps,
        visit: &mut impl FnMut(&str, &Address, &TreeNode),
    ) -> Result<(), IndexError> {
        fn walk_node(
            tx: &impl RepoReadOps,
            dir: &str,
            addr: &Address,
            visit: &mut impl FnMut(&str, &Address, &TreeNode),
        ) -> Result<(), IndexError> {
            let node = tx.read_tree_node(addr)?;
            visit(dir, addr, &node);
            for entry in &node.entries {
                if entry.kind == EntryKind::Tree {
                    let child = join_under(dir, &entry.name);
                    walk_node(tx, &child, &entry.address, visit)?;
                }
            }
            Ok(())
        }
        walk_node(tx, "", &self.root, visit)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Build a full [`RepoPath`] from a directory prefix and an entry name.
///
/// Stored names come from validated paths, so failure here means the store
/// handed back a corrupt node.
pub(crate) fn stored_path(dir: &str, name: &str) -> Result<RepoPath, IndexError> {
    RepoPath::new(&join_under(dir, name)).map_err(|e| {
        IndexError::Store(StoreError::Corrupt {
            detail: format!("stored entry name does not form a valid path: {e}"),
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::testkit::tree;
    use crate::model::types::RepoId;
    use crate::store::Store;
    use crate::store::mem::MemStore;

    fn path(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    #[test]
    fn empty_tree_root_is_the_constant() {
        assert_eq!(Merkle::empty().root(), empty_tree_address());
    }

    #[test]
    fn get_entry_descends_and_checks_kind() {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store
            .repo_transact(&repo, |tx| {
                let m = tree(tx, &[("a/b/c.txt", 'x'), ("a/d.txt", 'y')]);

                let entry = m.get_entry(tx, &path("a/b/c.txt"), EntryKind::Object)?;
                assert_eq!(entry.name, "c.txt");

                let dir = m.get_entry(tx, &path("a/b"), EntryKind::Tree)?;
                assert_eq!(dir.kind, EntryKind::Tree);
                assert_eq!(dir.size, 1, "tree entry size is the child count");

                // Wrong kind at the terminal entry.
                let err = m.get_entry(tx, &path("a/b"), EntryKind::Object).unwrap_err();
                assert!(err.is_not_found());

                // Missing intermediate segment.
                let err = m
                    .get_entry(tx, &path("a/zz/c.txt"), EntryKind::Object)
                    .unwrap_err();
                assert!(err.is_not_found());

                // Object used as a directory.
                let err = m
                    .get_entry(tx, &path("a/d.txt/deeper"), EntryKind::Object)
                    .unwrap_err();
                assert!(err.is_not_found());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn get_object_follows_the_entry_address() {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store
            .repo_transact(&repo, |tx| {
                let m = tree(tx, &[("a/b.txt", 'x')]);
                let record = m.get_object(tx, &path("a/b.txt"))?;
                assert_eq!(record.physical_address, "phys/x");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn walk_visits_every_node_once() {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store
            .repo_transact(&repo, |tx| {
                let m = tree(tx, &[("a/b/c.txt", 'x'), ("a/d.txt", 'y'), ("e.txt", 'z')]);
                let mut dirs = Vec::new();
                m.walk(tx, &mut |dir, _, _| dirs.push(dir.to_owned()))?;
                assert_eq!(dirs, vec!["", "a", "a/b"]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn node_at_dir_handles_missing_and_object_prefixes() {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store
            .repo_transact(&repo, |tx| {
                let m = tree(tx, &[("a/b.txt", 'x')]);
                assert!(m.node_at_dir(tx, "")?.is_some());
                assert!(m.node_at_dir(tx, "a")?.is_some());
                assert!(m.node_at_dir(tx, "missing")?.is_none());
                assert!(m.node_at_dir(tx, "a/b.txt")?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn identical_subtrees_share_addresses() {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store
            .repo_transact(&repo, |tx| {
                // Two directories with identical contents.
                let m = tree(tx, &[("one/data.txt", 'x'), ("two/data.txt", 'x')]);
                let one = m.get_entry(tx, &path("one"), EntryKind::Tree)?;
                let two = m.get_entry(tx, &path("two"), EntryKind::Tree)?;
                assert_eq!(one.address, two.address);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn stored_path_flags_corrupt_names() {
        assert!(stored_path("a", "b").is_ok());
        let err = stored_path("a", "").unwrap_err();
        assert!(matches!(err, IndexError::Store(StoreError::Corrupt { .. })));
    }
}
