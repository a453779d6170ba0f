//! Tree updates: fold staged changes into a new root, bottom-up.
//!
//! The algorithm groups changes by parent directory, rewrites every
//! affected node deepest-first, and bubbles each rewritten node up into
//! its parent as a tree-kind entry (or a removal, when a directory ends up
//! empty). Nodes are loaded from the *original* root throughout, so the
//! update is a pure function of `(root, changes)`; the new nodes are
//! persisted as a side effect as they are hashed.
//!
//! ```text
//! update(root, changes)
//!   ├── group changes by parent dir            {"a/b": {...}, "a": {...}}
//!   ├── add missing ancestors up to ""         {"a/b", "a", ""}
//!   ├── rewrite deepest-first                  a/b → a → ""
//!   │     empty node   → remove from parent
//!   │     else         → hash, write, insert into parent
//!   └── the rewritten "" node is the new root
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::IndexError;
use crate::ident::{RecordKind, address_of};
use crate::model::records::{Entry, EntryKind, StagedChange, TreeNode, WorkspaceEntry};
use crate::path::{depth, is_root, split_parent};
use crate::store::RepoOps;

use super::Merkle;

impl Merkle {
    /// Apply staged changes and return the tree rooted at the result.
    ///
    /// Tombstones remove entries (removing a missing entry is a no-op); a
    /// directory left empty is removed from its parent, cascading upward.
    /// Subtrees the changes never touch keep their addresses.
    ///
    /// # Errors
    /// Propagates store failures; canonical-serialization failures surface
    /// as [`crate::store::StoreError::Serialize`].
    pub fn update(
        &self,
        tx: &mut impl RepoOps,
        changes: &[WorkspaceEntry],
    ) -> Result<Self, IndexError> {
        if changes.is_empty() {
            return Ok(self.clone());
        }

        // Group changes by parent directory. `None` marks a removal.
        let mut dirs: BTreeMap<String, BTreeMap<String, Option<Entry>>> = BTreeMap::new();
        for staged in changes {
            let (dir, name) = split_parent(staged.path.as_str());
            let slot = match &staged.change {
                StagedChange::Put { entry } => Some(entry.clone()),
                StagedChange::Delete { .. } => None,
            };
            dirs.entry(dir.to_owned())
                .or_default()
                .insert(name.to_owned(), slot);
        }

        // Every affected directory needs its ancestors present so the
        // rewritten child has a parent map to land in.
        let affected: Vec<String> = dirs.keys().cloned().collect();
        for key in affected {
            let mut dir = key.as_str();
            while !is_root(dir) {
                let (parent, _) = split_parent(dir);
                dirs.entry(parent.to_owned()).or_default();
                dir = parent;
            }
        }

        // Deepest directories first; a parent is only rewritten after all
        // of its affected children have bubbled up.
        let mut order: Vec<String> = dirs.keys().cloned().collect();
        order.sort_by_key(|d| std::cmp::Reverse(depth(d)));
        let rewrites = order.len();

        let mut new_root = None;
        for dir in order {
            let pending = dirs.remove(&dir).unwrap_or_default();

            let existing = self.node_at_dir(tx, &dir)?.unwrap_or_default();
            let mut merged: BTreeMap<String, Entry> = existing
                .entries
                .into_iter()
                .map(|e| (e.name.clone(), e))
                .collect();
            for (name, slot) in pending {
                match slot {
                    Some(entry) => {
                        merged.insert(name, entry);
                    }
                    None => {
                        merged.remove(&name);
                    }
                }
            }
            let node = TreeNode { entries: merged.into_values().collect() };

            if is_root(&dir) {
                let addr = address_of(RecordKind::Tree, &node)?;
                tx.write_tree_node(&addr, &node)?;
                new_root = Some(addr);
            } else if node.entries.is_empty() {
                // Empty directory: drop it from the parent.
                let (parent, name) = split_parent(&dir);
                dirs.entry(parent.to_owned())
                    .or_default()
                    .insert(name.to_owned(), None);
            } else {
                let addr = address_of(RecordKind::Tree, &node)?;
                tx.write_tree_node(&addr, &node)?;
                let (parent, name) = split_parent(&dir);
                let timestamp = node.entries.iter().map(|e| e.timestamp).max().unwrap_or(0);
                let size = i64::try_from(node.entries.len()).unwrap_or(i64::MAX);
                let entry = Entry {
                    name: name.to_owned(),
                    address: addr.clone(),
                    kind: EntryKind::Tree,
                    size,
                    checksum: addr.as_str().to_owned(),
                    timestamp,
                };
                dirs.entry(parent.to_owned())
                    .or_default()
                    .insert(name.to_owned(), Some(entry));
            }
        }

        let root = new_root.expect("the root directory is always rewritten");
        debug!(rewrites, root = %root, "tree update complete");
        Ok(Self::at(root))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::testkit::{obj_change, tombstone, tree};
    use crate::model::types::RepoId;
    use crate::path::RepoPath;
    use crate::store::Store;
    use crate::store::mem::MemStore;

    fn path(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    fn with_repo_tx<R>(
        op: impl FnOnce(&mut <MemStore as Store>::RepoWriteTx) -> Result<R, IndexError>,
    ) -> R {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store.repo_transact(&repo, op).unwrap()
    }

    #[test]
    fn insert_creates_intermediate_directories() {
        with_repo_tx(|tx| {
            let m = tree(tx, &[("tables/events/part-0.parquet", 'a')]);
            let entry = m.get_entry(tx, &path("tables"), EntryKind::Tree)?;
            assert_eq!(entry.size, 1);
            assert!(
                m.get_entry(tx, &path("tables/events/part-0.parquet"), EntryKind::Object)
                    .is_ok()
            );
            Ok(())
        });
    }

    #[test]
    fn empty_change_set_returns_the_same_tree() {
        with_repo_tx(|tx| {
            let m = tree(tx, &[("a.txt", 'a')]);
            let same = m.update(tx, &[])?;
            assert_eq!(same.root(), m.root());
            Ok(())
        });
    }

    #[test]
    fn update_leaves_the_old_tree_intact() {
        with_repo_tx(|tx| {
            let before = tree(tx, &[("a/b.txt", 'a')]);
            let change = obj_change(tx, "a/b.txt", 'z');
            let after = before.update(tx, &[change])?;
            assert_ne!(before.root(), after.root());

            // Both versions are fully readable.
            let old = before.get_object(tx, &path("a/b.txt"))?;
            let new = after.get_object(tx, &path("a/b.txt"))?;
            assert_eq!(old.physical_address, "phys/a");
            assert_eq!(new.physical_address, "phys/z");
            Ok(())
        });
    }

    #[test]
    fn untouched_sibling_subtrees_keep_their_address() {
        with_repo_tx(|tx| {
            let before = tree(tx, &[("stable/data.txt", 'a'), ("hot/data.txt", 'b')]);
            let stable_before = before.get_entry(tx, &path("stable"), EntryKind::Tree)?;

            let change = obj_change(tx, "hot/data.txt", 'c');
            let after = before.update(tx, &[change])?;

            let stable_after = after.get_entry(tx, &path("stable"), EntryKind::Tree)?;
            assert_eq!(stable_before.address, stable_after.address);

            let hot_before = before.get_entry(tx, &path("hot"), EntryKind::Tree)?;
            let hot_after = after.get_entry(tx, &path("hot"), EntryKind::Tree)?;
            assert_ne!(hot_before.address, hot_after.address);
            Ok(())
        });
    }

    #[test]
    fn tombstone_removes_entry() {
        with_repo_tx(|tx| {
            let before = tree(tx, &[("a/b.txt", 'a'), ("a/c.txt", 'b')]);
            let after = before.update(tx, &[tombstone("a/b.txt")])?;
            assert!(after.get_object(tx, &path("a/b.txt")).is_err());
            assert!(after.get_object(tx, &path("a/c.txt")).is_ok());
            Ok(())
        });
    }

    #[test]
    fn emptied_directory_is_pruned_cascading() {
        with_repo_tx(|tx| {
            let before = tree(tx, &[("a/b/c.txt", 'a'), ("top.txt", 'b')]);
            let after = before.update(tx, &[tombstone("a/b/c.txt")])?;

            // "a/b" became empty → removed from "a" → "a" became empty →
            // removed from the root.
            assert!(after.get_entry(tx, &path("a"), EntryKind::Tree).is_err());
            assert!(after.get_object(tx, &path("top.txt")).is_ok());
            Ok(())
        });
    }

    #[test]
    fn removing_everything_yields_the_empty_tree() {
        with_repo_tx(|tx| {
            let before = tree(tx, &[("a/b.txt", 'a')]);
            let after = before.update(tx, &[tombstone("a/b.txt")])?;
            assert_eq!(after.root(), crate::ident::empty_tree_address());
            Ok(())
        });
    }

    #[test]
    fn tombstone_for_missing_path_is_a_no_op() {
        with_repo_tx(|tx| {
            let before = tree(tx, &[("a/b.txt", 'a')]);
            let after = before.update(tx, &[tombstone("a/ghost.txt")])?;
            // Rewriting a node to identical contents reproduces its address.
            assert_eq!(after.root(), before.root());
            Ok(())
        });
    }

    #[test]
    fn update_is_deterministic() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a/b.txt", 'a')]);
            let c1 = obj_change(tx, "a/x.txt", 'x');
            let c2 = obj_change(tx, "q/y.txt", 'y');
            let one = base.update(tx, &[c1.clone(), c2.clone()])?;
            let two = base.update(tx, &[c1, c2])?;
            assert_eq!(one.root(), two.root());
            Ok(())
        });
    }

    #[test]
    fn directory_entry_carries_max_child_timestamp() {
        with_repo_tx(|tx| {
            let mut late = obj_change(tx, "d/late.txt", 'l');
            if let StagedChange::Put { entry } = &mut late.change {
                entry.timestamp = 2_000_000_000;
            }
            let early = obj_change(tx, "d/early.txt", 'e');
            let m = tree(tx, &[]).update(tx, &[early, late])?;
            let dir = m.get_entry(tx, &path("d"), EntryKind::Tree)?;
            assert_eq!(dir.timestamp, 2_000_000_000);
            assert_eq!(dir.size, 2);
            Ok(())
        });
    }
}
