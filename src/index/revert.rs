//! Reverts: whole-branch, per-path, and per-object.

use tracing::instrument;

use crate::error::IndexError;
use crate::merkle::Merkle;
use crate::model::records::{Branch, Entry, EntryKind, StagedChange, WorkspaceEntry};
use crate::path::RepoPath;
use crate::store::{RepoOps, RepoReadOps, Store};

use super::{
    Index, parse_branch_name, parse_commit_id, parse_path, parse_repo_id, partial_commit,
    read_branch_record, read_repo_record,
};

/// Look `path` up in `tree`, trying each kind in order.
fn entry_any_kind(
    tx: &impl RepoReadOps,
    tree: &Merkle,
    path: &RepoPath,
    kinds: &[EntryKind],
) -> Result<Option<Entry>, IndexError> {
    for kind in kinds {
        match tree.get_entry(tx, path, *kind) {
            Ok(entry) => return Ok(Some(entry)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

impl<S: Store> Index<S> {
    /// Point the branch at `commit_id`: clear the workspace and set both
    /// roots to the commit's tree.
    ///
    /// # Errors
    /// [`IndexError::CommitNotFound`] if no such commit exists;
    /// [`IndexError::BranchNotFound`] if the branch does not.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn revert_commit(
        &self,
        repo_id: &str,
        branch: &str,
        commit_id: &str,
    ) -> Result<Branch, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        let address = parse_commit_id(commit_id)?;
        self.check_cancel()?;

        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let current = read_branch_record(tx, &name)?;
            let commit = tx.read_commit(&address).map_err(|e| {
                if e.is_not_found() {
                    IndexError::CommitNotFound { id: address.as_str().to_owned() }
                } else {
                    IndexError::Store(e)
                }
            })?;

            tx.clear_workspace(&name)?;
            if current.workspace_root != commit.tree {
                tx.reclaim(&current.workspace_root)?;
            }
            let reverted = Branch {
                commit: address.clone(),
                commit_root: commit.tree.clone(),
                workspace_root: commit.tree,
            };
            tx.write_branch(&name, &reverted)?;
            Ok(reverted)
        })
    }

    /// Restore `path` — object or whole subtree — to its committed state,
    /// discarding uncommitted changes beneath it.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] if the path exists in neither the
    /// committed nor the workspace tree.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn revert_path(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
    ) -> Result<Branch, IndexError> {
        self.revert_at(repo_id, branch, path, &[EntryKind::Tree, EntryKind::Object])
    }

    /// Restore the object at `path` to its committed state.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] if no object exists there in either
    /// tree.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn revert_object(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
    ) -> Result<Branch, IndexError> {
        self.revert_at(repo_id, branch, path, &[EntryKind::Object])
    }

    /// Shared machinery: drive a partial commit, then install a single
    /// workspace update that restores the committed entry (or tombstones a
    /// path added since the commit).
    fn revert_at(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
        kinds: &[EntryKind],
    ) -> Result<Branch, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        let path = parse_path(path)?;
        self.check_cancel()?;

        let now = self.now();
        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let folded = partial_commit(tx, &name)?;
            let committed = Merkle::at(folded.commit_root.clone());
            let staged = Merkle::at(folded.workspace_root.clone());

            let change = match entry_any_kind(tx, &committed, &path, kinds)? {
                Some(entry) => StagedChange::Put { entry },
                None => {
                    if entry_any_kind(tx, &staged, &path, kinds)?.is_none() {
                        return Err(IndexError::PathNotFound {
                            path: path.as_str().to_owned(),
                        });
                    }
                    // Added since the commit: restoring means removing.
                    StagedChange::Delete { name: path.basename().to_owned(), timestamp: now }
                }
            };

            let restored = staged.update(tx, &[WorkspaceEntry { path: path.clone(), change }])?;
            if folded.workspace_root != *restored.root() {
                tx.reclaim(&folded.workspace_root)?;
            }
            let updated = Branch { workspace_root: restored.root().clone(), ..folded };
            tx.write_branch(&name, &updated)?;
            Ok(updated)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::error::IndexError;
    use crate::index::Index;
    use crate::model::records::ObjectRecord;
    use crate::store::mem::MemStore;

    fn object(tag: &str) -> ObjectRecord {
        ObjectRecord {
            physical_address: format!("data/{tag}"),
            size: 3,
            checksum: format!("ck-{tag}"),
            metadata: BTreeMap::new(),
        }
    }

    fn seeded() -> Index<MemStore> {
        let idx = Index::new(MemStore::new());
        idx.create_repo("r1", "bkt", None, None).unwrap();
        idx.write_object("r1", "main", "t/a.txt", object("a")).unwrap();
        idx.write_object("r1", "main", "t/b.txt", object("b")).unwrap();
        idx.commit("r1", "main", "c1", "u", BTreeMap::new()).unwrap();
        idx
    }

    #[test]
    fn revert_commit_rolls_the_branch_back() {
        let idx = seeded();
        let c1 = idx.get_branch("r1", "main").unwrap().commit;
        idx.write_object("r1", "main", "t/a.txt", object("v2")).unwrap();
        idx.commit("r1", "main", "c2", "u", BTreeMap::new()).unwrap();

        let branch = idx.revert_commit("r1", "main", c1.as_str()).unwrap();
        assert_eq!(branch.commit, c1);
        assert_eq!(branch.workspace_root, branch.commit_root);
        let read = idx.read_object("r1", "main", "t/a.txt").unwrap();
        assert_eq!(read.physical_address, "data/a");
    }

    #[test]
    fn revert_commit_discards_staged_work() {
        let idx = seeded();
        let c1 = idx.get_branch("r1", "main").unwrap().commit;
        idx.write_object("r1", "main", "junk.txt", object("j")).unwrap();
        idx.revert_commit("r1", "main", c1.as_str()).unwrap();
        assert!(idx.read_object("r1", "main", "junk.txt").unwrap_err().is_not_found());
        assert!(idx.diff_workspace("r1", "main").unwrap().is_empty());
    }

    #[test]
    fn revert_unknown_commit_fails() {
        let idx = seeded();
        let ghost = "9".repeat(64);
        let err = idx.revert_commit("r1", "main", &ghost).unwrap_err();
        assert!(matches!(err, IndexError::CommitNotFound { .. }));
    }

    #[test]
    fn revert_object_restores_the_committed_version() {
        let idx = seeded();
        idx.write_object("r1", "main", "t/a.txt", object("dirty")).unwrap();
        idx.revert_object("r1", "main", "t/a.txt").unwrap();
        let read = idx.read_object("r1", "main", "t/a.txt").unwrap();
        assert_eq!(read.physical_address, "data/a");
        // The untouched sibling is unaffected.
        assert_eq!(
            idx.read_object("r1", "main", "t/b.txt").unwrap().physical_address,
            "data/b"
        );
    }

    #[test]
    fn revert_object_tombstones_an_added_path() {
        let idx = seeded();
        idx.write_object("r1", "main", "added.txt", object("n")).unwrap();
        idx.revert_object("r1", "main", "added.txt").unwrap();
        assert!(idx.read_object("r1", "main", "added.txt").unwrap_err().is_not_found());
        assert!(idx.diff_workspace("r1", "main").unwrap().is_empty());
    }

    #[test]
    fn revert_path_restores_a_whole_directory() {
        let idx = seeded();
        idx.write_object("r1", "main", "t/a.txt", object("x")).unwrap();
        idx.delete_object("r1", "main", "t/b.txt").unwrap();
        idx.revert_path("r1", "main", "t").unwrap();

        assert_eq!(
            idx.read_object("r1", "main", "t/a.txt").unwrap().physical_address,
            "data/a"
        );
        assert_eq!(
            idx.read_object("r1", "main", "t/b.txt").unwrap().physical_address,
            "data/b"
        );
    }

    #[test]
    fn revert_missing_path_fails() {
        let idx = seeded();
        let err = idx.revert_object("r1", "main", "ghost.txt").unwrap_err();
        assert!(matches!(err, IndexError::PathNotFound { .. }));
    }

    #[test]
    fn revert_restores_a_deleted_object() {
        let idx = seeded();
        idx.delete_object("r1", "main", "t/a.txt").unwrap();
        assert!(idx.read_object("r1", "main", "t/a.txt").unwrap_err().is_not_found());
        idx.revert_object("r1", "main", "t/a.txt").unwrap();
        assert!(idx.read_object("r1", "main", "t/a.txt").is_ok());
    }
}
