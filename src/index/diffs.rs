//! Diff operations: three-way reference diff and the workspace diff.

use tracing::instrument;

use crate::dag;
use crate::error::IndexError;
use crate::merkle::{Merkle, diff3};
use crate::model::diff::Difference;
use crate::model::types::Address;
use crate::store::{RepoOps, Store};

use super::{
    Index, check_ref, parse_branch_name, parse_repo_id, partial_commit, read_repo_record,
    resolve_ref,
};

/// Resolve a reference for diffing: branch references drive a partial
/// commit first (so everything staged is visible) and read the folded
/// `workspace_root`; commit references read their tree.
pub(crate) fn resolve_folded(
    tx: &mut impl RepoOps,
    reference: &str,
) -> Result<(Address, Merkle), IndexError> {
    let resolved = resolve_ref(tx, reference)?;
    match resolved.branch_name().cloned() {
        Some(name) => {
            let folded = partial_commit(tx, &name)?;
            Ok((folded.commit.clone(), Merkle::at(folded.workspace_root)))
        }
        None => Ok((
            resolved.commit_address().clone(),
            resolved.read_tree(false),
        )),
    }
}

impl<S: Store> Index<S> {
    /// Three-way diff of two references against their lowest common
    /// ancestor. Branch references include uncommitted changes.
    ///
    /// # Errors
    /// [`IndexError::NoMergeBase`] when the histories are disjoint;
    /// validation, reference, and store failures otherwise.
    #[instrument(skip(self), fields(repo = repo_id, left = left_ref, right = right_ref))]
    pub fn diff(
        &self,
        repo_id: &str,
        left_ref: &str,
        right_ref: &str,
    ) -> Result<Vec<Difference>, IndexError> {
        let id = parse_repo_id(repo_id)?;
        check_ref(left_ref)?;
        check_ref(right_ref)?;
        self.check_cancel()?;

        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let (left_commit, left_tree) = resolve_folded(tx, left_ref)?;
            let (right_commit, right_tree) = resolve_folded(tx, right_ref)?;

            let Some((_, base)) = dag::find_lowest_common_ancestor(tx, &left_commit, &right_commit)?
            else {
                return Err(IndexError::NoMergeBase);
            };
            diff3(tx, &left_tree, &right_tree, &Merkle::at(base.tree))
        })
    }

    /// What has the branch changed since its last commit? Drives a partial
    /// commit, then compares `workspace_root` against `commit_root` with
    /// `commit_root` as the base — every difference comes back on the left
    /// side.
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if the branch does not exist.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn diff_workspace(
        &self,
        repo_id: &str,
        branch: &str,
    ) -> Result<Vec<Difference>, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        self.check_cancel()?;

        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let folded = partial_commit(tx, &name)?;
            let staged = Merkle::at(folded.workspace_root);
            let committed = Merkle::at(folded.commit_root);
            diff3(tx, &staged, &committed, &committed)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::index::Index;
    use crate::model::diff::{DiffKind, DiffSide};
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
        idx.write_object("r1", "main", "a/b.txt", object("base")).unwrap();
        idx.commit("r1", "main", "c1", "u", BTreeMap::new()).unwrap();
        idx
    }

    #[test]
    fn identical_branches_have_no_diff() {
        let idx = seeded();
        idx.create_branch("r1", "dev", "main").unwrap();
        assert!(idx.diff("r1", "main", "dev").unwrap().is_empty());
    }

    #[test]
    fn committed_divergence_lands_on_the_changed_side() {
        let idx = seeded();
        idx.create_branch("r1", "dev", "main").unwrap();
        idx.write_object("r1", "dev", "a/b.txt", object("v2")).unwrap();
        idx.commit("r1", "dev", "c2", "u", BTreeMap::new()).unwrap();

        let diffs = idx.diff("r1", "main", "dev").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path.as_str(), "a/b.txt");
        assert_eq!(diffs[0].side, DiffSide::Right);
        assert_eq!(diffs[0].kind, DiffKind::Changed);
    }

    #[test]
    fn uncommitted_branch_changes_are_visible() {
        let idx = seeded();
        idx.create_branch("r1", "dev", "main").unwrap();
        // Staged on dev, not committed.
        idx.write_object("r1", "dev", "new.txt", object("n")).unwrap();

        let diffs = idx.diff("r1", "main", "dev").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path.as_str(), "new.txt");
        assert_eq!(diffs[0].side, DiffSide::Right);
        assert_eq!(diffs[0].kind, DiffKind::Added);
    }

    #[test]
    fn diff_against_a_commit_reference() {
        let idx = seeded();
        let c1 = idx.get_branch("r1", "main").unwrap().commit;
        idx.write_object("r1", "main", "a/b.txt", object("v2")).unwrap();
        idx.commit("r1", "main", "c2", "u", BTreeMap::new()).unwrap();

        let diffs = idx.diff("r1", c1.as_str(), "main").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].side, DiffSide::Right);
    }

    #[test]
    fn diff_workspace_reports_left_side_changes() {
        let idx = seeded();
        idx.write_object("r1", "main", "fresh.txt", object("f")).unwrap();
        idx.delete_object("r1", "main", "a/b.txt").unwrap();

        let diffs = idx.diff_workspace("r1", "main").unwrap();
        let brief: Vec<_> = diffs
            .iter()
            .map(|d| (d.path.as_str().to_owned(), d.side, d.kind))
            .collect();
        assert_eq!(
            brief,
            vec![
                ("a/b.txt".to_owned(), DiffSide::Left, DiffKind::Removed),
                ("fresh.txt".to_owned(), DiffSide::Left, DiffKind::Added),
            ]
        );
    }

    #[test]
    fn diff_workspace_is_empty_after_commit() {
        let idx = seeded();
        assert!(idx.diff_workspace("r1", "main").unwrap().is_empty());
    }

    #[test]
    fn diverging_writes_on_both_sides_conflict() {
        let idx = seeded();
        idx.create_branch("r1", "dev", "main").unwrap();
        idx.write_object("r1", "main", "a/b.txt", object("m")).unwrap();
        idx.commit("r1", "main", "cm", "u", BTreeMap::new()).unwrap();
        idx.write_object("r1", "dev", "a/b.txt", object("d")).unwrap();
        idx.commit("r1", "dev", "cd", "u", BTreeMap::new()).unwrap();

        let diffs = idx.diff("r1", "dev", "main").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].side, DiffSide::Conflict);
    }
}
