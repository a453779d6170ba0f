//! Three-way structural diff over tree roots.
//!
//! The walk recurses only into subtrees where `left` and `right` disagree
//! — content addressing makes "is this subtree identical?" a single
//! comparison, so the diff touches a number of nodes proportional to the
//! divergence, not to the tree size.
//!
//! Side assignment per path:
//! - only `left` differs from `base`   → [`DiffSide::Left`]
//! - only `right` differs from `base`  → [`DiffSide::Right`]
//! - both differ and disagree          → [`DiffSide::Conflict`]
//! - both differ and agree             → no difference at all
//!
//! Differences are reported at object granularity; a tree/object kind
//! collision at one name is reported as a single conflict at that path.

use std::collections::BTreeSet;

use crate::error::IndexError;
use crate::model::diff::{DiffKind, DiffSide, Difference};
use crate::model::records::{Entry, EntryKind, TreeNode};
use crate::model::types::Address;
use crate::path::join_under;
use crate::store::RepoReadOps;

use super::{Merkle, stored_path};

/// Compare `left` and `right` against their common `base`.
///
/// # Errors
/// Propagates store failures.
pub fn diff3(
    tx: &impl RepoReadOps,
    left: &Merkle,
    right: &Merkle,
    base: &Merkle,
) -> Result<Vec<Difference>, IndexError> {
    let mut out = Vec::new();
    diff_dir(
        tx,
        "",
        Some(left.root()),
        Some(right.root()),
        Some(base.root()),
        &mut out,
    )?;
    Ok(out)
}

/// An entry's comparison signature: presence, kind, and address.
fn sig(entry: Option<&Entry>) -> Option<(EntryKind, &Address)> {
    entry.map(|e| (e.kind, &e.address))
}

fn load(tx: &impl RepoReadOps, addr: Option<&Address>) -> Result<TreeNode, IndexError> {
    addr.map_or_else(|| Ok(TreeNode::default()), |a| Ok(tx.read_tree_node(a)?))
}

fn diff_dir(
    tx: &impl RepoReadOps,
    dir: &str,
    left: Option<&Address>,
    right: Option<&Address>,
    base: Option<&Address>,
    out: &mut Vec<Difference>,
) -> Result<(), IndexError> {
    // Both sides agree — whatever happened relative to the base, it is not
    // a difference between them.
    if left == right {
        return Ok(());
    }

    let ln = load(tx, left)?;
    let rn = load(tx, right)?;
    let bn = load(tx, base)?;

    let names: BTreeSet<&str> = ln
        .entries
        .iter()
        .chain(&rn.entries)
        .chain(&bn.entries)
        .map(|e| e.name.as_str())
        .collect();

    for name in names {
        let le = ln.find(name);
        let re = rn.find(name);
        let be = bn.find(name);

        if sig(le) == sig(re) {
            continue;
        }

        let left_treeish = le.is_none_or(|e| e.kind.is_tree());
        let right_treeish = re.is_none_or(|e| e.kind.is_tree());

        if left_treeish && right_treeish {
            // At least one side has a subtree here (both absent was caught
            // by the signature check); recurse. A base object at this name
            // contributes nothing below, so it degrades to an empty base.
            let base_sub = be.filter(|e| e.kind.is_tree()).map(|e| &e.address);
            diff_dir(
                tx,
                &join_under(dir, name),
                le.map(|e| &e.address),
                re.map(|e| &e.address),
                base_sub,
                out,
            )?;
            continue;
        }

        if le.is_some_and(|e| e.kind.is_tree()) || re.is_some_and(|e| e.kind.is_tree()) {
            // A tree on one side and an object on the other can never be
            // reconciled structurally.
            let path_kind = le.or(re).map_or(EntryKind::Object, |e| e.kind);
            out.push(Difference {
                path: stored_path(dir, name)?,
                path_kind,
                side: DiffSide::Conflict,
                kind: if be.is_some() { DiffKind::Changed } else { DiffKind::Added },
            });
            continue;
        }

        // Plain object comparison.
        let changed_left = sig(le) != sig(be);
        let changed_right = sig(re) != sig(be);

        let (side, kind) = if changed_left && changed_right {
            let kind = if be.is_some() { DiffKind::Changed } else { DiffKind::Added };
            (DiffSide::Conflict, kind)
        } else if changed_left {
            (DiffSide::Left, change_kind(le, be))
        } else {
            (DiffSide::Right, change_kind(re, be))
        };

        out.push(Difference {
            path: stored_path(dir, name)?,
            path_kind: EntryKind::Object,
            side,
            kind,
        });
    }
    Ok(())
}

/// How a changed side relates to the base entry.
fn change_kind(changed: Option<&Entry>, base: Option<&Entry>) -> DiffKind {
    match (changed, base) {
        (Some(_), None) => DiffKind::Added,
        (None, Some(_)) => DiffKind::Removed,
        _ => DiffKind::Changed,
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
    use crate::store::Store;
    use crate::store::mem::MemStore;

    fn with_repo_tx<R>(
        op: impl FnOnce(&mut <MemStore as Store>::RepoWriteTx) -> Result<R, IndexError>,
    ) -> R {
        let store = MemStore::new();
        let repo = RepoId::new("r1").unwrap();
        store.repo_transact(&repo, op).unwrap()
    }

    fn brief(diffs: &[Difference]) -> Vec<(String, DiffSide, DiffKind)> {
        diffs
            .iter()
            .map(|d| (d.path.as_str().to_owned(), d.side, d.kind))
            .collect()
    }

    #[test]
    fn identical_trees_diff_empty() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a/b.txt", 'x')]);
            let diffs = diff3(tx, &base, &base.clone(), &base)?;
            assert!(diffs.is_empty());
            Ok(())
        });
    }

    #[test]
    fn right_only_change_is_right_changed() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a/b.txt", 'x')]);
            let change = obj_change(tx, "a/b.txt", 'y');
            let right = base.update(tx, &[change])?;
            let diffs = diff3(tx, &base, &right, &base)?;
            assert_eq!(
                brief(&diffs),
                vec![("a/b.txt".to_owned(), DiffSide::Right, DiffKind::Changed)]
            );
            Ok(())
        });
    }

    #[test]
    fn left_add_and_remove() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("keep.txt", 'k'), ("gone.txt", 'g')]);
            let add = obj_change(tx, "new.txt", 'n');
            let left = base.update(tx, &[add, tombstone("gone.txt")])?;
            let diffs = diff3(tx, &left, &base, &base)?;
            assert_eq!(
                brief(&diffs),
                vec![
                    ("gone.txt".to_owned(), DiffSide::Left, DiffKind::Removed),
                    ("new.txt".to_owned(), DiffSide::Left, DiffKind::Added),
                ]
            );
            Ok(())
        });
    }

    #[test]
    fn both_sides_same_change_is_no_difference() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a.txt", 'x')]);
            let c1 = obj_change(tx, "a.txt", 'y');
            let left = base.update(tx, &[c1.clone()])?;
            let right = base.update(tx, &[c1])?;
            let diffs = diff3(tx, &left, &right, &base)?;
            assert!(diffs.is_empty());
            Ok(())
        });
    }

    #[test]
    fn divergent_change_is_conflict() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a.txt", 'x')]);
            let change_l = obj_change(tx, "a.txt", 'l');
            let left = base.update(tx, &[change_l])?;
            let change_r = obj_change(tx, "a.txt", 'r');
            let right = base.update(tx, &[change_r])?;
            let diffs = diff3(tx, &left, &right, &base)?;
            assert_eq!(
                brief(&diffs),
                vec![("a.txt".to_owned(), DiffSide::Conflict, DiffKind::Changed)]
            );
            Ok(())
        });
    }

    #[test]
    fn double_add_is_an_added_conflict() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("anchor.txt", 'a')]);
            let change_l = obj_change(tx, "fresh.txt", 'l');
            let left = base.update(tx, &[change_l])?;
            let change_r = obj_change(tx, "fresh.txt", 'r');
            let right = base.update(tx, &[change_r])?;
            let diffs = diff3(tx, &left, &right, &base)?;
            assert_eq!(
                brief(&diffs),
                vec![("fresh.txt".to_owned(), DiffSide::Conflict, DiffKind::Added)]
            );
            Ok(())
        });
    }

    #[test]
    fn change_versus_delete_is_a_conflict() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a.txt", 'x')]);
            let change_l = obj_change(tx, "a.txt", 'l');
            let left = base.update(tx, &[change_l])?;
            let right = base.update(tx, &[tombstone("a.txt")])?;
            let diffs = diff3(tx, &left, &right, &base)?;
            assert_eq!(
                brief(&diffs),
                vec![("a.txt".to_owned(), DiffSide::Conflict, DiffKind::Changed)]
            );
            Ok(())
        });
    }

    #[test]
    fn removed_directory_reports_each_object() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("d/a.txt", 'a'), ("d/b.txt", 'b'), ("z.txt", 'z')]);
            let left = base.update(tx, &[tombstone("d/a.txt"), tombstone("d/b.txt")])?;
            let diffs = diff3(tx, &left, &base, &base)?;
            assert_eq!(
                brief(&diffs),
                vec![
                    ("d/a.txt".to_owned(), DiffSide::Left, DiffKind::Removed),
                    ("d/b.txt".to_owned(), DiffSide::Left, DiffKind::Removed),
                ]
            );
            Ok(())
        });
    }

    #[test]
    fn diff_is_antisymmetric_on_side() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("a.txt", 'x'), ("b.txt", 'y')]);
            let change_p = obj_change(tx, "a.txt", 'p');
            let one = base.update(tx, &[change_p])?;
            let change_q = obj_change(tx, "b.txt", 'q');
            let change_c = obj_change(tx, "c.txt", 'c');
            let two = base.update(tx, &[change_q, change_c])?;

            let forward = diff3(tx, &one, &two, &base)?;
            let backward = diff3(tx, &two, &one, &base)?;
            assert_eq!(forward.len(), backward.len());
            for f in &forward {
                let b = backward
                    .iter()
                    .find(|b| b.path == f.path)
                    .expect("same paths on both sides");
                assert_eq!(b.side, f.side.swapped());
                assert_eq!(b.kind, f.kind);
            }
            Ok(())
        });
    }

    #[test]
    fn kind_collision_is_a_conflict() {
        with_repo_tx(|tx| {
            let base = tree(tx, &[("anchor.txt", 'a')]);
            // Left creates an object at "x"; right creates a subtree at "x".
            let change_l = obj_change(tx, "x", 'l');
            let left = base.update(tx, &[change_l])?;
            let change_r = obj_change(tx, "x/inner.txt", 'r');
            let right = base.update(tx, &[change_r])?;
            let diffs = diff3(tx, &left, &right, &base)?;
            assert_eq!(diffs.len(), 1);
            assert_eq!(diffs[0].path.as_str(), "x");
            assert!(diffs[0].is_conflict());
            assert_eq!(diffs[0].kind, DiffKind::Added);
            Ok(())
        });
    }
}
