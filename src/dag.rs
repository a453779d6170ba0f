//! Commit DAG traversals: log paging and merge-base discovery.
//!
//! Commits reference parents by content address, so the history is a DAG
//! of immutable values — no cycle-breaking, no back-pointers. Both
//! operations here are plain breadth-first searches; sibling order is
//! parent order, which makes log output deterministic for merge commits.

use std::collections::{HashSet, VecDeque};

use crate::error::IndexError;
use crate::model::records::Commit;
use crate::model::types::Address;
use crate::store::{Page, RepoReadOps};

/// Read a commit, translating the store's bare not-found into the domain
/// variant (a dangling parent edge is indistinguishable from a bad id).
fn read_commit(tx: &impl RepoReadOps, addr: &Address) -> Result<Commit, IndexError> {
    tx.read_commit(addr).map_err(|e| {
        if e.is_not_found() {
            IndexError::CommitNotFound { id: addr.as_str().to_owned() }
        } else {
            IndexError::Store(e)
        }
    })
}

// ---------------------------------------------------------------------------
// Log scan
// ---------------------------------------------------------------------------

/// Breadth-first log page starting at `from`.
///
/// When `after` is given, emission starts with the commit following it in
/// traversal order (the standard continuation token: pass the last commit
/// of the previous page). Each commit is visited once even when reachable
/// through several parents.
///
/// # Errors
/// [`IndexError::CommitNotFound`] if `from` or a parent edge is dangling;
/// store failures otherwise.
pub fn bfs_scan(
    tx: &impl RepoReadOps,
    from: &Address,
    limit: usize,
    after: Option<&Address>,
) -> Result<Page<(Address, Commit)>, IndexError> {
    let mut queue = VecDeque::from([from.clone()]);
    let mut visited: HashSet<Address> = HashSet::new();
    let mut emitting = after.is_none();
    let mut items = Vec::new();
    let mut has_more = false;

    while let Some(addr) = queue.pop_front() {
        if !visited.insert(addr.clone()) {
            continue;
        }
        let commit = read_commit(tx, &addr)?;

        if emitting {
            if items.len() == limit {
                has_more = true;
                break;
            }
            items.push((addr, commit.clone()));
        } else if after == Some(&addr) {
            emitting = true;
        }

        for parent in &commit.parents {
            if !visited.contains(parent) {
                queue.push_back(parent.clone());
            }
        }
    }

    Ok(Page { items, has_more })
}

// ---------------------------------------------------------------------------
// Lowest common ancestor
// ---------------------------------------------------------------------------

/// Find the merge base of `a` and `b`: the first commit reachable from
/// both in an interleaved two-frontier BFS. Returns `None` when the
/// histories are disjoint.
///
/// # Errors
/// [`IndexError::CommitNotFound`] on dangling edges; store failures
/// otherwise.
pub fn find_lowest_common_ancestor(
    tx: &impl RepoReadOps,
    a: &Address,
    b: &Address,
) -> Result<Option<(Address, Commit)>, IndexError> {
    let mut queue_a = VecDeque::from([a.clone()]);
    let mut queue_b = VecDeque::from([b.clone()]);
    let mut seen_a: HashSet<Address> = HashSet::new();
    let mut seen_b: HashSet<Address> = HashSet::new();

    while !(queue_a.is_empty() && queue_b.is_empty()) {
        if let Some(found) = advance(tx, &mut queue_a, &mut seen_a, &seen_b)? {
            return Ok(Some(found));
        }
        if let Some(found) = advance(tx, &mut queue_b, &mut seen_b, &seen_a)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Pop one address from `queue`; if the other frontier has already seen
/// it, that commit is the meeting point.
fn advance(
    tx: &impl RepoReadOps,
    queue: &mut VecDeque<Address>,
    seen: &mut HashSet<Address>,
    other_seen: &HashSet<Address>,
) -> Result<Option<(Address, Commit)>, IndexError> {
    let Some(addr) = queue.pop_front() else {
        return Ok(None);
    };
    if !seen.insert(addr.clone()) {
        return Ok(None);
    }
    let commit = read_commit(tx, &addr)?;
    if other_seen.contains(&addr) {
        return Ok(Some((addr, commit)));
    }
    for parent in &commit.parents {
        if !seen.contains(parent) {
            queue.push_back(parent.clone());
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
