//! Prefix scans: paginated listings of a tree.
//!
//! Two shapes, per the listing contract:
//! - `descend = false`: the immediate children of `prefix`, objects and
//!   subdirectories alike, in name order.
//! - `descend = true`: every object underneath `prefix`, depth-first, in
//!   full-path lexicographic order.
//!
//! Pagination starts strictly after the `after` path and reports
//! `has_more` when the page was truncated. In descend mode siblings are
//! ordered with directories keyed as `name/`, which makes the emission
//! order exactly full-path lexicographic — resuming a listing from its
//! last returned path can neither skip nor repeat entries.

use std::borrow::Cow;

use crate::error::IndexError;
use crate::model::records::{Entry, EntryKind, TreeNode};
use crate::path::join_under;
use crate::store::{Page, RepoReadOps};

use super::{Merkle, stored_path};

impl Merkle {
    /// List entries under `prefix`, starting strictly after `after`,
    /// returning at most `limit` of them.
    ///
    /// A prefix that does not exist (or names an object) yields an empty,
    /// exhausted page.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn prefix_scan(
        &self,
        tx: &impl RepoReadOps,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
        descend: bool,
    ) -> Result<Page<(crate::path::RepoPath, Entry)>, IndexError> {
        let Some(node) = self.node_at_dir(tx, prefix)? else {
            return Ok(Page::empty());
        };

        let mut items = Vec::new();
        let has_more = if descend {
            scan_deep(tx, prefix, &node, after, limit, &mut items)?
        } else {
            let mut truncated = false;
            for entry in &node.entries {
                let full = join_under(prefix, &entry.name);
                if after.is_some_and(|a| full.as_str() <= a) {
                    continue;
                }
                if items.len() == limit {
                    truncated = true;
                    break;
                }
                items.push((stored_path(prefix, &entry.name)?, entry.clone()));
            }
            truncated
        };
        Ok(Page { items, has_more })
    }
}

/// The key an entry sorts under in descend mode: directories order as
/// `name/` so siblings interleave exactly like their full paths do.
fn lex_key(entry: &Entry) -> Cow<'_, str> {
    if entry.kind == EntryKind::Tree {
        Cow::Owned(format!("{}/", entry.name))
    } else {
        Cow::Borrowed(entry.name.as_str())
    }
}

/// Depth-first emission of object entries. Returns `true` when the page
/// filled up and more entries remain.
fn scan_deep(
    tx: &impl RepoReadOps,
    dir: &str,
    node: &TreeNode,
    after: Option<&str>,
    limit: usize,
    out: &mut Vec<(crate::path::RepoPath, Entry)>,
) -> Result<bool, IndexError> {
    let mut ordered: Vec<&Entry> = node.entries.iter().collect();
    ordered.sort_by(|a, b| lex_key(a).cmp(&lex_key(b)));

    for entry in ordered {
        let full = join_under(dir, &entry.name);
        match entry.kind {
            EntryKind::Tree => {
                // Skip subtrees that lie entirely before `after`: every
                // path below starts with `full/`, so if `after` is past
                // that prefix interval the subtree holds nothing to emit.
                if let Some(a) = after {
                    let bound = format!("{full}/");
                    if a >= bound.as_str() && !a.starts_with(&bound) {
                        continue;
                    }
                }
                let child = tx.read_tree_node(&entry.address)?;
                if scan_deep(tx, &full, &child, after, limit, out)? {
                    return Ok(true);
                }
            }
            EntryKind::Object => {
                if after.is_some_and(|a| full.as_str() <= a) {
                    continue;
                }
                if out.len() == limit {
                    return Ok(true);
                }
                out.push((stored_path(dir, &entry.name)?, entry.clone()));
            }
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
