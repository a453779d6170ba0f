//! Repository operations: create, get, list, delete.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::error::IndexError;
use crate::ident::{RecordKind, address_of, empty_tree_address};
use crate::model::records::{Branch, Commit, Repository, TreeNode};
use crate::model::types::RepoId;
use crate::store::{ClientOps, ClientReadOps, Page, RepoOps, RepoReadOps, Store};

use super::{Index, parse_branch_name, parse_repo_id, read_repo_record};

impl<S: Store> Index<S> {
    /// Create a repository: the record, the initial empty commit, and the
    /// default branch pointing at it.
    ///
    /// `default_branch` and `partial_commit_ratio` fall back to the
    /// configured defaults when not given.
    ///
    /// # Errors
    /// [`IndexError::RepoExists`] if the id is taken; validation errors
    /// before any transaction is opened.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn create_repo(
        &self,
        repo_id: &str,
        bucket: &str,
        default_branch: Option<&str>,
        partial_commit_ratio: Option<f64>,
    ) -> Result<Repository, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let branch_name = parse_branch_name(
            default_branch.unwrap_or(self.config.repo.default_branch.as_str()),
        )?;
        self.check_cancel()?;

        let now = self.now();
        let repo = Repository {
            bucket: bucket.to_owned(),
            created_at: now,
            default_branch: branch_name.clone(),
            partial_commit_ratio: partial_commit_ratio
                .unwrap_or(self.config.repo.partial_commit_ratio)
                .clamp(0.0, 1.0),
        };

        self.store.repo_transact(&id, |tx| {
            if tx.read_repo().is_ok() {
                return Err(IndexError::RepoExists { id: id.as_str().to_owned() });
            }
            tx.write_repo(&repo)?;

            // Seed the empty tree and the initial commit pointing at it.
            let empty = empty_tree_address();
            tx.write_tree_node(empty, &TreeNode::default())?;
            let initial = Commit {
                tree: empty.clone(),
                parents: vec![],
                committer: String::new(),
                message: "Repository created".to_owned(),
                timestamp: now,
                metadata: BTreeMap::new(),
            };
            let commit_addr = address_of(RecordKind::Commit, &initial)?;
            tx.write_commit(&commit_addr, &initial)?;

            let branch = Branch {
                commit: commit_addr,
                commit_root: empty.clone(),
                workspace_root: empty.clone(),
            };
            tx.write_branch(&branch_name, &branch)?;
            Ok(repo.clone())
        })
    }

    /// Read a repository record.
    ///
    /// # Errors
    /// [`IndexError::RepoNotFound`] if it does not exist.
    pub fn get_repo(&self, repo_id: &str) -> Result<Repository, IndexError> {
        let id = parse_repo_id(repo_id)?;
        self.check_cancel()?;
        self.store
            .repo_read_transact(&id, |tx| read_repo_record(tx, &id))
    }

    /// List repositories in id order, starting strictly after `after`.
    ///
    /// # Errors
    /// Validation errors for a malformed `after`; store failures.
    pub fn list_repos(
        &self,
        amount: usize,
        after: Option<&str>,
    ) -> Result<Page<(RepoId, Repository)>, IndexError> {
        let after = after.map(parse_repo_id).transpose()?;
        self.check_cancel()?;
        self.store
            .read_transact(|tx| Ok(tx.list_repos(amount, after.as_ref())?))
    }

    /// Delete a repository and everything scoped under it.
    ///
    /// # Errors
    /// [`IndexError::RepoNotFound`] if it does not exist.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn delete_repo(&self, repo_id: &str) -> Result<(), IndexError> {
        let id = parse_repo_id(repo_id)?;
        self.check_cancel()?;
        self.store.transact(|tx| {
            tx.delete_repo(&id).map_err(|e| {
                if e.is_not_found() {
                    IndexError::RepoNotFound { id: id.as_str().to_owned() }
                } else {
                    IndexError::Store(e)
                }
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::error::IndexError;
    use crate::index::Index;
    use crate::store::mem::MemStore;

    fn index() -> Index<MemStore> {
        Index::new(MemStore::new())
    }

    #[test]
    fn create_and_get_round_trip() {
        let idx = index();
        let repo = idx.create_repo("raw-events", "bkt", None, None).unwrap();
        assert_eq!(repo.default_branch.as_str(), "main");

        let read = idx.get_repo("raw-events").unwrap();
        assert_eq!(read, repo);
    }

    #[test]
    fn create_initializes_default_branch_at_empty_tree() {
        let idx = index();
        idx.create_repo("raw-events", "bkt", Some("trunk"), None).unwrap();
        let branch = idx.get_branch("raw-events", "trunk").unwrap();
        assert_eq!(&branch.commit_root, crate::ident::empty_tree_address());
        assert_eq!(branch.workspace_root, branch.commit_root);

        let commit = idx
            .get_commit("raw-events", branch.commit.as_str())
            .unwrap();
        assert!(commit.parents.is_empty());
        assert_eq!(commit.tree, branch.commit_root);
    }

    #[test]
    fn create_twice_is_repo_exists() {
        let idx = index();
        idx.create_repo("raw-events", "bkt", None, None).unwrap();
        let err = idx.create_repo("raw-events", "bkt", None, None).unwrap_err();
        assert!(matches!(err, IndexError::RepoExists { .. }));
    }

    #[test]
    fn invalid_id_fails_before_any_transaction() {
        let idx = index();
        let err = idx.create_repo("Bad Id", "bkt", None, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn get_missing_is_repo_not_found() {
        let err = index().get_repo("missing-repo").unwrap_err();
        assert!(matches!(err, IndexError::RepoNotFound { .. }));
    }

    #[test]
    fn list_pages_in_id_order() {
        let idx = index();
        for id in ["rc", "ra", "rb"] {
            idx.create_repo(id, "bkt", None, None).unwrap();
        }
        let page = idx.list_repos(2, None).unwrap();
        let ids: Vec<_> = page.items.iter().map(|(id, _)| id.as_str().to_owned()).collect();
        assert_eq!(ids, vec!["ra", "rb"]);
        assert!(page.has_more);

        let rest = idx.list_repos(5, Some("rb")).unwrap();
        let ids: Vec<_> = rest.items.iter().map(|(id, _)| id.as_str().to_owned()).collect();
        assert_eq!(ids, vec!["rc"]);
        assert!(!rest.has_more);
    }

    #[test]
    fn delete_removes_the_repo() {
        let idx = index();
        idx.create_repo("raw-events", "bkt", None, None).unwrap();
        idx.delete_repo("raw-events").unwrap();
        assert!(idx.get_repo("raw-events").unwrap_err().is_not_found());
        let err = idx.delete_repo("raw-events").unwrap_err();
        assert!(matches!(err, IndexError::RepoNotFound { .. }));
    }

    #[test]
    fn ratio_is_clamped() {
        let idx = index();
        let repo = idx.create_repo("raw-events", "bkt", None, Some(7.5)).unwrap();
        assert!((repo.partial_commit_ratio - 1.0).abs() < f64::EPSILON);
    }
}
