//! Object and entry operations: the read path, the write path, and the
//! four-state delete.
//!
//! Branch reads consult the workspace first — a staged entry shadows the
//! tree, a tombstone hides it — and fall through to the branch's
//! `workspace_root` tree. Commit reads go straight to the commit's tree.
//! Every mutation stages a workspace entry and then rolls the
//! partial-commit die.

use tracing::instrument;

use crate::error::IndexError;
use crate::ident::{RecordKind, address_of};
use crate::merkle::Merkle;
use crate::model::records::{Entry, EntryKind, ObjectRecord, StagedChange, TreeNode, WorkspaceEntry};
use crate::path::RepoPath;
use crate::store::{Page, RepoOps, RepoReadOps, Store};

use super::{
    Index, check_ref, parse_branch_name, parse_path, parse_repo_id, partial_commit,
    read_branch_record, read_repo_record, resolve_ref,
};

/// Workspace lookup outcome, with store failures separated from absence.
fn staged_at(
    tx: &impl RepoReadOps,
    branch: &crate::model::types::BranchName,
    path: &RepoPath,
) -> Result<Option<WorkspaceEntry>, IndexError> {
    match tx.read_from_workspace(branch, path) {
        Ok(entry) => Ok(Some(entry)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn path_not_found(path: &RepoPath) -> IndexError {
    IndexError::PathNotFound { path: path.as_str().to_owned() }
}

impl<S: Store> Index<S> {
    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Read the object record at `path` as seen from `reference`.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] if the path is absent or tombstoned.
    pub fn read_object(
        &self,
        repo_id: &str,
        reference: &str,
        path: &str,
    ) -> Result<ObjectRecord, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let path = parse_path(path)?;
        check_ref(reference)?;
        self.check_cancel()?;

        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let resolved = resolve_ref(tx, reference)?;
            if let Some(name) = resolved.branch_name() {
                if let Some(staged) = staged_at(tx, name, &path)? {
                    return match staged.change {
                        StagedChange::Put { entry } => Ok(tx.read_object(&entry.address)?),
                        StagedChange::Delete { .. } => Err(path_not_found(&path)),
                    };
                }
            }
            resolved.read_tree(false).get_object(tx, &path)
        })
    }

    /// Read the entry at `path` as seen from `reference`, requiring `kind`.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] if the path is absent, tombstoned, or
    /// of the wrong kind.
    pub fn read_entry(
        &self,
        repo_id: &str,
        reference: &str,
        path: &str,
        kind: EntryKind,
    ) -> Result<Entry, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let path = parse_path(path)?;
        check_ref(reference)?;
        self.check_cancel()?;

        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let resolved = resolve_ref(tx, reference)?;
            if let Some(name) = resolved.branch_name() {
                if let Some(staged) = staged_at(tx, name, &path)? {
                    return match staged.change {
                        StagedChange::Put { entry } if entry.kind == kind => Ok(entry),
                        _ => Err(path_not_found(&path)),
                    };
                }
            }
            resolved.read_tree(false).get_entry(tx, &path, kind)
        })
    }

    /// The root tree node as seen from `reference` (a branch's
    /// `workspace_root`, a commit's tree).
    ///
    /// # Errors
    /// Reference and store failures.
    pub fn read_root_object(
        &self,
        repo_id: &str,
        reference: &str,
    ) -> Result<TreeNode, IndexError> {
        let id = parse_repo_id(repo_id)?;
        check_ref(reference)?;
        self.check_cancel()?;

        self.store.repo_read_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let resolved = resolve_ref(tx, reference)?;
            resolved.read_tree(false).root_node(tx)
        })
    }

    /// Paginated listing under `prefix` (`""` for the root).
    ///
    /// Branch references drive a partial commit first so the listing
    /// reflects everything staged; the scan then runs against the folded
    /// `workspace_root`.
    ///
    /// # Errors
    /// Validation, reference, and store failures.
    pub fn list_objects(
        &self,
        repo_id: &str,
        reference: &str,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
        descend: bool,
    ) -> Result<Page<(RepoPath, Entry)>, IndexError> {
        let id = parse_repo_id(repo_id)?;
        check_ref(reference)?;
        if !prefix.is_empty() {
            parse_path(prefix)?;
        }
        if let Some(a) = after {
            parse_path(a)?;
        }
        self.check_cancel()?;

        self.store.repo_transact(&id, |tx| {
            read_repo_record(tx, &id)?;
            let resolved = resolve_ref(tx, reference)?;
            let tree = match resolved.branch_name() {
                Some(name) => {
                    let folded = partial_commit(tx, name)?;
                    Merkle::at(folded.workspace_root)
                }
                None => resolved.read_tree(false),
            };
            tree.prefix_scan(tx, prefix, after, limit, descend)
        })
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Write an object: persist its record at its content address and
    /// stage an entry for it on `branch`. Returns the staged entry.
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if the branch does not exist;
    /// validation and store failures otherwise.
    #[instrument(skip(self, object), fields(repo = repo_id))]
    pub fn write_object(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
        object: ObjectRecord,
    ) -> Result<Entry, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        let path = parse_path(path)?;
        self.check_cancel()?;

        let now = self.now();
        self.store.repo_transact(&id, |tx| {
            let repo = read_repo_record(tx, &id)?;
            read_branch_record(tx, &name)?;

            let address = address_of(RecordKind::Object, &object)?;
            tx.write_object(&address, &object)?;

            let entry = Entry {
                name: path.basename().to_owned(),
                address,
                kind: EntryKind::Object,
                size: object.size,
                checksum: object.checksum.clone(),
                timestamp: now,
            };
            tx.write_to_workspace(&name, &WorkspaceEntry {
                path: path.clone(),
                change: StagedChange::Put { entry: entry.clone() },
            })?;
            self.maybe_partial_commit(tx, &name, repo.partial_commit_ratio)?;
            Ok(entry)
        })
    }

    /// Write a file with a caller-supplied entry: the record is persisted
    /// under the entry's address, which lets non-self-describing cases
    /// (external uploads) keep whatever address the uploader computed.
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if the branch does not exist;
    /// validation and store failures otherwise.
    #[instrument(skip(self, entry, object), fields(repo = repo_id))]
    pub fn write_file(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
        mut entry: Entry,
        object: ObjectRecord,
    ) -> Result<Entry, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        let path = parse_path(path)?;
        self.check_cancel()?;

        entry.name = path.basename().to_owned();
        self.store.repo_transact(&id, |tx| {
            let repo = read_repo_record(tx, &id)?;
            read_branch_record(tx, &name)?;
            tx.write_object(&entry.address, &object)?;
            tx.write_to_workspace(&name, &WorkspaceEntry {
                path: path.clone(),
                change: StagedChange::Put { entry: entry.clone() },
            })?;
            self.maybe_partial_commit(tx, &name, repo.partial_commit_ratio)?;
            Ok(entry)
        })
    }

    /// Stage an entry with no object write (the record was persisted
    /// out-of-band, e.g. by an earlier staged upload).
    ///
    /// # Errors
    /// [`IndexError::BranchNotFound`] if the branch does not exist;
    /// validation and store failures otherwise.
    #[instrument(skip(self, entry), fields(repo = repo_id))]
    pub fn write_entry(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
        mut entry: Entry,
    ) -> Result<Entry, IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        let path = parse_path(path)?;
        self.check_cancel()?;

        entry.name = path.basename().to_owned();
        self.store.repo_transact(&id, |tx| {
            let repo = read_repo_record(tx, &id)?;
            read_branch_record(tx, &name)?;
            tx.write_to_workspace(&name, &WorkspaceEntry {
                path: path.clone(),
                change: StagedChange::Put { entry: entry.clone() },
            })?;
            self.maybe_partial_commit(tx, &name, repo.partial_commit_ratio)?;
            Ok(entry)
        })
    }

    /// Delete the object at `path` on `branch`.
    ///
    /// Case analysis over (staged, in-tree):
    /// - neither → [`IndexError::PathNotFound`];
    /// - staged only → the stage is undone;
    /// - in-tree only → a tombstone is staged;
    /// - both → the stage is undone *and* a tombstone is staged, so the
    ///   tree entry is shadowed on the next partial commit.
    ///
    /// An already-staged tombstone reads as absent.
    ///
    /// # Errors
    /// [`IndexError::PathNotFound`] per the analysis above.
    #[instrument(skip(self), fields(repo = repo_id))]
    pub fn delete_object(
        &self,
        repo_id: &str,
        branch: &str,
        path: &str,
    ) -> Result<(), IndexError> {
        let id = parse_repo_id(repo_id)?;
        let name = parse_branch_name(branch)?;
        let path = parse_path(path)?;
        self.check_cancel()?;

        let now = self.now();
        self.store.repo_transact(&id, |tx| {
            let repo = read_repo_record(tx, &id)?;
            let record = read_branch_record(tx, &name)?;

            let staged = staged_at(tx, &name, &path)?;
            if staged.as_ref().is_some_and(WorkspaceEntry::is_tombstone) {
                return Err(path_not_found(&path));
            }

            let in_tree = match Merkle::at(record.workspace_root)
                .get_entry(tx, &path, EntryKind::Object)
            {
                Ok(_) => true,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e),
            };

            let tombstone = WorkspaceEntry {
                path: path.clone(),
                change: StagedChange::Delete {
                    name: path.basename().to_owned(),
                    timestamp: now,
                },
            };
            match (staged.is_some(), in_tree) {
                (false, false) => return Err(path_not_found(&path)),
                (true, false) => {
                    tx.delete_workspace_path(&name, &path)?;
                }
                (false, true) => {
                    tx.write_to_workspace(&name, &tombstone)?;
                }
                (true, true) => {
                    tx.delete_workspace_path(&name, &path)?;
                    tx.write_to_workspace(&name, &tombstone)?;
                }
            }
            self.maybe_partial_commit(tx, &name, repo.partial_commit_ratio)?;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
