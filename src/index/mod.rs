//! The index orchestration layer.
//!
//! [`Index`] binds the model, the Merkle engine, the commit DAG, and the
//! store together and exposes the public operations. Every operation
//! follows the same shape:
//!
//! 1. validate inputs (before any transaction is opened);
//! 2. check the cancellation token;
//! 3. open the least-privileged transaction scope;
//! 4. read the repo record (arming the store's conflict detection);
//! 5. resolve references, run Merkle/workspace work;
//! 6. write back and let the transaction commit.
//!
//! The handle is stateless apart from its injected collaborators — a
//! timestamp source, a cancellation token (replaced, never mutated, when
//! re-binding), and the partial-commit probe — so it is safe to share
//! across callers.

mod branches;
mod commits;
mod diffs;
mod merge;
mod objects;
mod repos;
mod revert;

pub use merge::MergeOutcome;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng as _;
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::merkle::Merkle;
use crate::model::records::{Branch, Commit};
use crate::model::types::{Address, BranchName, RepoId};
use crate::path::RepoPath;
use crate::store::{RepoOps, RepoReadOps, Store};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Timestamp source, injectable so tests are deterministic.
pub trait Clock: Send + Sync {
    /// Current time as Unix seconds.
    fn now(&self) -> i64;
}

/// The production clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
    }
}

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Ambient cancellation: once fired, operations fail with
/// [`IndexError::Cancelled`] at their entry point and at the next store
/// boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, unfired token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Irrevocable.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Has the token fired?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// FlushProbe
// ---------------------------------------------------------------------------

/// Decides, after each mutation, whether to fold the workspace into the
/// tree immediately. The probabilistic trial is a performance knob;
/// replacing it with a size or time threshold does not change observable
/// semantics.
pub trait FlushProbe: Send + Sync {
    /// `ratio` is the repository's `partial_commit_ratio` in `[0, 1]`.
    fn should_flush(&self, ratio: f64) -> bool;
}

/// The default probe: a Bernoulli trial with probability `ratio`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BernoulliProbe;

impl FlushProbe for BernoulliProbe {
    fn should_flush(&self, ratio: f64) -> bool {
        ratio > 0.0 && rand::rng().random::<f64>() < ratio
    }
}

/// A probe with a fixed answer: `FixedProbe(true)` folds after every
/// mutation, `FixedProbe(false)` never folds on its own. Deterministic
/// replacement for the Bernoulli trial in tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedProbe(pub bool);

impl FlushProbe for FixedProbe {
    fn should_flush(&self, _ratio: f64) -> bool {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// The versioned-object-index handle.
pub struct Index<S> {
    pub(crate) store: Arc<S>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) cancel: CancelToken,
    pub(crate) flush: Arc<dyn FlushProbe>,
    pub(crate) config: IndexConfig,
}

impl<S> Clone for Index<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            cancel: self.cancel.clone(),
            flush: Arc::clone(&self.flush),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> Index<S> {
    /// An index over `store` with production defaults: the system clock,
    /// the Bernoulli flush probe, an unfired token, default config.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
            cancel: CancelToken::new(),
            flush: Arc::new(BernoulliProbe),
            config: IndexConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the partial-commit probe.
    #[must_use]
    pub fn with_flush_probe(mut self, flush: Arc<dyn FlushProbe>) -> Self {
        self.flush = flush;
        self
    }

    /// A handle bound to a different cancellation token. The original
    /// handle keeps its own token — rebinding replaces, never mutates.
    #[must_use]
    pub fn with_cancel(&self, cancel: CancelToken) -> Self {
        let mut bound = self.clone();
        bound.cancel = cancel;
        bound
    }

    pub(crate) fn check_cancel(&self) -> Result<(), IndexError> {
        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Roll the partial-commit die and fold the workspace when it says so.
    pub(crate) fn maybe_partial_commit(
        &self,
        tx: &mut S::RepoWriteTx,
        name: &BranchName,
        ratio: f64,
    ) -> Result<(), IndexError> {
        if self.flush.should_flush(ratio) {
            debug!(branch = %name, "partial-commit trial fired");
            partial_commit(tx, name)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation (pre-transaction)
// ---------------------------------------------------------------------------

pub(crate) fn parse_repo_id(s: &str) -> Result<RepoId, IndexError> {
    RepoId::new(s).map_err(|e| IndexError::InvalidRepoId { value: e.value, reason: e.reason })
}

pub(crate) fn parse_branch_name(s: &str) -> Result<BranchName, IndexError> {
    BranchName::new(s).map_err(|e| IndexError::InvalidRef { value: e.value, reason: e.reason })
}

pub(crate) fn parse_path(s: &str) -> Result<RepoPath, IndexError> {
    RepoPath::new(s).map_err(|e| IndexError::InvalidPath { value: e.value, reason: e.reason })
}

pub(crate) fn parse_commit_id(s: &str) -> Result<Address, IndexError> {
    Address::new(s).map_err(|e| IndexError::InvalidCommitId { value: e.value, reason: e.reason })
}

/// A reference must be a commit address or a branch name by syntax.
pub(crate) fn check_ref(s: &str) -> Result<(), IndexError> {
    if Address::is_address_syntax(s) || BranchName::new(s).is_ok() {
        Ok(())
    } else {
        Err(IndexError::InvalidRef {
            value: s.to_owned(),
            reason: "not a branch name and not a commit address".to_owned(),
        })
    }
}

pub(crate) fn require_message(s: &str) -> Result<(), IndexError> {
    if s.is_empty() {
        return Err(IndexError::EmptyCommitMessage);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reference resolution
// ---------------------------------------------------------------------------

/// A resolved reference: either a bare commit or a branch with its tip.
#[derive(Clone, Debug)]
pub enum ResolvedRef {
    /// The reference named a commit by address.
    Commit {
        /// The commit's address.
        address: Address,
        /// The commit itself.
        commit: Commit,
    },
    /// The reference named a branch.
    Branch {
        /// The branch name.
        name: BranchName,
        /// The branch record.
        branch: Branch,
        /// The commit the branch points at.
        commit: Commit,
    },
}

impl ResolvedRef {
    /// The address of the resolved commit (a branch's tip).
    #[must_use]
    pub const fn commit_address(&self) -> &Address {
        match self {
            Self::Commit { address, .. } => address,
            Self::Branch { branch, .. } => &branch.commit,
        }
    }

    /// The resolved commit.
    #[must_use]
    pub const fn commit(&self) -> &Commit {
        match self {
            Self::Commit { commit, .. } | Self::Branch { commit, .. } => commit,
        }
    }

    /// The tree this reference reads from. Branch references read
    /// `workspace_root` so folded-but-uncommitted changes are visible —
    /// except under merge semantics, which only ever see committed state.
    #[must_use]
    pub fn read_tree(&self, for_merge: bool) -> Merkle {
        match self {
            Self::Commit { commit, .. } => Merkle::at(commit.tree.clone()),
            Self::Branch { branch, .. } => {
                if for_merge {
                    Merkle::at(branch.commit_root.clone())
                } else {
                    Merkle::at(branch.workspace_root.clone())
                }
            }
        }
    }

    /// The branch name, when the reference named one.
    #[must_use]
    pub const fn branch_name(&self) -> Option<&BranchName> {
        match self {
            Self::Commit { .. } => None,
            Self::Branch { name, .. } => Some(name),
        }
    }
}

/// Resolve `reference` inside a repository: commit by address first (when
/// the syntax allows), then branch by name. Read-only and side-effect
/// free.
pub(crate) fn resolve_ref(
    tx: &impl RepoReadOps,
    reference: &str,
) -> Result<ResolvedRef, IndexError> {
    if let Ok(address) = Address::new(reference) {
        match tx.read_commit(&address) {
            Ok(commit) => return Ok(ResolvedRef::Commit { address, commit }),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }
    if let Ok(name) = BranchName::new(reference) {
        match tx.read_branch(&name) {
            Ok(branch) => {
                let commit = tx.read_commit(&branch.commit).map_err(|e| {
                    if e.is_not_found() {
                        IndexError::CommitNotFound { id: branch.commit.as_str().to_owned() }
                    } else {
                        IndexError::Store(e)
                    }
                })?;
                return Ok(ResolvedRef::Branch { name, branch, commit });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err(IndexError::ReferenceNotFound { reference: reference.to_owned() })
}

// ---------------------------------------------------------------------------
// Shared repo-scope helpers
// ---------------------------------------------------------------------------

/// Read the repo record, translating the store's not-found.
pub(crate) fn read_repo_record(
    tx: &impl RepoReadOps,
    id: &RepoId,
) -> Result<crate::model::records::Repository, IndexError> {
    tx.read_repo().map_err(|e| {
        if e.is_not_found() {
            IndexError::RepoNotFound { id: id.as_str().to_owned() }
        } else {
            IndexError::Store(e)
        }
    })
}

/// Read a branch, translating the store's not-found.
pub(crate) fn read_branch_record(
    tx: &impl RepoReadOps,
    name: &BranchName,
) -> Result<Branch, IndexError> {
    tx.read_branch(name).map_err(|e| {
        if e.is_not_found() {
            IndexError::BranchNotFound { name: name.as_str().to_owned() }
        } else {
            IndexError::Store(e)
        }
    })
}

// ---------------------------------------------------------------------------
// Partial commit
// ---------------------------------------------------------------------------

/// Fold the branch's staged workspace into its tree.
///
/// Runs inside the caller's transaction. Idempotent: with an empty
/// workspace it returns the branch untouched. `commit` and `commit_root`
/// never move here — only `workspace_root` advances.
///
/// # Errors
/// [`IndexError::BranchNotFound`] if the branch does not exist; store and
/// tree-update failures otherwise.
pub(crate) fn partial_commit(
    tx: &mut impl RepoOps,
    name: &BranchName,
) -> Result<Branch, IndexError> {
    let staged = tx.list_workspace(name)?;
    let branch = read_branch_record(tx, name)?;
    if staged.is_empty() {
        return Ok(branch);
    }

    let folded = Merkle::at(branch.workspace_root.clone()).update(tx, &staged)?;
    tx.clear_workspace(name)?;

    let updated = Branch { workspace_root: folded.root().clone(), ..branch };
    tx.write_branch(name, &updated)?;
    debug!(branch = %name, entries = staged.len(), root = %updated.workspace_root, "partial commit folded workspace");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;

    // Operation-level coverage lives with each operation module and in
    // tests/index_ops.rs; here only the handle plumbing.

    #[test]
    fn cancel_token_fires_once_for_all_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn with_cancel_replaces_rather_than_mutates() {
        let index = Index::new(MemStore::new());
        let token = CancelToken::new();
        let bound = index.with_cancel(token.clone());
        token.cancel();
        assert!(bound.check_cancel().is_err());
        assert!(index.check_cancel().is_ok(), "original token is untouched");
    }

    #[test]
    fn system_clock_is_past_2023() {
        assert!(SystemClock.now() > 1_672_531_200);
    }

    #[test]
    fn bernoulli_probe_edges() {
        let probe = BernoulliProbe;
        assert!(!probe.should_flush(0.0));
        // Probability 1.0 always fires.
        for _ in 0..16 {
            assert!(probe.should_flush(1.0));
        }
    }

    #[test]
    fn check_ref_accepts_both_shapes() {
        assert!(check_ref("main").is_ok());
        assert!(check_ref(&"a".repeat(64)).is_ok());
        assert!(check_ref("NOT A REF").is_err());
    }

    #[test]
    fn validation_errors_carry_the_value() {
        let err = parse_repo_id("X").unwrap_err();
        assert!(matches!(err, IndexError::InvalidRepoId { .. }));
        let err = parse_path("/abs").unwrap_err();
        assert!(matches!(err, IndexError::InvalidPath { .. }));
        let err = parse_commit_id("short").unwrap_err();
        assert!(matches!(err, IndexError::InvalidCommitId { .. }));
        assert!(matches!(require_message(""), Err(IndexError::EmptyCommitMessage)));
        assert!(require_message("m").is_ok());
    }
}
