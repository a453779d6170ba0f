//! Content addressing: canonical JSON → SHA-256 → [`Address`].
//!
//! Commits, tree nodes, and object records are identified by the SHA-256
//! digest of their canonical JSON form, domain-separated by a record-kind
//! tag so that a commit and a tree node with coincidentally identical JSON
//! can never collide. The serialization must stay stable across versions
//! for existing data to remain addressable: field order is fixed by struct
//! declaration order and all maps are `BTreeMap`.

use std::fmt;
use std::fmt::Write as _;
use std::sync::OnceLock;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::records::TreeNode;
use crate::model::types::Address;

// ---------------------------------------------------------------------------
// RecordKind
// ---------------------------------------------------------------------------

/// The hash domain a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    /// A [`crate::model::records::Commit`].
    Commit,
    /// A [`TreeNode`].
    Tree,
    /// An [`crate::model::records::ObjectRecord`].
    Object,
}

impl RecordKind {
    const fn tag(self) -> &'static [u8] {
        match self {
            Self::Commit => b"commit",
            Self::Tree => b"tree",
            Self::Object => b"object",
        }
    }
}

// ---------------------------------------------------------------------------
// HashError
// ---------------------------------------------------------------------------

/// Serializing a record to its canonical form failed.
///
/// This only happens for records that cannot be represented in JSON, which
/// no well-formed index record is; it is surfaced rather than panicked on
/// so the store layer can abort the enclosing transaction.
#[derive(Debug)]
pub struct HashError(pub serde_json::Error);

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to serialize record to canonical JSON: {}", self.0)
    }
}

impl std::error::Error for HashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Compute the content address of a record.
///
/// Digest layout: `tag || 0x00 || canonical_json`. Two calls with equal
/// records always produce the same address; changing any field changes it.
///
/// # Errors
/// Returns [`HashError`] if the record cannot be serialized.
pub fn address_of<T: Serialize>(kind: RecordKind, record: &T) -> Result<Address, HashError> {
    let json = serde_json::to_vec(record).map_err(HashError)?;

    let mut hasher = Sha256::new();
    hasher.update(kind.tag());
    hasher.update([0u8]);
    hasher.update(&json);
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(Address::LEN);
    for b in digest {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{b:02x}");
    }
    Ok(Address::new(&hex).unwrap_or_else(|_| unreachable!("sha256 hex is a valid address")))
}

/// The well-known address of the empty tree (`TreeNode { entries: [] }`).
///
/// Every fresh repository's initial commit points here.
pub fn empty_tree_address() -> &'static Address {
    static EMPTY: OnceLock<Address> = OnceLock::new();
    EMPTY.get_or_init(|| {
        address_of(RecordKind::Tree, &TreeNode::default())
            .unwrap_or_else(|_| unreachable!("the empty tree always serializes"))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
