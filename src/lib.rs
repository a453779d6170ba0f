//! silt — a versioned object index for object-storage data lakes.
//!
//! Git-like semantics (branches, commits, three-way diffs, merges) over a
//! content-addressed Merkle tree per branch, with a per-branch workspace
//! that buffers uncommitted writes and folds them into the tree via
//! partial commits. The index stores metadata and content addresses only;
//! object bytes live in an external blockstore, and persistence goes
//! through the transactional [`store::Store`] contract.
//!
//! Entry point: [`index::Index`] over a store implementation
//! ([`store::mem::MemStore`] ships for tests and embedding).

pub mod config;
pub mod dag;
pub mod error;
pub mod ident;
pub mod index;
pub mod merkle;
pub mod model;
pub mod path;
pub mod store;

pub use config::IndexConfig;
pub use error::IndexError;
pub use index::{CancelToken, Clock, Index, MergeOutcome};
