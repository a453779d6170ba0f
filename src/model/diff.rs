//! Three-way diff result types.
//!
//! A [`Difference`] describes how one path diverged across the `left`,
//! `right`, and `base` trees of a three-way comparison. The merge engine
//! consumes differences directly: everything the source side contributes
//! (side ≠ `Right`) is translated back into staged changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::records::EntryKind;
use crate::path::RepoPath;

// ---------------------------------------------------------------------------
// DiffKind
// ---------------------------------------------------------------------------

/// How a path changed relative to the comparison base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// The path does not exist in the base.
    Added,
    /// The path exists in the base with a different address.
    Changed,
    /// The path exists in the base but not on the changed side.
    Removed,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Changed => write!(f, "changed"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

// ---------------------------------------------------------------------------
// DiffSide
// ---------------------------------------------------------------------------

/// Which side of a three-way comparison a difference belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSide {
    /// Only the left tree diverged from the base.
    Left,
    /// Only the right tree diverged from the base.
    Right,
    /// Both sides diverged from the base and disagree with each other.
    Conflict,
}

impl DiffSide {
    /// The side a difference lands on when left and right are swapped.
    /// Conflicts are symmetric.
    #[must_use]
    pub const fn swapped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Conflict => Self::Conflict,
        }
    }

    /// Returns `true` for [`DiffSide::Conflict`].
    #[must_use]
    pub const fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict)
    }
}

impl fmt::Display for DiffSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

// ---------------------------------------------------------------------------
// Difference
// ---------------------------------------------------------------------------

/// A single three-way diff result for one path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    /// The diverged path.
    pub path: RepoPath,
    /// Whether the path names an object or a subtree.
    pub path_kind: EntryKind,
    /// Which side diverged.
    pub side: DiffSide,
    /// How it diverged relative to the base.
    pub kind: DiffKind,
}

impl Difference {
    /// Returns `true` if this difference is a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        self.side.is_conflict()
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.path, self.side)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(side: DiffSide, kind: DiffKind) -> Difference {
        Difference {
            path: RepoPath::new("a/b.txt").unwrap(),
            path_kind: EntryKind::Object,
            side,
            kind,
        }
    }

    #[test]
    fn side_swap_is_involutive() {
        for side in [DiffSide::Left, DiffSide::Right, DiffSide::Conflict] {
            assert_eq!(side.swapped().swapped(), side);
        }
    }

    #[test]
    fn conflict_swaps_to_conflict() {
        assert_eq!(DiffSide::Conflict.swapped(), DiffSide::Conflict);
        assert_eq!(DiffSide::Left.swapped(), DiffSide::Right);
    }

    #[test]
    fn display_reads_naturally() {
        let d = diff(DiffSide::Right, DiffKind::Changed);
        assert_eq!(format!("{d}"), "changed a/b.txt (right)");
    }

    #[test]
    fn conflict_predicate() {
        assert!(diff(DiffSide::Conflict, DiffKind::Changed).is_conflict());
        assert!(!diff(DiffSide::Left, DiffKind::Added).is_conflict());
    }

    #[test]
    fn serde_uses_snake_case_tags() {
        let d = diff(DiffSide::Conflict, DiffKind::Removed);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"side\":\"conflict\""));
        assert!(json.contains("\"kind\":\"removed\""));
        assert!(json.contains("\"path_kind\":\"object\""));
    }
}
