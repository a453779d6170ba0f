//! Slash-separated object paths and the helpers the tree engine needs.
//!
//! Paths are logical keys into a repository's tree, not filesystem paths:
//! `tables/events/part-0001.parquet`. The root of a tree is the empty
//! string, which is not a valid [`RepoPath`] but appears internally as a
//! directory prefix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::types::{ErrorKind, ValidationError};

/// The path separator.
pub const SEPARATOR: char = '/';

// ---------------------------------------------------------------------------
// RepoPath
// ---------------------------------------------------------------------------

/// A validated object path within a repository.
///
/// Non-empty UTF-8, no NUL byte, no leading or trailing separator, no empty
/// segment. Any accepted path round-trips through every index operation
/// without re-escaping.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a new `RepoPath` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the path is empty, contains a NUL byte, starts
    /// or ends with `/`, or contains an empty segment.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path segment (the entry name within its directory).
    #[must_use]
    pub fn basename(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The directory prefix of this path; the empty string for a
    /// root-level path.
    #[must_use]
    pub fn parent(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(i) => &self.0[..i],
            None => "",
        }
    }

    /// Iterate the path's segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty() {
            return Err(ValidationError {
                kind: ErrorKind::Path,
                value: s.to_owned(),
                reason: "path must not be empty".to_owned(),
            });
        }
        if s.contains('\0') {
            return Err(ValidationError {
                kind: ErrorKind::Path,
                value: s.to_owned(),
                reason: "path must not contain a NUL byte".to_owned(),
            });
        }
        if s.starts_with(SEPARATOR) || s.ends_with(SEPARATOR) {
            return Err(ValidationError {
                kind: ErrorKind::Path,
                value: s.to_owned(),
                reason: "path must not start or end with '/'".to_owned(),
            });
        }
        if s.split(SEPARATOR).any(str::is_empty) {
            return Err(ValidationError {
                kind: ErrorKind::Path,
                value: s.to_owned(),
                reason: "path must not contain an empty segment".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoPath {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

// ---------------------------------------------------------------------------
// Free helpers over directory prefixes
// ---------------------------------------------------------------------------

/// Join a directory prefix and an entry name into a full path string.
///
/// The root prefix is the empty string, so `join_under("", "a")` is `"a"`
/// and `join_under("a/b", "c")` is `"a/b/c"`.
#[must_use]
pub fn join_under(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}{SEPARATOR}{name}")
    }
}

/// Split a full path string into its directory prefix and basename.
///
/// `split_parent("a/b/c")` is `("a/b", "c")`; `split_parent("a")` is
/// `("", "a")`.
#[must_use]
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind(SEPARATOR) {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Returns `true` if `dir` names the tree root.
#[must_use]
pub const fn is_root(dir: &str) -> bool {
    dir.is_empty()
}

/// The number of segments in a directory prefix (0 for the root).
#[must_use]
pub fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.split(SEPARATOR).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- RepoPath validation --

    #[test]
    fn path_valid_flat() {
        let p = RepoPath::new("data.csv").unwrap();
        assert_eq!(p.as_str(), "data.csv");
        assert_eq!(p.basename(), "data.csv");
        assert_eq!(p.parent(), "");
    }

    #[test]
    fn path_valid_nested() {
        let p = RepoPath::new("tables/events/part-0001.parquet").unwrap();
        assert_eq!(p.basename(), "part-0001.parquet");
        assert_eq!(p.parent(), "tables/events");
        let segs: Vec<_> = p.segments().collect();
        assert_eq!(segs, vec!["tables", "events", "part-0001.parquet"]);
    }

    #[test]
    fn path_allows_unicode() {
        assert!(RepoPath::new("données/été.csv").is_ok());
    }

    #[test]
    fn path_rejects_empty() {
        assert!(RepoPath::new("").is_err());
    }

    #[test]
    fn path_rejects_nul() {
        assert!(RepoPath::new("a\0b").is_err());
    }

    #[test]
    fn path_rejects_leading_slash() {
        assert!(RepoPath::new("/a/b").is_err());
    }

    #[test]
    fn path_rejects_trailing_slash() {
        assert!(RepoPath::new("a/b/").is_err());
    }

    #[test]
    fn path_rejects_empty_segment() {
        assert!(RepoPath::new("a//b").is_err());
    }

    #[test]
    fn path_serde_roundtrip() {
        let p = RepoPath::new("a/b/c.txt").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let decoded: RepoPath = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, p);
    }

    // -- free helpers --

    #[test]
    fn join_under_root() {
        assert_eq!(join_under("", "a"), "a");
    }

    #[test]
    fn join_under_nested() {
        assert_eq!(join_under("a/b", "c"), "a/b/c");
    }

    #[test]
    fn split_parent_flat() {
        assert_eq!(split_parent("a"), ("", "a"));
    }

    #[test]
    fn split_parent_nested() {
        assert_eq!(split_parent("a/b/c"), ("a/b", "c"));
    }

    #[test]
    fn split_then_join_round_trips() {
        for path in ["a", "a/b", "tables/events/x.parquet"] {
            let (dir, name) = split_parent(path);
            assert_eq!(join_under(dir, name), path);
        }
    }

    #[test]
    fn root_and_depth() {
        assert!(is_root(""));
        assert!(!is_root("a"));
        assert_eq!(depth(""), 0);
        assert_eq!(depth("a"), 1);
        assert_eq!(depth("a/b/c"), 3);
    }
}
