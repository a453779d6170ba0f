//! Core identity types for the index.
//!
//! Foundation newtypes used throughout the crate: content addresses,
//! repository identifiers, and branch names. Each type validates on
//! construction so that any value that exists is well-formed, and each one
//! round-trips through serde as a plain string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A validated content address: exactly 64 lowercase hex characters
/// (a SHA-256 digest of a record's canonical form).
///
/// Addresses identify commits, tree nodes, and object records. They are
/// opaque to callers; the only structure the index relies on is the syntax,
/// which distinguishes an address from a branch name during reference
/// resolution.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The length of an address in hex characters.
    pub const LEN: usize = 64;

    /// Create a new `Address` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 64 lowercase hex characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `s` is syntactically an address.
    ///
    /// Used by reference resolution to decide whether a ref could name a
    /// commit before falling back to branch lookup.
    #[must_use]
    pub fn is_address_syntax(s: &str) -> bool {
        Self::validate(s).is_ok()
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.len() != Self::LEN {
            return Err(ValidationError {
                kind: ErrorKind::Address,
                value: s.to_owned(),
                reason: format!("expected {} hex characters, got {}", Self::LEN, s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ValidationError {
                kind: ErrorKind::Address,
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

// ---------------------------------------------------------------------------
// RepoId
// ---------------------------------------------------------------------------

/// A validated repository identifier.
///
/// Repository ids follow a conservative bucket-identifier grammar: 2–63
/// characters, lowercase alphanumeric plus hyphen, no leading or trailing
/// hyphen. Examples: `analytics`, `raw-events`, `ml-features-2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    /// The minimum length of a repository id.
    pub const MIN_LEN: usize = 2;
    /// The maximum length of a repository id.
    pub const MAX_LEN: usize = 63;

    /// Create a new `RepoId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the id is too short, too long, or contains
    /// invalid characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the repository id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.len() < Self::MIN_LEN || s.len() > Self::MAX_LEN {
            return Err(ValidationError {
                kind: ErrorKind::RepoId,
                value: s.to_owned(),
                reason: format!(
                    "repository id must be {}-{} characters, got {}",
                    Self::MIN_LEN,
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        if s.starts_with('-') || s.ends_with('-') {
            return Err(ValidationError {
                kind: ErrorKind::RepoId,
                value: s.to_owned(),
                reason: "repository id must not start or end with a hyphen".to_owned(),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError {
                kind: ErrorKind::RepoId,
                value: s.to_owned(),
                reason:
                    "repository id must contain only lowercase letters (a-z), digits (0-9), and hyphens (-)"
                        .to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RepoId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// BranchName
// ---------------------------------------------------------------------------

/// A validated branch name.
///
/// Branch names are 1–128 characters of `[a-z0-9._-]` with no leading or
/// trailing separator and no `..` sequence. A 64-character hex string is
/// also a syntactically valid branch name; reference resolution tries the
/// commit read first and falls back to the branch.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// The maximum length of a branch name.
    pub const MAX_LEN: usize = 128;

    /// Create a new `BranchName` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains
    /// invalid characters or sequences.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the branch name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty() {
            return Err(ValidationError {
                kind: ErrorKind::BranchName,
                value: s.to_owned(),
                reason: "branch name must not be empty".to_owned(),
            });
        }
        if s.len() > Self::MAX_LEN {
            return Err(ValidationError {
                kind: ErrorKind::BranchName,
                value: s.to_owned(),
                reason: format!(
                    "branch name must be at most {} characters, got {}",
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        let first = s.chars().next().unwrap_or('-');
        let last = s.chars().last().unwrap_or('-');
        if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
            return Err(ValidationError {
                kind: ErrorKind::BranchName,
                value: s.to_owned(),
                reason: "branch name must start and end with a letter or digit".to_owned(),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ValidationError {
                kind: ErrorKind::BranchName,
                value: s.to_owned(),
                reason:
                    "branch name must contain only lowercase letters (a-z), digits (0-9), and . _ -"
                        .to_owned(),
            });
        }
        if s.contains("..") {
            return Err(ValidationError {
                kind: ErrorKind::BranchName,
                value: s.to_owned(),
                reason: "branch name must not contain '..'".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BranchName {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BranchName {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// The kind of value that failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An [`Address`] validation error.
    Address,
    /// A [`RepoId`] validation error.
    RepoId,
    /// A [`BranchName`] validation error.
    BranchName,
    /// A [`crate::path::RepoPath`] validation error.
    Path,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "Address"),
            Self::RepoId => write!(f, "RepoId"),
            Self::BranchName => write!(f, "BranchName"),
            Self::Path => write!(f, "Path"),
        }
    }
}

/// A validation error for index identity types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}: {:?} — {}",
            self.kind, self.value, self.reason
        )
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Address --

    #[test]
    fn address_valid() {
        let hex = "a".repeat(64);
        let addr = Address::new(&hex).unwrap();
        assert_eq!(addr.as_str(), hex);
    }

    #[test]
    fn address_mixed_hex() {
        let hex = "0123456789abcdef".repeat(4);
        assert!(Address::new(&hex).is_ok());
    }

    #[test]
    fn address_rejects_short() {
        assert!(Address::new("abc123").is_err());
    }

    #[test]
    fn address_rejects_long() {
        let hex = "a".repeat(65);
        assert!(Address::new(&hex).is_err());
    }

    #[test]
    fn address_rejects_uppercase() {
        let hex = "A".repeat(64);
        assert!(Address::new(&hex).is_err());
    }

    #[test]
    fn address_rejects_non_hex() {
        let bad = "g".repeat(64);
        assert!(Address::new(&bad).is_err());
    }

    #[test]
    fn address_syntax_probe() {
        assert!(Address::is_address_syntax(&"f".repeat(64)));
        assert!(!Address::is_address_syntax("main"));
        assert!(!Address::is_address_syntax(&"f".repeat(40)));
    }

    #[test]
    fn address_serde_roundtrip() {
        let hex = "d".repeat(64);
        let addr = Address::new(&hex).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{hex}\""));
        let decoded: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn address_serde_rejects_invalid() {
        assert!(serde_json::from_str::<Address>("\"not-an-address\"").is_err());
    }

    // -- RepoId --

    #[test]
    fn repo_id_valid() {
        let id = RepoId::new("raw-events").unwrap();
        assert_eq!(id.as_str(), "raw-events");
    }

    #[test]
    fn repo_id_rejects_single_char() {
        assert!(RepoId::new("a").is_err());
    }

    #[test]
    fn repo_id_rejects_uppercase() {
        assert!(RepoId::new("Analytics").is_err());
    }

    #[test]
    fn repo_id_rejects_underscore() {
        assert!(RepoId::new("raw_events").is_err());
    }

    #[test]
    fn repo_id_rejects_edge_hyphens() {
        assert!(RepoId::new("-repo").is_err());
        assert!(RepoId::new("repo-").is_err());
    }

    #[test]
    fn repo_id_max_length() {
        assert!(RepoId::new(&"a".repeat(63)).is_ok());
        assert!(RepoId::new(&"a".repeat(64)).is_err());
    }

    #[test]
    fn repo_id_serde_roundtrip() {
        let id = RepoId::new("ml-features").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let decoded: RepoId = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
    }

    // -- BranchName --

    #[test]
    fn branch_name_valid_simple() {
        let name = BranchName::new("main").unwrap();
        assert_eq!(name.as_str(), "main");
    }

    #[test]
    fn branch_name_valid_with_separators() {
        assert!(BranchName::new("feature.auth_v2-rc1").is_ok());
    }

    #[test]
    fn branch_name_rejects_empty() {
        let err = BranchName::new("").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BranchName);
    }

    #[test]
    fn branch_name_rejects_edge_separators() {
        assert!(BranchName::new("-dev").is_err());
        assert!(BranchName::new("dev.").is_err());
        assert!(BranchName::new("_dev").is_err());
    }

    #[test]
    fn branch_name_rejects_dotdot() {
        assert!(BranchName::new("a..b").is_err());
    }

    #[test]
    fn branch_name_rejects_uppercase() {
        assert!(BranchName::new("Main").is_err());
    }

    #[test]
    fn branch_name_rejects_slash() {
        assert!(BranchName::new("feature/auth").is_err());
    }

    #[test]
    fn branch_name_max_length() {
        assert!(BranchName::new(&"a".repeat(128)).is_ok());
        assert!(BranchName::new(&"a".repeat(129)).is_err());
    }

    #[test]
    fn branch_name_hex_is_valid_branch_syntax() {
        // A 64-char hex string also parses as a branch name; resolution
        // disambiguates by trying the commit read first.
        let hex = "c".repeat(64);
        assert!(BranchName::new(&hex).is_ok());
        assert!(Address::is_address_syntax(&hex));
    }

    #[test]
    fn branch_name_serde_rejects_invalid() {
        assert!(serde_json::from_str::<BranchName>("\"BAD NAME\"").is_err());
    }

    // -- ValidationError --

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            kind: ErrorKind::RepoId,
            value: "X".to_owned(),
            reason: "too short".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("RepoId"));
        assert!(msg.contains("too short"));
    }
}
