//! Index configuration (`silt.toml`).
//!
//! Typed configuration for the defaults `create_repo` applies when the
//! caller does not override them. Missing file → all defaults; unknown
//! fields are rejected with line-level detail.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level index configuration.
#[derive(Clone, Debug, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Repository defaults.
    #[serde(default)]
    pub repo: RepoConfig,
}

// ---------------------------------------------------------------------------
// RepoConfig
// ---------------------------------------------------------------------------

/// Defaults applied to newly created repositories.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RepoConfig {
    /// The default branch name (default: `"main"`).
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Probability that a mutation triggers an immediate partial commit
    /// (default: `0.02`). Must lie in `[0, 1]`.
    #[serde(default = "default_partial_commit_ratio")]
    pub partial_commit_ratio: f64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            partial_commit_ratio: default_partial_commit_ratio(),
        }
    }
}

fn default_branch() -> String {
    "main".to_owned()
}

const fn default_partial_commit_ratio() -> f64 {
    0.02
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading an index configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl IndexConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields, or
    ///   an out-of-range ratio, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse
    /// errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or a
    /// partial-commit ratio outside `[0, 1]`.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError { path: None, message }
        })?;
        if !(0.0..=1.0).contains(&cfg.repo.partial_commit_ratio) {
            return Err(ConfigError {
                path: None,
                message: format!(
                    "partial-commit-ratio must be in [0, 1], got {}",
                    cfg.repo.partial_commit_ratio
                ),
            });
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.repo.default_branch, "main");
        assert!((cfg.repo.partial_commit_ratio - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_empty_string() {
        let cfg = IndexConfig::parse("").unwrap();
        assert_eq!(cfg, IndexConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let cfg = IndexConfig::parse(
            r#"
[repo]
default-branch = "trunk"
partial-commit-ratio = 0.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.repo.default_branch, "trunk");
        assert!((cfg.repo.partial_commit_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_rejects_unknown_field() {
        let err = IndexConfig::parse("[repo]\nbogus = 1\n").unwrap_err();
        assert!(err.message.contains("line 2") || err.message.contains("bogus"));
    }

    #[test]
    fn parse_rejects_out_of_range_ratio() {
        let err = IndexConfig::parse("[repo]\npartial-commit-ratio = 1.5\n").unwrap_err();
        assert!(err.message.contains("[0, 1]"));
    }

    #[test]
    fn load_missing_file_is_defaults() {
        let cfg = IndexConfig::load(Path::new("/nonexistent/silt.toml")).unwrap();
        assert_eq!(cfg, IndexConfig::default());
    }

    #[test]
    fn config_error_display_with_path() {
        let err = ConfigError {
            path: Some("silt.toml".into()),
            message: "bad".to_owned(),
        };
        assert_eq!(format!("{err}"), "silt.toml: bad");
    }
}
