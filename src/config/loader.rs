//! Reading rule files.
//!
//! A rule file is parsed with `toml_edit`, then checked and compiled by
//! [`RuleConfig::into_rule_set`]. Errors name the file they came from.

use crate::config::schema::{RuleConfig, ValidationError};
use crate::rules::RuleSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What was wrong with a rule file.
#[derive(Debug)]
pub enum ConfigErrorKind {
    /// The file could not be read
    Read(io::Error),
    /// Not TOML, or not shaped like a rule file
    Parse(toml_edit::de::Error),
    /// Parsed, but one or more rules are unusable
    Invalid(ValidationError),
}

/// A rule file that could not be loaded.
#[derive(Debug)]
pub struct ConfigError {
    path: Option<PathBuf>,
    kind: ConfigErrorKind,
}

impl ConfigError {
    fn new(kind: ConfigErrorKind) -> Self {
        Self { path: None, kind }
    }

    fn in_file(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    /// The rule file, when the error came from [`load_from_path`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = match &self.path {
            Some(path) => format!("rule file {}", path.display()),
            None => "rule file".to_string(),
        };
        match &self.kind {
            ConfigErrorKind::Read(e) => write!(f, "cannot read {file}: {e}"),
            ConfigErrorKind::Parse(e) => write!(f, "{file} is not valid TOML: {e}"),
            ConfigErrorKind::Invalid(e) => {
                write!(f, "{file} has {} problem(s): {e}", e.issues.len())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ConfigErrorKind::Read(e) => Some(e),
            ConfigErrorKind::Parse(e) => Some(e),
            ConfigErrorKind::Invalid(e) => Some(e),
        }
    }
}

/// Parse and compile rule-file text.
pub fn load_from_str(input: &str) -> Result<RuleSet, ConfigError> {
    let config: RuleConfig = toml_edit::de::from_str(input)
        .map_err(|e| ConfigError::new(ConfigErrorKind::Parse(e)))?;
    config
        .into_rule_set()
        .map_err(|e| ConfigError::new(ConfigErrorKind::Invalid(e)))
}

/// Read, parse and compile the rule file at `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleSet, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::new(ConfigErrorKind::Read(e)).in_file(path))?;
    load_from_str(&contents).map_err(|e| e.in_file(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;

    const VALID: &str = r#"
[meta]
name = "custom"

[extensions]
eligible = [".js", ".vue"]

[[rules]]
id = "trial-flag"
description = "clear the trial flag"
pattern = '\btrialExpired\s*=\s*true\b'
replacement = "trialExpired = false"
"#;

    fn issues(err: &ConfigError) -> &[ValidationIssue] {
        match err.kind() {
            ConfigErrorKind::Invalid(e) => &e.issues,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_valid() {
        let rules = load_from_str(VALID).unwrap();
        assert!(rules.is_eligible(Path::new("App.vue")));
        assert!(!rules.is_eligible(Path::new("app.py")));
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules()[0].id(), "trial-flag");
        assert_eq!(rules.rules()[0].description(), Some("clear the trial flag"));
    }

    #[test]
    fn test_default_extensions_when_omitted() {
        let rules = load_from_str(
            r#"
[[rules]]
id = "x"
pattern = "foo"
replacement = "bar"
"#,
        )
        .unwrap();
        assert!(rules.is_eligible(Path::new("a.php")));
    }

    #[test]
    fn test_invalid_regex_and_duplicates_collected() {
        let err = load_from_str(
            r#"
[[rules]]
id = "a"
pattern = "("
replacement = ""

[[rules]]
id = "a"
pattern = "ok"
replacement = ""

[[rules]]
id = "b"
pattern = ""
replacement = ""
"#,
        )
        .unwrap_err();

        let issues = issues(&err);
        assert_eq!(issues.len(), 3);
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::InvalidPattern { rule_id, .. } if rule_id == "a")));
        assert!(issues.contains(&ValidationIssue::DuplicateId {
            rule_id: "a".to_string()
        }));
        assert!(issues.contains(&ValidationIssue::MissingField {
            rule_id: Some("b".to_string()),
            field: "pattern",
        }));
        assert!(err.to_string().starts_with("rule file has 3 problem(s)"));
    }

    #[test]
    fn test_empty_rule_list_rejected() {
        let err = load_from_str("[meta]\nname = \"empty\"\n").unwrap_err();
        assert_eq!(issues(&err), [ValidationIssue::EmptyRuleList]);
    }

    #[test]
    fn test_bad_extension_rejected() {
        let err = load_from_str(
            r#"
[extensions]
eligible = ["js"]

[[rules]]
id = "x"
pattern = "foo"
replacement = "bar"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must start with '.'"));
    }

    #[test]
    fn test_load_from_path_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(&path, "not = [valid").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err.kind(), ConfigErrorKind::Parse(_)));
        assert_eq!(err.path(), Some(path.as_path()));
        assert!(err.to_string().contains("rules.toml is not valid TOML"));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err.kind(), ConfigErrorKind::Read(_)));
        assert!(err.to_string().starts_with("cannot read rule file"));
    }
}
