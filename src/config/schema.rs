use crate::rules::{PatchRule, RuleError, RuleSet, DEFAULT_EXTENSIONS};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// On-disk rule file layout, see [`crate::config::load_from_path`].
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuleConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub extensions: Option<Extensions>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Extensions {
    pub eligible: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub id: String,
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl RuleConfig {
    /// Check the file and compile its rules in one pass.
    ///
    /// Every problem is collected before failing, including patterns that do
    /// not compile. Falls back to the built-in extensions when the file does
    /// not list any.
    pub fn into_rule_set(self) -> Result<RuleSet, ValidationError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(self.rules.len());
        for def in self.rules {
            if def.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            } else if !seen.insert(def.id.clone()) {
                issues.push(ValidationIssue::DuplicateId {
                    rule_id: def.id.clone(),
                });
            }

            if def.pattern.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    rule_id: Some(def.id),
                    field: "pattern",
                });
                continue;
            }

            match PatchRule::new(def.id, &def.pattern, def.replacement) {
                Ok(rule) => rules.push(match def.description {
                    Some(description) => rule.with_description(description),
                    None => rule,
                }),
                Err(RuleError::InvalidPattern { id, source }) => {
                    issues.push(ValidationIssue::InvalidPattern {
                        rule_id: id,
                        message: source.to_string(),
                    })
                }
            }
        }

        let extensions = match self.extensions {
            Some(extensions) => {
                if extensions.eligible.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        rule_id: None,
                        field: "extensions.eligible",
                    });
                }
                for ext in &extensions.eligible {
                    if !ext.starts_with('.') || ext.len() < 2 {
                        issues.push(ValidationIssue::InvalidExtension { value: ext.clone() });
                    }
                }
                extensions.eligible
            }
            None => DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        };

        if issues.is_empty() {
            Ok(RuleSet::new(rules, extensions))
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyRuleList,
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        rule_id: String,
    },
    InvalidPattern {
        rule_id: String,
        message: String,
    },
    InvalidExtension {
        value: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "rule file defines no rules"),
            ValidationIssue::MissingField {
                rule_id: Some(id),
                field,
            } => write!(f, "rule '{}' is missing {}", id, field),
            ValidationIssue::MissingField {
                rule_id: None,
                field,
            } => write!(f, "missing {}", field),
            ValidationIssue::DuplicateId { rule_id } => {
                write!(f, "duplicate rule id '{}'", rule_id)
            }
            ValidationIssue::InvalidPattern { rule_id, message } => {
                write!(f, "rule '{}' has an invalid pattern: {}", rule_id, message)
            }
            ValidationIssue::InvalidExtension { value } => {
                write!(f, "extension '{}' must start with '.'", value)
            }
        }
    }
}
