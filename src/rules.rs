//! Patch rules and the eligible-extension allow-list.
//!
//! A [`RuleSet`] is plain data: an ordered list of compiled regex rewrites plus
//! the set of file suffixes the scanner is allowed to open. It is built once
//! (from [`RuleSet::builtin`] or a rule file, see [`crate::config`]) and shared
//! by reference afterwards. Rule order is significant, since each rule runs on
//! the output of the one before it.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Suffixes the scanner opens when no rule file overrides them.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".js", ".ts", ".json", ".html", ".py", ".txt", ".cfg", ".xml", ".md", ".java", ".cs", ".cpp",
    ".c", ".php",
];

const GATE_NAMES: &str = "isPremium|licenseValid|proVersion|hasProAccess";

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid pattern for rule '{id}': {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// A single regex rewrite.
///
/// The replacement is a `regex` template: `$1` / `${name}` expand to captures.
#[derive(Debug, Clone)]
pub struct PatchRule {
    id: String,
    description: Option<String>,
    pattern: Regex,
    replacement: String,
}

impl PatchRule {
    /// Compile a rule. Fails if `pattern` is not a valid regex.
    pub fn new(
        id: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        let pattern = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            id: id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            description: None,
            pattern,
            replacement: replacement.into(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Ordered rules plus the eligible-extension allow-list.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PatchRule>,
    extensions: BTreeSet<String>,
}

impl RuleSet {
    /// Build a rule set. Extensions are trimmed and given a leading dot; case is kept.
    pub fn new<I, S>(rules: Vec<PatchRule>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        Self { rules, extensions }
    }

    /// The built-in license-gate rules over [`DEFAULT_EXTENSIONS`].
    pub fn builtin() -> Self {
        Self::new(builtin_rules(), DEFAULT_EXTENSIONS.iter().copied())
    }

    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    /// Eligible suffixes, each with a leading dot.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Whether the scanner may open `path`, judged by suffix alone.
    ///
    /// Suffixes compare exactly: `app.JS` is not eligible under `.js`.
    pub fn is_eligible(&self, path: &Path) -> bool {
        suffix_of(path).is_some_and(|suffix| self.extensions.contains(&suffix))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `.ext` suffix of a path as written, if it has one.
pub(crate) fn suffix_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

fn builtin_rules() -> Vec<PatchRule> {
    let specs = [
        (
            "premium-flag",
            format!(r"\b({GATE_NAMES})\s*=\s*false\b"),
            "${1} = True",
            "force boolean license flags on",
        ),
        (
            "premium-guard",
            format!(r"if\s*\(!?\s*({GATE_NAMES})\)"),
            "if True",
            "collapse guards around premium-only code",
        ),
        (
            "license-check",
            r"checkLicense\s*\([^)]*\)\s*\{[^}]*\}".to_string(),
            "checkLicense() { return True }",
            "stub out checkLicense() bodies",
        ),
    ];

    specs
        .into_iter()
        .filter_map(|(id, pattern, replacement, description)| {
            match PatchRule::new(id, &pattern, replacement) {
                Ok(rule) => Some(rule.with_description(description)),
                Err(e) => {
                    // Built-in patterns are constants; this only fires if one is edited badly.
                    tracing::error!(rule = id, error = %e, "built-in rule failed to compile");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules_compile_in_order() {
        let rules = RuleSet::builtin();
        let ids: Vec<_> = rules.rules().iter().map(PatchRule::id).collect();
        assert_eq!(ids, ["premium-flag", "premium-guard", "license-check"]);
    }

    #[test]
    fn test_builtin_extensions() {
        let rules = RuleSet::builtin();
        assert_eq!(rules.extensions().count(), DEFAULT_EXTENSIONS.len());
        assert!(rules.is_eligible(Path::new("src/app.js")));
        assert!(rules.is_eligible(Path::new("README.md")));
        assert!(!rules.is_eligible(Path::new("icon.png")));
        assert!(!rules.is_eligible(Path::new("Makefile")));
    }

    #[test]
    fn test_eligibility_is_case_sensitive() {
        let rules = RuleSet::builtin();
        assert!(!rules.is_eligible(Path::new("LEGACY.JS")));
        assert!(!rules.is_eligible(Path::new("page.Html")));
        assert!(rules.is_eligible(Path::new("LEGACY.js")));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let rules = RuleSet::new(Vec::new(), ["vue", ".svelte", " .md ", ""]);
        let exts: Vec<_> = rules.extensions().collect();
        assert_eq!(exts, [".md", ".svelte", ".vue"]);

        let upper = RuleSet::new(Vec::new(), [".JSX"]);
        assert!(upper.is_eligible(Path::new("a.JSX")));
        assert!(!upper.is_eligible(Path::new("a.jsx")));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PatchRule::new("broken", r"checkLicense(", "x").unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { ref id, .. } if id == "broken"));
    }

    #[test]
    fn test_suffix_of() {
        assert_eq!(suffix_of(Path::new("a/b.ZIP")), Some(".ZIP".to_string()));
        assert_eq!(suffix_of(Path::new("noext")), None);
        assert_eq!(suffix_of(Path::new("archive.tar.gz")), Some(".gz".to_string()));
    }
}
