//! Target classification and top-level dispatch.
//!
//! [`process`] is the single entry point a shell needs: it classifies the
//! path once, by filesystem type and suffix only, routes it to the scanner,
//! the archive round-trip or the single-file patcher, and folds the result
//! into an [`Outcome`].

use crate::archive::{process_archive, ArchiveError, ArchiveKind};
use crate::patcher::{patch_file, FileOutcome, Mode};
use crate::rules::{suffix_of, RuleSet};
use crate::scan::{scan_tree, FileFailure};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Suffixes rejected outright as executables.
pub const BINARY_EXTENSIONS: &[&str] = &[".exe", ".bin"];

/// What kind of input a path is. Decided once, before any content is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "format", rename_all = "kebab-case")]
pub enum Target {
    Missing,
    Directory,
    Archive(ArchiveKind),
    TextFile,
    Binary,
    Unsupported,
}

impl Target {
    /// Classify `path`. First match wins: missing, directory, archive suffix,
    /// eligible text suffix, binary suffix, anything else.
    pub fn classify(path: &Path, rules: &RuleSet) -> Self {
        if !path.exists() {
            return Target::Missing;
        }
        if path.is_dir() {
            return Target::Directory;
        }
        if let Some(kind) = ArchiveKind::from_path(path) {
            return Target::Archive(kind);
        }
        if rules.is_eligible(path) {
            return Target::TextFile;
        }
        let is_binary = suffix_of(path)
            .is_some_and(|suffix| BINARY_EXTENSIONS.contains(&suffix.as_str()));
        if is_binary {
            Target::Binary
        } else {
            Target::Unsupported
        }
    }
}

/// Why a target was not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum UnsupportedTarget {
    NotFound { path: PathBuf },
    Binary { extension: String },
    UnknownType { extension: Option<String> },
}

impl fmt::Display for UnsupportedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedTarget::NotFound { path } => {
                write!(f, "{} is not a valid file or folder", path.display())
            }
            UnsupportedTarget::Binary { extension } => write!(
                f,
                "binary patching is not supported ({}); select source files, folders or archives",
                extension
            ),
            UnsupportedTarget::UnknownType {
                extension: Some(extension),
            } => write!(
                f,
                "file type '{}' is not directly patchable; select a folder, ZIP or CRX",
                extension
            ),
            UnsupportedTarget::UnknownType { extension: None } => write!(
                f,
                "file has no extension and is not directly patchable; select a folder, ZIP or CRX"
            ),
        }
    }
}

/// How a shell should present an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Result of one top-level [`process`] or [`check`] call.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
#[must_use = "Outcome should be reported to the user"]
pub enum Outcome {
    /// `count` files changed (or would change, for [`check`])
    Patched {
        target: Target,
        count: usize,
        /// Repacked archive, for archive targets in apply mode
        output: Option<PathBuf>,
        failures: Vec<FileFailure>,
    },
    /// Traversal succeeded but nothing matched
    NoChangesFound {
        target: Target,
        failures: Vec<FileFailure>,
    },
    Unsupported(UnsupportedTarget),
    ArchiveCorrupt { reason: String },
    InternalError { detail: String },
}

impl Outcome {
    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Patched { failures, .. } | Outcome::NoChangesFound { failures, .. }
                if !failures.is_empty() =>
            {
                Severity::Warning
            }
            Outcome::Patched { .. } | Outcome::NoChangesFound { .. } => Severity::Info,
            Outcome::Unsupported(UnsupportedTarget::NotFound { .. }) => Severity::Error,
            Outcome::Unsupported(_) => Severity::Warning,
            Outcome::ArchiveCorrupt { .. } | Outcome::InternalError { .. } => Severity::Error,
        }
    }

    /// Number of files changed; zero for every non-`Patched` outcome.
    pub fn count(&self) -> usize {
        match self {
            Outcome::Patched { count, .. } => *count,
            _ => 0,
        }
    }

    /// File-scoped failures collected during the run.
    pub fn failures(&self) -> &[FileFailure] {
        match self {
            Outcome::Patched { failures, .. } | Outcome::NoChangesFound { failures, .. } => {
                failures.as_slice()
            }
            _ => &[],
        }
    }

    /// True if the run hit a fatal or file-scoped error.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::ArchiveCorrupt { .. } | Outcome::InternalError { .. }
        ) || !self.failures().is_empty()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Patched {
                count,
                output: Some(output),
                ..
            } => write!(
                f,
                "{} file(s) patched; archive saved to {}",
                count,
                output.display()
            ),
            Outcome::Patched { count, .. } => write!(f, "{} file(s) patched", count),
            Outcome::NoChangesFound { .. } => write!(f, "no patchable code found"),
            Outcome::Unsupported(reason) => write!(f, "{}", reason),
            Outcome::ArchiveCorrupt { reason } => {
                write!(f, "invalid or corrupted ZIP/CRX file: {}", reason)
            }
            Outcome::InternalError { detail } => write!(f, "failed to process target: {}", detail),
        }
    }
}

/// Patch `path` in place (or into a new archive) and report what happened.
pub fn process(rules: &RuleSet, path: &Path) -> Outcome {
    run(rules, path, Mode::Apply)
}

/// Same routing as [`process`], but nothing is written and no archive is
/// produced. `Patched` means "would patch".
pub fn check(rules: &RuleSet, path: &Path) -> Outcome {
    run(rules, path, Mode::DryRun)
}

fn run(rules: &RuleSet, path: &Path, mode: Mode) -> Outcome {
    let target = Target::classify(path, rules);
    tracing::debug!(path = %path.display(), ?target, ?mode, "dispatching target");

    match target {
        Target::Missing => Outcome::Unsupported(UnsupportedTarget::NotFound {
            path: path.to_path_buf(),
        }),
        Target::Binary => Outcome::Unsupported(UnsupportedTarget::Binary {
            extension: suffix_of(path).unwrap_or_default(),
        }),
        Target::Unsupported => Outcome::Unsupported(UnsupportedTarget::UnknownType {
            extension: suffix_of(path),
        }),
        Target::Directory => {
            let report = scan_tree(rules, path, mode);
            counted(target, report.count(), None, report.failures)
        }
        Target::Archive(_) => match process_archive(rules, path, mode) {
            Ok(report) => counted(target, report.scan.count(), report.output, report.scan.failures),
            Err(ArchiveError::Corrupt { reason, .. }) => Outcome::ArchiveCorrupt { reason },
            Err(e) => Outcome::InternalError {
                detail: e.to_string(),
            },
        },
        Target::TextFile => match patch_file(rules, path, mode) {
            Ok(FileOutcome::Changed { .. }) => counted(target, 1, None, Vec::new()),
            Ok(FileOutcome::Unchanged | FileOutcome::SkippedNonText) => Outcome::NoChangesFound {
                target,
                failures: Vec::new(),
            },
            Err(e) => Outcome::InternalError {
                detail: e.to_string(),
            },
        },
    }
}

fn counted(
    target: Target,
    count: usize,
    output: Option<PathBuf>,
    failures: Vec<FileFailure>,
) -> Outcome {
    if count > 0 {
        Outcome::Patched {
            target,
            count,
            output,
            failures,
        }
    } else {
        Outcome::NoChangesFound { target, failures }
    }
}
