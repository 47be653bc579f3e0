//! Recursive tree scanning.
//!
//! Walks a directory, patches every eligible regular file and aggregates the
//! results. Failures are isolated per file: a read or write error is recorded
//! in [`ScanReport::failures`] and the walk moves on. Nothing is rolled back.

use crate::patcher::{patch_file, FileOutcome, Mode, PatchError, RuleHit};
use crate::rules::RuleSet;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file the scan changed (or would change, in dry-run mode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    /// Path relative to the scan root
    pub path: PathBuf,
    pub hits: Vec<RuleHit>,
}

/// A file-scoped error that did not stop the scan.
#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_display")]
    pub error: FailureKind,
}

#[derive(Debug)]
pub enum FailureKind {
    Patch(PatchError),
    Walk(walkdir::Error),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Patch(e) => write!(f, "{}", e),
            FailureKind::Walk(e) => write!(f, "walk error: {}", e),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Aggregate result of one traversal.
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub root: PathBuf,
    /// Eligible regular files that were opened
    pub examined: usize,
    pub changed: Vec<ChangedFile>,
    /// Eligible files skipped because they are not UTF-8 text
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl ScanReport {
    /// Number of files changed.
    pub fn count(&self) -> usize {
        self.changed.len()
    }

    /// True if no file-scoped error occurred.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Patch every eligible file under `root`.
pub fn scan_tree(rules: &RuleSet, root: &Path, mode: Mode) -> ScanReport {
    let mut report = ScanReport {
        root: root.to_path_buf(),
        ..ScanReport::default()
    };

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let path = error
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                tracing::warn!(path = %path.display(), error = %error, "failed to read directory entry");
                report.failures.push(FileFailure {
                    path,
                    error: FailureKind::Walk(error),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !rules.is_eligible(entry.path()) {
            continue;
        }

        report.examined += 1;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();

        match patch_file(rules, entry.path(), mode) {
            Ok(FileOutcome::Changed { hits }) => {
                report.changed.push(ChangedFile {
                    path: relative,
                    hits,
                });
            }
            Ok(FileOutcome::Unchanged) => {}
            Ok(FileOutcome::SkippedNonText) => report.skipped.push(relative),
            Err(error) => {
                tracing::warn!(error = %error, "file patch failed, continuing");
                report.failures.push(FileFailure {
                    path: relative,
                    error: FailureKind::Patch(error),
                });
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        examined = report.examined,
        changed = report.count(),
        failures = report.failures.len(),
        "scan finished"
    );
    report
}

fn serialize_display<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: fmt::Display,
{
    serializer.collect_str(value)
}
