use crate::rules::RuleSet;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Whether patching writes results back or only reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Rewrite changed files in place.
    #[default]
    Apply,
    /// Compute changes without touching the filesystem.
    DryRun,
}

impl Mode {
    pub fn writes(self) -> bool {
        matches!(self, Mode::Apply)
    }
}

/// How many times one rule fired on one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleHit {
    pub rule: String,
    pub count: usize,
}

/// Result of running the rule set over a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for changes"]
pub struct PatchOutcome {
    pub text: String,
    pub changed: bool,
    pub hits: Vec<RuleHit>,
}

/// Result of patching one file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileOutcome should be checked for changes"]
pub enum FileOutcome {
    /// Content differed after patching (and was written back in `Apply` mode)
    Changed { hits: Vec<RuleHit> },
    /// No rule produced a difference
    Unchanged,
    /// File is not valid UTF-8 and was left alone
    SkippedNonText,
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    pub fn path(&self) -> &Path {
        match self {
            PatchError::Read { path, .. } | PatchError::Write { path, .. } => path,
        }
    }
}

/// Apply every rule in order, each to the output of the previous one.
///
/// Pure and deterministic. Matching is textual only; the rewritten code is not
/// guaranteed to mean anything sensible.
pub fn patch_text(rules: &RuleSet, text: &str) -> PatchOutcome {
    let mut current = text.to_owned();
    let mut hits = Vec::new();

    for rule in rules.rules() {
        let count = rule.pattern().find_iter(&current).count();
        if count == 0 {
            continue;
        }
        let replaced = rule
            .pattern()
            .replace_all(&current, rule.replacement())
            .into_owned();
        hits.push(RuleHit {
            rule: rule.id().to_string(),
            count,
        });
        current = replaced;
    }

    let changed = current != text;
    PatchOutcome {
        text: current,
        changed,
        hits,
    }
}

/// Patch a single file in place.
///
/// Non-UTF-8 content is skipped, not failed. A read-only file that needs a
/// change is a [`PatchError::Write`] and is left untouched.
pub fn patch_file(rules: &RuleSet, path: &Path, mode: Mode) -> Result<FileOutcome, PatchError> {
    let bytes = fs::read(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let Ok(original) = String::from_utf8(bytes) else {
        tracing::debug!(path = %path.display(), "skipping non-UTF-8 file");
        return Ok(FileOutcome::SkippedNonText);
    };

    let outcome = patch_text(rules, &original);
    if !outcome.changed {
        return Ok(FileOutcome::Unchanged);
    }

    for hit in &outcome.hits {
        tracing::debug!(path = %path.display(), rule = %hit.rule, count = hit.count, "rule matched");
    }

    if mode.writes() {
        write_back(path, outcome.text.as_bytes()).map_err(|source| PatchError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "patched");
    }

    Ok(FileOutcome::Changed { hits: outcome.hits })
}

/// Write `content` back to an existing file.
///
/// Symlinks are resolved first so the link target is rewritten and the link
/// stays a link. Read-only files are refused even when the directory would
/// allow a rename over them. Normally the write is atomic (tempfile + fsync +
/// rename) and keeps the original permissions; a file with other hard links is
/// rewritten in place so every link sees the new content.
fn write_back(path: &Path, content: &[u8]) -> io::Result<()> {
    let path = fs::canonicalize(path)?;
    let metadata = fs::metadata(&path)?;
    if metadata.permissions().readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "file is read-only",
        ));
    }

    if has_other_links(&metadata) {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(content)?;
        return file.sync_all();
    }

    // Create tempfile in same directory to ensure same filesystem
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "Path has no parent directory")
    })?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), metadata.permissions())?;

    temp.persist(&path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn has_other_links(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink() > 1
}

#[cfg(not(unix))]
fn has_other_links(_metadata: &fs::Metadata) -> bool {
    false
}
