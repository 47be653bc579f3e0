//! Archive round-trip: extract → patch → repack → cleanup.
//!
//! The archive is extracted into a [`Workspace`] next to it, scanned with
//! [`scan_tree`], and, if anything changed, repacked into
//! `<stem>_patched<ext>` beside the original. The original archive is never
//! modified. The workspace guard is dropped before [`process_archive`]
//! returns, whether it succeeds, fails or unwinds.

use crate::patcher::Mode;
use crate::rules::{suffix_of, RuleSet};
use crate::scan::{scan_tree, ScanReport};
use crate::workspace::{Workspace, WorkspaceError};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Suffix inserted before the extension of the repacked archive.
pub const OUTPUT_SUFFIX: &str = "_patched";

/// Supported container formats. Both are read and written as ZIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Zip,
    /// Chrome extension package: a ZIP with a prepended header
    Crx,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match suffix_of(path)?.as_str() {
            ".zip" => Some(ArchiveKind::Zip),
            ".crx" => Some(ArchiveKind::Crx),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("invalid or corrupted archive {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

impl ArchiveError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
        move |source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl ToString) -> ArchiveError {
        ArchiveError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Result of one archive round-trip.
#[derive(Debug)]
pub struct ArchiveReport {
    pub archive: PathBuf,
    /// Number of entries extracted into the workspace
    pub entries: usize,
    /// Scan over the workspace; paths are relative to the archive root
    pub scan: ScanReport,
    /// Repacked archive, if anything changed and the mode writes
    pub output: Option<PathBuf>,
}

/// Where the repacked copy of `archive` is written.
pub fn output_path_for(archive: &Path) -> Option<PathBuf> {
    let stem = archive.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(OUTPUT_SUFFIX);
    if let Some(ext) = archive.extension() {
        name.push(".");
        name.push(ext);
    }
    Some(archive.with_file_name(name))
}

/// Extract, patch and (when something changed) repack `archive`.
pub fn process_archive(
    rules: &RuleSet,
    archive: &Path,
    mode: Mode,
) -> Result<ArchiveReport, ArchiveError> {
    let workspace = Workspace::create(archive)?;

    let entries = extract(archive, &workspace)?;
    tracing::debug!(archive = %archive.display(), entries, "extracted archive");

    let scan = scan_tree(rules, workspace.root(), mode);

    let output = if scan.count() > 0 && mode.writes() {
        let output = output_path_for(archive)
            .ok_or_else(|| WorkspaceError::NoFileName(archive.to_path_buf()))?;
        let files = repack(workspace.root(), &output)?;
        tracing::info!(output = %output.display(), files, "repacked archive");
        Some(output)
    } else {
        None
    };

    Ok(ArchiveReport {
        archive: archive.to_path_buf(),
        entries,
        scan,
        output,
    })
}

/// Extract every entry of `archive_path` into the workspace.
///
/// Container and decompression errors are reported as [`ArchiveError::Corrupt`];
/// filesystem errors on the workspace side as [`ArchiveError::Io`].
fn extract(archive_path: &Path, workspace: &Workspace) -> Result<usize, ArchiveError> {
    let file = File::open(archive_path).map_err(ArchiveError::io(archive_path))?;
    let mut archive = ZipArchive::new(file).map_err(|e| read_error(archive_path, e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| read_error(archive_path, e))?;
        let target = workspace
            .resolve(Path::new(entry.name()))
            .map_err(|e| ArchiveError::corrupt(archive_path, e))?;

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(ArchiveError::io(&target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(ArchiveError::io(parent))?;
        }
        let name = entry.name().to_string();
        stream_entry(&mut entry, &target).map_err(|e| match e {
            EntryError::Read(e) => {
                ArchiveError::corrupt(archive_path, format!("entry '{}': {}", name, e))
            }
            EntryError::Write(e) => ArchiveError::io(&target)(e),
        })?;
    }

    Ok(archive.len())
}

enum EntryError {
    Read(io::Error),
    Write(io::Error),
}

/// Copy one entry to `target` in fixed-size chunks.
///
/// The declared uncompressed size is never used for allocation; only bytes
/// that actually decompress reach the disk.
fn stream_entry(entry: &mut impl Read, target: &Path) -> Result<(), EntryError> {
    let mut out = File::create(target).map_err(EntryError::Write)?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EntryError::Read(e)),
        };
        out.write_all(&buf[..read]).map_err(EntryError::Write)?;
    }
    Ok(())
}

fn read_error(path: &Path, error: ZipError) -> ArchiveError {
    match error {
        ZipError::Io(source)
            if !matches!(
                source.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::InvalidData
                    | io::ErrorKind::InvalidInput
            ) =>
        {
            ArchiveError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
        other => ArchiveError::corrupt(path, other),
    }
}

/// Write every regular file under `root` into a new archive at `output`.
///
/// The archive is assembled in a tempfile beside `output` and renamed into
/// place, so a failed repack leaves no output behind.
fn repack(root: &Path, output: &Path) -> Result<usize, ArchiveError> {
    let parent = output.parent().unwrap_or_else(|| Path::new(""));
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(ArchiveError::io(parent))?;
    let zip_err = |source| ArchiveError::Zip {
        path: output.to_path_buf(),
        source,
    };

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(&mut temp);
    let mut files = 0;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Io {
            path: root.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        writer
            .start_file(entry_name(relative), options)
            .map_err(zip_err)?;
        let mut source = File::open(entry.path()).map_err(ArchiveError::io(entry.path()))?;
        io::copy(&mut source, &mut writer).map_err(ArchiveError::io(output))?;
        files += 1;
    }

    writer.finish().map_err(zip_err)?;

    temp.as_file()
        .sync_all()
        .map_err(ArchiveError::io(output))?;
    temp.persist(output)
        .map_err(|e| ArchiveError::io(output)(e.error))?;

    Ok(files)
}

/// Archive entry name: relative path with `/` separators.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
