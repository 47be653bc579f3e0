//! Patch Suite: pattern-based content patching
//!
//! Rewrites known "license gate" idioms in source-like files, across a single
//! file, a directory tree, or a ZIP/CRX archive.
//!
//! # Architecture
//!
//! A [`RuleSet`] is an ordered list of regex rewrites plus an allow-list of
//! file suffixes. [`patch_text`] applies it to a string, [`patch_file`] to one
//! file on disk, [`scan_tree`] to every eligible file under a directory and
//! [`process_archive`] to an archive via a scoped [`Workspace`]. [`process`]
//! classifies an arbitrary path into a [`Target`] and routes it, returning an
//! [`Outcome`] for the caller to present.
//!
//! The transformation is deliberately textual. It has no notion of syntax
//! or meaning, so patched code is not guaranteed to be correct.
//!
//! # Safety
//!
//! - Files are rewritten atomically (tempfile + fsync + rename) or not at all,
//!   through symlinks; read-only files are left alone
//! - Non-UTF-8 files are skipped, never rewritten
//! - Archive entries cannot escape the extraction workspace, and their
//!   declared sizes are never trusted for allocation
//! - The workspace is removed on every exit path
//! - The input archive is never modified
//!
//! # Example
//!
//! ```no_run
//! use patch_suite::{process, Outcome, RuleSet};
//! use std::path::Path;
//!
//! let rules = RuleSet::builtin();
//! match process(&rules, Path::new("extension.crx")) {
//!     Outcome::Patched { count, output, .. } => {
//!         println!("{count} file(s) patched, output: {output:?}")
//!     }
//!     other => eprintln!("{other}"),
//! }
//! ```

pub mod archive;
pub mod config;
pub mod dispatch;
pub mod patcher;
pub mod rules;
pub mod scan;
pub mod workspace;

// Re-exports
pub use archive::{output_path_for, process_archive, ArchiveError, ArchiveKind, ArchiveReport};
pub use config::{load_from_path, load_from_str, ConfigError, ConfigErrorKind, RuleConfig};
pub use dispatch::{check, process, Outcome, Severity, Target, UnsupportedTarget};
pub use patcher::{patch_file, patch_text, FileOutcome, Mode, PatchError, PatchOutcome, RuleHit};
pub use rules::{PatchRule, RuleError, RuleSet, DEFAULT_EXTENSIONS};
pub use scan::{scan_tree, ChangedFile, FailureKind, FileFailure, ScanReport};
pub use workspace::{Workspace, WorkspaceError};
