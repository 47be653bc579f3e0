use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Suffix appended to the archive stem to name its extraction directory.
pub const WORKSPACE_SUFFIX: &str = "_unzipped_temp";

/// Ephemeral extraction directory for one archive operation.
///
/// Created by [`Workspace::create`] and removed recursively on drop, so it
/// cannot outlive the call that owns it on any exit path.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("archive path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("failed to prepare workspace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
#[error("entry escapes workspace: {0}")]
pub struct OutsideWorkspace(pub PathBuf);

impl Workspace {
    /// Workspace path for `archive`: `<parent>/<stem>_unzipped_temp`.
    pub fn path_for(archive: &Path) -> Result<PathBuf, WorkspaceError> {
        let stem = archive
            .file_stem()
            .ok_or_else(|| WorkspaceError::NoFileName(archive.to_path_buf()))?;
        let mut name = stem.to_os_string();
        name.push(WORKSPACE_SUFFIX);
        let parent = archive.parent().unwrap_or_else(|| Path::new(""));
        Ok(parent.join(name))
    }

    /// Create a fresh workspace for `archive`, clearing any leftover directory
    /// from an earlier failed run.
    pub fn create(archive: &Path) -> Result<Self, WorkspaceError> {
        let root = Self::path_for(archive)?;
        let io_err = |source| WorkspaceError::Io {
            path: root.clone(),
            source,
        };

        if root.exists() {
            tracing::warn!(path = %root.display(), "removing leftover workspace");
            fs::remove_dir_all(&root).map_err(io_err)?;
        }
        fs::create_dir_all(&root).map_err(io_err)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an archive-relative path inside the workspace.
    ///
    /// Rejects absolute paths, drive prefixes and any `..` component, so the
    /// result always lies under [`Workspace::root`].
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf, OutsideWorkspace> {
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(OutsideWorkspace(relative.to_path_buf()));
                }
            }
        }
        if resolved == self.root {
            return Err(OutsideWorkspace(relative.to_path_buf()));
        }
        Ok(resolved)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to remove workspace");
            }
        }
    }
}
