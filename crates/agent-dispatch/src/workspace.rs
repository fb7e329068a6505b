//! File workspace available to the agent.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// Errors raised by a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The file does not exist.
    #[error("file '{0}' not found")]
    NotFound(String),
    /// The path points outside of the workspace.
    #[error("path '{0}' is outside of the workspace")]
    OutsideWorkspace(String),
    /// An IO operation failed.
    #[error("fail to access '{path}': {source}")]
    Io {
        /// Relative path.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },
}

/// Text file storage addressed by relative paths.
pub trait Workspace: Send + Sync {
    /// Reads the file as UTF-8 text.
    fn read_file(&self, path: &str) -> Result<String, WorkspaceError>;

    /// Writes the text to the file, creating parent directories as needed.
    fn write_file(&mut self, path: &str, data: &str) -> Result<(), WorkspaceError>;

    /// Returns `true` if the file exists.
    fn exists(&self, path: &str) -> bool;
}

/// Normalizes a relative path, rejecting absolute paths and parent components.
fn normalize(path: &str) -> Result<PathBuf, WorkspaceError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            _ => return Err(WorkspaceError::OutsideWorkspace(path.to_owned())),
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(WorkspaceError::NotFound(path.to_owned()));
    }
    Ok(normalized)
}

/// Workspace rooted at a directory of the local file system.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    /// Creates a workspace rooted at the directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        normalize(path).map(|relative| self.root.join(relative))
    }
}

impl Workspace for FsWorkspace {
    fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let full_path = self.resolve(path)?;
        fs::read_to_string(full_path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => WorkspaceError::NotFound(path.to_owned()),
            _ => WorkspaceError::Io {
                path: path.to_owned(),
                source,
            },
        })
    }

    fn write_file(&mut self, path: &str, data: &str) -> Result<(), WorkspaceError> {
        let full_path = self.resolve(path)?;
        let io_error = |source| WorkspaceError::Io {
            path: path.to_owned(),
            source,
        };
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&full_path, data).map_err(io_error)?;
        tracing::debug!(path, bytes = data.len(), "workspace file written");
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|full_path| full_path.is_file())
    }
}

/// Workspace kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkspace {
    files: BTreeMap<PathBuf, String>,
}

impl InMemoryWorkspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Workspace for InMemoryWorkspace {
    fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        self.files
            .get(&normalize(path)?)
            .cloned()
            .ok_or_else(|| WorkspaceError::NotFound(path.to_owned()))
    }

    fn write_file(&mut self, path: &str, data: &str) -> Result<(), WorkspaceError> {
        self.files.insert(normalize(path)?, data.to_owned());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|path| self.files.contains_key(&path))
    }
}
