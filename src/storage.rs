use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("path {0:?} escapes the storage root")]
pub struct PathTraversalError(pub String);

/// Canonicalizes a stored attachment path to `<dir>/<file>` form: forward
/// slashes, no leading slash, no empty or `.` segments. Any `..` segment or
/// absolute/drive-qualified prefix is rejected outright rather than rewritten,
/// so a hostile value can never resolve outside the storage root.
pub fn normalize_relative_path(raw: &str) -> Result<String, PathTraversalError> {
    let unified = raw.replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathTraversalError(raw.to_string())),
            other if other.contains(':') => return Err(PathTraversalError(raw.to_string())),
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(PathTraversalError(raw.to_string()));
    }

    Ok(segments.join("/"))
}

#[async_trait]
pub trait AttachmentStore: Send + Sync + 'static {
    /// Maps a stored relative path back to its absolute on-disk location.
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, PathTraversalError>;

    async fn save(&self, relative_path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Returns `None` when the database row exists but the file is gone;
    /// callers translate that into a 404 instead of assuming consistency.
    async fn read(&self, relative_path: &str) -> Result<Option<Vec<u8>>>;

    /// Removing an already-missing file is not an error.
    async fn remove(&self, relative_path: &str) -> Result<()>;
}

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in ["incoming", "outgoing"] {
            std::fs::create_dir_all(root.join(dir))
                .with_context(|| format!("failed to create upload directory {dir}"))?;
        }
        Ok(Self { root })
    }
}

#[async_trait]
impl AttachmentStore for LocalStorage {
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, PathTraversalError> {
        let normalized = normalize_relative_path(relative_path)?;
        Ok(self.root.join(normalized))
    }

    async fn save(&self, relative_path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.resolve(relative_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create attachment directory")?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("failed to write attachment {}", target.display()))?;
        Ok(())
    }

    async fn read(&self, relative_path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(relative_path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read attachment {}", target.display()))
            }
        }
    }

    async fn remove(&self, relative_path: &str) -> Result<()> {
        let target = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove attachment {}", target.display())),
        }
    }
}
