//! Storage backends
//!
//! A backend decides where repository data lives and starts the repository units
//! that front it. Two backends are provided:
//!
//! - [`MemoryBackend`]: nothing touches the disk
//! - [`DiskBackend`]: repositories live under a root directory in `.git` layout

use crate::areas::index::{self, IndexSummary};
use crate::areas::repository::Repository;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

pub trait StorageBackend: Send + Sync {
    /// Start a repository unit for the repository at `path`
    ///
    /// Must be called from within a tokio runtime.
    fn open_repository(&self, path: &Path) -> anyhow::Result<Repository>;

    /// Repositories started by this backend that are still running
    fn repositories(&self) -> Vec<Repository>;
}

/// Repositories a backend has started, pruned of terminated ones on access
#[derive(Debug, Default)]
struct Registry {
    repositories: Mutex<Vec<Repository>>,
}

impl Registry {
    fn register(&self, repository: Repository) {
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        repositories.retain(Repository::is_alive);
        repositories.push(repository);
    }

    fn live(&self) -> Vec<Repository> {
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        repositories.retain(Repository::is_alive);
        repositories.clone()
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    registry: Registry,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn open_repository(&self, path: &Path) -> anyhow::Result<Repository> {
        let repository = Repository::start(path);
        info!(path = %path.display(), "opened in-memory repository");

        self.registry.register(repository.clone());
        Ok(repository)
    }

    fn repositories(&self) -> Vec<Repository> {
        self.registry.live()
    }
}

#[derive(Debug)]
pub struct DiskBackend {
    root: Box<Path>,
    registry: Registry,
}

impl DiskBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskBackend {
            root: root.into().into_boxed_path(),
            registry: Registry::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check the checksum of the repository's index
    pub async fn verify_index(&self, repository: &Repository) -> anyhow::Result<IndexSummary> {
        index::verify_index(&repository.index_path()).await
    }

    fn init_layout(repository: &Repository) -> anyhow::Result<()> {
        std::fs::create_dir_all(repository.objects_path())
            .context("Failed to create .git/objects directory")?;

        std::fs::create_dir_all(repository.heads_path())
            .context("Failed to create .git/refs/heads directory")?;

        // create the index file if it does not exist
        let index_path = repository.index_path();
        if !index_path.exists() {
            std::fs::write(&index_path, b"").context("Failed to create .git/index file")?;
        }

        Ok(())
    }
}

impl StorageBackend for DiskBackend {
    /// Relative paths resolve against the backend root
    fn open_repository(&self, path: &Path) -> anyhow::Result<Repository> {
        let path = self.root.join(path);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create repository directory {}", path.display()))?;
        let path = path.canonicalize()?;

        let repository = Repository::start(&path);
        // on failure the only handle is dropped here, which closes the unit's mailbox
        Self::init_layout(&repository)?;
        info!(path = %path.display(), "opened repository");

        self.registry.register(repository.clone());
        Ok(repository)
    }

    fn repositories(&self) -> Vec<Repository> {
        self.registry.live()
    }
}
