//! Working tree unit
//!
//! A working tree is a checked-out directory bound for life to the repository it
//! was started against. It is linked to that repository at construction and
//! terminates when the repository does; the reverse does not hold.

use crate::areas::repository::Repository;
use crate::artifacts::core::protocol::{Reply, Request};
use crate::artifacts::core::unit::{self, Behavior, UnitId, UnitKind};
use crate::artifacts::core::UnitRef;
use crate::errors::UnitError;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 3] = [".git", ".", ".."];

/// Handle to a running working tree unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    unit: UnitRef,
}

impl Workspace {
    /// Spawn a working tree rooted at `path`, owned by `repository`
    ///
    /// Fails with [`UnitError::Terminated`] if the repository is not running.
    pub fn start(repository: &Repository, path: impl AsRef<Path>) -> Result<Self, UnitError> {
        let owner = repository.unit();
        if !Repository::is_repository(owner) {
            return Err(UnitError::Terminated);
        }

        let path: Box<Path> = path.as_ref().into();
        let unit = unit::spawn(
            |id| WorkspaceUnit::new(id, path.clone(), owner.clone()),
            Some(owner.monitor().clone()),
        );
        debug!(unit = %unit, owner = %owner, path = %path.display(), "working tree started");

        Ok(Workspace { unit })
    }

    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    /// Whether `unit` is a live working tree
    pub fn is_valid(unit: &UnitRef) -> bool {
        unit.is_live(UnitKind::WorkingTree)
    }

    pub fn is_alive(&self) -> bool {
        self.unit.is_alive()
    }

    pub async fn path(&self) -> Result<PathBuf, UnitError> {
        match self.unit.ask(Request::WorkingTreePath).await? {
            Reply::Path(path) => Ok(path),
            other => Err(other.into_error()),
        }
    }

    pub async fn owner(&self) -> Result<UnitRef, UnitError> {
        match self.unit.ask(Request::WorkingTreeOwner).await? {
            Reply::Owner(owner) => Ok(owner),
            other => Err(other.into_error()),
        }
    }

    /// Files under the working tree root, relative to it and sorted
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, UnitError> {
        match self.unit.ask(Request::ListFiles).await? {
            Reply::Files(files) => Ok(files),
            other => Err(other.into_error()),
        }
    }

    pub async fn stop(&self) -> Result<bool, UnitError> {
        self.unit.stop().await
    }
}

struct WorkspaceUnit {
    id: UnitId,
    path: Box<Path>,
    owner: UnitRef,
}

impl WorkspaceUnit {
    fn new(id: UnitId, path: Box<Path>, owner: UnitRef) -> Self {
        WorkspaceUnit { id, path, owner }
    }

    /// Walks the tree on the blocking pool so large trees do not stall the runtime
    async fn list_files(&self) -> Result<Vec<PathBuf>, UnitError> {
        let root = self.path.clone();
        tokio::task::spawn_blocking(move || Self::walk(&root))
            .await
            .map_err(io::Error::other)?
    }

    fn walk(root: &Path) -> Result<Vec<PathBuf>, UnitError> {
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("The working tree root is not a directory: {root:?}"),
            )
            .into());
        }

        let mut files = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !Self::is_ignored(relative)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
            .collect::<Vec<_>>();
        files.sort();

        Ok(files)
    }

    fn is_ignored(path: &Path) -> bool {
        // Check if any component of the path is in IGNORED_PATHS
        path.components().any(|component| {
            if let std::path::Component::Normal(name) = component {
                let name_str = name.to_string_lossy();
                IGNORED_PATHS.contains(&name_str.as_ref())
            } else {
                false
            }
        })
    }
}

impl Behavior for WorkspaceUnit {
    const KIND: UnitKind = UnitKind::WorkingTree;

    async fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::WorkingTreePath => Reply::Path(self.path.to_path_buf()),
            Request::WorkingTreeOwner => Reply::Owner(self.owner.clone()),
            Request::ListFiles => self.list_files().await.into(),
            other => unit::reject(Self::KIND, self.id, &other),
        }
    }
}
