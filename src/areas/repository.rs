//! Repository unit
//!
//! A repository owns a one-shot slot for its default working tree. The slot starts
//! empty and can be latched exactly once; afterwards it never changes, not even
//! when the latched working tree terminates on its own.
//!
//! Every working tree started against a repository is linked to it and terminates
//! together with it, whether or not it was ever latched as the default.

use crate::areas::workspace::Workspace;
use crate::artifacts::core::protocol::{Reply, Request};
use crate::artifacts::core::unit::{self, Behavior, UnitId, UnitKind};
use crate::artifacts::core::UnitRef;
use crate::errors::{SlotError, UnitError};
use std::path::Path;
use tracing::{debug, warn};

/// Handle to a running repository unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    unit: UnitRef,
    path: Box<Path>,
}

impl Repository {
    /// Spawn a repository unit for the repository rooted at `path`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(path: impl AsRef<Path>) -> Self {
        let path: Box<Path> = path.as_ref().into();
        let unit = unit::spawn(RepositoryUnit::new, None);
        debug!(unit = %unit, path = %path.display(), "repository started");

        Repository { unit, path }
    }

    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> Box<Path> {
        self.path.join(".git").into_boxed_path()
    }

    pub fn objects_path(&self) -> Box<Path> {
        self.git_path().join("objects").into_boxed_path()
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.git_path().join("refs").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.refs_path().join("heads").into_boxed_path()
    }

    pub fn index_path(&self) -> Box<Path> {
        self.git_path().join("index").into_boxed_path()
    }

    /// Whether `unit` is a live repository
    pub fn is_repository(unit: &UnitRef) -> bool {
        unit.is_live(UnitKind::Repository)
    }

    pub fn is_alive(&self) -> bool {
        self.unit.is_alive()
    }

    pub async fn default_working_tree(&self) -> Result<Option<UnitRef>, UnitError> {
        match self.unit.ask(Request::GetDefaultWorkingTree).await? {
            Reply::DefaultWorkingTree(working_tree) => Ok(working_tree),
            other => Err(other.into_error()),
        }
    }

    /// Latch `candidate` as the default working tree
    ///
    /// Fails without touching the slot when the candidate is not a live working tree
    /// or when the slot has already been latched (even to the same candidate).
    pub async fn set_default_working_tree(&self, candidate: &UnitRef) -> Result<(), SlotError> {
        match self
            .unit
            .ask(Request::SetDefaultWorkingTree(candidate.clone()))
            .await?
        {
            Reply::Latch(result) => result,
            other => Err(other.into_error().into()),
        }
    }

    /// Terminate the repository along with every working tree linked to it
    pub async fn stop(&self) -> Result<bool, UnitError> {
        self.unit.stop().await
    }
}

struct RepositoryUnit {
    id: UnitId,
    default_working_tree: Option<UnitRef>,
}

impl RepositoryUnit {
    fn new(id: UnitId) -> Self {
        RepositoryUnit {
            id,
            default_working_tree: None,
        }
    }

    fn set_default_working_tree(&mut self, candidate: UnitRef) -> Result<(), SlotError> {
        if !Workspace::is_valid(&candidate) {
            warn!(unit = %self.id, candidate = %candidate, "rejected default working tree candidate");
            return Err(SlotError::NotAWorkingTree(candidate));
        }

        match &self.default_working_tree {
            Some(current) => Err(SlotError::AlreadySet(current.clone())),
            None => {
                debug!(unit = %self.id, working_tree = %candidate, "default working tree latched");
                self.default_working_tree = Some(candidate);
                Ok(())
            }
        }
    }
}

impl Behavior for RepositoryUnit {
    const KIND: UnitKind = UnitKind::Repository;

    async fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::GetDefaultWorkingTree => {
                Reply::DefaultWorkingTree(self.default_working_tree.clone())
            }
            Request::SetDefaultWorkingTree(candidate) => {
                Reply::Latch(self.set_default_working_tree(candidate))
            }
            other => unit::reject(Self::KIND, self.id, &other),
        }
    }
}
