//! Request/reply protocol spoken over unit mailboxes
//!
//! All unit kinds share one message vocabulary so that any [`UnitRef`] can be
//! queried (e.g. for its identity) regardless of what it is. A unit answers the
//! requests of its own kind and rejects the rest with
//! [`UnitError::UnexpectedRequest`](crate::errors::UnitError::UnexpectedRequest).

use crate::artifacts::checksum::{ReadOutcome, Verification};
use crate::artifacts::core::UnitRef;
use crate::artifacts::core::unit::UnitKind;
use crate::errors::{SlotError, UnitError};
use std::path::PathBuf;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum Request {
    /// Handshake answered by every live unit with its kind
    Identify,
    Stop,

    GetDefaultWorkingTree,
    SetDefaultWorkingTree(UnitRef),

    WorkingTreePath,
    WorkingTreeOwner,
    ListFiles,

    Read(usize),
    Remaining,
    ValidHash,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Identify => "identify",
            Request::Stop => "stop",
            Request::GetDefaultWorkingTree => "get-default-working-tree",
            Request::SetDefaultWorkingTree(_) => "set-default-working-tree",
            Request::WorkingTreePath => "working-tree-path",
            Request::WorkingTreeOwner => "working-tree-owner",
            Request::ListFiles => "list-files",
            Request::Read(_) => "read",
            Request::Remaining => "remaining",
            Request::ValidHash => "valid-hash",
        }
    }
}

#[derive(Debug)]
pub enum Reply {
    Identity(UnitKind),
    Stopped,
    DefaultWorkingTree(Option<UnitRef>),
    Latch(Result<(), SlotError>),
    Path(PathBuf),
    Owner(UnitRef),
    Files(Vec<PathBuf>),
    Read(ReadOutcome),
    Remaining(u64),
    Verification(Verification),
    Error(UnitError),
}

impl Reply {
    pub fn name(&self) -> &'static str {
        match self {
            Reply::Identity(_) => "identity",
            Reply::Stopped => "stopped",
            Reply::DefaultWorkingTree(_) => "default-working-tree",
            Reply::Latch(_) => "latch",
            Reply::Path(_) => "path",
            Reply::Owner(_) => "owner",
            Reply::Files(_) => "files",
            Reply::Read(_) => "read",
            Reply::Remaining(_) => "remaining",
            Reply::Verification(_) => "verification",
            Reply::Error(_) => "error",
        }
    }

    /// Turn a reply that did not match the caller's expectation into an error
    pub fn into_error(self) -> UnitError {
        match self {
            Reply::Error(error) => error,
            other => UnitError::UnexpectedReply(other.name()),
        }
    }
}

impl<T: Into<Reply>> From<Result<T, UnitError>> for Reply {
    fn from(result: Result<T, UnitError>) -> Self {
        match result {
            Ok(reply) => reply.into(),
            Err(error) => Reply::Error(error),
        }
    }
}

impl From<ReadOutcome> for Reply {
    fn from(outcome: ReadOutcome) -> Self {
        Reply::Read(outcome)
    }
}

impl From<Verification> for Reply {
    fn from(verification: Verification) -> Self {
        Reply::Verification(verification)
    }
}

impl From<Vec<PathBuf>> for Reply {
    fn from(files: Vec<PathBuf>) -> Self {
        Reply::Files(files)
    }
}

/// A request in flight, paired with the channel its reply travels back on
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) request: Request,
    pub(crate) reply_to: oneshot::Sender<Reply>,
}

impl Envelope {
    pub(crate) fn reply(self, reply: Reply) {
        // the caller may have given up waiting; nothing to do about it here
        let _ = self.reply_to.send(reply);
    }
}
