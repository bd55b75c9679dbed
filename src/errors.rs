//! Error taxonomy shared by every unit
//!
//! - `UnitError`: transport and protocol failures of a single request (dead unit,
//!   out-of-protocol request, native I/O failure of the unit's resource)
//! - `SlotError`: rejected attempts to latch a repository's default working tree
//!
//! Designed protocol outcomes such as "too soon" or "already done" are not errors;
//! they live in [`crate::artifacts::checksum::Verification`].

use crate::artifacts::core::{UnitKind, UnitRef};

#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    /// The unit stopped (explicitly, by failure or through its owner) before replying
    #[error("unit has terminated")]
    Terminated,

    #[error("{kind} unit cannot handle request `{request}`")]
    UnexpectedRequest {
        kind: UnitKind,
        request: &'static str,
    },

    #[error("unexpected reply `{0}` from unit")]
    UnexpectedReply(&'static str),

    #[error("unexpected end of content: wanted {wanted} bytes, got {got}")]
    UnexpectedEof { wanted: usize, got: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("candidate {0} is not a live working tree")]
    NotAWorkingTree(UnitRef),

    #[error("default working tree already set to {0}")]
    AlreadySet(UnitRef),

    #[error(transparent)]
    Unit(#[from] UnitError),
}
