//! Repository process model and trailer-hashed file streaming for a git-compatible
//! storage layer.
//!
//! Repositories, working trees and hash streams are units: tokio tasks owning their
//! state, driven through typed handles ([`Repository`], [`Workspace`],
//! [`HashStream`]) or an untyped [`UnitRef`].

pub mod areas;
pub mod artifacts;
pub mod errors;

pub use areas::backend::{DiskBackend, MemoryBackend, StorageBackend};
pub use areas::repository::Repository;
pub use areas::workspace::Workspace;
pub use artifacts::checksum::{HashStream, ReadOutcome, TRAILER_SIZE, Verification};
pub use artifacts::core::{UnitKind, UnitRef};
pub use errors::{SlotError, UnitError};
