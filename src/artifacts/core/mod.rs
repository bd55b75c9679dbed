//! Unit runtime shared by repositories, working trees and hash streams
//!
//! A unit is a tokio task owning private state, reachable only through its mailbox.
//! Requests are handled one at a time in arrival order, so state transitions inside
//! a unit need no further locking.
//!
//! - `link`: termination monitoring between units
//! - `protocol`: request and reply messages
//! - `unit`: unit identity, addresses and the mailbox loop

pub mod link;
pub mod protocol;
pub mod unit;

pub use link::Monitor;
pub use protocol::{Reply, Request};
pub use unit::{UnitId, UnitKind, UnitRef};
