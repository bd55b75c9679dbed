//! Data structures and protocol plumbing
//!
//! - `checksum`: Streaming reader for trailer-hashed files
//! - `core`: Unit runtime (addresses, mailboxes, termination links)
//! - `index`: Index file header format

pub mod checksum;
pub mod core;
pub mod index;
