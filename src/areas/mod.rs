//! Live repository components
//!
//! - `backend`: Storage backends that start repository units
//! - `index`: Index file checksum verification and writing
//! - `repository`: Repository unit holding the default working tree slot
//! - `workspace`: Working tree unit bound to its owning repository

pub mod backend;
pub mod index;
pub mod repository;
pub mod workspace;
