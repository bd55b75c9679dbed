#![allow(dead_code)]

use bit_core::{MemoryBackend, Repository, StorageBackend};
use rstest::fixture;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;

/// Upper bound for waiting on cascading termination
pub const TERMINATION_TIMEOUT: Duration = Duration::from_secs(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Content followed by its SHA-1 digest
pub fn trailer_hashed(content: &[u8]) -> Vec<u8> {
    let mut buffer = content.to_vec();
    buffer.extend_from_slice(Sha1::digest(content).as_slice());
    buffer
}

#[fixture]
pub fn backend() -> MemoryBackend {
    init_tracing();
    MemoryBackend::new()
}

pub fn open_repository(backend: &MemoryBackend, name: &str) -> Repository {
    backend
        .open_repository(Path::new(name))
        .expect("in-memory repositories always open")
}
