//! Index file integrity
//!
//! The index ends with a SHA-1 checksum of everything before it. Verification streams
//! the file through a [`HashStream`], parses the header, drains the entries and
//! checks the trailer exactly once.

use crate::artifacts::checksum::{HashStream, ReadOutcome, TrailerHashed, Verification};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use anyhow::{Context, anyhow};
use derive_new::new;
use sha1::{Digest, Sha1};
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;
use tracing::warn;

/// Entries are drained in chunks of this size
const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexSummary {
    pub version: u32,
    pub entries_count: u32,
    /// Bytes between the header and the trailer
    pub entries_size: u64,
}

impl IndexSummary {
    pub fn empty() -> Self {
        let header = IndexHeader::empty();
        IndexSummary::new(header.version, header.entries_count, 0)
    }
}

/// Check the framing and checksum of the index at `path`
///
/// An empty index file is a freshly initialized repository and counts as valid.
pub async fn verify_index(path: &Path) -> anyhow::Result<IndexSummary> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Unable to stat index file {}", path.display()))?
        .len();

    if size == 0 {
        return Ok(IndexSummary::empty());
    }

    let stream = HashStream::open_file(path)
        .with_context(|| format!("Unable to open index file {}", path.display()))?;
    let summary = read_index(&stream).await;
    stream.close().await?;

    summary
}

async fn read_index(stream: &HashStream) -> anyhow::Result<IndexSummary> {
    let header = IndexHeader::parse(stream).await?;

    let mut entries_size = 0u64;
    while let ReadOutcome::Data(chunk) = stream.read(READ_CHUNK).await? {
        entries_size += chunk.len() as u64;
    }

    match stream.valid_hash().await? {
        Verification::Valid(true) => Ok(IndexSummary::new(
            header.version,
            header.entries_count,
            entries_size,
        )),
        Verification::Valid(false) => {
            warn!("index checksum mismatch");
            Err(anyhow!("Checksum does not match value stored on disk"))
        }
        other => Err(anyhow!("Index checksum could not be verified: {:?}", other)),
    }
}

/// Write an index made of a header, pre-encoded `entries` and a SHA-1 trailer
pub fn write_index(path: &Path, entries_count: u32, entries: &[u8]) -> anyhow::Result<()> {
    let mut index_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Unable to open index file {}", path.display()))?;
    let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)?;

    let header = IndexHeader {
        entries_count,
        ..IndexHeader::empty()
    };
    let header_bytes = header.serialize()?;
    debug_assert_eq!(header_bytes.len(), HEADER_SIZE);

    let mut digest = Sha1::new();
    for part in [&header_bytes[..], entries] {
        lock.deref_mut().write_all(part)?;
        digest.update(part);
    }

    lock.deref_mut()
        .write_all(digest.finalize().as_slice())
        .map_err(|_| anyhow!("Failed to write checksum to index file"))?;

    Ok(())
}
