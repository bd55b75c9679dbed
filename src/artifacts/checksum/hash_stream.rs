//! Integrity-checked streaming reader
//!
//! A hash stream is a unit wrapping a byte source whose last [`TRAILER_SIZE`] bytes
//! are a SHA-1 digest of the rest. Reads only ever deliver content bytes, and every
//! delivered byte is fed to a rolling digest.
//!
//! ## Verification states
//!
//! ```text
//! Pending --[content exhausted]--> Ready --[first valid_hash]--> Done
//! ```
//!
//! `Done` is terminal: later verification requests answer `AlreadyDone` and the
//! digest is never recomputed.

use crate::artifacts::checksum::TRAILER_SIZE;
use crate::artifacts::checksum::source::ByteSource;
use crate::artifacts::core::protocol::{Reply, Request};
use crate::artifacts::core::unit::{self, Behavior, UnitId, UnitKind};
use crate::artifacts::core::UnitRef;
use crate::errors::UnitError;
use bytes::{Bytes, BytesMut};
use sha1::{Digest, Sha1};
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of a single read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(Bytes),
    EndOfContent,
}

/// Outcome of a verification request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Whether the digest of the delivered content matches the trailer
    Valid(bool),
    /// Content bytes remain to be read
    TooSoon,
    /// The trailer has already been checked
    AlreadyDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerificationState {
    Pending,
    Ready,
    Done,
}

/// Handle to a running hash stream unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashStream {
    unit: UnitRef,
}

impl HashStream {
    /// Open a trailer-hashed file
    ///
    /// The total size comes from the opened file's metadata. Files too short to hold
    /// a trailer are rejected with [`io::ErrorKind::InvalidData`].
    pub fn open_file(path: &Path) -> Result<Self, UnitError> {
        let (source, size) = ByteSource::open_file(path)?;

        if size < TRAILER_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} is {} bytes long, too short for a {}-byte trailer",
                    path.display(),
                    size,
                    TRAILER_SIZE
                ),
            )
            .into());
        }

        Ok(Self::spawn(source, size))
    }

    /// Open an in-memory trailer-hashed buffer
    ///
    /// The buffer must be at least [`TRAILER_SIZE`] bytes long.
    pub fn open_buffer(buffer: impl Into<Bytes>) -> Self {
        let (source, size) = ByteSource::memory(buffer.into());
        debug_assert!(
            size >= TRAILER_SIZE as u64,
            "buffer of {size} bytes cannot hold a {TRAILER_SIZE}-byte trailer"
        );

        Self::spawn(source, size)
    }

    fn spawn(source: ByteSource, size: u64) -> Self {
        let unit = unit::spawn(|id| HashStreamUnit::new(id, source, size), None);
        HashStream { unit }
    }

    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    /// Whether `unit` is a live hash stream
    pub fn is_instance(unit: &UnitRef) -> bool {
        unit.is_live(UnitKind::HashStream)
    }

    /// Read up to `count` content bytes
    ///
    /// Returns fewer bytes than asked for when less content remains or the
    /// underlying source delivered a short read.
    ///
    /// The unit issues one synchronous source read per request on its runtime
    /// worker, so `count` bounds how long a worker is held. Callers draining large
    /// files should read in chunks of a few pages.
    pub async fn read(&self, count: usize) -> Result<ReadOutcome, UnitError> {
        match self.unit.ask(Request::Read(count)).await? {
            Reply::Read(outcome) => Ok(outcome),
            other => Err(other.into_error()),
        }
    }

    /// Read exactly `count` content bytes, failing if the content ends first
    pub async fn read_exact(&self, count: usize) -> Result<Bytes, UnitError> {
        let mut buffer = BytesMut::with_capacity(count);

        while buffer.len() < count {
            match self.read(count - buffer.len()).await? {
                ReadOutcome::Data(chunk) => buffer.extend_from_slice(&chunk),
                ReadOutcome::EndOfContent => {
                    return Err(UnitError::UnexpectedEof {
                        wanted: count,
                        got: buffer.len(),
                    });
                }
            }
        }

        Ok(buffer.freeze())
    }

    /// Number of content bytes not yet delivered
    pub async fn remaining(&self) -> Result<u64, UnitError> {
        match self.unit.ask(Request::Remaining).await? {
            Reply::Remaining(remaining) => Ok(remaining),
            other => Err(other.into_error()),
        }
    }

    pub async fn valid_hash(&self) -> Result<Verification, UnitError> {
        match self.unit.ask(Request::ValidHash).await? {
            Reply::Verification(verification) => Ok(verification),
            other => Err(other.into_error()),
        }
    }

    /// Release the underlying source
    ///
    /// Returns `false` if the stream was already closed.
    pub async fn close(&self) -> Result<bool, UnitError> {
        self.unit.stop().await
    }
}

struct HashStreamUnit {
    id: UnitId,
    source: ByteSource,
    remaining: u64,
    digest: Sha1,
    state: VerificationState,
}

impl HashStreamUnit {
    fn new(id: UnitId, source: ByteSource, size: u64) -> Self {
        let remaining = size.saturating_sub(TRAILER_SIZE as u64);
        let state = if remaining == 0 {
            VerificationState::Ready
        } else {
            VerificationState::Pending
        };

        HashStreamUnit {
            id,
            source,
            remaining,
            digest: Sha1::new(),
            state,
        }
    }

    fn read(&mut self, count: usize) -> Result<ReadOutcome, UnitError> {
        if self.remaining == 0 {
            return Ok(ReadOutcome::EndOfContent);
        }
        if count == 0 {
            return Ok(ReadOutcome::Data(Bytes::new()));
        }

        let wanted = self.remaining.min(count as u64) as usize;
        let mut buffer = vec![0; wanted];
        let delivered = loop {
            match self.source.read(&mut buffer) {
                Ok(delivered) => break delivered,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if delivered == 0 {
            // the source shrank underneath us
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended with {} content bytes left", self.remaining),
            )
            .into());
        }

        buffer.truncate(delivered);
        self.digest.update(&buffer);
        self.remaining -= delivered as u64;

        if self.remaining == 0 {
            self.state = VerificationState::Ready;
        }

        Ok(ReadOutcome::Data(Bytes::from(buffer)))
    }

    fn valid_hash(&mut self) -> Result<Verification, UnitError> {
        match self.state {
            VerificationState::Done => return Ok(Verification::AlreadyDone),
            VerificationState::Pending => return Ok(Verification::TooSoon),
            VerificationState::Ready => {}
        }

        // the trailer is checked once, even if reading it fails
        self.state = VerificationState::Done;

        let mut expected = [0u8; TRAILER_SIZE];
        self.source.read_exact(&mut expected)?;

        let actual = std::mem::take(&mut self.digest).finalize();
        let valid = actual.as_slice() == expected.as_slice();

        if !valid {
            warn!(unit = %self.id, "trailer does not match content digest");
        }
        debug!(unit = %self.id, valid, "trailer verified");

        Ok(Verification::Valid(valid))
    }
}

impl Behavior for HashStreamUnit {
    const KIND: UnitKind = UnitKind::HashStream;

    async fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Read(count) => self.read(count).into(),
            Request::Remaining => Reply::Remaining(self.remaining),
            Request::ValidHash => self.valid_hash().into(),
            other => unit::reject(Self::KIND, self.id, &other),
        }
    }
}
