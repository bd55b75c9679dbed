//! Trailer-hashed files
//!
//! Several on-disk formats end with a SHA-1 digest of everything that precedes it:
//!
//! ```text
//! +------------------------------+----------------------+
//! | content (size - 20 bytes)    | SHA-1(content) (20)  |
//! +------------------------------+----------------------+
//! ```
//!
//! [`HashStream`] hands out the content region only, hashing it as it goes, and
//! checks the trailer once the content has been consumed.

pub mod hash_stream;
pub(crate) mod source;

pub use hash_stream::{HashStream, ReadOutcome, Verification};

/// Size of the SHA-1 trailer in bytes
pub const TRAILER_SIZE: usize = 20;

/// A format that can be parsed from the content region of a trailer-hashed file
///
/// Parsers only ever go through [`HashStream::read`] (or helpers built on it) and
/// never touch the trailer themselves.
pub trait TrailerHashed: Sized {
    fn parse(stream: &HashStream) -> impl Future<Output = anyhow::Result<Self>> + Send;
}
