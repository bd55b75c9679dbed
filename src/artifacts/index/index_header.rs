use crate::artifacts::checksum::{HashStream, TrailerHashed};
use crate::artifacts::index::{HEADER_SIZE, SIGNATURE, VERSION};
use anyhow::{Context, anyhow};
use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};
use derive_new::new;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub marker: String,
    pub version: u32,
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn empty() -> Self {
        IndexHeader {
            marker: String::from(SIGNATURE),
            version: VERSION,
            entries_count: 0,
        }
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.write_all(self.marker.as_bytes())?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.version)?;
        bytes.write_u32::<byteorder::NetworkEndian>(self.entries_count)?;

        Ok(Bytes::from(bytes))
    }
}

impl TrailerHashed for IndexHeader {
    /// Reads the fixed-size header off the front of the content region
    async fn parse(stream: &HashStream) -> anyhow::Result<Self> {
        let mut header = stream
            .read_exact(HEADER_SIZE)
            .await
            .context("Unexpected end-of-file while reading index header")?;

        let marker = header.split_to(SIGNATURE.len());
        if marker != SIGNATURE.as_bytes() {
            return Err(anyhow!("Invalid index file signature"));
        }

        let version = header.get_u32();
        if version != VERSION {
            return Err(anyhow!("Unsupported index file version: {}", version));
        }

        Ok(IndexHeader {
            marker: String::from(SIGNATURE),
            version,
            entries_count: header.get_u32(),
        })
    }
}
