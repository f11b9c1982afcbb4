//! # Stored Record Format
//!
//! Binary encoding of one raw record in the local store.
//!
//! Format: Header (5 bytes) + postcard-serialized `StoredRecord`.
//! - 4 bytes: Magic ("PUPD")
//! - 1 byte: Version
//!
//! postcard is not self-describing, so the free-form document body is
//! carried as JSON text inside the postcard payload.
//!
//! Size is validated before any payload is parsed.

use crate::extractor::RawRecord;
use crate::primitives::{self, MAX_RECORD_SIZE};
use crate::PupdatesError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header that precedes every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl RecordHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), PupdatesError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(PupdatesError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(PupdatesError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PupdatesError> {
        match bytes {
            [a, b, c, d, version, ..] => Ok(Self {
                magic: [*a, *b, *c, *d],
                version: *version,
            }),
            _ => Err(PupdatesError::SerializationError(
                "Header too short".to_string(),
            )),
        }
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// PAYLOAD
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    partition: String,
    written_at: Option<NaiveDateTime>,
    document_json: String,
}

/// Encode a record (header + payload).
pub fn encode_record(record: &RawRecord) -> Result<Vec<u8>, PupdatesError> {
    let stored = StoredRecord {
        partition: record.partition.clone(),
        written_at: record.written_at,
        document_json: serde_json::to_string(&record.document)
            .map_err(|e| PupdatesError::SerializationError(e.to_string()))?,
    };

    let payload = postcard::to_stdvec(&stored)
        .map_err(|e| PupdatesError::SerializationError(e.to_string()))?;

    if HEADER_SIZE + payload.len() > MAX_RECORD_SIZE {
        return Err(PupdatesError::SerializationError(format!(
            "Record too large: {} bytes exceeds maximum of {} bytes",
            HEADER_SIZE + payload.len(),
            MAX_RECORD_SIZE
        )));
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&RecordHeader::new().to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a record produced by `encode_record`.
pub fn decode_record(bytes: &[u8]) -> Result<RawRecord, PupdatesError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(PupdatesError::SerializationError(format!(
            "Record too large: {} bytes exceeds maximum of {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    RecordHeader::from_bytes(bytes)?.validate()?;

    let payload = bytes.get(HEADER_SIZE..).unwrap_or_default();
    let stored: StoredRecord = postcard::from_bytes(payload)
        .map_err(|e| PupdatesError::SerializationError(e.to_string()))?;
    let document = serde_json::from_str(&stored.document_json)
        .map_err(|e| PupdatesError::SerializationError(e.to_string()))?;

    Ok(RawRecord {
        partition: stored.partition,
        written_at: stored.written_at,
        document,
    })
}
