use crate::error::{HoardError, Result};
use crate::layout::HEADER_SIZE;
use chrono::Utc;

/// Header length in bytes, as a usize for buffer work.
pub const HEADER_LEN: usize = HEADER_SIZE as usize;

/// Segment file header, the first 40 bytes of every segment.
///
/// Field order on disk: firstId (i32), slotCount (i32), creation time
/// (i64, ms since epoch), update time (i64, ms since epoch), then a
/// 16-byte reserved digest region written as zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Global ID of slot 0 in this segment.
    pub first_id: i32,

    /// Number of slots appended so far, live or tombstoned.
    pub slot_count: i32,

    /// Creation timestamp, milliseconds since the epoch.
    pub created_ms: i64,

    /// Last persist timestamp, milliseconds since the epoch.
    pub updated_ms: i64,
}

impl SegmentHeader {
    /// Fresh header for a new segment starting at `first_id`.
    pub fn new(first_id: i32) -> Self {
        let now = Utc::now().timestamp_millis();
        SegmentHeader {
            first_id,
            slot_count: 0,
            created_ms: now,
            updated_ms: now,
        }
    }

    /// Refresh the update timestamp.
    pub fn touch(&mut self) {
        self.updated_ms = Utc::now().timestamp_millis();
    }

    /// Serialize to the fixed 40-byte on-disk form, big-endian.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.first_id.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.slot_count.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.created_ms.to_be_bytes());
        bytes[16..24].copy_from_slice(&self.updated_ms.to_be_bytes());
        // Bytes 24..40 stay zero: reserved for a future content digest.
        bytes
    }

    /// Deserialize from the on-disk form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(HoardError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "insufficient bytes for segment header",
            )));
        }

        let mut b4 = [0u8; 4];
        let mut b8 = [0u8; 8];

        b4.copy_from_slice(&bytes[0..4]);
        let first_id = i32::from_be_bytes(b4);

        b4.copy_from_slice(&bytes[4..8]);
        let slot_count = i32::from_be_bytes(b4);

        b8.copy_from_slice(&bytes[8..16]);
        let created_ms = i64::from_be_bytes(b8);

        b8.copy_from_slice(&bytes[16..24]);
        let updated_ms = i64::from_be_bytes(b8);

        Ok(SegmentHeader {
            first_id,
            slot_count,
            created_ms,
            updated_ms,
        })
    }
}
