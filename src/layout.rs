use crate::error::{HoardError, Result};

/// Slot capacity of a segment at standard geometry.
pub const MAX_SLOTS: i32 = 32768;

/// Byte capacity of a segment file at standard geometry (64 MiB).
pub const MAX_BYTES: u64 = 64 * 1024 * 1024;

/// Fixed size of the segment header region in bytes.
pub const HEADER_SIZE: u64 = 40;

/// Bytes of name fingerprint stored per slot.
pub const FINGERPRINT_SIZE: usize = 16;

/// Capacity parameters of a segment file and the region offsets that
/// follow from them.
///
/// A segment file is laid out as five contiguous regions:
///
/// ```text
/// ┌──────────────────────────────────────────────┐
/// │ Header     40 B   firstId, slotCount, times  │
/// ├──────────────────────────────────────────────┤
/// │ Index      (maxSlots + 1) × 4 B   offsets    │
/// ├──────────────────────────────────────────────┤
/// │ Status     ⌈maxSlots / 32⌉ × 4 B  tombstones │
/// ├──────────────────────────────────────────────┤
/// │ Namespace  maxSlots × 16 B   fingerprints    │
/// ├──────────────────────────────────────────────┤
/// │ Data       payloads, back to back            │
/// └──────────────────────────────────────────────┘
/// ```
///
/// All multi-byte integers are big-endian. At standard geometry the data
/// region starts at byte 659500. A file is only readable under the
/// geometry it was written with; the geometry is configuration, not file
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Maximum number of slots a segment can hold.
    pub max_slots: i32,

    /// Maximum occupied length of a segment file in bytes. The preamble
    /// regions count against this cap.
    pub max_bytes: u64,
}

impl Geometry {
    pub const fn new(max_slots: i32, max_bytes: u64) -> Self {
        Geometry {
            max_slots,
            max_bytes,
        }
    }

    /// The compiled-in default: 32768 slots, 64 MiB.
    pub const fn standard() -> Self {
        Geometry::new(MAX_SLOTS, MAX_BYTES)
    }

    /// Check that the capacities describe a usable segment.
    ///
    /// Offsets are stored as 32-bit integers, so `max_bytes` may not
    /// exceed `i32::MAX`, and the byte cap must leave room for at least
    /// one payload byte past the preamble.
    pub fn validate(&self) -> Result<()> {
        if self.max_slots < 1 {
            return Err(HoardError::InvalidGeometry(format!(
                "max_slots must be at least 1, got {}",
                self.max_slots
            )));
        }
        if self.max_bytes > i32::MAX as u64 {
            return Err(HoardError::InvalidGeometry(format!(
                "max_bytes {} exceeds the 32-bit offset range",
                self.max_bytes
            )));
        }
        if self.max_bytes <= self.data_offset() {
            return Err(HoardError::InvalidGeometry(format!(
                "max_bytes {} leaves no data room past the {} byte preamble",
                self.max_bytes,
                self.data_offset()
            )));
        }
        Ok(())
    }

    /// Size of the index region: one 4-byte offset per slot, plus one.
    pub fn index_size(&self) -> u64 {
        (self.max_slots as u64 + 1) * 4
    }

    /// Number of 32-bit words in the status bitmap.
    pub fn status_words(&self) -> usize {
        (self.max_slots as usize + 31) / 32
    }

    /// Size of the status region in bytes, whole words.
    pub fn status_size(&self) -> u64 {
        self.status_words() as u64 * 4
    }

    /// Size of the namespace region: one fingerprint per slot.
    pub fn namespace_size(&self) -> u64 {
        self.max_slots as u64 * FINGERPRINT_SIZE as u64
    }

    pub fn status_offset(&self) -> u64 {
        HEADER_SIZE + self.index_size()
    }

    pub fn namespace_offset(&self) -> u64 {
        self.status_offset() + self.status_size()
    }

    /// First byte of the data region, which is also the size of the
    /// preamble written by every persist.
    pub fn data_offset(&self) -> u64 {
        self.namespace_offset() + self.namespace_size()
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::standard()
    }
}
