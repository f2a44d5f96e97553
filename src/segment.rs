use crate::error::{HoardError, Result};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::freelist::FreeSlot;
use crate::header::{SegmentHeader, HEADER_LEN};
use crate::layout::{Geometry, FINGERPRINT_SIZE, HEADER_SIZE};
use crate::staging::StagingBuffer;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Prefix of every segment file name.
pub const SEGMENT_PREFIX: &str = "hoard";

/// Extension of every segment file name.
pub const SEGMENT_SUFFIX: &str = ".seg";

/// Byte used to pad a replacement payload out to its slot span.
const FILL_BYTE: u8 = 0x20;

/// File name for the segment whose first slot is `first_id`.
pub fn segment_file_name(first_id: i32) -> String {
    format!("{}{:08}{}", SEGMENT_PREFIX, first_id, SEGMENT_SUFFIX)
}

/// One capped append-only segment file.
///
/// A segment holds up to `geometry.max_slots` payloads and at most
/// `geometry.max_bytes` occupied bytes, preamble included. Slots are
/// addressed by local position; the store translates global IDs before
/// calling in. Appends accumulate in a staging buffer and only reach the
/// segment file at [`persist`](Segment::persist); positional reads hit
/// the segment file, so a slot is readable once the segment has been
/// persisted.
///
/// The in-memory region mirrors (index, status bitmap, namespace) load
/// lazily and can be dropped with
/// [`release_tables`](Segment::release_tables) to give memory back.
#[derive(Debug)]
pub struct Segment {
    /// Path of the segment file.
    path: PathBuf,

    /// Capacity parameters this file was written under.
    geometry: Geometry,

    /// The 40-byte header, kept current in memory.
    header: SegmentHeader,

    /// Occupied length in bytes, staged tail included.
    byte_len: u64,

    /// Slots appended and not tombstoned. Valid once the region mirrors
    /// have loaded.
    live_count: i32,

    file: Option<File>,
    offsets: Option<Vec<i32>>,
    status: Option<Vec<u32>>,
    namespace: Option<Vec<u8>>,
    staging: StagingBuffer,
}

impl Segment {
    /// Create a new empty segment under `dir`, named after `first_id`.
    ///
    /// A stale segment file of the same name is deleted, along with any
    /// leftover staging file. Nothing is written to disk until the first
    /// persist.
    pub fn create(first_id: i32, dir: &Path, geometry: Geometry) -> Result<Segment> {
        geometry.validate()?;
        fs::create_dir_all(dir)?;

        let path = dir.join(segment_file_name(first_id));
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let mut staging = StagingBuffer::new(&path);
        staging.discard()?;

        tracing::debug!(segment = %path.display(), first_id, "created segment");

        Ok(Segment {
            path,
            geometry,
            header: SegmentHeader::new(first_id),
            byte_len: geometry.data_offset(),
            live_count: 0,
            file: None,
            offsets: None,
            status: None,
            namespace: None,
            staging,
        })
    }

    /// Open an existing segment file.
    ///
    /// Reads the header eagerly; the region mirrors load on first use.
    /// A header whose slot count falls outside the geometry is rejected
    /// as [`HoardError::Corrupt`]. Stale staged bytes from an earlier
    /// process are discarded, since nothing indexes them.
    pub fn open(path: &Path, geometry: Geometry) -> Result<Segment> {
        geometry.validate()?;

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut buf = [0u8; HEADER_LEN];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let header = SegmentHeader::from_bytes(&buf)?;
        if header.slot_count < 0 || header.slot_count > geometry.max_slots {
            return Err(HoardError::Corrupt {
                path: path.display().to_string(),
                detail: format!(
                    "slot count {} outside 0..={}",
                    header.slot_count, geometry.max_slots
                ),
            });
        }
        let byte_len = file.metadata()?.len();

        let mut staging = StagingBuffer::new(path);
        staging.discard()?;

        tracing::debug!(
            segment = %path.display(),
            first_id = header.first_id,
            slots = header.slot_count,
            "opened segment"
        );

        Ok(Segment {
            path: path.to_path_buf(),
            geometry,
            header,
            byte_len,
            live_count: 0,
            file: Some(file),
            offsets: None,
            status: None,
            namespace: None,
            staging,
        })
    }

    /// Append a payload named `name`. Returns `Ok(false)` without
    /// changing state when the slot or byte capacity is exhausted, in
    /// which case the segment has persisted itself and the caller is
    /// expected to roll over to a successor.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<bool> {
        self.ensure_loaded()?;

        let fits = self.header.slot_count + 1 <= self.geometry.max_slots
            && self.byte_len + data.len() as u64 <= self.geometry.max_bytes;
        if !fits {
            self.persist()?;
            return Ok(false);
        }

        self.staging.append(data)?;

        let pos = self.header.slot_count as usize;
        let fp = fingerprint(name);
        if let (Some(offsets), Some(namespace)) = (self.offsets.as_mut(), self.namespace.as_mut())
        {
            offsets[pos + 1] = offsets[pos] + data.len() as i32;
            namespace[pos * FINGERPRINT_SIZE..(pos + 1) * FINGERPRINT_SIZE].copy_from_slice(&fp);
        }

        self.header.slot_count += 1;
        self.live_count += 1;
        self.byte_len += data.len() as u64;
        Ok(true)
    }

    /// Write the header and the three full-size preamble regions from
    /// byte 0, merge the staged payloads onto the tail, and sync.
    /// Idempotent when nothing is staged.
    pub fn persist(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        self.header.touch();
        self.ensure_file()?;

        let header_bytes = self.header.to_bytes();
        if let (Some(file), Some(offsets), Some(status), Some(namespace)) = (
            self.file.as_mut(),
            self.offsets.as_ref(),
            self.status.as_ref(),
            self.namespace.as_ref(),
        ) {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header_bytes)?;

            let mut index = Vec::with_capacity(offsets.len() * 4);
            for offset in offsets {
                index.extend_from_slice(&offset.to_be_bytes());
            }
            file.write_all(&index)?;

            let mut bitmap = Vec::with_capacity(status.len() * 4);
            for word in status {
                bitmap.extend_from_slice(&word.to_be_bytes());
            }
            file.write_all(&bitmap)?;

            file.write_all(namespace)?;

            self.staging.merge_into(file)?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// Read the payload at `position`. Out-of-range positions yield
    /// `Ok(None)`. Tombstones do not block positional reads.
    pub fn get(&mut self, position: i32) -> Result<Option<Vec<u8>>> {
        let (start, len) = match self.span(position)? {
            Some(span) => span,
            None => return Ok(None),
        };
        if len == 0 {
            return Ok(Some(Vec::new()));
        }

        self.ensure_file()?;
        match self.file.as_mut() {
            Some(file) => {
                file.seek(SeekFrom::Start(start as u64))?;
                let mut buf = vec![0u8; len as usize];
                file.read_exact(&mut buf)?;
                Ok(Some(buf))
            }
            None => Ok(None),
        }
    }

    /// Read the first payload whose fingerprint matches `name`, scanning
    /// slots in position order. The scan does not consult tombstones.
    pub fn get_by_name(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_loaded()?;
        let fp = fingerprint(name);
        let count = self.header.slot_count as usize;

        let found = match self.namespace.as_ref() {
            Some(namespace) => (0..count)
                .find(|&pos| namespace[pos * FINGERPRINT_SIZE..(pos + 1) * FINGERPRINT_SIZE] == fp),
            None => None,
        };
        match found {
            Some(pos) => self.get(pos as i32),
            None => Ok(None),
        }
    }

    /// Whether the slot at `position` is tombstoned. Out-of-range
    /// positions read as not deleted.
    pub fn is_deleted(&mut self, position: i32) -> Result<bool> {
        self.ensure_loaded()?;
        if position < 0 || position >= self.header.slot_count {
            return Ok(false);
        }
        let block = position as usize / 32;
        let mask = 1u32 << (position as usize % 32);
        match self.status.as_ref() {
            Some(status) => Ok(status[block] & mask != 0),
            None => Ok(false),
        }
    }

    /// Tombstone the slot at `position`. Returns `Ok(false)` only for
    /// out-of-range positions. A slot that is already tombstoned is left
    /// alone without touching the disk.
    pub fn delete(&mut self, position: i32) -> Result<bool> {
        self.ensure_loaded()?;
        if position < 0 || position >= self.header.slot_count {
            return Ok(false);
        }
        let block = position as usize / 32;
        let mask = 1u32 << (position as usize % 32);

        let word = match self.status.as_ref() {
            Some(status) => status[block],
            None => return Ok(false),
        };
        if word & mask != 0 {
            return Ok(true);
        }
        if let Some(status) = self.status.as_mut() {
            status[block] = word | mask;
        }
        self.live_count -= 1;
        self.write_status_word(block)?;
        Ok(true)
    }

    /// Clear the tombstone on the slot at `position`. Mirror image of
    /// [`delete`](Segment::delete).
    pub fn undelete(&mut self, position: i32) -> Result<bool> {
        self.ensure_loaded()?;
        if position < 0 || position >= self.header.slot_count {
            return Ok(false);
        }
        let block = position as usize / 32;
        let mask = 1u32 << (position as usize % 32);

        let word = match self.status.as_ref() {
            Some(status) => status[block],
            None => return Ok(false),
        };
        if word & mask == 0 {
            return Ok(true);
        }
        if let Some(status) = self.status.as_mut() {
            status[block] = word & !mask;
        }
        self.live_count += 1;
        self.write_status_word(block)?;
        Ok(true)
    }

    /// Overwrite the slot at `position` in place with a payload no
    /// larger than its span, padding the remainder with spaces. Clears
    /// the slot's tombstone and rewrites its fingerprint to `name`.
    /// Returns `Ok(false)` when out of range or when the payload does
    /// not fit the span. The slot's span never changes.
    pub fn replace(&mut self, position: i32, name: &str, data: &[u8]) -> Result<bool> {
        let (start, span) = match self.span(position)? {
            Some(span) => span,
            None => return Ok(false),
        };
        if data.len() as u64 > span as u64 {
            return Ok(false);
        }

        // In-place writes land in the segment file, so any staged tail
        // must reach it first to keep the data region contiguous.
        if !self.staging.is_empty() {
            self.persist()?;
        }

        let mut padded = data.to_vec();
        padded.resize(span as usize, FILL_BYTE);

        self.undelete(position)?;

        let fp = fingerprint(name);
        let fp_offset =
            self.geometry.namespace_offset() + position as u64 * FINGERPRINT_SIZE as u64;

        self.ensure_file()?;
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(start as u64))?;
            file.write_all(&padded)?;
            file.seek(SeekFrom::Start(fp_offset))?;
            file.write_all(&fp)?;
        }
        if let Some(namespace) = self.namespace.as_mut() {
            namespace[position as usize * FINGERPRINT_SIZE
                ..(position as usize + 1) * FINGERPRINT_SIZE]
                .copy_from_slice(&fp);
        }
        Ok(true)
    }

    /// Byte length of the slot at `position`, or `None` out of range.
    pub fn payload_len(&mut self, position: i32) -> Result<Option<u32>> {
        Ok(self.span(position)?.map(|(_, len)| len))
    }

    /// Fingerprint recorded for the slot at `position`.
    pub fn namespace_of(&mut self, position: i32) -> Result<Option<Fingerprint>> {
        self.ensure_loaded()?;
        if position < 0 || position >= self.header.slot_count {
            return Ok(None);
        }
        match self.namespace.as_ref() {
            Some(namespace) => {
                let mut fp = [0u8; FINGERPRINT_SIZE];
                fp.copy_from_slice(
                    &namespace
                        [position as usize * FINGERPRINT_SIZE..(position as usize + 1) * FINGERPRINT_SIZE],
                );
                Ok(Some(fp))
            }
            None => Ok(None),
        }
    }

    /// Global ID and fingerprint of every non-tombstoned slot, in
    /// position order.
    pub fn live_names(&mut self) -> Result<Vec<(i32, Fingerprint)>> {
        self.ensure_loaded()?;
        let count = self.header.slot_count as usize;
        let mut out = Vec::new();

        if let (Some(namespace), Some(status)) = (self.namespace.as_ref(), self.status.as_ref()) {
            for pos in 0..count {
                if status[pos / 32] & (1u32 << (pos % 32)) != 0 {
                    continue;
                }
                let mut fp = [0u8; FINGERPRINT_SIZE];
                fp.copy_from_slice(&namespace[pos * FINGERPRINT_SIZE..(pos + 1) * FINGERPRINT_SIZE]);
                out.push((self.header.first_id + pos as i32, fp));
            }
        }
        Ok(out)
    }

    /// Every tombstoned slot as a reclaimable free slot, in position
    /// order. Slots with inconsistent offsets are skipped.
    pub fn deleted_slots(&mut self) -> Result<Vec<FreeSlot>> {
        self.ensure_loaded()?;
        let count = self.header.slot_count as usize;
        let mut out = Vec::new();

        if let (Some(offsets), Some(status)) = (self.offsets.as_ref(), self.status.as_ref()) {
            for pos in 0..count {
                if status[pos / 32] & (1u32 << (pos % 32)) == 0 {
                    continue;
                }
                let start = offsets[pos];
                let end = offsets[pos + 1];
                if end < start {
                    continue;
                }
                out.push(FreeSlot {
                    id: self.header.first_id + pos as i32,
                    len: (end - start) as u32,
                });
            }
        }
        Ok(out)
    }

    /// Number of non-tombstoned slots.
    pub fn live_count(&mut self) -> Result<i32> {
        self.ensure_loaded()?;
        Ok(self.live_count)
    }

    /// Drop the in-memory region mirrors. They reload lazily on the
    /// next operation that needs them. Skipped while any slot exists
    /// only in memory: the mirrors of staged appends cannot be rebuilt
    /// from disk until a persist writes them.
    pub fn release_tables(&mut self) {
        let on_disk =
            self.header.slot_count == 0 || self.file.is_some() || self.path.exists();
        if !self.staging.is_empty() || !on_disk {
            return;
        }
        self.offsets = None;
        self.status = None;
        self.namespace = None;
    }

    /// Flush staged bytes to the staging file and drop the OS file
    /// handle. The segment reopens lazily on the next disk touch.
    pub fn close_file(&mut self) -> Result<()> {
        self.staging.flush()?;
        self.file = None;
        Ok(())
    }

    pub fn first_id(&self) -> i32 {
        self.header.first_id
    }

    pub fn slot_count(&self) -> i32 {
        self.header.slot_count
    }

    /// Global ID the next append would mint.
    pub fn next_id(&self) -> i32 {
        self.header.first_id + self.header.slot_count
    }

    /// Global ID of the last appended slot. One below `first_id` while
    /// the segment is empty.
    pub fn last_id(&self) -> i32 {
        self.next_id() - 1
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start offset and length of the slot at `position`, or `None`
    /// when out of range. Inconsistent offsets read as an empty slot.
    fn span(&mut self, position: i32) -> Result<Option<(i32, u32)>> {
        self.ensure_loaded()?;
        if position < 0 || position >= self.header.slot_count {
            return Ok(None);
        }
        match self.offsets.as_ref() {
            Some(offsets) => {
                let start = offsets[position as usize];
                let end = offsets[position as usize + 1];
                if end < start {
                    tracing::warn!(
                        segment = %self.path.display(),
                        position,
                        start,
                        end,
                        "inconsistent slot offsets, treating slot as missing"
                    );
                    return Ok(None);
                }
                Ok(Some((start, (end - start) as u32)))
            }
            None => Ok(None),
        }
    }

    /// Load the region mirrors from disk if absent. Short regions are
    /// tolerated: the remainder reads as zeros.
    fn ensure_loaded(&mut self) -> Result<()> {
        if self.offsets.is_some() {
            return Ok(());
        }

        let g = self.geometry;
        let mut offsets = vec![0i32; g.max_slots as usize + 1];
        offsets[0] = g.data_offset() as i32;
        let mut status = vec![0u32; g.status_words()];
        let mut namespace = vec![0u8; g.namespace_size() as usize];

        if self.header.slot_count > 0 {
            self.ensure_file()?;
            if let Some(file) = self.file.as_mut() {
                let raw = read_region(file, HEADER_SIZE, g.index_size() as usize, "index", &self.path)?;
                for (i, chunk) in raw.chunks_exact(4).enumerate() {
                    let mut b4 = [0u8; 4];
                    b4.copy_from_slice(chunk);
                    offsets[i] = i32::from_be_bytes(b4);
                }

                let raw = read_region(
                    file,
                    g.status_offset(),
                    g.status_size() as usize,
                    "status",
                    &self.path,
                )?;
                for (i, chunk) in raw.chunks_exact(4).enumerate() {
                    let mut b4 = [0u8; 4];
                    b4.copy_from_slice(chunk);
                    status[i] = u32::from_be_bytes(b4);
                }

                namespace = read_region(
                    file,
                    g.namespace_offset(),
                    g.namespace_size() as usize,
                    "namespace",
                    &self.path,
                )?;
            }

            let mut live = 0;
            for pos in 0..self.header.slot_count as usize {
                if status[pos / 32] & (1u32 << (pos % 32)) == 0 {
                    live += 1;
                }
            }
            self.live_count = live;
        } else {
            self.byte_len = g.data_offset();
            self.live_count = 0;
        }

        self.offsets = Some(offsets);
        self.status = Some(status);
        self.namespace = Some(namespace);
        Ok(())
    }

    fn ensure_file(&mut self) -> Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        Ok(())
    }

    /// Write one status word at its absolute file offset. Skipped while
    /// the segment file does not exist; the full region lands at the
    /// next persist.
    fn write_status_word(&mut self, block: usize) -> Result<()> {
        if self.file.is_none() && !self.path.exists() {
            return Ok(());
        }
        let word = match self.status.as_ref() {
            Some(status) => status[block],
            None => return Ok(()),
        };
        let offset = self.geometry.status_offset() + block as u64 * 4;

        self.ensure_file()?;
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&word.to_be_bytes())?;
        }
        Ok(())
    }
}

/// Read up to `len` bytes at `offset`, zero-filling and warning when the
/// file ends early. I/O faults other than EOF still fail the read.
fn read_region(
    file: &mut File,
    offset: u64,
    len: usize,
    region: &str,
    path: &Path,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < len {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled < len {
        tracing::warn!(
            segment = %path.display(),
            region,
            expected = len,
            got = filled,
            "short region read, zero-filling the remainder"
        );
    }
    Ok(buf)
}
