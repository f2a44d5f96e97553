use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::freelist::FreeSlot;
use crate::segment::Segment;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::path::PathBuf;

/// Interior mutability wrapper chosen by the store's threading mode.
///
/// `Shared` guards the segment with a mutex. `Direct` trades the lock
/// for a `RefCell`, which keeps the store `!Sync` in single-thread mode
/// so misuse across threads fails to compile instead of corrupting a
/// segment.
#[derive(Debug)]
pub enum SegmentCell {
    Shared(Mutex<Segment>),
    Direct(RefCell<Segment>),
}

impl SegmentCell {
    pub fn new(segment: Segment, thread_safe: bool) -> SegmentCell {
        if thread_safe {
            SegmentCell::Shared(Mutex::new(segment))
        } else {
            SegmentCell::Direct(RefCell::new(segment))
        }
    }

    /// Run `f` with exclusive access to the segment.
    pub fn with<R>(&self, f: impl FnOnce(&mut Segment) -> R) -> R {
        match self {
            SegmentCell::Shared(mutex) => f(&mut mutex.lock()),
            SegmentCell::Direct(cell) => f(&mut cell.borrow_mut()),
        }
    }
}

/// A segment plus the global-ID arithmetic in front of it.
///
/// Segments count slots from zero; the store addresses objects by
/// global ID. The handle caches `first_id` so routing can compare
/// ranges without taking the segment lock, and translates IDs to local
/// positions on the way in.
#[derive(Debug)]
pub struct SegmentHandle {
    first_id: i32,
    cell: SegmentCell,
}

impl SegmentHandle {
    pub fn new(segment: Segment, thread_safe: bool) -> SegmentHandle {
        SegmentHandle {
            first_id: segment.first_id(),
            cell: SegmentCell::new(segment, thread_safe),
        }
    }

    fn translate(&self, id: i32) -> i32 {
        id - self.first_id
    }

    /// First global ID this segment covers. Lock-free.
    pub fn first_id(&self) -> i32 {
        self.first_id
    }

    /// Last global ID currently appended, `first_id - 1` when empty.
    pub fn last_id(&self) -> i32 {
        self.cell.with(|seg| seg.last_id())
    }

    /// Global ID the next append to this segment would mint.
    pub fn next_id(&self) -> i32 {
        self.cell.with(|seg| seg.next_id())
    }

    pub fn append(&self, name: &str, data: &[u8]) -> Result<bool> {
        self.cell.with(|seg| seg.append(name, data))
    }

    pub fn get(&self, id: i32) -> Result<Option<Vec<u8>>> {
        let pos = self.translate(id);
        self.cell.with(|seg| seg.get(pos))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.cell.with(|seg| seg.get_by_name(name))
    }

    pub fn replace(&self, id: i32, name: &str, data: &[u8]) -> Result<bool> {
        let pos = self.translate(id);
        self.cell.with(|seg| seg.replace(pos, name, data))
    }

    pub fn is_deleted(&self, id: i32) -> Result<bool> {
        let pos = self.translate(id);
        self.cell.with(|seg| seg.is_deleted(pos))
    }

    /// Tombstone `id`. Returns the freed slot on a live-to-deleted
    /// transition and `None` when the slot was already tombstoned or
    /// out of range, so the caller never double-counts a reclaim.
    pub fn delete(&self, id: i32) -> Result<Option<FreeSlot>> {
        let pos = self.translate(id);
        self.cell.with(|seg| {
            let len = match seg.payload_len(pos)? {
                Some(len) => len,
                None => return Ok(None),
            };
            if seg.is_deleted(pos)? {
                return Ok(None);
            }
            if !seg.delete(pos)? {
                return Ok(None);
            }
            Ok(Some(FreeSlot { id, len }))
        })
    }

    /// Clear the tombstone on `id`. Returns the slot's fingerprint on a
    /// deleted-to-live transition and `None` when nothing changed.
    pub fn undelete(&self, id: i32) -> Result<Option<Fingerprint>> {
        let pos = self.translate(id);
        self.cell.with(|seg| {
            if !seg.is_deleted(pos)? {
                return Ok(None);
            }
            seg.undelete(pos)?;
            seg.namespace_of(pos)
        })
    }

    pub fn namespace_of(&self, id: i32) -> Result<Option<Fingerprint>> {
        let pos = self.translate(id);
        self.cell.with(|seg| seg.namespace_of(pos))
    }

    pub fn payload_len(&self, id: i32) -> Result<Option<u32>> {
        let pos = self.translate(id);
        self.cell.with(|seg| seg.payload_len(pos))
    }

    pub fn persist(&self) -> Result<()> {
        self.cell.with(|seg| seg.persist())
    }

    pub fn close_file(&self) -> Result<()> {
        self.cell.with(|seg| seg.close_file())
    }

    pub fn release_tables(&self) {
        self.cell.with(|seg| seg.release_tables())
    }

    pub fn live_count(&self) -> Result<i32> {
        self.cell.with(|seg| seg.live_count())
    }

    pub fn live_names(&self) -> Result<Vec<(i32, Fingerprint)>> {
        self.cell.with(|seg| seg.live_names())
    }

    pub fn deleted_slots(&self) -> Result<Vec<FreeSlot>> {
        self.cell.with(|seg| seg.deleted_slots())
    }

    pub fn path(&self) -> PathBuf {
        self.cell.with(|seg| seg.path().to_path_buf())
    }
}
