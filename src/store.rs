use crate::compression::{self, CompressionMethod};
use crate::error::{HoardError, Result};
use crate::fingerprint::fingerprint;
use crate::freelist::FreeList;
use crate::handle::SegmentHandle;
use crate::layout::Geometry;
use crate::namemap::NameMap;
use crate::segment::{Segment, SEGMENT_PREFIX, SEGMENT_SUFFIX};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Construction-time knobs for a [`Store`].
///
/// Defaults to thread-safe segments, no compression, and the standard
/// segment geometry.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Guard each segment with a real lock. Turning this off swaps the
    /// lock for a `RefCell`, which is cheaper but assumes one caller
    /// at a time per segment.
    pub thread_safe: bool,

    /// Applied to every payload on the way in and undone on the way
    /// out. Enabling compression disables free-slot reclamation, since
    /// compressed payloads no longer have a stable size to fit back
    /// into a reserved span.
    pub compression: CompressionMethod,

    /// Capacity parameters for every segment this store creates.
    pub geometry: Geometry,
}

impl StoreOptions {
    pub fn thread_safe(mut self, thread_safe: bool) -> StoreOptions {
        self.thread_safe = thread_safe;
        self
    }

    pub fn compression(mut self, compression: CompressionMethod) -> StoreOptions {
        self.compression = compression;
        self
    }

    pub fn geometry(mut self, geometry: Geometry) -> StoreOptions {
        self.geometry = geometry;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> StoreOptions {
        StoreOptions {
            thread_safe: true,
            compression: CompressionMethod::None,
            geometry: Geometry::standard(),
        }
    }
}

/// Shared state behind the store lock.
///
/// The free list, name map, segment collection, and ID counter move
/// together on every mutation, so one lock covers them all. Segment
/// cells carry their own lock besides, which lets [`Store::close`]
/// and the per-segment ops stay independent of this struct.
#[derive(Debug)]
struct StoreInner {
    /// Segments ascending by `first_id`.
    handles: Vec<SegmentHandle>,
    names: NameMap,
    free: FreeList,
    /// IDs tombstoned during this session, in delete order.
    deleted_ids: Vec<i32>,
    next_id: i32,
    total: i64,
}

impl StoreInner {
    /// Index of the segment whose ID range contains `id`. IDs falling
    /// into a gap left by a skipped segment resolve to `None`.
    fn route(&self, id: i32) -> Option<usize> {
        if id < 0 {
            return None;
        }
        let mut first = 0usize;
        let mut last = self.handles.len();
        while first < last {
            let mid = first + (last - first) / 2;
            let handle = &self.handles[mid];
            if id < handle.first_id() {
                last = mid;
            } else if id > handle.last_id() {
                first = mid + 1;
            } else {
                return Some(mid);
            }
        }
        None
    }

    /// Raw stored bytes for `id`, still compressed if the store
    /// compresses. Tombstones do not block reads by ID.
    fn fetch(&self, id: i32) -> Result<Option<Vec<u8>>> {
        if id < 0 || id >= self.next_id {
            return Ok(None);
        }
        match self.route(id) {
            Some(idx) => self.handles[idx].get(id),
            None => Ok(None),
        }
    }

    /// Tombstone `id` and run the bookkeeping that goes with a
    /// live-to-deleted transition. Resolvable IDs answer `true` even
    /// when already tombstoned, in which case nothing changes.
    fn delete_by_id(&mut self, id: i32, reclaim: bool) -> Result<bool> {
        let idx = match self.route(id) {
            Some(idx) => idx,
            None => return Ok(false),
        };
        if let Some(slot) = self.handles[idx].delete(id)? {
            if reclaim {
                self.free.insert(slot);
            }
            self.deleted_ids.push(id);
            self.names.remove_by_id(id);
            tracing::debug!(id, len = slot.len, "tombstoned object");
        }
        Ok(true)
    }

    fn push_segment(&mut self, dir: &Path, options: &StoreOptions) -> Result<()> {
        let segment = Segment::create(self.next_id, dir, options.geometry)?;
        self.handles
            .push(SegmentHandle::new(segment, options.thread_safe));
        Ok(())
    }

    /// Append to the tail segment, creating the first segment on
    /// demand. `Ok(false)` means the tail is out of capacity.
    fn append_tail(
        &mut self,
        name: &str,
        payload: &[u8],
        dir: &Path,
        options: &StoreOptions,
    ) -> Result<bool> {
        if self.handles.is_empty() {
            self.push_segment(dir, options)?;
        }
        match self.handles.last() {
            Some(handle) => handle.append(name, payload),
            None => Ok(false),
        }
    }
}

/// An embedded store packing many small named payloads into capped
/// segment files under one directory.
///
/// Objects are addressed two ways: by the monotonically increasing
/// global ID minted at insertion, or by name through an in-memory
/// fingerprint map. IDs are never reassigned; deleting an object
/// tombstones its slot and, when compression is off, queues the slot's
/// byte span for reuse by a later insertion that fits.
///
/// # Examples
///
/// ```
/// use hoard_rs::Store;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = Store::create(dir.path()).unwrap();
///
/// let id = store.add_file("greeting.txt", b"hello").unwrap();
/// store.optimize().unwrap(); // staged appends become readable here
/// assert_eq!(store.search_file(id).unwrap(), Some(b"hello".to_vec()));
/// assert_eq!(
///     store.search_file_by_name("greeting.txt").unwrap(),
///     Some(b"hello".to_vec()),
/// );
/// store.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    options: StoreOptions,
    inner: Mutex<StoreInner>,
}

impl Store {
    /// Create an empty store under `dir` with default options. The
    /// directory is created if absent.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Store> {
        Store::create_with(dir, StoreOptions::default())
    }

    pub fn create_with<P: AsRef<Path>>(dir: P, options: StoreOptions) -> Result<Store> {
        options.geometry.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        tracing::debug!(dir = %dir.display(), "created store");
        Ok(Store {
            dir,
            options,
            inner: Mutex::new(StoreInner {
                handles: Vec::new(),
                names: NameMap::new(),
                free: FreeList::new(),
                deleted_ids: Vec::new(),
                next_id: 0,
                total: 0,
            }),
        })
    }

    /// Load the store persisted under `dir` with default options.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Store> {
        Store::load_with(dir, StoreOptions::default())
    }

    /// Load the store persisted under `dir`.
    ///
    /// Segment files are discovered recursively and opened in
    /// ascending ID order; a file that cannot be opened is skipped
    /// with a warning, leaving a routing gap for its IDs. When
    /// reclamation is active (compression off), every segment's
    /// tombstone bitmap and namespace table are scanned to rebuild the
    /// free-slot list and the name map; with compression on, the scan
    /// is skipped and previously freed slots stay unreclaimed.
    pub fn load_with<P: AsRef<Path>>(dir: P, options: StoreOptions) -> Result<Store> {
        options.geometry.validate()?;
        let dir = dir.as_ref().to_path_buf();
        let reclaim = !options.compression.is_enabled();

        let mut handles = Vec::new();
        for path in collect_segment_paths(&dir)? {
            match Segment::open(&path, options.geometry) {
                Ok(segment) => handles.push(SegmentHandle::new(segment, options.thread_safe)),
                Err(e) => {
                    tracing::warn!(segment = %path.display(), error = %e, "skipping unreadable segment")
                }
            }
        }
        handles.sort_by_key(|h| h.first_id());

        let mut names = NameMap::new();
        let mut free = FreeList::new();
        let mut total: i64 = 0;
        for handle in &handles {
            total += handle.live_count()? as i64;
            if reclaim {
                for (id, fp) in handle.live_names()? {
                    names.insert(fp, id);
                }
                for slot in handle.deleted_slots()? {
                    free.insert(slot);
                }
            }
        }
        let next_id = handles.last().map(|h| h.next_id()).unwrap_or(0);

        tracing::info!(
            dir = %dir.display(),
            segments = handles.len(),
            objects = total,
            next_id,
            "loaded store"
        );
        Ok(Store {
            dir,
            options,
            inner: Mutex::new(StoreInner {
                handles,
                names,
                free,
                deleted_ids: Vec::new(),
                next_id,
                total,
            }),
        })
    }

    /// Insert `data` under `name` and return the object's global ID.
    ///
    /// A name that is already registered is shadow-overwritten: its
    /// current mapping is deleted first, then the insertion proceeds as
    /// usual, so the name resolves to the result of this call while the
    /// old ID stays readable until its bytes are reused. When
    /// reclamation is active, the payload is first fitted into the
    /// smallest adequate freed slot; otherwise it is appended to the
    /// tail segment, rolling over to a fresh segment when the tail is
    /// out of capacity.
    ///
    /// Fails with [`HoardError::ObjectTooLarge`] when the payload
    /// exceeds what one empty segment can hold.
    pub fn add_file(&self, name: &str, data: &[u8]) -> Result<i32> {
        let payload = compression::compress(data, self.options.compression)?;
        let reclaim = !self.options.compression.is_enabled();
        let fp = fingerprint(name);
        let mut inner = self.inner.lock();

        if let Some(old_id) = inner.names.get(&fp) {
            inner.delete_by_id(old_id, reclaim)?;
        }

        if reclaim {
            if let Some(slot) = inner.free.take_fit(payload.len() as u32) {
                let reused = match inner.route(slot.id) {
                    Some(idx) => inner.handles[idx].replace(slot.id, name, &payload)?,
                    None => false,
                };
                if reused {
                    inner.names.insert(fp, slot.id);
                    tracing::debug!(id = slot.id, name, "reused freed slot");
                    return Ok(slot.id);
                }
                inner.free.insert(slot);
            }
        }

        if !inner.append_tail(name, &payload, &self.dir, &self.options)? {
            inner.push_segment(&self.dir, &self.options)?;
            if !inner.append_tail(name, &payload, &self.dir, &self.options)? {
                // Not even a fresh segment fits it. Drop the segment
                // again; its refusal already persisted an empty file.
                if let Some(dead) = inner.handles.pop() {
                    let _ = fs::remove_file(dead.path());
                }
                return Err(HoardError::ObjectTooLarge {
                    len: payload.len(),
                    max: self.options.geometry.max_bytes - self.options.geometry.data_offset(),
                });
            }
        }

        let id = inner.next_id;
        inner.names.insert(fp, id);
        inner.total += 1;
        inner.next_id = match inner.handles.last() {
            Some(handle) => handle.next_id(),
            None => id + 1,
        };
        Ok(id)
    }

    /// Payload stored under `id`, decompressed if the store
    /// compresses. `None` for IDs never minted or lost to a skipped
    /// segment. Reads by ID do not consult tombstones, so a deleted
    /// object stays readable until its bytes are reused.
    pub fn search_file(&self, id: i32) -> Result<Option<Vec<u8>>> {
        let raw = self.inner.lock().fetch(id)?;
        match raw {
            Some(bytes) => Ok(Some(compression::decompress(
                &bytes,
                self.options.compression,
            )?)),
            None => Ok(None),
        }
    }

    /// Payload stored under `name`, or `None` when the name is not
    /// currently mapped.
    pub fn search_file_by_name(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let raw = {
            let inner = self.inner.lock();
            match inner.names.get(&fingerprint(name)) {
                Some(id) => inner.fetch(id)?,
                None => None,
            }
        };
        match raw {
            Some(bytes) => Ok(Some(compression::decompress(
                &bytes,
                self.options.compression,
            )?)),
            None => Ok(None),
        }
    }

    /// Tombstone the object under `id`, unregister its name, and queue
    /// its slot for reuse when reclamation is active. `false` when the
    /// ID routes to no segment; `true` otherwise, including for an
    /// already-deleted ID, which changes nothing.
    pub fn delete_file(&self, id: i32) -> Result<bool> {
        let reclaim = !self.options.compression.is_enabled();
        self.inner.lock().delete_by_id(id, reclaim)
    }

    /// [`delete_file`](Store::delete_file) by name. `false` when the
    /// name is not currently mapped.
    pub fn delete_file_by_name(&self, name: &str) -> Result<bool> {
        let reclaim = !self.options.compression.is_enabled();
        let mut inner = self.inner.lock();
        match inner.names.get(&fingerprint(name)) {
            Some(id) => inner.delete_by_id(id, reclaim),
            None => Ok(false),
        }
    }

    /// Clear the tombstone on `id` and restore its bookkeeping: the
    /// slot leaves the free list, the ID leaves the session's deleted
    /// list, and the stored fingerprint maps to this ID again. `false`
    /// when the ID routes to no segment.
    pub fn undelete_file(&self, id: i32) -> Result<bool> {
        let mut inner = self.inner.lock();
        let idx = match inner.route(id) {
            Some(idx) => idx,
            None => return Ok(false),
        };
        if let Some(fp) = inner.handles[idx].undelete(id)? {
            inner.free.remove_id(id);
            inner.deleted_ids.retain(|&deleted| deleted != id);
            inner.names.insert(fp, id);
            tracing::debug!(id, "restored object");
        }
        Ok(true)
    }

    /// Whether `id` is currently tombstoned. Unroutable IDs read as
    /// not deleted.
    pub fn is_deleted(&self, id: i32) -> Result<bool> {
        let inner = self.inner.lock();
        match inner.route(id) {
            Some(idx) => inner.handles[idx].is_deleted(id),
            None => Ok(false),
        }
    }

    /// Whether `name` currently maps to an object.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().names.contains(&fingerprint(name))
    }

    /// Global ID currently mapped to `name`.
    pub fn name_to_id(&self, name: &str) -> Option<i32> {
        self.inner.lock().names.get(&fingerprint(name))
    }

    /// Persist the tail segment, making its staged appends durable and
    /// readable. No-op on a store with no segments.
    pub fn optimize(&self) -> Result<()> {
        let inner = self.inner.lock();
        match inner.handles.last() {
            Some(handle) => handle.persist(),
            None => Ok(()),
        }
    }

    /// Drop every segment's in-memory tables. They reload lazily.
    pub fn release_tables(&self) {
        let inner = self.inner.lock();
        for handle in &inner.handles {
            handle.release_tables();
        }
    }

    /// Persist the tail segment and close every segment's file handle,
    /// consuming the store.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner();
        if let Some(handle) = inner.handles.last() {
            handle.persist()?;
        }
        for handle in &inner.handles {
            handle.close_file()?;
        }
        tracing::debug!(dir = %self.dir.display(), "closed store");
        Ok(())
    }

    /// Objects inserted and still counted. Deletions do not decrement
    /// this during a session; a reload recounts live objects.
    pub fn total_objects(&self) -> i64 {
        self.inner.lock().total
    }

    /// Global ID the next insertion will mint.
    pub fn next_id(&self) -> i32 {
        self.inner.lock().next_id
    }

    /// Highest global ID appended so far, `None` for a store that has
    /// never appended.
    pub fn last_id(&self) -> Option<i32> {
        let inner = self.inner.lock();
        inner.handles.last().map(|handle| handle.last_id())
    }

    pub fn segment_count(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// IDs tombstoned during this session, in delete order.
    pub fn deleted_ids(&self) -> Vec<i32> {
        self.inner.lock().deleted_ids.clone()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// All segment files under `dir`, recursively, sorted by path. The
/// zero-padded naming makes the path order the ID order.
fn collect_segment_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    walk_segments(dir, &mut paths)?;
    paths.sort();
    Ok(paths)
}

fn walk_segments(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_segments(&path, out)?;
        } else if is_segment_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_segment_file(path: &Path) -> bool {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name.starts_with(SEGMENT_PREFIX) && name.ends_with(SEGMENT_SUFFIX),
        None => false,
    }
}
