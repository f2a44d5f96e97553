//! Hoard Small-Object Store
//!
//! An embedded store that packs huge numbers of small named byte
//! payloads into a handful of capped append-only segment files, for
//! workloads where one file per object would drown the filesystem.
//!
//! ## Features
//!
//! - **Capped segments**: up to 32 768 objects or 64 MiB per file,
//!   with automatic rollover to the next segment
//! - **Global IDs**: sequential across segments, assigned once and
//!   never reused, resolved by ID-range binary search
//! - **Name lookup** through MD5 fingerprints and a bidirectional
//!   name map, with shadow-overwrite on re-added names
//! - **Tombstone deletes** flipping single status bits, plus undelete
//! - **Free-slot reclamation**: deleted spans are size-sorted and
//!   refilled in place by later insertions that fit
//! - **Staged appends** merged onto the segment tail at persist time
//!   with a file-level copy
//! - **Optional LZ4/Zstd compression**, and a [`TextStore`] wrapper
//!   for UTF-8 payloads
//!
//! ## Segment Layout
//!
//! Every segment file carries four fixed-size regions followed by the
//! packed payload bytes. Offsets below are for the standard geometry;
//! all integers are big-endian.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (40 B @ 0)                           │
//! │  - first ID, slot count                     │
//! │  - creation / update timestamps             │
//! ├─────────────────────────────────────────────┤
//! │ Index (131 076 B @ 40)                      │
//! │  - 32 769 i32 offsets, one per slot + end   │
//! ├─────────────────────────────────────────────┤
//! │ Status (4 096 B @ 131 116)                  │
//! │  - one tombstone bit per slot               │
//! ├─────────────────────────────────────────────┤
//! │ Namespace (524 288 B @ 135 212)             │
//! │  - 16-byte name fingerprint per slot        │
//! ├─────────────────────────────────────────────┤
//! │ Data (@ 659 500)                            │
//! │  - payload bytes, back to back              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use hoard_rs::{Store, StoreOptions, CompressionMethod};
//!
//! let dir = tempfile::tempdir().unwrap();
//!
//! // Create a compressing store and insert a couple of objects.
//! let options = StoreOptions::default().compression(CompressionMethod::Lz4);
//! let store = Store::create_with(dir.path(), options).unwrap();
//!
//! let a = store.add_file("a.txt", b"hello").unwrap();
//! let b = store.add_file("b.txt", b"world!").unwrap();
//! assert_eq!((a, b), (0, 1));
//!
//! // Staged appends become readable once persisted.
//! store.optimize().unwrap();
//! assert_eq!(store.search_file(a).unwrap(), Some(b"hello".to_vec()));
//! assert_eq!(
//!     store.search_file_by_name("b.txt").unwrap(),
//!     Some(b"world!".to_vec()),
//! );
//!
//! // Tombstone and restore.
//! store.delete_file(a).unwrap();
//! assert!(store.is_deleted(a).unwrap());
//! store.undelete_file(a).unwrap();
//! assert_eq!(store.search_file(a).unwrap(), Some(b"hello".to_vec()));
//!
//! store.close().unwrap();
//!
//! // Everything comes back on load.
//! let store = hoard_rs::Store::load_with(dir.path(), options).unwrap();
//! assert_eq!(store.search_file(b).unwrap(), Some(b"world!".to_vec()));
//! ```

pub mod compression;
pub mod error;
pub mod fingerprint;
pub mod freelist;
pub mod handle;
pub mod header;
pub mod layout;
pub mod namemap;
pub mod segment;
pub mod staging;
pub mod store;
pub mod text;

// Re-export commonly used types
pub use compression::CompressionMethod;
pub use error::{HoardError, Result};
pub use fingerprint::{fingerprint, Fingerprint};
pub use freelist::{FreeList, FreeSlot};
pub use handle::{SegmentCell, SegmentHandle};
pub use header::SegmentHeader;
pub use layout::{Geometry, MAX_BYTES, MAX_SLOTS};
pub use namemap::NameMap;
pub use segment::Segment;
pub use staging::StagingBuffer;
pub use store::{Store, StoreOptions};
pub use text::TextStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
