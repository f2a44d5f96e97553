//! Concurrent insert/read/delete stress against one shared store.

use hoard_rs::{Store, StoreOptions};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_store_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Store>();
}

#[test]
fn test_concurrent_adders_mint_unique_ids() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::create(dir.path()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..50 {
                    let name = format!("t{}-obj{}", thread_id, i);
                    let body = format!("payload from thread {} item {}", thread_id, i);
                    ids.push(store.add_file(&name, body.as_bytes()).unwrap());
                }
                ids
            })
        })
        .collect();

    let mut all_ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(all_ids.insert(id), "ID {} minted twice", id);
        }
    }
    assert_eq!(all_ids.len(), 400);
    assert_eq!(store.total_objects(), 400);
    assert_eq!(store.next_id(), 400);

    // Every name still resolves to its own payload.
    store.optimize().unwrap();
    for thread_id in 0..8 {
        for i in (0..50).step_by(10) {
            let name = format!("t{}-obj{}", thread_id, i);
            let expected = format!("payload from thread {} item {}", thread_id, i);
            assert_eq!(
                store.search_file_by_name(&name).unwrap(),
                Some(expected.into_bytes())
            );
        }
    }
}

#[test]
fn test_mixed_readers_writers_deleters() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::create(dir.path()).unwrap());

    // Pre-populate a persisted working set.
    for i in 0..100 {
        store.add_file(&format!("base{}", i), format!("base body {}", i).as_bytes()).unwrap();
    }
    store.optimize().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let store = store.clone();
            std::thread::spawn(move || {
                match thread_id {
                    // Writers keep inserting fresh names.
                    0 | 1 => {
                        for i in 0..100 {
                            store
                                .add_file(&format!("w{}-{}", thread_id, i), b"written under load")
                                .unwrap();
                        }
                    }
                    // Deleters tombstone and restore base objects.
                    2 | 3 => {
                        for i in 0..100 {
                            let id = (thread_id - 2) * 50 + i % 50;
                            store.delete_file(id as i32).unwrap();
                            store.undelete_file(id as i32).unwrap();
                        }
                    }
                    // Readers hammer the persisted range.
                    _ => {
                        for _ in 0..500 {
                            let id = (rand::random::<u32>() % 100) as i32;
                            let body = store.search_file(id).unwrap();
                            assert_eq!(
                                body,
                                Some(format!("base body {}", id).into_bytes())
                            );
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // 100 base + 200 written; every base object ended up restored.
    assert_eq!(store.total_objects(), 300);
    for id in 0..100 {
        assert!(!store.is_deleted(id).unwrap());
    }
    // The joins dropped every clone, so the sole owner remains.
    Arc::into_inner(store).unwrap().close().unwrap();

    let store = Store::load(dir.path()).unwrap();
    assert_eq!(store.total_objects(), 300);
}

#[test]
fn test_concurrent_name_shadowing_settles_on_one_id() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::create(dir.path()).unwrap());
    store.add_file("contested", b"origin--").unwrap();
    store.optimize().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .add_file("contested", format!("t{}i{:04}", thread_id, i).as_bytes())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One winner; the map and the payload agree on it.
    store.optimize().unwrap();
    let winner = store.name_to_id("contested").unwrap();
    let body = store.search_file(winner).unwrap().unwrap();
    assert_eq!(store.search_file_by_name("contested").unwrap(), Some(body));
    assert!(!store.is_deleted(winner).unwrap());
}

#[test]
fn test_thread_safe_segments_under_shared_reads() {
    let dir = TempDir::new().unwrap();
    let options = StoreOptions::default();
    let store = Arc::new(Store::create_with(dir.path(), options).unwrap());
    for i in 0..20 {
        store.add_file(&format!("f{}", i), vec![i as u8; 64].as_slice()).unwrap();
    }
    store.optimize().unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..300 {
                    let id = (rand::random::<u32>() % 20) as i32;
                    assert_eq!(
                        store.search_file(id).unwrap(),
                        Some(vec![id as u8; 64])
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
