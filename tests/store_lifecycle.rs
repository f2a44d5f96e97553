//! End-to-end store lifecycle: insert, lookup, delete, undelete,
//! shadow-overwrite, slot reuse, and reload.

use hoard_rs::{Store, StoreOptions};
use tempfile::TempDir;

#[test]
fn test_basic_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();

    let a = store.add_file("a.txt", b"hello").unwrap();
    let b = store.add_file("b.txt", b"world!").unwrap();
    assert_eq!(a, 0);
    assert_eq!(b, 1);
    store.optimize().unwrap();

    assert_eq!(store.search_file(0).unwrap(), Some(b"hello".to_vec()));
    assert_eq!(store.search_file(1).unwrap(), Some(b"world!".to_vec()));
    assert_eq!(
        store.search_file_by_name("a.txt").unwrap(),
        Some(b"hello".to_vec())
    );
    assert_eq!(store.name_to_id("b.txt"), Some(1));
    assert_eq!(store.total_objects(), 2);
    assert_eq!(store.last_id(), Some(1));

    store.delete_file(0).unwrap();
    assert!(store.is_deleted(0).unwrap());
    store.undelete_file(0).unwrap();
    assert!(!store.is_deleted(0).unwrap());
    assert_eq!(store.search_file(0).unwrap(), Some(b"hello".to_vec()));

    store.close().unwrap();
}

#[test]
fn test_name_lookup_follows_delete_and_undelete() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();
    let id = store.add_file("doc", b"payload").unwrap();
    store.optimize().unwrap();

    assert!(store.contains("doc"));
    store.delete_file(id).unwrap();
    assert!(!store.contains("doc"));
    assert_eq!(store.search_file_by_name("doc").unwrap(), None);
    // The ID itself keeps answering until the bytes are reused.
    assert_eq!(store.search_file(id).unwrap(), Some(b"payload".to_vec()));

    store.undelete_file(id).unwrap();
    assert!(store.contains("doc"));
    assert_eq!(
        store.search_file_by_name("doc").unwrap(),
        Some(b"payload".to_vec())
    );
}

#[test]
fn test_shadowed_name_resolves_to_newest_id() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();

    let old = store.add_file("config", b"version = 1").unwrap();
    let new = store.add_file("config", b"version = 2, larger body").unwrap();
    store.optimize().unwrap();

    assert_ne!(old, new);
    assert_eq!(store.name_to_id("config"), Some(new));
    assert_eq!(
        store.search_file_by_name("config").unwrap(),
        Some(b"version = 2, larger body".to_vec())
    );
    assert_eq!(store.search_file(old).unwrap(), Some(b"version = 1".to_vec()));
    assert!(store.is_deleted(old).unwrap());
}

#[test]
fn test_freed_slot_is_refilled_and_padded() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();

    let victim = store.add_file("victim", b"0123456789").unwrap();
    store.add_file("filler", b"filler-bytes").unwrap();
    store.optimize().unwrap();
    store.delete_file(victim).unwrap();

    // Six bytes into a ten-byte span: the remainder reads back as
    // spaces, which is the documented fill byte.
    let tenant = store.add_file("tenant", b"abcdef").unwrap();
    assert_eq!(tenant, victim);
    assert_eq!(
        store.search_file_by_name("tenant").unwrap(),
        Some(b"abcdef    ".to_vec())
    );
    assert!(!store.is_deleted(tenant).unwrap());
    assert_eq!(store.next_id(), 2);
}

#[test]
fn test_oversized_update_appends_instead_of_reusing() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();

    let old = store.add_file("doc", b"tiny").unwrap();
    store.optimize().unwrap();
    let new = store.add_file("doc", b"far too large for the old span").unwrap();
    store.optimize().unwrap();

    assert_ne!(old, new);
    assert_eq!(store.search_file(old).unwrap(), Some(b"tiny".to_vec()));
    assert_eq!(
        store.search_file(new).unwrap(),
        Some(b"far too large for the old span".to_vec())
    );
    // The small span stays queued for some future fitting insertion.
    let third = store.add_file("note", b"tin").unwrap();
    assert_eq!(third, old);
}

#[test]
fn test_totals_count_insertions_not_deletions() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();

    for i in 0..4 {
        store.add_file(&format!("f{}", i), b"data").unwrap();
    }
    store.delete_file(1).unwrap();
    store.delete_file(2).unwrap();
    // Deletions do not decrement the running total within a session.
    assert_eq!(store.total_objects(), 4);
    store.close().unwrap();

    // A reload recounts only live objects.
    let store = Store::load(dir.path()).unwrap();
    assert_eq!(store.total_objects(), 2);
}

#[test]
fn test_close_seals_staged_appends() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();
    store.add_file("staged", b"never optimized").unwrap();
    store.close().unwrap();

    let store = Store::load(dir.path()).unwrap();
    assert_eq!(
        store.search_file_by_name("staged").unwrap(),
        Some(b"never optimized".to_vec())
    );
}

#[test]
fn test_reload_preserves_ids_and_names() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();
    let a = store.add_file("a", b"alpha").unwrap();
    let b = store.add_file("b", b"beta").unwrap();
    store.close().unwrap();

    let store = Store::load(dir.path()).unwrap();
    assert_eq!(store.next_id(), 2);
    assert_eq!(store.last_id(), Some(b));
    assert_eq!(store.name_to_id("a"), Some(a));
    assert_eq!(store.search_file(a).unwrap(), Some(b"alpha".to_vec()));
    assert_eq!(
        store.search_file_by_name("b").unwrap(),
        Some(b"beta".to_vec())
    );

    // IDs keep counting from where the previous session stopped.
    let c = store.add_file("c", b"gamma").unwrap();
    assert_eq!(c, 2);
}

#[test]
fn test_undelete_takes_slot_off_the_free_list() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();

    let id = store.add_file("doc", b"1234").unwrap();
    store.optimize().unwrap();
    store.delete_file(id).unwrap();
    store.undelete_file(id).unwrap();

    // The span is live again, so an equal-size insertion must append.
    let fresh = store.add_file("other", b"wxyz").unwrap();
    assert_ne!(fresh, id);
    store.optimize().unwrap();
    assert_eq!(store.search_file(id).unwrap(), Some(b"1234".to_vec()));
    assert_eq!(store.search_file(fresh).unwrap(), Some(b"wxyz".to_vec()));
}

#[test]
fn test_release_tables_is_transparent() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();
    let id = store.add_file("doc", b"payload").unwrap();
    store.optimize().unwrap();

    store.release_tables();
    assert_eq!(store.search_file(id).unwrap(), Some(b"payload".to_vec()));
    store.release_tables();
    assert!(store.delete_file(id).unwrap());
    assert!(store.is_deleted(id).unwrap());
}

#[test]
fn test_load_missing_directory_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("never-created");
    assert!(Store::load(&missing).is_err());
}

#[test]
fn test_empty_payloads_are_stored() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();
    let id = store.add_file("empty", b"").unwrap();
    store.optimize().unwrap();
    assert_eq!(store.search_file(id).unwrap(), Some(Vec::new()));
    assert_eq!(store.search_file_by_name("empty").unwrap(), Some(Vec::new()));
}

#[test]
fn test_single_thread_mode_full_cycle() {
    let dir = TempDir::new().unwrap();
    let options = StoreOptions::default().thread_safe(false);
    let store = Store::create_with(dir.path(), options).unwrap();

    let id = store.add_file("doc", b"unlocked").unwrap();
    store.optimize().unwrap();
    assert_eq!(store.search_file(id).unwrap(), Some(b"unlocked".to_vec()));
    store.delete_file(id).unwrap();
    store.undelete_file(id).unwrap();
    store.close().unwrap();

    let store = Store::load_with(dir.path(), options).unwrap();
    assert_eq!(
        store.search_file_by_name("doc").unwrap(),
        Some(b"unlocked".to_vec())
    );
}
