use crate::compression::CompressionMethod;
use crate::error::Result;
use crate::store::{Store, StoreOptions};
use std::path::Path;

/// A [`Store`] specialized for UTF-8 text payloads.
///
/// Text compresses well, so this wrapper always stores compressed and
/// converts between `String` and bytes at the boundary. Stored bytes
/// that fail UTF-8 validation surface as
/// [`HoardError::Utf8`](crate::HoardError::Utf8).
#[derive(Debug)]
pub struct TextStore {
    store: Store,
}

impl TextStore {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<TextStore> {
        TextStore::create_with(dir, true)
    }

    pub fn create_with<P: AsRef<Path>>(dir: P, thread_safe: bool) -> Result<TextStore> {
        let store = Store::create_with(dir, text_options(thread_safe))?;
        Ok(TextStore { store })
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<TextStore> {
        TextStore::load_with(dir, true)
    }

    pub fn load_with<P: AsRef<Path>>(dir: P, thread_safe: bool) -> Result<TextStore> {
        let store = Store::load_with(dir, text_options(thread_safe))?;
        Ok(TextStore { store })
    }

    /// Insert `text` under `name` and return its global ID.
    pub fn add_text(&self, name: &str, text: &str) -> Result<i32> {
        self.store.add_file(name, text.as_bytes())
    }

    pub fn search_text(&self, id: i32) -> Result<Option<String>> {
        match self.store.search_file(id)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn search_text_by_name(&self, name: &str) -> Result<Option<String>> {
        match self.store.search_file_by_name(name)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete_text(&self, id: i32) -> Result<bool> {
        self.store.delete_file(id)
    }

    pub fn delete_text_by_name(&self, name: &str) -> Result<bool> {
        self.store.delete_file_by_name(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    pub fn optimize(&self) -> Result<()> {
        self.store.optimize()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// The wrapped byte store, for operations without a text shortcut.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

fn text_options(thread_safe: bool) -> StoreOptions {
    StoreOptions::default()
        .thread_safe(thread_safe)
        .compression(CompressionMethod::Lz4)
}
