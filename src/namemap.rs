use crate::fingerprint::{to_hex, Fingerprint};
use std::collections::HashMap;

/// Bidirectional fingerprint to global ID map.
///
/// The forward and inverse tables are kept in lockstep: inserting a
/// fingerprint that was already mapped drops the old ID's inverse entry,
/// and re-binding an ID to a new fingerprint drops the old fingerprint's
/// forward entry with a warning. Last write wins in both directions.
#[derive(Debug, Default)]
pub struct NameMap {
    forward: HashMap<Fingerprint, i32>,
    inverse: HashMap<i32, Fingerprint>,
}

impl NameMap {
    pub fn new() -> NameMap {
        NameMap::default()
    }

    pub fn insert(&mut self, fp: Fingerprint, id: i32) {
        if let Some(old_id) = self.forward.insert(fp, id) {
            if old_id != id {
                self.inverse.remove(&old_id);
            }
        }
        if let Some(old_fp) = self.inverse.insert(id, fp) {
            if old_fp != fp {
                tracing::warn!(
                    id,
                    old = %to_hex(&old_fp),
                    new = %to_hex(&fp),
                    "object id re-bound to a different name fingerprint"
                );
                self.forward.remove(&old_fp);
            }
        }
    }

    pub fn get(&self, fp: &Fingerprint) -> Option<i32> {
        self.forward.get(fp).copied()
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.forward.contains_key(fp)
    }

    /// Remove a mapping by fingerprint, returning the ID it held.
    pub fn remove(&mut self, fp: &Fingerprint) -> Option<i32> {
        match self.forward.remove(fp) {
            Some(id) => {
                self.inverse.remove(&id);
                Some(id)
            }
            None => None,
        }
    }

    /// Remove a mapping by ID, returning the fingerprint it held.
    pub fn remove_by_id(&mut self, id: i32) -> Option<Fingerprint> {
        match self.inverse.remove(&id) {
            Some(fp) => {
                self.forward.remove(&fp);
                Some(fp)
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    #[test]
    fn test_insert_and_lookup_both_directions() {
        let mut map = NameMap::new();
        let fp = fingerprint("a.txt");
        map.insert(fp, 3);

        assert_eq!(map.get(&fp), Some(3));
        assert!(map.contains(&fp));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remapping_a_name_unlinks_the_old_id() {
        let mut map = NameMap::new();
        let fp = fingerprint("a.txt");
        map.insert(fp, 3);
        map.insert(fp, 9);

        assert_eq!(map.get(&fp), Some(9));
        assert_eq!(map.remove_by_id(3), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_rebinding_an_id_unlinks_the_old_name() {
        let mut map = NameMap::new();
        let fp_a = fingerprint("a.txt");
        let fp_b = fingerprint("b.txt");
        map.insert(fp_a, 3);
        map.insert(fp_b, 3);

        assert_eq!(map.get(&fp_a), None);
        assert_eq!(map.get(&fp_b), Some(3));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_by_fingerprint() {
        let mut map = NameMap::new();
        let fp = fingerprint("a.txt");
        map.insert(fp, 5);

        assert_eq!(map.remove(&fp), Some(5));
        assert_eq!(map.remove(&fp), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut map = NameMap::new();
        let fp = fingerprint("a.txt");
        map.insert(fp, 5);

        assert_eq!(map.remove_by_id(5), Some(fp));
        assert_eq!(map.get(&fp), None);
        assert!(map.is_empty());
    }
}
