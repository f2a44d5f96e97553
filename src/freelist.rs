/// A reclaimable slot: the global ID it was minted under and the byte
/// span it still owns in its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSlot {
    pub id: i32,
    pub len: u32,
}

/// Free slots ordered ascending by length, so the best-fit probe is a
/// lower-bound search.
///
/// Equal lengths keep their insertion order, and `take_fit` returns the
/// leftmost candidate. Neither is part of the store's contract.
#[derive(Debug, Default)]
pub struct FreeList {
    slots: Vec<FreeSlot>,
}

impl FreeList {
    pub fn new() -> FreeList {
        FreeList { slots: Vec::new() }
    }

    /// Insert a freed slot, keeping the list sorted by length.
    pub fn insert(&mut self, slot: FreeSlot) {
        let at = self.slots.partition_point(|s| s.len <= slot.len);
        self.slots.insert(at, slot);
    }

    /// Remove and return the leftmost slot with `len >= needed`, or
    /// `None` when no slot is large enough.
    pub fn take_fit(&mut self, needed: u32) -> Option<FreeSlot> {
        if self.slots.is_empty() {
            return None;
        }
        if self.slots[self.slots.len() - 1].len < needed {
            return None;
        }

        let mut first = 0;
        let mut last = self.slots.len() - 1;
        while first < last {
            let mid = first + (last - first) / 2;
            if self.slots[mid].len >= needed {
                last = mid;
            } else {
                first = mid + 1;
            }
        }
        Some(self.slots.remove(first))
    }

    /// Drop the entry for `id`, if present. Returns whether one was
    /// removed.
    pub fn remove_id(&mut self, id: i32) -> bool {
        match self.slots.iter().position(|s| s.id == id) {
            Some(at) => {
                self.slots.remove(at);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FreeSlot] {
        &self.slots
    }
}
