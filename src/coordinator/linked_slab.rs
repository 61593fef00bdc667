//! Arena-backed intrusive lists
//!
//! Entries live in a slot vector and are linked by slot index. Several
//! lists can share one arena; each entry carries the index of the list
//! that currently owns it, so an entry belongs to at most one list at a
//! time. A key→slot map gives O(1) unlink without searching.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, Default)]
struct Ends {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    list: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct LinkedSlab<K, V> {
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    lists: Vec<Ends>,
}

impl<K: Hash + Eq + Clone, V> LinkedSlab<K, V> {
    /// Arena hosting `num_lists` independent lists.
    pub fn with_lists(num_lists: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            lists: vec![Ends::default(); num_lists],
        }
    }

    /// Insert at the head of `list`. Returns false, leaving the arena
    /// untouched, if `key` is already linked into any list.
    pub fn push_front(&mut self, list: usize, key: K, value: V) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let old_head = self.lists[list].head;
        let slot = self.alloc(Entry {
            key: key.clone(),
            value,
            list,
            prev: None,
            next: old_head,
        });
        match old_head {
            Some(h) => self.entry_mut(h).prev = Some(slot),
            None => self.lists[list].tail = Some(slot),
        }
        self.lists[list].head = Some(slot);
        self.lists[list].len += 1;
        self.index.insert(key, slot);
        true
    }

    /// Insert at the tail of `list`. Same contract as [`Self::push_front`].
    pub fn push_back(&mut self, list: usize, key: K, value: V) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        let old_tail = self.lists[list].tail;
        let slot = self.alloc(Entry {
            key: key.clone(),
            value,
            list,
            prev: old_tail,
            next: None,
        });
        match old_tail {
            Some(t) => self.entry_mut(t).next = Some(slot),
            None => self.lists[list].head = Some(slot),
        }
        self.lists[list].tail = Some(slot);
        self.lists[list].len += 1;
        self.index.insert(key, slot);
        true
    }

    /// Unlink `key` from whichever list holds it.
    pub fn remove(&mut self, key: &K) -> Option<(usize, V)> {
        let slot = self.index.remove(key)?;
        let entry = self.unlink(slot);
        Some((entry.list, entry.value))
    }

    /// Unlink `key` only if `list` currently holds it.
    pub fn remove_from(&mut self, list: usize, key: &K) -> Option<V> {
        if self.list_of(key) != Some(list) {
            return None;
        }
        self.remove(key).map(|(_, value)| value)
    }

    /// Which list currently holds `key`.
    pub fn list_of(&self, key: &K) -> Option<usize> {
        self.index.get(key).map(|&slot| self.entry(slot).list)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entry(slot).value)
    }

    pub fn len(&self, list: usize) -> usize {
        self.lists[list].len
    }

    pub fn total_len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn head(&self, list: usize) -> Option<usize> {
        self.lists[list].head
    }

    /// Value at `slot` and the slot that follows it, provided the slot is
    /// still occupied by an entry of `list`. Used by cursors that release
    /// the arena's lock between steps.
    pub fn step(&self, list: usize, slot: usize) -> Option<(&V, Option<usize>)> {
        match self.slots.get(slot) {
            Some(Some(entry)) if entry.list == list => Some((&entry.value, entry.next)),
            _ => None,
        }
    }

    pub fn iter(&self, list: usize) -> Iter<'_, K, V> {
        Iter {
            slab: self,
            list,
            next: self.lists[list].head,
        }
    }

    /// Unlink every entry of `list`, returning how many were dropped.
    pub fn clear_list(&mut self, list: usize) -> usize {
        let mut cursor = self.lists[list].head;
        let mut dropped = 0;
        while let Some(slot) = cursor {
            cursor = self.entry(slot).next;
            if let Some(entry) = self.slots[slot].take() {
                self.index.remove(&entry.key);
                self.free.push(slot);
                dropped += 1;
            }
        }
        self.lists[list] = Ends::default();
        dropped
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        for ends in &mut self.lists {
            *ends = Ends::default();
        }
    }

    fn alloc(&mut self, entry: Entry<K, V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, slot: usize) -> Entry<K, V> {
        let entry = self.slots[slot]
            .take()
            .unwrap_or_else(|| panic!("linked slab index points at vacant slot {}", slot));
        match entry.prev {
            Some(p) => self.entry_mut(p).next = entry.next,
            None => self.lists[entry.list].head = entry.next,
        }
        match entry.next {
            Some(n) => self.entry_mut(n).prev = entry.prev,
            None => self.lists[entry.list].tail = entry.prev,
        }
        self.lists[entry.list].len -= 1;
        self.free.push(slot);
        entry
    }

    fn entry(&self, slot: usize) -> &Entry<K, V> {
        self.slots[slot]
            .as_ref()
            .unwrap_or_else(|| panic!("linked slab link points at vacant slot {}", slot))
    }

    fn entry_mut(&mut self, slot: usize) -> &mut Entry<K, V> {
        self.slots[slot]
            .as_mut()
            .unwrap_or_else(|| panic!("linked slab link points at vacant slot {}", slot))
    }
}

/// Head-to-tail iteration over one list.
pub struct Iter<'a, K, V> {
    slab: &'a LinkedSlab<K, V>,
    list: usize,
    next: Option<usize>,
}

impl<'a, K: Hash + Eq + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.next?;
        let entry = self.slab.entry(slot);
        debug_assert_eq!(entry.list, self.list);
        self.next = entry.next;
        Some((&entry.key, &entry.value))
    }
}
