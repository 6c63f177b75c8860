//! SlotMap - Generational index-based storage
//!
//! Provides O(1) insertion, removal, and lookup with use-after-free detection.
//! Keys are any type implementing [`Key`], so callers can use their own
//! strongly typed, plain-old-data handles such as [`NodeId`].

use strata_core::id::{NodeId, FIRST_GENERATION};

/// A generational handle into a [`SlotMap`].
///
/// Generation 0 is never live, so a key with generation 0 can be used as a
/// null value.
pub trait Key: Copy + Eq {
    fn from_parts(index: u32, generation: u32) -> Self;

    fn index(&self) -> u32;

    fn generation(&self) -> u32;
}

/// Default key type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    /// Create a null/invalid key
    #[inline]
    pub const fn null() -> Self {
        Self { index: 0, generation: 0 }
    }

    /// Check if key is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.generation == 0
    }
}

impl Key for SlotKey {
    #[inline]
    fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    fn generation(&self) -> u32 {
        self.generation
    }
}

impl Key for NodeId {
    #[inline]
    fn from_parts(index: u32, generation: u32) -> Self {
        NodeId::new(index, generation)
    }

    #[inline]
    fn index(&self) -> u32 {
        NodeId::index(self)
    }

    #[inline]
    fn generation(&self) -> u32 {
        NodeId::generation(self)
    }
}

#[inline]
fn next_generation(generation: u32) -> u32 {
    match generation.wrapping_add(1) {
        0 => FIRST_GENERATION,
        next => next,
    }
}

/// Slot entry
struct Slot<V> {
    value: Option<V>,
    generation: u32,
}

/// SlotMap - generational index storage
pub struct SlotMap<V, K: Key = SlotKey> {
    slots: Vec<Slot<V>>,
    free_list: Vec<u32>,
    len: usize,
    _key: core::marker::PhantomData<fn() -> K>,
}

impl<V, K: Key> SlotMap<V, K> {
    /// Create a new empty slot map
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
            _key: core::marker::PhantomData,
        }
    }

    /// Insert a value and get its key
    pub fn insert(&mut self, value: V) -> K {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            K::from_parts(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(value),
                generation: FIRST_GENERATION,
            });
            K::from_parts(index, FIRST_GENERATION)
        }
    }

    /// Build a map from values keyed by slot index, as restored from an
    /// archive. Every key gets the first generation.
    ///
    /// Slots are allocated once, up to the highest index, and the vacant
    /// ones below it are handed out lowest first. Entries whose index is
    /// already taken are returned instead of inserted.
    pub fn from_indexed(entries: Vec<(u32, V)>) -> (Self, Vec<(u32, V)>) {
        let slot_count = entries.iter().map(|(index, _)| *index as usize + 1).max().unwrap_or(0);
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || Slot {
            value: None,
            generation: FIRST_GENERATION,
        });

        let mut len = 0;
        let mut duplicates = Vec::new();
        for (index, value) in entries {
            let slot: &mut Slot<V> = &mut slots[index as usize];
            if slot.value.is_some() {
                duplicates.push((index, value));
                continue;
            }
            slot.value = Some(value);
            len += 1;
        }

        let free_list = (0..slot_count as u32)
            .rev()
            .filter(|index| slots[*index as usize].value.is_none())
            .collect();

        let map = Self {
            slots,
            free_list,
            len,
            _key: core::marker::PhantomData,
        };
        (map, duplicates)
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: K) -> Option<V> {
        let slot = self.slots.get_mut(key.index() as usize)?;

        if slot.generation != key.generation() || slot.value.is_none() {
            return None;
        }

        slot.generation = next_generation(slot.generation);
        self.free_list.push(key.index());
        self.len -= 1;

        slot.value.take()
    }

    /// Get a reference to a value
    pub fn get(&self, key: K) -> Option<&V> {
        let slot = self.slots.get(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Get a mutable reference to a value
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Get mutable references to two distinct values at once
    pub fn get2_mut(&mut self, a: K, b: K) -> Option<(&mut V, &mut V)> {
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia == ib || ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }

        let (slot_a, slot_b) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };

        if slot_a.generation != a.generation() || slot_b.generation != b.generation() {
            return None;
        }

        Some((slot_a.value.as_mut()?, slot_b.value.as_mut()?))
    }

    /// Check if a key is valid
    pub fn contains_key(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Get the number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated, live or vacant
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Clear all elements. Slots are kept and their generations bumped, so
    /// keys handed out before the clear stay invalid.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (i, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = next_generation(slot.generation);
            }
            self.free_list.push(i as u32);
        }
        self.len = 0;
    }

    /// Iterate over all values
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (K::from_parts(i as u32, slot.generation), v))
        })
    }

    /// Iterate over all values mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let gen = slot.generation;
            slot.value.as_mut().map(|v| (K::from_parts(i as u32, gen), v))
        })
    }

    /// Iterate over keys only
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterate over values only
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}

impl<V, K: Key> Default for SlotMap<V, K> {
    fn default() -> Self {
        Self::new()
    }
}
