//! HashTable: separate chaining over an index-linked item arena.
//!
//! Items live in one growable `slots` array. Each bucket stores the index
//! of the first item of its chain, and each item stores the index of the
//! next one, so growing the item storage never invalidates a chain and
//! growing the bucket array only rewrites `next` links. Removed slots are
//! recycled through a LIFO freelist and never compacted, which keeps a
//! [`Handle`] valid until its own item is removed.
//!
//! The bucket array is rebuilt whenever the item count passes 3/4 of the
//! current tier; it never shrinks. If it cannot be allocated, the table
//! keeps working by scanning the item storage linearly until a later
//! insertion manages to rebuild it.

use crate::error::AllocError;
use crate::tiers::{bucket_index, grow_tier, load_limit, table_size, LAST_TIER};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use std::collections::hash_map::RandomState;

/// End of chain, empty bucket, empty freelist.
const NIL: u32 = u32::MAX;

/// Most items a table can hold. The two highest `u32` values are reserved
/// as chain and freelist sentinels.
pub const MAX_ITEMS: u32 = u32::MAX - 2;

/// Item storage never allocates fewer slots than this.
const MIN_STORAGE: usize = 16;

/// Index of an item inside a [`HashTable`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Handle(u32);

impl Handle {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn key<'a, K, V, S>(&self, table: &'a HashTable<K, V, S>) -> Option<&'a K> {
        table.handle_key(*self)
    }

    pub fn value<'a, K, V, S>(&self, table: &'a HashTable<K, V, S>) -> Option<&'a V> {
        table.handle_value(*self)
    }

    pub fn value_mut<'a, K, V, S>(&self, table: &'a mut HashTable<K, V, S>) -> Option<&'a mut V> {
        table.handle_value_mut(*self)
    }
}

#[derive(Debug)]
struct Item<K, V> {
    hash: u32,
    next: u32,
    key: K,
    value: V,
}

#[derive(Debug)]
enum Slot<K, V> {
    Occupied(Item<K, V>),
    Vacant { next_free: u32 },
}

pub struct HashTable<K, V, S = RandomState> {
    hasher: S,
    len: usize,
    tier: usize,
    buckets: Vec<u32>, // empty while unallocated
    slots: Vec<Slot<K, V>>,
    first_free: u32,
}

#[inline]
fn key_matches<K, Q>(key: &K, q: &Q) -> bool
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    q.eq(key.borrow())
}

impl<K, V> HashTable<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Table sized up front so that `count` insertions trigger no rebuild.
    pub fn with_capacity(count: usize) -> Result<Self, AllocError> {
        Self::with_capacity_and_hasher(count, Default::default())
    }
}

impl<K, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashTable<K, V, S> {
    /// Empty table; allocates nothing until the first insertion.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            len: 0,
            tier: 0,
            buckets: Vec::new(),
            slots: Vec::new(),
            first_free: NIL,
        }
    }

    pub fn with_capacity_and_hasher(count: usize, hasher: S) -> Result<Self, AllocError> {
        if count > MAX_ITEMS as usize {
            return Err(AllocError::CapacityOverflow {
                requested: count,
                max: MAX_ITEMS as usize,
            });
        }
        let mut table = Self::with_hasher(hasher);
        table.tier = grow_tier(count, 0);
        table.rebuild_buckets()?;
        table
            .slots
            .try_reserve_exact(count)
            .map_err(|e| AllocError::exhausted(count, e))?;
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current bucket-array length; 0 while it is unallocated.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the current bucket-size tier. Never decreases.
    pub fn size_tier(&self) -> usize {
        self.tier
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    fn item(&self, i: u32) -> &Item<K, V> {
        match &self.slots[i as usize] {
            Slot::Occupied(item) => item,
            Slot::Vacant { .. } => unreachable!("vacant slot {} linked into a chain", i),
        }
    }

    fn item_mut(&mut self, i: u32) -> &mut Item<K, V> {
        match &mut self.slots[i as usize] {
            Slot::Occupied(item) => item,
            Slot::Vacant { .. } => unreachable!("vacant slot {} linked into a chain", i),
        }
    }

    fn occupied(&self, h: Handle) -> Option<&Item<K, V>> {
        match self.slots.get(h.index()) {
            Some(Slot::Occupied(item)) => Some(item),
            _ => None,
        }
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&K> {
        self.occupied(h).map(|item| &item.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.occupied(h).map(|item| &item.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        match self.slots.get_mut(h.index()) {
            Some(Slot::Occupied(item)) => Some(&mut item.value),
            _ => None,
        }
    }

    /// Replace the bucket array with one sized for the current tier and
    /// rechain every live item from its stored hash. Item indices do not move.
    ///
    /// The old array is released first; on failure the table is left
    /// without buckets and lookups fall back to scanning.
    fn rebuild_buckets(&mut self) -> Result<(), AllocError> {
        let old = mem::take(&mut self.buckets);
        drop(old);

        let size = table_size(self.tier);
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(size)
            .map_err(|e| AllocError::exhausted(size, e))?;
        buckets.resize(size, NIL);

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Occupied(item) = slot {
                let b = bucket_index(item.hash, size);
                item.next = buckets[b];
                buckets[b] = i as u32;
            }
        }
        log::debug!(
            "rebuilt bucket array at tier {} ({} buckets, {} items)",
            self.tier,
            size,
            self.len
        );
        self.buckets = buckets;
        Ok(())
    }

    /// Move to the tier that keeps the load under 3/4, rebuilding the
    /// bucket array if the tier changed or the array is missing.
    fn auto_grow(&mut self) {
        let target = grow_tier(self.len, self.tier);
        if target != self.tier || self.buckets.is_empty() {
            self.tier = target;
            if let Err(e) = self.rebuild_buckets() {
                log::warn!("bucket array unavailable, falling back to linear scans: {}", e);
            }
        }
    }

    fn grow_storage(&mut self) -> Result<(), AllocError> {
        let max = MAX_ITEMS as usize;
        let cap = self.slots.capacity();
        let new_cap = cap.saturating_add(cap / 2).clamp(MIN_STORAGE, max);
        self.slots
            .try_reserve_exact(new_cap - self.slots.len())
            .map_err(|e| AllocError::exhausted(new_cap, e))?;
        log::trace!("item storage grew to {} slots", self.slots.capacity());
        Ok(())
    }

    /// Index of a slot ready to be overwritten: the freelist head if any,
    /// else a fresh slot at the end of storage.
    fn claim_slot(&mut self) -> Result<u32, AllocError> {
        if self.first_free != NIL {
            let i = self.first_free;
            self.first_free = match self.slots[i as usize] {
                Slot::Vacant { next_free } => next_free,
                Slot::Occupied(_) => unreachable!("freelist points at occupied slot {}", i),
            };
            return Ok(i);
        }
        if self.slots.len() >= MAX_ITEMS as usize {
            return Err(AllocError::CapacityOverflow {
                requested: self.slots.len() + 1,
                max: MAX_ITEMS as usize,
            });
        }
        if self.slots.len() == self.slots.capacity() {
            self.grow_storage()?;
        }
        let i = self.slots.len() as u32;
        self.slots.push(Slot::Vacant { next_free: NIL });
        Ok(i)
    }

    /// Fill a claimed slot, prepend it to its chain and grow if needed.
    fn hook_up(&mut self, i: u32, hash: u32, key: K, value: V) {
        let next = if self.buckets.is_empty() {
            NIL
        } else {
            let b = bucket_index(hash, self.buckets.len());
            mem::replace(&mut self.buckets[b], i)
        };
        self.slots[i as usize] = Slot::Occupied(Item {
            hash,
            next,
            key,
            value,
        });
        self.len += 1;
        self.auto_grow();
    }

    /// Point whatever precedes `i` in bucket `b` at the item after `i`.
    fn splice_out(&mut self, b: usize, prev: u32, i: u32) {
        let next = self.item(i).next;
        if prev == NIL {
            self.buckets[b] = next;
        } else {
            self.item_mut(prev).next = next;
        }
    }

    /// Unlink item `i` from its chain, locating the predecessor by walking
    /// the chain from the bucket head.
    fn unlink(&mut self, i: u32) {
        if self.buckets.is_empty() {
            return;
        }
        let b = bucket_index(self.item(i).hash, self.buckets.len());
        let mut prev = NIL;
        let mut cur = self.buckets[b];
        while cur != NIL && cur != i {
            prev = cur;
            cur = self.item(cur).next;
        }
        debug_assert_eq!(cur, i, "item missing from its chain");
        if cur == i {
            self.splice_out(b, prev, i);
        }
    }

    /// Turn an already unlinked slot into the freelist head.
    fn release_slot(&mut self, i: u32) -> (K, V) {
        let freed = Slot::Vacant {
            next_free: self.first_free,
        };
        let old = mem::replace(&mut self.slots[i as usize], freed);
        self.first_free = i;
        self.len -= 1;
        match old {
            Slot::Occupied(item) => (item.key, item.value),
            Slot::Vacant { .. } => unreachable!("released a vacant slot"),
        }
    }

    /// Remove the item behind `h`, returning its key and value.
    /// Returns `None` if the slot is vacant.
    pub fn remove_handle(&mut self, h: Handle) -> Option<(K, V)> {
        self.occupied(h)?;
        self.unlink(h.0);
        Some(self.release_slot(h.0))
    }

    /// Keep only the items for which `f` returns `true`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut cursor = self.cursor();
        while !cursor.at_end() {
            let keep = match cursor.entry_mut() {
                Some((k, v)) => f(k, v),
                None => true,
            };
            if !keep {
                cursor.delete();
            }
            cursor.advance();
        }
    }

    /// Drop every item and free both arrays.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.buckets = Vec::new();
        self.len = 0;
        self.tier = 0;
        self.first_free = NIL;
    }

    /// Verify the structural invariants:
    /// - every chained item sits in the bucket its stored hash maps to;
    /// - the chains hold exactly `len()` items;
    /// - the freelist covers exactly the vacant slots;
    /// - the load stays within 3/4 of the bucket count, except on the last tier.
    pub fn check_internal_sanity(&self) -> bool {
        let live = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count();
        if live != self.len {
            return false;
        }

        let mut free = 0;
        let mut f = self.first_free;
        while f != NIL {
            match self.slots.get(f as usize) {
                Some(Slot::Vacant { next_free }) => f = *next_free,
                _ => return false,
            }
            free += 1;
            if free > self.slots.len() {
                return false;
            }
        }
        if free + live != self.slots.len() {
            return false;
        }

        if self.buckets.is_empty() {
            // Nothing is chained while the bucket array is missing.
            return true;
        }
        let size = table_size(self.tier);
        if self.buckets.len() != size {
            return false;
        }

        let mut chained = 0;
        for (b, &head) in self.buckets.iter().enumerate() {
            let mut i = head;
            while i != NIL {
                chained += 1;
                if chained > self.len {
                    return false;
                }
                let Some(Slot::Occupied(item)) = self.slots.get(i as usize) else {
                    return false;
                };
                if bucket_index(item.hash, size) != b {
                    return false;
                }
                i = item.next;
            }
        }
        if chained != self.len {
            return false;
        }

        !(self.len > load_limit(self.tier) && self.tier < LAST_TIER)
    }

    /// Chain-length statistics for the current bucket array.
    #[cfg(any(test, feature = "bench_internal"))]
    pub fn chain_stats(&self) -> ChainStats {
        let mut stats = ChainStats {
            buckets: self.buckets.len(),
            ..ChainStats::default()
        };
        for &head in &self.buckets {
            let mut n = 0;
            let mut i = head;
            while i != NIL {
                n += 1;
                i = self.item(i).next;
            }
            if n > 0 {
                stats.used_buckets += 1;
                stats.collisions += n - 1;
            }
            stats.longest_chain = stats.longest_chain.max(n);
        }
        stats
    }

    /// Simulates a failed bucket allocation.
    #[cfg(test)]
    pub(crate) fn discard_buckets(&mut self) {
        self.buckets = Vec::new();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter().enumerate(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.slots.iter_mut().enumerate(),
        }
    }

    /// Cursor over the live items that can delete as it goes.
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S> {
        let mut cursor = Cursor { table: self, pos: 0 };
        cursor.skip_vacant();
        cursor
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        let h = self.hasher.hash_one(q);
        (h ^ (h >> 32)) as u32
    }

    fn find_index<Q>(&self, hash: u32, q: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.buckets.is_empty() {
            return self
                .slots
                .iter()
                .position(|s| match s {
                    Slot::Occupied(item) => item.hash == hash && key_matches(&item.key, q),
                    Slot::Vacant { .. } => false,
                })
                .map(|i| i as u32);
        }
        let mut i = self.buckets[bucket_index(hash, self.buckets.len())];
        while i != NIL {
            let item = self.item(i);
            if item.hash == hash && key_matches(&item.key, q) {
                return Some(i);
            }
            i = item.next;
        }
        None
    }

    pub fn lookup<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_index(self.make_hash(q), q).map(Handle)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.lookup(q)?;
        self.handle_value(i)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.lookup(q)?;
        self.occupied(h).map(|item| (&item.key, &item.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.lookup(q)?;
        self.handle_value_mut(i)
    }

    /// Map `key` to `value`. An existing value is dropped and replaced (the
    /// stored key is kept); otherwise a new item is added.
    pub fn set(&mut self, key: K, value: V) -> Result<Handle, AllocError> {
        let hash = self.make_hash(&key);
        if let Some(i) = self.find_index(hash, &key) {
            self.item_mut(i).value = value;
            return Ok(Handle(i));
        }
        let i = self.claim_slot()?;
        self.hook_up(i, hash, key, value);
        Ok(Handle(i))
    }

    /// Like [`set`](Self::set), duplicating key and value from borrowed
    /// forms. The key is only duplicated when a new item is created.
    pub fn set_cloned<Q, W>(&mut self, key: &Q, value: &W) -> Result<Handle, AllocError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        W: ?Sized + ToOwned<Owned = V>,
    {
        self.set_with(key, || value.to_owned())
    }

    /// Reset the value for `key` to `V::default()`, creating the item if needed.
    pub fn set_default<Q>(&mut self, key: &Q) -> Result<Handle, AllocError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        V: Default,
    {
        self.set_with(key, V::default)
    }

    fn set_with<Q, F>(&mut self, key: &Q, make: F) -> Result<Handle, AllocError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(key);
        if let Some(i) = self.find_index(hash, key) {
            self.item_mut(i).value = make();
            return Ok(Handle(i));
        }
        let (key, value) = (key.to_owned(), make());
        let i = self.claim_slot()?;
        self.hook_up(i, hash, key, value);
        Ok(Handle(i))
    }

    /// Handle for `key`, inserting a duplicate of it with `make()` as value
    /// if absent. `make` only runs on insertion.
    pub fn lookup_or_insert_with<Q, F>(&mut self, key: &Q, make: F) -> Result<Handle, AllocError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(key);
        if let Some(i) = self.find_index(hash, key) {
            return Ok(Handle(i));
        }
        let (key, value) = (key.to_owned(), make());
        let i = self.claim_slot()?;
        self.hook_up(i, hash, key, value);
        Ok(Handle(i))
    }

    /// Remove `key`, returning the stored key and value. The bucket array
    /// keeps its size.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        if self.buckets.is_empty() {
            let i = self.find_index(hash, q)?;
            return Some(self.release_slot(i));
        }

        let b = bucket_index(hash, self.buckets.len());
        let mut prev = NIL;
        let mut cur = self.buckets[b];
        loop {
            if cur == NIL {
                return None;
            }
            let item = self.item(cur);
            if item.hash == hash && key_matches(&item.key, q) {
                break;
            }
            prev = cur;
            cur = item.next;
        }
        self.splice_out(b, prev, cur);
        Some(self.release_slot(cur))
    }
}

impl<K, V, S> fmt::Debug for HashTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, k, v)| (k, v)))
            .finish()
    }
}

/// Chain statistics reported by [`HashTable::chain_stats`].
#[cfg(any(test, feature = "bench_internal"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainStats {
    pub buckets: usize,
    pub used_buckets: usize,
    /// Items that are not the head of their chain.
    pub collisions: usize,
    pub longest_chain: usize,
}

/// Iterator over live items in storage order.
pub struct Iter<'a, K, V> {
    it: core::iter::Enumerate<core::slice::Iter<'a, Slot<K, V>>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, slot) = self.it.next()?;
            if let Slot::Occupied(item) = slot {
                return Some((Handle(i as u32), &item.key, &item.value));
            }
        }
    }
}

/// Iterator over live items with mutable values.
pub struct IterMut<'a, K, V> {
    it: core::iter::Enumerate<core::slice::IterMut<'a, Slot<K, V>>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Handle, &'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, slot) = self.it.next()?;
            if let Slot::Occupied(item) = slot {
                return Some((Handle(i as u32), &item.key, &mut item.value));
            }
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashTable<K, V, S> {
    type Item = (Handle, &'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cursor over the storage slots of a table.
///
/// It always rests on a live item or at the end, except right after
/// [`delete`](Cursor::delete), when it rests on the freed slot until the
/// next [`advance`](Cursor::advance).
pub struct Cursor<'a, K, V, S> {
    table: &'a mut HashTable<K, V, S>,
    pos: usize,
}

impl<'a, K, V, S> Cursor<'a, K, V, S> {
    fn skip_vacant(&mut self) {
        while matches!(self.table.slots.get(self.pos), Some(Slot::Vacant { .. })) {
            self.pos += 1;
        }
    }

    fn current(&self) -> Option<&Item<K, V>> {
        match self.table.slots.get(self.pos) {
            Some(Slot::Occupied(item)) => Some(item),
            _ => None,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.table.slots.len()
    }

    /// Handle of the current item, `None` at the end or after a delete.
    pub fn handle(&self) -> Option<Handle> {
        self.current().map(|_| Handle(self.pos as u32))
    }

    pub fn key(&self) -> Option<&K> {
        self.current().map(|item| &item.key)
    }

    pub fn value(&self) -> Option<&V> {
        self.current().map(|item| &item.value)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.entry_mut().map(|(_, v)| v)
    }

    pub fn entry_mut(&mut self) -> Option<(&K, &mut V)> {
        match self.table.slots.get_mut(self.pos) {
            Some(Slot::Occupied(item)) => Some((&item.key, &mut item.value)),
            _ => None,
        }
    }

    /// Move to the next live item.
    pub fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
            self.skip_vacant();
        }
    }

    /// Remove the current item and return it. The cursor stays in place;
    /// call [`advance`](Cursor::advance) to continue.
    pub fn delete(&mut self) -> Option<(K, V)> {
        debug_assert!(!self.at_end(), "delete through a cursor past the end");
        self.current()?;
        let i = self.pos as u32;
        self.table.unlink(i);
        Some(self.table.release_slot(i))
    }
}
