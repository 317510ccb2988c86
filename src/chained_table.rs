//! ChainedTable: separate chaining with one boxed node per entry.
//!
//! Shares the bucket tiers and the `(hash * 11) mod size` placement with
//! [`HashTable`](crate::HashTable), but links entries through owned
//! pointers instead of storage indices. Nodes never move, so the table
//! can shrink as freely as it grows: after a removal it steps down while
//! fewer than a quarter of the buckets would be in use.
//!
//! Only bucket arrays are allocated fallibly. A failed resize keeps the
//! current array, which stays correct with longer chains.

use crate::error::AllocError;
use crate::tiers::{bucket_index, grow_tier, load_limit, shrink_tier, table_size, LAST_TIER};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    hash: u32,
    key: K,
    value: V,
    next: Link<K, V>,
}

pub struct ChainedTable<K, V, S = RandomState> {
    hasher: S,
    len: usize,
    tier: usize,
    buckets: Vec<Link<K, V>>,
}

fn alloc_buckets<K, V>(size: usize) -> Result<Vec<Link<K, V>>, AllocError> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(size)
        .map_err(|e| AllocError::exhausted(size, e))?;
    buckets.resize_with(size, || None);
    Ok(buckets)
}

impl<K, V> ChainedTable<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn try_new() -> Result<Self, AllocError> {
        Self::try_with_hasher(Default::default())
    }
}

impl<K, V> Default for ChainedTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ChainedTable<K, V, S> {
    /// Table with the smallest bucket array allocated.
    pub fn with_hasher(hasher: S) -> Self {
        let buckets = std::iter::repeat_with(|| None).take(table_size(0)).collect();
        Self {
            hasher,
            len: 0,
            tier: 0,
            buckets,
        }
    }

    pub fn try_with_hasher(hasher: S) -> Result<Self, AllocError> {
        Ok(Self {
            hasher,
            len: 0,
            tier: 0,
            buckets: alloc_buckets(table_size(0))?,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn size_tier(&self) -> usize {
        self.tier
    }

    /// Rechain every node into a freshly allocated array for `tier`.
    /// On allocation failure the current array is kept.
    fn resize(&mut self, tier: usize) {
        let size = table_size(tier);
        let mut buckets = match alloc_buckets::<K, V>(size) {
            Ok(b) => b,
            Err(e) => {
                log::warn!(
                    "keeping {} buckets, resize to tier {} failed: {}",
                    self.buckets.len(),
                    tier,
                    e
                );
                return;
            }
        };
        for head in self.buckets.iter_mut() {
            let mut cur = head.take();
            while let Some(mut node) = cur {
                cur = node.next.take();
                let b = bucket_index(node.hash, size);
                node.next = buckets[b].take();
                buckets[b] = Some(node);
            }
        }
        log::debug!(
            "resized chained table from tier {} to {} ({} entries)",
            self.tier,
            tier,
            self.len
        );
        self.buckets = buckets;
        self.tier = tier;
    }

    fn grow_for(&mut self, count: usize) {
        let target = grow_tier(count, self.tier);
        if target != self.tier {
            self.resize(target);
        }
    }

    fn shrink_if_sparse(&mut self) {
        let target = shrink_tier(self.len, self.tier);
        if target != self.tier {
            self.resize(target);
        }
    }

    fn link_at(&mut self, b: usize, depth: usize) -> Option<&mut Link<K, V>> {
        let mut link = &mut self.buckets[b];
        for _ in 0..depth {
            link = &mut link.as_mut()?.next;
        }
        Some(link)
    }

    fn value_at(&mut self, b: usize, depth: usize) -> &mut V {
        match self.link_at(b, depth) {
            Some(Some(node)) => &mut node.value,
            _ => unreachable!("chain shorter than a located position"),
        }
    }

    /// Prepend a new node, growing first if it would overload the table.
    fn insert_new(&mut self, hash: u32, key: K, value: V) -> &mut V {
        self.grow_for(self.len + 1);
        let b = bucket_index(hash, self.buckets.len());
        let head = &mut self.buckets[b];
        let next = head.take();
        self.len += 1;
        &mut head
            .insert(Box::new(Node {
                hash,
                key,
                value,
                next,
            }))
            .value
    }

    /// Drop every entry and step back down to the smallest tier.
    pub fn clear(&mut self) {
        self.release_chains();
        self.shrink_if_sparse();
    }

    fn release_chains(&mut self) {
        for head in self.buckets.iter_mut() {
            let mut cur = head.take();
            while let Some(mut node) = cur {
                cur = node.next.take();
            }
        }
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            node: None,
            remaining: self.len,
        }
    }

    /// Verify the structural invariants:
    /// - every node sits in the bucket its stored hash maps to;
    /// - the chains hold exactly `len()` nodes;
    /// - the load stays within 3/4 of the bucket count, except on the last tier;
    /// - at least a quarter of the buckets' worth of entries, except on tier 0.
    pub fn check_internal_sanity(&self) -> bool {
        let size = table_size(self.tier);
        if self.buckets.len() != size {
            return false;
        }
        let mut count = 0;
        for (b, head) in self.buckets.iter().enumerate() {
            let mut cur = head.as_deref();
            while let Some(node) = cur {
                if bucket_index(node.hash, size) != b {
                    return false;
                }
                count += 1;
                cur = node.next.as_deref();
            }
        }
        if count != self.len {
            return false;
        }
        if self.len > load_limit(self.tier) && self.tier < LAST_TIER {
            return false;
        }
        !(self.len < size / 4 && self.tier > 0)
    }
}

impl<K, V, S> ChainedTable<K, V, S>
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

    fn find<Q>(&self, hash: u32, q: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut cur = self.buckets[bucket_index(hash, self.buckets.len())].as_deref();
        while let Some(node) = cur {
            if node.hash == hash && q.eq(node.key.borrow()) {
                return Some(node);
            }
            cur = node.next.as_deref();
        }
        None
    }

    /// Bucket and chain depth of the node holding `q`.
    fn locate<Q>(&self, hash: u32, q: &Q) -> Option<(usize, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let b = bucket_index(hash, self.buckets.len());
        let mut cur = self.buckets[b].as_deref();
        let mut depth = 0;
        while let Some(node) = cur {
            if node.hash == hash && q.eq(node.key.borrow()) {
                return Some((b, depth));
            }
            depth += 1;
            cur = node.next.as_deref();
        }
        None
    }

    pub fn lookup<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(self.make_hash(q), q)
            .map(|node| (&node.key, &node.value))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).map(|(_, v)| v)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).is_some()
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (b, depth) = self.locate(self.make_hash(q), q)?;
        self.link_at(b, depth)?.as_mut().map(|node| &mut node.value)
    }

    /// Map `key` to `value`, dropping any previous value.
    pub fn set(&mut self, key: K, value: V) -> &mut V {
        let hash = self.make_hash(&key);
        if let Some((b, depth)) = self.locate(hash, &key) {
            let slot = self.value_at(b, depth);
            *slot = value;
            return slot;
        }
        self.insert_new(hash, key, value)
    }

    /// Reset the value for `key` to `V::default()`, creating the entry if needed.
    pub fn set_default<Q>(&mut self, key: &Q) -> &mut V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        V: Default,
    {
        let hash = self.make_hash(key);
        if let Some((b, depth)) = self.locate(hash, key) {
            let slot = self.value_at(b, depth);
            *slot = V::default();
            return slot;
        }
        self.insert_new(hash, key.to_owned(), V::default())
    }

    /// Value for `key`, inserting a duplicate of the key with `make()` if
    /// absent.
    pub fn lookup_or_insert_with<Q, F>(&mut self, key: &Q, make: F) -> &mut V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(key);
        if let Some((b, depth)) = self.locate(hash, key) {
            return self.value_at(b, depth);
        }
        self.insert_new(hash, key.to_owned(), make())
    }

    /// Remove `key`, shrinking the bucket array if the table became sparse.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (b, depth) = self.locate(self.make_hash(q), q)?;
        let link = self.link_at(b, depth)?;
        let mut node = link.take()?;
        *link = node.next.take();
        self.len -= 1;
        self.shrink_if_sparse();
        let Node { key, value, .. } = *node;
        Some((key, value))
    }
}

impl<K, V, S> Drop for ChainedTable<K, V, S> {
    fn drop(&mut self) {
        self.release_chains();
    }
}

impl<K, V, S> fmt::Debug for ChainedTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over entries in bucket order.
pub struct Iter<'a, K, V> {
    buckets: core::slice::Iter<'a, Link<K, V>>,
    node: Option<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                self.remaining -= 1;
                return Some((&node.key, &node.value));
            }
            self.node = self.buckets.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V, S> IntoIterator for &'a ChainedTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
