//! Vector: growable contiguous array with fallible, amortized growth.
//!
//! Capacity grows by half of itself (minimum 2) until a request fits, and
//! never shrinks except through [`Vector::clear`]. Every operation that
//! may allocate returns `Result<_, AllocError>` and leaves the vector
//! untouched when it fails.
//!
//! Ownership hooks are static: methods taking `&Q` with
//! `Q: ToOwned<Owned = T>` duplicate their input (`push_back`, `insert`,
//! `insert_multi`, `assign`), while the `emplace` family moves values in.
//! Releasing an element is its `Drop`.

use crate::error::AllocError;
use core::mem;
use core::ops::{Deref, DerefMut};

/// Next capacity step: at least 2, then `c + c / 2`, saturating.
#[inline]
pub(crate) fn next_capacity(current: usize) -> usize {
    if current < 2 {
        2
    } else {
        current.saturating_add(current / 2)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector<T> {
    buf: Vec<T>,
}

impl<T> Vector<T> {
    /// Empty vector; allocates nothing.
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Largest element count whose byte size stays addressable.
    fn max_len() -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            n => isize::MAX as usize / n,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Ensure `capacity() >= count`.
    ///
    /// Allocates exactly `count` slots when growing. Fails without touching
    /// the vector if `count` elements would not be addressable or the
    /// allocator refuses.
    pub fn reserve(&mut self, count: usize) -> Result<(), AllocError> {
        if self.buf.capacity() >= count {
            return Ok(());
        }
        let max = Self::max_len();
        if count > max {
            return Err(AllocError::CapacityOverflow {
                requested: count,
                max,
            });
        }
        let additional = count - self.buf.len();
        self.buf
            .try_reserve_exact(additional)
            .map_err(|e| AllocError::exhausted(count, e))?;
        log::trace!(
            "vector of {} grew to capacity {}",
            core::any::type_name::<T>(),
            self.buf.capacity()
        );
        Ok(())
    }

    /// Grow by the amortized rule until `needed` elements fit.
    fn grow_for(&mut self, needed: usize) -> Result<(), AllocError> {
        let mut c = self.buf.capacity();
        if c >= needed {
            return Ok(());
        }
        while c < needed {
            c = next_capacity(c);
        }
        let max = Self::max_len();
        if c > max && needed <= max {
            c = max;
        }
        self.reserve(c)
    }

    fn grow_for_insert(&mut self, index: usize, count: usize) -> Result<(), AllocError> {
        assert!(
            index <= self.buf.len(),
            "insert index {} out of bounds for length {}",
            index,
            self.buf.len()
        );
        let needed = self
            .buf
            .len()
            .checked_add(count)
            .ok_or(AllocError::CapacityOverflow {
                requested: usize::MAX,
                max: Self::max_len(),
            })?;
        self.grow_for(needed)
    }

    /// Append a duplicate of `el`.
    pub fn push_back<Q>(&mut self, el: &Q) -> Result<&mut T, AllocError>
    where
        Q: ?Sized + ToOwned<Owned = T>,
    {
        self.grow_for_insert(self.buf.len(), 1)?;
        let i = self.buf.len();
        self.buf.push(el.to_owned());
        Ok(&mut self.buf[i])
    }

    /// Append `el` without duplicating it.
    pub fn emplace_back(&mut self, el: T) -> Result<&mut T, AllocError> {
        self.grow_for_insert(self.buf.len(), 1)?;
        let i = self.buf.len();
        self.buf.push(el);
        Ok(&mut self.buf[i])
    }

    /// Insert a duplicate of `el` at `index`, shifting the tail right.
    ///
    /// Panics if `index > len()`.
    pub fn insert<Q>(&mut self, index: usize, el: &Q) -> Result<&mut T, AllocError>
    where
        Q: ?Sized + ToOwned<Owned = T>,
    {
        let slice = self.insert_multi(index, core::iter::once(el))?;
        Ok(&mut slice[0])
    }

    /// Insert `el` at `index` without duplicating it.
    pub fn emplace(&mut self, index: usize, el: T) -> Result<&mut T, AllocError> {
        let slice = self.emplace_multi(index, core::iter::once(el))?;
        Ok(&mut slice[0])
    }

    /// Insert duplicates of every element of `els` at `index`, keeping
    /// their order. Returns the newly inserted run.
    pub fn insert_multi<'a, Q, I>(&mut self, index: usize, els: I) -> Result<&mut [T], AllocError>
    where
        Q: ?Sized + ToOwned<Owned = T> + 'a,
        I: IntoIterator<Item = &'a Q>,
        I::IntoIter: ExactSizeIterator,
    {
        let els = els.into_iter();
        let count = els.len();
        self.grow_for_insert(index, count)?;
        drop(self.buf.splice(index..index, els.map(|q| q.to_owned())));
        Ok(&mut self.buf[index..index + count])
    }

    /// Move every element of `els` in at `index`, keeping their order.
    pub fn emplace_multi<I>(&mut self, index: usize, els: I) -> Result<&mut [T], AllocError>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let els = els.into_iter();
        let count = els.len();
        self.grow_for_insert(index, count)?;
        drop(self.buf.splice(index..index, els));
        Ok(&mut self.buf[index..index + count])
    }

    /// Insert `count` default values at `index`.
    pub fn insert_default(&mut self, index: usize, count: usize) -> Result<&mut [T], AllocError>
    where
        T: Default,
    {
        self.emplace_multi(index, (0..count).map(|_| T::default()))
    }

    /// Append duplicates of every element of `els`.
    pub fn extend_from<'a, Q, I>(&mut self, els: I) -> Result<(), AllocError>
    where
        Q: ?Sized + ToOwned<Owned = T> + 'a,
        I: IntoIterator<Item = &'a Q>,
        I::IntoIter: ExactSizeIterator,
    {
        let len = self.buf.len();
        self.insert_multi(len, els).map(|_| ())
    }

    /// Drop `count` elements starting at `index` and close the gap.
    ///
    /// The allocation is kept even when the vector becomes empty.
    /// Panics if the range is out of bounds.
    pub fn remove(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        let end = index
            .checked_add(count)
            .filter(|&end| end <= self.buf.len());
        let Some(end) = end else {
            panic!(
                "remove range {}+{} out of bounds for length {}",
                index,
                count,
                self.buf.len()
            );
        };
        self.buf.drain(index..end).for_each(drop);
    }

    /// Remove and return the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        self.buf.pop()
    }

    /// Duplicate of the element at `index`.
    pub fn item(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.buf.get(index).cloned()
    }

    /// Replace the contents with duplicates of `source`.
    ///
    /// Room for `source` is secured before anything is released, so a
    /// failure leaves `self` as it was.
    pub fn assign(&mut self, source: &Vector<T>) -> Result<(), AllocError>
    where
        T: Clone,
    {
        self.grow_for(source.len())?;
        self.remove(0, self.buf.len());
        self.buf.extend(source.buf.iter().cloned());
        Ok(())
    }

    /// Grow with default values or shrink by removing from the tail.
    pub fn resize_default(&mut self, len: usize) -> Result<(), AllocError>
    where
        T: Default,
    {
        let cur = self.buf.len();
        if len > cur {
            self.insert_default(cur, len - cur)?;
        } else {
            self.remove(len, cur - len);
        }
        Ok(())
    }

    pub fn swap(&mut self, other: &mut Vector<T>) {
        mem::swap(&mut self.buf, &mut other.buf);
    }

    /// Drop every element and free the allocation.
    pub fn clear(&mut self) {
        self.buf = Vec::new();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.buf
    }
}

impl<T> Deref for Vector<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.buf
    }
}

impl<T> DerefMut for Vector<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.buf
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.iter()
    }
}

impl<T> IntoIterator for Vector<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.buf.into_iter()
    }
}

impl<T> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            buf: iter.into_iter().collect(),
        }
    }
}

impl<T> From<Vec<T>> for Vector<T> {
    fn from(buf: Vec<T>) -> Self {
        Self { buf }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn assert_contents(v: &Vector<i32>, expected: &[i32]) {
        assert_eq!(v.len(), expected.len());
        assert_eq!(v.as_slice(), expected);
    }

    /// Element whose drop is observable, standing in for a release hook.
    #[derive(Debug)]
    struct Tracked {
        id: i32,
        drops: Rc<Cell<usize>>,
    }

    impl Clone for Tracked {
        fn clone(&self) -> Self {
            Tracked {
                id: self.id,
                drops: self.drops.clone(),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn next_capacity_steps() {
        assert_eq!(next_capacity(0), 2);
        assert_eq!(next_capacity(1), 2);
        assert_eq!(next_capacity(2), 3);
        assert_eq!(next_capacity(10), 15);
        assert_eq!(next_capacity(usize::MAX - 1), usize::MAX);
    }

    #[test]
    fn new_vector_is_empty_and_unallocated() {
        let v: Vector<i32> = Vector::new();
        assert_eq!(v.len(), 0);
        assert_eq!(v.capacity(), 0);
        assert!(v.is_empty());
    }

    #[test]
    fn append_values() {
        let mut v = Vector::new();
        for i in 0..1000 {
            v.push_back(&i).unwrap();
        }
        assert_eq!(v.len(), 1000);
        for (i, x) in v.iter().enumerate() {
            assert_eq!(*x, i as i32);
        }
        v.clear();
        assert_eq!(v.len(), 0);
        assert_eq!(v.capacity(), 0);
    }

    #[test]
    fn append_reallocates_logarithmically() {
        let mut v: Vector<u64> = Vector::new();
        let mut reallocs = 0;
        let mut last_cap = v.capacity();
        for i in 0..10_000u64 {
            v.emplace_back(i).unwrap();
            let cap = v.capacity();
            assert!(cap >= last_cap, "capacity never shrinks");
            if cap != last_cap {
                reallocs += 1;
                last_cap = cap;
            }
        }
        // 1.5x growth from 2 reaches 10_000 in about 21 steps.
        assert!(reallocs <= 25, "too many reallocations: {}", reallocs);
        assert!(v.iter().copied().eq(0..10_000u64));
    }

    #[test]
    fn prepend_values() {
        let mut v = Vector::new();
        for i in 0..100 {
            v.insert(0, &i).unwrap();
        }
        assert_eq!(v.len(), 100);
        for i in 0..100 {
            assert_eq!(v[i], 100 - i as i32 - 1);
        }
    }

    #[test]
    fn prepend_multi() {
        let vals = [0, 1, 2, 3, 4];
        let mut v = Vector::new();

        v.insert_multi(0, &vals[0..2]).unwrap();
        assert_contents(&v, &[0, 1]);

        v.insert_multi(0, &vals[2..3]).unwrap();
        assert_contents(&v, &[2, 0, 1]);

        v.insert_multi(0, &vals[3..5]).unwrap();
        assert_contents(&v, &[3, 4, 2, 0, 1]);

        v.insert_multi(0, &vals[0..0]).unwrap();
        assert_contents(&v, &[3, 4, 2, 0, 1]);

        v.insert_multi(0, core::iter::empty::<&i32>()).unwrap();
        assert_contents(&v, &[3, 4, 2, 0, 1]);
    }

    #[test]
    fn insert_multi_positions() {
        let vals = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut v = Vector::new();

        v.insert_multi(0, &vals[0..2]).unwrap();
        assert_contents(&v, &[0, 1]);

        let run = v.insert_multi(1, &vals[2..4]).unwrap();
        assert_eq!(run, &[2, 3]);
        assert_contents(&v, &[0, 2, 3, 1]);

        let len = v.len();
        v.insert(len, &vals[4]).unwrap();
        assert_contents(&v, &[0, 2, 3, 1, 4]);

        v.insert(0, &vals[5]).unwrap();
        assert_contents(&v, &[5, 0, 2, 3, 1, 4]);

        v.insert_multi(4, core::iter::empty::<&i32>()).unwrap();
        assert_contents(&v, &[5, 0, 2, 3, 1, 4]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn insert_past_end_panics() {
        let mut v: Vector<i32> = Vector::new();
        let _ = v.insert(1, &1);
    }

    #[test]
    fn remove_range_keeps_order() {
        let mut v = Vector::new();
        for i in 0..100 {
            v.push_back(&i).unwrap();
        }
        v.remove(31, 4);
        assert_eq!(v.len(), 96);
        let mut prev = -1;
        for &cur in v.iter() {
            assert!(!(31..=34).contains(&cur));
            assert!(prev < cur);
            prev = cur;
        }

        let cap = v.capacity();
        let len = v.len();
        v.remove(0, len);
        assert_eq!(v.len(), 0);
        assert_eq!(v.capacity(), cap, "removing everything keeps the allocation");

        // Removing nothing from an empty vector is a no-op.
        v.remove(0, 0);
        assert_eq!(v.len(), 0);
    }

    #[test]
    fn overflowing_reserve_fails_without_change() {
        let mut v: Vector<i32> = Vector::new();
        match v.reserve(usize::MAX / mem::size_of::<i32>()) {
            Err(AllocError::CapacityOverflow { .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(v.capacity(), 0);

        v.push_back(&1).unwrap();
        v.push_back(&2).unwrap();
        v.push_back(&3).unwrap();
        assert!(v.capacity() >= 3);

        assert!(v.reserve(usize::MAX / mem::size_of::<i32>()).is_err());
        assert_contents(&v, &[1, 2, 3]);
        assert!(v.capacity() >= 3);
    }

    #[test]
    fn push_pop() {
        let mut v = Vector::new();
        for i in 0..1000 {
            v.push_back(&i).unwrap();
        }
        assert_eq!(v.pop_back(), Some(999));
        assert_eq!(v.len(), 999);

        let mut empty: Vector<i32> = Vector::new();
        assert_eq!(empty.pop_back(), None);
    }

    #[test]
    fn owned_strings() {
        let mut v: Vector<String> = Vector::new();
        v.push_back("Hello World!").unwrap();
        v.push_back("Goodbye, World!").unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0], "Hello World!");

        let g = v.pop_back().unwrap();
        assert_eq!(g, "Goodbye, World!");
        assert_eq!(v.len(), 1);

        v.emplace_back(String::from("Goodbye, World, again!"))
            .unwrap();
        assert_eq!(v.item(1).as_deref(), Some("Goodbye, World, again!"));
    }

    #[test]
    fn borrowed_strings_are_not_copied() {
        let backing = String::from("shared");
        let mut v: Vector<&str> = Vector::new();
        v.push_back(&backing.as_str()).unwrap();
        v.emplace_back(&backing[0..3]).unwrap();
        assert!(core::ptr::eq(v[0].as_ptr(), backing.as_ptr()));
        assert_eq!(v[1], "sha");
    }

    #[test]
    fn assign_copies() {
        let mut v1: Vector<i32> = Vector::new();
        let mut v2: Vector<i32> = Vector::new();
        v2.extend_from(&[1, 2, 3]).unwrap();

        v1.assign(&v2).unwrap();
        assert_contents(&v1, &[1, 2, 3]);

        v1.push_back(&4).unwrap();
        v1.push_back(&5).unwrap();
        v2.assign(&v1).unwrap();
        assert_contents(&v2, &[1, 2, 3, 4, 5]);
        assert_contents(&v1, &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a: Vector<i32> = Vector::new();
        let mut b: Vector<i32> = Vector::new();
        a.extend_from(&[1, 2]).unwrap();
        b.extend_from(&[3]).unwrap();
        a.swap(&mut b);
        assert_contents(&a, &[3]);
        assert_contents(&b, &[1, 2]);
    }

    #[test]
    fn resize_default_grows_and_shrinks() {
        let mut v: Vector<i32> = Vector::new();
        v.extend_from(&[7, 8]).unwrap();
        v.resize_default(4).unwrap();
        assert_contents(&v, &[7, 8, 0, 0]);
        v.resize_default(1).unwrap();
        assert_contents(&v, &[7]);
    }

    #[test]
    fn release_runs_once_per_element() {
        let drops = Rc::new(Cell::new(0));
        let mk = |id| Tracked {
            id,
            drops: drops.clone(),
        };

        let mut v = Vector::new();
        for i in 0..10 {
            v.emplace_back(mk(i)).unwrap();
        }
        assert_eq!(drops.get(), 0);

        v.remove(2, 3);
        assert_eq!(drops.get(), 3);
        assert_eq!(v.iter().map(|t| t.id).collect::<Vec<_>>(), [0, 1, 5, 6, 7, 8, 9]);

        let mut copy = Vector::new();
        copy.assign(&v).unwrap();
        assert_eq!(drops.get(), 3, "duplicating releases nothing");

        v.clear();
        assert_eq!(drops.get(), 10);
        drop(copy);
        assert_eq!(drops.get(), 17);
    }
}
