//! IntrusiveList: doubly linked list whose links live inside the elements.
//!
//! Elements embed a [`Link`] and expose it through [`Linked`]. The list
//! keeps the elements themselves in a slot arena and threads them
//! together through their embedded links, so there is no separate node
//! allocation and unlinking is O(1). Keys are generational: a key whose
//! element was removed never resolves again.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key of an element inside an [`IntrusiveList`].
    pub struct ListKey;
}

/// Link fields embedded in a list element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Link {
    prev: Option<ListKey>,
    next: Option<ListKey>,
}

impl Link {
    pub const fn new() -> Self {
        Link {
            prev: None,
            next: None,
        }
    }
}

/// Access to the [`Link`] embedded in a list element.
pub trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

pub struct IntrusiveList<T: Linked> {
    items: SlotMap<ListKey, T>,
    head: Option<ListKey>,
    tail: Option<ListKey>,
}

impl<T: Linked> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> IntrusiveList<T> {
    pub fn new() -> Self {
        Self {
            items: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn first(&self) -> Option<ListKey> {
        self.head
    }

    pub fn last(&self) -> Option<ListKey> {
        self.tail
    }

    pub fn next(&self, key: ListKey) -> Option<ListKey> {
        self.items.get(key)?.link().next
    }

    pub fn prev(&self, key: ListKey) -> Option<ListKey> {
        self.items.get(key)?.link().prev
    }

    pub fn get(&self, key: ListKey) -> Option<&T> {
        self.items.get(key)
    }

    pub fn get_mut(&mut self, key: ListKey) -> Option<&mut T> {
        self.items.get_mut(key)
    }

    pub fn contains(&self, key: ListKey) -> bool {
        self.items.contains_key(key)
    }

    fn set_next(&mut self, at: Option<ListKey>, to: Option<ListKey>) {
        match at.and_then(|k| self.items.get_mut(k)) {
            Some(el) => el.link_mut().next = to,
            None => self.head = to,
        }
    }

    fn set_prev(&mut self, at: Option<ListKey>, to: Option<ListKey>) {
        match at.and_then(|k| self.items.get_mut(k)) {
            Some(el) => el.link_mut().prev = to,
            None => self.tail = to,
        }
    }

    /// Store `el` and link it between `prev` and `next`, which must be
    /// adjacent (or the list ends).
    fn link_between(&mut self, mut el: T, prev: Option<ListKey>, next: Option<ListKey>) -> ListKey {
        *el.link_mut() = Link { prev, next };
        let key = self.items.insert(el);
        self.set_next(prev, Some(key));
        self.set_prev(next, Some(key));
        key
    }

    fn assert_member(&self, key: ListKey) {
        assert!(self.items.contains_key(key), "list key {:?} is not in this list", key);
    }

    pub fn insert_front(&mut self, el: T) -> ListKey {
        let next = self.head;
        self.link_between(el, None, next)
    }

    pub fn insert_back(&mut self, el: T) -> ListKey {
        let prev = self.tail;
        self.link_between(el, prev, None)
    }

    /// Insert `el` right after `at`. Panics if `at` is not in the list.
    pub fn insert_after(&mut self, at: ListKey, el: T) -> ListKey {
        self.assert_member(at);
        let next = self.next(at);
        self.link_between(el, Some(at), next)
    }

    /// Insert `el` right before `at`. Panics if `at` is not in the list.
    pub fn insert_before(&mut self, at: ListKey, el: T) -> ListKey {
        self.assert_member(at);
        let prev = self.prev(at);
        self.link_between(el, prev, Some(at))
    }

    /// Unlink and return the element behind `key`.
    pub fn remove(&mut self, key: ListKey) -> Option<T> {
        let mut el = self.items.remove(key)?;
        let Link { prev, next } = *el.link();
        self.set_next(prev, next);
        self.set_prev(next, prev);
        *el.link_mut() = Link::new();
        Some(el)
    }

    /// Remove every element front to back, handing each to `f`.
    pub fn clear_with<F>(&mut self, mut f: F)
    where
        F: FnMut(T),
    {
        let mut cur = self.head;
        while let Some(key) = cur {
            let Some(mut el) = self.items.remove(key) else {
                break;
            };
            cur = el.link().next;
            *el.link_mut() = Link::new();
            f(el);
        }
        self.items.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn clear(&mut self) {
        self.clear_with(drop);
    }

    /// Front-to-back iterator; `.rev()` walks back to front.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.items.len(),
        }
    }
}

impl<T: Linked + core::fmt::Debug> core::fmt::Debug for IntrusiveList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter().map(|(_, el)| el)).finish()
    }
}

pub struct Iter<'a, T: Linked> {
    list: &'a IntrusiveList<T>,
    front: Option<ListKey>,
    back: Option<ListKey>,
    remaining: usize,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
    type Item = (ListKey, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.front?;
        let el = self.list.items.get(key)?;
        self.front = el.link().next;
        self.remaining -= 1;
        Some((key, el))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T: Linked> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.back?;
        let el = self.list.items.get(key)?;
        self.back = el.link().prev;
        self.remaining -= 1;
        Some((key, el))
    }
}

impl<T: Linked> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T: Linked> IntoIterator for &'a IntrusiveList<T> {
    type Item = (ListKey, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Job {
        id: u32,
        link: Link,
    }

    impl Job {
        fn new(id: u32) -> Self {
            Job {
                id,
                link: Link::new(),
            }
        }
    }

    impl Linked for Job {
        fn link(&self) -> &Link {
            &self.link
        }
        fn link_mut(&mut self) -> &mut Link {
            &mut self.link
        }
    }

    fn ids(list: &IntrusiveList<Job>) -> Vec<u32> {
        list.iter().map(|(_, j)| j.id).collect()
    }

    fn ids_rev(list: &IntrusiveList<Job>) -> Vec<u32> {
        list.iter().rev().map(|(_, j)| j.id).collect()
    }

    #[test]
    fn empty_list() {
        let list: IntrusiveList<Job> = IntrusiveList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.first().is_none());
        assert!(list.last().is_none());
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn insert_at_both_ends_and_around() {
        let mut list = IntrusiveList::new();
        let b = list.insert_back(Job::new(2));
        list.insert_front(Job::new(1));
        let d = list.insert_back(Job::new(4));
        list.insert_after(b, Job::new(3));
        list.insert_before(b, Job::new(15));
        list.insert_after(d, Job::new(5));
        assert_eq!(ids(&list), [1, 15, 2, 3, 4, 5]);
        assert_eq!(ids_rev(&list), [5, 4, 3, 2, 15, 1]);
        assert_eq!(list.len(), 6);
        assert_eq!(list.get(list.last().unwrap()).unwrap().id, 5);
    }

    /// Invariant: removal relinks neighbours and the key stops resolving.
    #[test]
    fn remove_relinks_neighbours() {
        let mut list = IntrusiveList::new();
        let keys: Vec<_> = (0..5).map(|i| list.insert_back(Job::new(i))).collect();

        let mid = list.remove(keys[2]).unwrap();
        assert_eq!(mid.id, 2);
        assert_eq!(mid.link, Link::new());
        assert_eq!(list.next(keys[1]), Some(keys[3]));
        assert_eq!(list.prev(keys[3]), Some(keys[1]));
        assert!(list.remove(keys[2]).is_none());
        assert!(!list.contains(keys[2]));

        list.remove(keys[0]);
        list.remove(keys[4]);
        assert_eq!(list.first(), Some(keys[1]));
        assert_eq!(list.last(), Some(keys[3]));
        assert_eq!(ids(&list), [1, 3]);
        assert_eq!(ids_rev(&list), [3, 1]);

        list.remove(keys[1]);
        list.remove(keys[3]);
        assert!(list.is_empty());
        assert!(list.last().is_none());
    }

    #[test]
    fn traversal_by_keys() {
        let mut list = IntrusiveList::new();
        for i in 0..4 {
            list.insert_back(Job::new(i));
        }
        let mut seen = Vec::new();
        let mut cur = list.first();
        while let Some(k) = cur {
            seen.push(list.get(k).unwrap().id);
            cur = list.next(k);
        }
        assert_eq!(seen, [0, 1, 2, 3]);

        let last = list.last().unwrap();
        list.get_mut(last).unwrap().id = 30;
        assert_eq!(ids_rev(&list), [30, 2, 1, 0]);
    }

    #[test]
    fn iterating_from_both_ends_meets_once() {
        let mut list = IntrusiveList::new();
        for i in 0..5 {
            list.insert_back(Job::new(i));
        }
        let mut it = list.iter();
        assert_eq!(it.next().map(|(_, j)| j.id), Some(0));
        assert_eq!(it.next_back().map(|(_, j)| j.id), Some(4));
        assert_eq!(it.len(), 3);
        let rest: Vec<_> = it.map(|(_, j)| j.id).collect();
        assert_eq!(rest, [1, 2, 3]);
    }

    #[test]
    fn clear_with_visits_front_to_back() {
        let mut list = IntrusiveList::new();
        list.insert_back(Job::new(2));
        list.insert_front(Job::new(1));
        list.insert_back(Job::new(3));
        let mut released = Vec::new();
        list.clear_with(|j| released.push(j.id));
        assert_eq!(released, [1, 2, 3]);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);

        list.insert_back(Job::new(9));
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    #[should_panic(expected = "not in this list")]
    fn insert_after_stale_key_panics() {
        let mut list = IntrusiveList::new();
        let k = list.insert_back(Job::new(1));
        list.remove(k);
        list.insert_after(k, Job::new(2));
    }
}
