#![cfg(test)]

// Property tests for both table variants kept inside the crate so they can
// reach test-only helpers such as `discard_buckets`.

use crate::chained_table::ChainedTable;
use crate::hash_table::{Handle, HashTable};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    SetDefault(usize),
    LookupOrInsert(usize, i32),
    Remove(usize),
    RemoveHandle(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    DeleteBelow(i32),
    DiscardBuckets,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=64).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            1 => idx.clone().prop_map(OpI::SetDefault),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::LookupOrInsert(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::RemoveHandle),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => (idx.clone(), -100i32..100).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => any::<i32>().prop_map(OpI::DeleteBelow),
            2 => prop_oneof![Just(OpI::DiscardBuckets), Just(OpI::Iterate)],
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives the storage-indexed table and a std HashMap through the same
// operations, checking after every step:
// - lookups agree with the model and live handles stay stable;
// - `remove`/`remove_handle` return the owned pair the model held;
// - cursor deletion leaves exactly the model's survivors;
// - `len` parity and the structural sanity check, including while the
//   bucket array is missing.
fn run_storage_indexed<S>(
    mut sut: HashTable<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Handle> = HashMap::new();
    let make_calls = Cell::new(0);

    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = key_from(pool, i);
                let h = sut.set(k.clone(), v).expect("set");
                if let Some(&prev) = live.get(&k) {
                    prop_assert_eq!(prev, h, "set on a live key keeps its slot");
                }
                live.insert(k.clone(), h);
                model.insert(k, v);
            }
            OpI::SetDefault(i) => {
                let k = key_from(pool, i);
                let h = sut.set_default(&k).expect("set_default");
                live.insert(k.clone(), h);
                model.insert(k, 0);
            }
            OpI::LookupOrInsert(i, v) => {
                let k = key_from(pool, i);
                let before = make_calls.get();
                let h = sut
                    .lookup_or_insert_with(&k, || {
                        make_calls.set(make_calls.get() + 1);
                        v
                    })
                    .expect("lookup_or_insert_with");
                let present = model.contains_key(&k);
                prop_assert_eq!(make_calls.get(), before + usize::from(!present));
                if !present {
                    model.insert(k.clone(), v);
                }
                prop_assert_eq!(h.value(&sut), model.get(&k));
                live.insert(k, h);
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                let got = sut.remove(k.0.as_str());
                let want = model.remove(&k).map(|v| (k.clone(), v));
                prop_assert_eq!(got, want);
                live.remove(&k);
            }
            OpI::RemoveHandle(i) => {
                let k = key_from(pool, i);
                if let Some(h) = live.remove(&k) {
                    let got = sut.remove_handle(h);
                    let want = model.remove(&k).map(|v| (k.clone(), v));
                    prop_assert_eq!(got, want);
                }
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                if let Some(h) = sut.lookup(&k) {
                    prop_assert_eq!(Some(&h), live.get(&k));
                    prop_assert_eq!(h.key(&sut), Some(&k));
                }
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(&h) = live.get(&k) {
                    match h.value_mut(&mut sut) {
                        Some(vr) => {
                            *vr = vr.saturating_add(d);
                        }
                        None => {
                            prop_assert!(false, "live handle should resolve");
                        }
                    }
                    if let Some(mv) = model.get_mut(&k) {
                        *mv = mv.saturating_add(d);
                    }
                }
            }
            OpI::DeleteBelow(t) => {
                let mut cursor = sut.cursor();
                while !cursor.at_end() {
                    if cursor.value().is_some_and(|v| *v < t) {
                        cursor.delete();
                    }
                    cursor.advance();
                }
                model.retain(|_, v| *v >= t);
                live.retain(|k, _| model.contains_key(k));
            }
            OpI::DiscardBuckets => sut.discard_buckets(),
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        prop_assert!(sut.check_internal_sanity());
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Same model check for the node-chained table, which also shrinks.
fn run_chained<S>(
    mut sut: ChainedTable<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model: HashMap<Key, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = key_from(pool, i);
                prop_assert_eq!(*sut.set(k.clone(), v), v);
                model.insert(k, v);
            }
            OpI::SetDefault(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(*sut.set_default(&k), 0);
                model.insert(k, 0);
            }
            OpI::LookupOrInsert(i, v) => {
                let k = key_from(pool, i);
                let want = *model.entry(k.clone()).or_insert(v);
                prop_assert_eq!(*sut.lookup_or_insert_with(&k, || v), want);
            }
            OpI::Remove(i) | OpI::RemoveHandle(i) => {
                let k = key_from(pool, i);
                let want = model.remove(&k).map(|v| (k.clone(), v));
                prop_assert_eq!(sut.remove(k.0.as_str()), want);
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(vr) = sut.get_mut(&k) {
                    *vr = vr.saturating_add(d);
                }
                if let Some(mv) = model.get_mut(&k) {
                    *mv = mv.saturating_add(d);
                }
            }
            OpI::DeleteBelow(t) => {
                let doomed: Vec<Key> = sut
                    .iter()
                    .filter(|(_, v)| **v < t)
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in doomed {
                    prop_assert!(sut.remove(&k).is_some());
                }
                model.retain(|_, v| *v >= t);
            }
            OpI::DiscardBuckets => {}
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        prop_assert!(sut.check_internal_sanity());
        prop_assert_eq!(sut.len(), model.len());
    }
    Ok(())
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_storage_indexed(HashTable::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_storage_indexed(HashTable::with_hasher(ConstBuildHasher), &pool, ops)?;
    }

    #[test]
    fn prop_chained_state_machine((pool, ops) in arb_scenario()) {
        run_chained(ChainedTable::new(), &pool, ops)?;
    }

    #[test]
    fn prop_chained_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_chained(ChainedTable::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}

// Property: after inserting N distinct integers the table is sane, holds all
// of them, and never sits on a tier larger than needed.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_growth_picks_minimal_tier(keys in proptest::collection::btree_set(any::<u32>(), 0..2_000)) {
        let mut t: HashTable<u32, u32> = HashTable::new();
        for &k in &keys {
            t.set(k, !k).expect("set");
        }
        prop_assert!(t.check_internal_sanity());
        prop_assert_eq!(t.len(), keys.len());
        let tier = t.size_tier();
        prop_assert!(tier == 0 || crate::tiers::load_limit(tier - 1) < keys.len());
        for &k in &keys {
            prop_assert_eq!(t.get(&k), Some(&!k));
        }
    }
}
