//! chained-collections: allocation-aware container building blocks with
//! explicit ownership semantics and fallible growth.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: small containers whose growth arithmetic, rehashing and
//!   deletion-during-iteration can each be reasoned about on their own,
//!   and which report allocation failure instead of aborting.
//! - Layers:
//!   - Vector<T>: contiguous buffer growing by half of itself (minimum 2).
//!     Everything that allocates returns `Result<_, AllocError>`.
//!   - HashTable<K, V, S>: separate chaining where buckets and chain links
//!     are `u32` indices into one item storage array; removed slots go on
//!     a LIFO freelist and are reused, never compacted.
//!   - ChainedTable<K, V, S>: the same placement rule over boxed nodes;
//!     grows and shrinks.
//!   - StrList: a `Vector<String>` with split/join, lines, double-null
//!     buffers and `KEY=value` environment lookups.
//!   - IntrusiveList<T>: doubly linked list threaded through links that
//!     live inside the elements.
//!
//! Constraints
//! - Single-threaded, synchronous; exclusive access comes from `&mut`.
//! - Bucket index is `(hash * 11) mod size` over a fixed ladder of prime
//!   sizes; a table grows once it holds more than 3/4 of its buckets.
//! - HashTable never shrinks. Its `Handle`s survive growth and stay valid
//!   until their own item is removed.
//! - At most `u32::MAX - 2` items per HashTable; the top two index values
//!   are reserved as sentinels.
//!
//! Ownership
//! - Duplicating is `ToOwned`/`Clone`: methods taking `&Q` store
//!   `q.to_owned()`. Methods taking a value (`set`, `emplace_*`) move it.
//! - Releasing is `Drop`. Borrowing containers simply hold borrowed
//!   element types such as `Vector<&str>`.
//!
//! Allocation failure
//! - A failed vector operation leaves the vector unchanged.
//! - A HashTable that cannot allocate its bucket array keeps working by
//!   scanning item storage linearly, and rebuilds the array on a later
//!   insertion. Stored items are never lost.
//! - ChainedTable keeps its current bucket array when a resize fails.
//!
//! Hashing
//! - Tables take any `S: BuildHasher` (default `RandomState`). The 64-bit
//!   hash is folded to 32 bits and stored per item, so resizing never calls
//!   `K: Hash` again. `StrBuildHasher` is a deterministic alternative.
//!
//! Logging
//! - Uses the `log` facade: `trace` for storage growth, `debug` for bucket
//!   rebuilds, `warn` when a bucket array could not be allocated.

pub mod chained_table;
mod error;
pub mod hash_table;
mod hash_table_proptest;
pub mod intrusive_list;
mod str_hash;
mod str_list;
mod tiers;
mod vector;

// Public surface
pub use chained_table::ChainedTable;
pub use error::AllocError;
#[cfg(feature = "bench_internal")]
pub use hash_table::ChainStats;
pub use hash_table::{Cursor, Handle, HashTable, MAX_ITEMS};
pub use intrusive_list::{IntrusiveList, Link, Linked, ListKey};
pub use str_hash::{StrBuildHasher, StrHasher};
pub use str_list::{EnvKeyMatch, StrList};
pub use vector::Vector;
