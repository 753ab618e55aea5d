//! Cosync Index - Sequence algorithms behind cosync views.
//!
//! This crate provides the building blocks views use to stay in sync without
//! rebuilding:
//!
//! - `diff`: Minimal edit scripts between two snapshots (Myers, O(ND))
//! - `ordered`: Binary-search insertion and removal of sorted runs
//! - `RefCountMap`: Reference-counted key membership for deduplication
//! - `SyncRefCountMap`: A thread-safe, spin-guarded `RefCountMap`
//!
//! # Example
//!
//! ```rust
//! use cosync_core::SimpleComparator;
//! use cosync_index::{diff, insert_presorted_items, RefCountMap};
//!
//! // Edit script between two snapshots
//! let left: Vec<char> = "kitten".chars().collect();
//! let right: Vec<char> = "sitting".chars().collect();
//! let script = diff(&left, &right);
//! assert_eq!(script.apply(&left, &right), right);
//!
//! // Merge a sorted run into a sorted list
//! let mut list = vec![10, 20, 30];
//! let indices = insert_presorted_items(&mut list, vec![15, 35], &SimpleComparator::asc());
//! assert_eq!(list, vec![10, 15, 20, 30, 35]);
//! assert_eq!(indices, vec![1, 4]);
//!
//! // Reference-counted membership
//! let mut counts = RefCountMap::new();
//! assert!(counts.increment("tag"));
//! assert!(!counts.increment("tag"));
//! assert_eq!(counts.decrement("tag"), Ok(false));
//! assert_eq!(counts.decrement("tag"), Ok(true));
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod diff;
pub mod ordered;
pub mod refcount;

pub use diff::{diff, diff_by, diff_by_key, EditOp, EditScript};
pub use ordered::{
    binary_search, binary_search_by_identity, contiguous_runs, insert_presorted_items,
    insert_sorted, is_sorted, remove_presorted_items, remove_sorted,
};
pub use refcount::{RefCountMap, SyncRefCountMap};
