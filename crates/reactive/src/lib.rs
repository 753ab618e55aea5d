//! Cosync Reactive - Mutation-capable observable sources.
//!
//! This crate provides the collections that views attach to. Every mutation
//! is reported to subscribers as a positional `ChangeEvent`, and every length
//! change as a `CountChanged`.
//!
//! # Core Concepts
//!
//! - `ObservableList`: A positional list with insert, remove, replace and move
//! - `KeyedCollection`: An ordered collection indexed by a unique key
//! - `connect_items`: Mirrors a source into a list of derived values
//!
//! # Reconciliation
//!
//! When only full snapshots are available, `ObservableList::sync_with` and
//! `KeyedCollection::sync_with_keys` replay the minimal edit script between the
//! current content and the target, so attached views see granular events
//! rather than a reset.
//!
//! # Example
//!
//! ```rust
//! use cosync_core::ObservableCollection;
//! use cosync_reactive::{connect_items, ObservableList};
//!
//! let list = ObservableList::from_vec(vec!["a", "b", "c"]);
//! let upper = connect_items(&list, |s: &&str| s.to_uppercase());
//!
//! list.sync_with(&["b", "c", "d"]).unwrap();
//! assert_eq!(list.to_vec(), vec!["b", "c", "d"]);
//! assert_eq!(upper.to_vec(), vec!["B", "C", "D"]);
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod connect;
pub mod keyed;
pub mod observable;

pub use connect::{connect_items, connect_items_with, ConnectedItems};
pub use keyed::KeyedCollection;
pub use observable::ObservableList;
