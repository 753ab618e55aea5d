//! Cosync Incremental - Views maintained from change notifications.
//!
//! Instead of re-sorting or re-filtering a whole collection on every change,
//! the views in this crate apply each upstream change in place and emit the
//! minimal positional events describing it.
//!
//! # Core Concepts
//!
//! - `Notification`: A positionless Added/Removed/Reset change
//! - `IncrementalChangeNotifier`: A source of notifications
//! - `StatefulIncrementalChangeNotifier`: A notifier that also reports
//!   per-item state changes
//!
//! # Notifiers
//!
//! - `SourceNotifier`: Membership feed of a positional collection
//! - `FilteredNotifier` / `FilteredStatefulNotifier`: Predicate on item or state
//! - `StatefulNotifier`: Tracks a per-item state through item signals
//!
//! # Views
//!
//! - `SortedView`: Comparer-ordered, optionally filtered
//! - `FilteredView`: Order-preserving filter of a positional source
//! - `StatefulSortedView`: Ordered by tracked state, moving items as it changes
//! - `MultiplexedView`: Distinct keys projected from many items
//!
//! # Example
//!
//! ```rust
//! use cosync_core::{ObservableCollection, SimpleComparator};
//! use cosync_incremental::SortedViewBuilder;
//! use cosync_reactive::ObservableList;
//!
//! let list = ObservableList::from_vec(vec![5, 2, 8, 3]);
//! let evens = SortedViewBuilder::new(SimpleComparator::asc())
//!     .filter(|x: &i32| x % 2 == 0)
//!     .build_from_source(list.clone());
//! assert_eq!(evens.to_vec(), vec![2, 8]);
//!
//! list.push(4).unwrap();
//! list.push(7).unwrap();
//! assert_eq!(evens.to_vec(), vec![2, 4, 8]);
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod notification;
pub mod notifier;
pub mod view;

#[cfg(test)]
mod testing;

pub use notification::{
    IncrementalChangeNotifier, Notification, Predicate, StateChange, StatefulIncrementalChangeNotifier,
    StatefulNotification,
};
pub use notifier::{
    AttachFn, FilteredNotifier, FilteredStatefulNotifier, ItemSignal, SourceNotifier, StatefulNotifier,
};
pub use view::{
    FilteredView, MultiplexedView, Projection, SortedFilteredView, SortedView, SortedViewBuilder,
    StatefulSortedView,
};
