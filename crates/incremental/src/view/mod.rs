//! Views: positional collections maintained from a source or notifier.
//!
//! - `SortedView` / `SortedFilteredView`: items ordered by a comparer
//! - `FilteredView`: passing items in source order
//! - `StatefulSortedView`: items ordered by their tracked state
//! - `MultiplexedView`: distinct projected keys, ordered
//!
//! Every view is itself an `ObservableCollection`, so views chain.

mod feed;
mod filtered;
mod multiplexed;
mod ordered;
mod sorted;
mod stateful;

pub use filtered::FilteredView;
pub use multiplexed::{MultiplexedView, Projection};
pub use sorted::{SortedFilteredView, SortedView, SortedViewBuilder};
pub use stateful::StatefulSortedView;
