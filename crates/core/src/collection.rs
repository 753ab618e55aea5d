//! The positional source contract.

use crate::event::{ChangeEvent, CountChanged};
use crate::subscription::{ChangeCallback, Subscription};
use alloc::vec::Vec;

/// An ordered, index-addressable collection with a positional change feed.
///
/// Subscribing never replays existing content: consumers that need the current
/// snapshot read it with `to_vec` before subscribing.
pub trait ObservableCollection<T> {
    /// Returns the number of elements.
    fn len(&self) -> usize;

    /// Returns true if the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the element at `index`.
    fn get(&self, index: usize) -> Option<T>;

    /// Returns a snapshot of the content in collection order.
    fn to_vec(&self) -> Vec<T>;

    /// Subscribes to positional change events.
    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<T>>) -> Subscription;

    /// Subscribes to count change notifications.
    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription;
}
