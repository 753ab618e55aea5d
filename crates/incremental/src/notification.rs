//! Positionless change notifications.
//!
//! A notifier reports *which* items entered or left a collection, never
//! *where*. Views that keep their own ordering consume these and derive the
//! positions themselves.

use alloc::rc::Rc;
use alloc::vec::Vec;
use cosync_core::{ChangeCallback, Subscription};

/// An item predicate shared between notifiers and views.
pub type Predicate<T> = Rc<dyn Fn(&T) -> bool>;

/// A positionless change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<T> {
    /// Items entered the collection.
    Added(Vec<T>),
    /// Items left the collection.
    Removed(Vec<T>),
    /// The collection was cleared; it is rebuilt by later `Added` notifications.
    Reset,
}

impl<T> Notification<T> {
    /// Returns the number of items carried.
    pub fn len(&self) -> usize {
        match self {
            Notification::Added(items) | Notification::Removed(items) => items.len(),
            Notification::Reset => 0,
        }
    }

    /// Returns true if no items are carried.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The state of an item before and after a state signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChange<T, S> {
    pub item: T,
    pub old_state: S,
    pub new_state: S,
}

impl<T, S> StateChange<T, S> {
    /// Creates a state change record.
    pub fn new(item: T, old_state: S, new_state: S) -> Self {
        Self {
            item,
            old_state,
            new_state,
        }
    }
}

/// A positionless change from a stateful notifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatefulNotification<T, S> {
    /// A membership change.
    Plain(Notification<T>),
    /// Items changed state while staying in the collection.
    Changed(Vec<StateChange<T, S>>),
}

impl<T, S> From<Notification<T>> for StatefulNotification<T, S> {
    fn from(notification: Notification<T>) -> Self {
        StatefulNotification::Plain(notification)
    }
}

/// A source of positionless change notifications.
pub trait IncrementalChangeNotifier<T> {
    /// Returns the items currently in the collection.
    fn items(&self) -> Vec<T>;

    /// Returns the number of items currently in the collection.
    fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns true if the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to `Added` / `Removed` / `Reset` notifications.
    fn subscribe(&self, callback: ChangeCallback<Notification<T>>) -> Subscription;
}

/// A notifier that also tracks a per-item state.
///
/// Plain subscribers see membership changes only; stateful subscribers also
/// receive `Changed` whenever an item's state signal fires.
pub trait StatefulIncrementalChangeNotifier<T, S>: IncrementalChangeNotifier<T> {
    /// Computes the current state of an item.
    fn state_of(&self, item: &T) -> S;

    /// Subscribes to membership and state changes.
    fn subscribe_stateful(&self, callback: ChangeCallback<StatefulNotification<T, S>>) -> Subscription;
}
