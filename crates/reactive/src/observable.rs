//! Mutable observable list.
//!
//! `ObservableList` is the positional source the views attach to. Every
//! mutation updates the backing vector first and then notifies subscribers
//! with no borrow held, so handlers may read the list while reacting.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;
use cosync_core::{
    ChangeCallback, ChangeEvent, CountChanged, Error, ObservableCollection, ReentrancyMonitor, Result,
    Subscription, SubscriptionManager,
};
use cosync_index::diff;
use tracing::debug;

struct Inner<T> {
    items: RefCell<Vec<T>>,
    changes: SubscriptionManager<ChangeEvent<T>>,
    counts: SubscriptionManager<CountChanged>,
    monitor: ReentrancyMonitor,
}

/// A list that reports every mutation as a positional change event.
///
/// Mutating the list from inside one of its own change handlers fails with
/// `Error::Reentrancy`. A handler error aborts the dispatch and is returned
/// from the mutating call; the mutation itself has already been applied.
///
/// Cloning yields another handle to the same list.
pub struct ObservableList<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ObservableList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Creates a list holding `items`. No event is emitted.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                items: RefCell::new(items),
                changes: SubscriptionManager::new(),
                counts: SubscriptionManager::new(),
                monitor: ReentrancyMonitor::new(),
            }),
        }
    }

    /// Appends an item.
    pub fn push(&self, item: T) -> Result<()> {
        self.mutate(|items| {
            let index = items.len();
            items.push(item.clone());
            Ok(((), vec![ChangeEvent::added(vec![item], index)]))
        })
    }

    /// Inserts an item at `index`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.insert_range(index, vec![item])
    }

    /// Inserts a run of items at `index` as a single `Add`.
    pub fn insert_range(&self, index: usize, new_items: Vec<T>) -> Result<()> {
        self.mutate(|items| {
            Error::check_insert_index(index, items.len())?;
            if new_items.is_empty() {
                return Ok(((), Vec::new()));
            }
            items.splice(index..index, new_items.iter().cloned());
            Ok(((), vec![ChangeEvent::added(new_items, index)]))
        })
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.mutate(|items| {
            Error::check_index(index, items.len())?;
            let item = items.remove(index);
            Ok((item.clone(), vec![ChangeEvent::removed(vec![item], index)]))
        })
    }

    /// Removes `count` items starting at `index` as a single `Remove`.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<Vec<T>> {
        self.mutate(|items| {
            if index + count > items.len() {
                return Err(Error::index_out_of_range(index + count, items.len()));
            }
            if count == 0 {
                return Ok((Vec::new(), Vec::new()));
            }
            let removed: Vec<T> = items.drain(index..index + count).collect();
            Ok((removed.clone(), vec![ChangeEvent::removed(removed, index)]))
        })
    }

    /// Removes the first item equal to `item`. Returns false if none matched.
    pub fn remove(&self, item: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        let position = self.inner.items.borrow().iter().position(|existing| existing == item);
        match position {
            Some(index) => self.remove_at(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Replaces the item at `index`, returning the old one.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.mutate(|items| {
            Error::check_index(index, items.len())?;
            let old = core::mem::replace(&mut items[index], item.clone());
            let event = ChangeEvent::replaced(vec![old.clone()], vec![item], index)?;
            Ok((old, vec![event]))
        })
    }

    /// Moves the item at `old_index` so that it ends up at `new_index`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.mutate(|items| {
            Error::check_index(old_index, items.len())?;
            Error::check_index(new_index, items.len())?;
            if old_index == new_index {
                return Ok(((), Vec::new()));
            }
            let item = items.remove(old_index);
            items.insert(new_index, item.clone());
            Ok(((), vec![ChangeEvent::moved(vec![item], old_index, new_index)]))
        })
    }

    /// Removes everything and emits `Reset`.
    ///
    /// Subscribers observe an empty list while handling the `Reset`.
    pub fn clear(&self) -> Result<()> {
        self.mutate(|items| {
            items.clear();
            Ok(((), vec![ChangeEvent::reset()]))
        })
    }

    /// Replaces the whole content: `Reset` on the emptied list, then one `Add`.
    pub fn reset_with(&self, items: Vec<T>) -> Result<()> {
        self.clear()?;
        self.insert_range(0, items)
    }

    /// Reconciles the list with `target` using a minimal edit script.
    ///
    /// Each edit emits at most one `Remove` and one `Add`, so unchanged runs
    /// keep their identity downstream.
    pub fn sync_with(&self, target: &[T]) -> Result<()>
    where
        T: Eq + Hash,
    {
        self.mutate(|items| {
            let script = diff(&items[..], target);
            let mut events = Vec::with_capacity(script.len() * 2);
            let mut offset: isize = 0;
            for op in script.iter() {
                let at = (op.start_left as isize + offset) as usize;
                if op.deleted_left > 0 {
                    let removed: Vec<T> = items.drain(at..at + op.deleted_left).collect();
                    events.push(ChangeEvent::removed(removed, at));
                }
                if op.inserted_right > 0 {
                    let added = target[op.start_right..op.start_right + op.inserted_right].to_vec();
                    items.splice(at..at, added.iter().cloned());
                    events.push(ChangeEvent::added(added, at));
                }
                offset += op.delta();
            }
            debug!(edits = script.len(), events = events.len(), "list synchronized");
            Ok(((), events))
        })
    }

    /// Returns the number of change subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.len()
    }

    /// Applies `mutate` to the items, then publishes the events it returns.
    fn mutate<R, F>(&self, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<T>) -> Result<(R, Vec<ChangeEvent<T>>)>,
    {
        self.inner.monitor.check()?;
        let (result, events, old_len, new_len) = {
            let mut items = self.inner.items.borrow_mut();
            let old_len = items.len();
            let (result, events) = mutate(&mut items)?;
            (result, events, old_len, items.len())
        };
        self.inner.publish(&events, old_len, new_len)?;
        Ok(result)
    }
}

impl<T> Inner<T> {
    fn publish(&self, events: &[ChangeEvent<T>], old_len: usize, new_len: usize) -> Result<()> {
        let _guard = self.monitor.enter();
        for event in events {
            self.changes.notify_all(event)?;
        }
        if old_len != new_len {
            self.counts.notify_all(&CountChanged::new(old_len, new_len))?;
        }
        Ok(())
    }
}

impl<T: Clone + 'static> ObservableCollection<T> for ObservableList<T> {
    fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<T>>) -> Subscription {
        self.inner.changes.subscribe_rc_scoped(callback)
    }

    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription {
        self.inner.counts.subscribe_rc_scoped(callback)
    }
}

impl<T: Clone + core::fmt::Debug + 'static> core::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}
