//! Per-item state tracking.

use crate::notification::{
    IncrementalChangeNotifier, Notification, StateChange, StatefulIncrementalChangeNotifier, StatefulNotification,
};
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;
use cosync_core::{ChangeCallback, Error, Result, Subscription, SubscriptionManager};
use hashbrown::HashMap;
use tracing::trace;

/// Invoked by an item's state signal whenever the item may have changed.
pub type ItemSignal = Rc<dyn Fn() -> Result<()>>;

/// Attaches an item signal to an item, returning the handle that detaches it.
pub type AttachFn<T> = Rc<dyn Fn(&T, ItemSignal) -> Subscription>;

/// Side-table entry for one tracked item.
struct Tracked<S> {
    /// Keeps the item signal attached while the item is tracked
    _signal: Subscription,
    /// State observed at the last signal (or when the item was added)
    state: S,
}

struct Inner<T, S, K> {
    upstream: Rc<dyn IncrementalChangeNotifier<T>>,
    state_fn: Rc<dyn Fn(&T) -> S>,
    key_fn: Rc<dyn Fn(&T) -> K>,
    attach: AttachFn<T>,
    tracked: RefCell<HashMap<K, Tracked<S>>>,
    channel: SubscriptionManager<StatefulNotification<T, S>>,
    subscription: RefCell<Subscription>,
}

/// Tracks a per-item state over a plain notifier.
///
/// Every item is registered in a side table keyed by `key_fn`, holding the
/// detach handle of its state signal and the last state seen. When a signal
/// fires the state is recomputed with `state_fn` and a `Changed` notification
/// carries the old and new state.
///
/// Keys must be unique and stable while an item is tracked. Adding a key that
/// is already tracked, or removing one that is not, means an item's key
/// mutated or an add was missed; both are reported as faults.
pub struct StatefulNotifier<T, S, K> {
    inner: Rc<Inner<T, S, K>>,
}

impl<T, S, K> Clone for StatefulNotifier<T, S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, S, K> StatefulNotifier<T, S, K>
where
    T: Clone + 'static,
    S: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Creates a stateful notifier over `upstream`.
    ///
    /// Items already present upstream are tracked immediately.
    pub fn new<N, SF, KF, AF>(upstream: N, state_fn: SF, key_fn: KF, attach: AF) -> Result<Self>
    where
        N: IncrementalChangeNotifier<T> + 'static,
        SF: Fn(&T) -> S + 'static,
        KF: Fn(&T) -> K + 'static,
        AF: Fn(&T, ItemSignal) -> Subscription + 'static,
    {
        let inner = Rc::new(Inner {
            upstream: Rc::new(upstream) as Rc<dyn IncrementalChangeNotifier<T>>,
            state_fn: Rc::new(state_fn),
            key_fn: Rc::new(key_fn),
            attach: Rc::new(attach),
            tracked: RefCell::new(HashMap::new()),
            channel: SubscriptionManager::new(),
            subscription: RefCell::new(Subscription::empty()),
        });

        Inner::track(&inner, &inner.upstream.items())?;

        let weak: Weak<Inner<T, S, K>> = Rc::downgrade(&inner);
        let subscription = inner.upstream.subscribe(Rc::new(move |n: &Notification<T>| {
            match weak.upgrade() {
                Some(inner) => Inner::on_notification(&inner, n),
                None => Ok(()),
            }
        }));
        *inner.subscription.borrow_mut() = subscription;

        Ok(Self { inner })
    }

    /// Returns the number of tracked items.
    pub fn tracked_len(&self) -> usize {
        self.inner.tracked.borrow().len()
    }

    /// Stops listening upstream and detaches every item signal.
    pub fn detach(&self) {
        self.inner.subscription.borrow_mut().detach();
        self.inner.untrack_all();
    }
}

impl<T, S, K> Inner<T, S, K>
where
    T: Clone + 'static,
    S: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    fn on_notification(this: &Rc<Self>, notification: &Notification<T>) -> Result<()> {
        match notification {
            Notification::Added(items) => Self::track(this, items)?,
            Notification::Removed(items) => this.untrack(items)?,
            Notification::Reset => this.untrack_all(),
        }
        this.channel
            .notify_all(&StatefulNotification::Plain(notification.clone()))
    }

    fn track(this: &Rc<Self>, items: &[T]) -> Result<()> {
        for item in items {
            let key = (this.key_fn)(item);
            if this.tracked.borrow().contains_key(&key) {
                return Err(Error::invariant(
                    "stateful notifier received an item whose key is already tracked",
                ));
            }

            let weak = Rc::downgrade(this);
            let signal_item = item.clone();
            let signal_key = key.clone();
            let signal: ItemSignal = Rc::new(move || match weak.upgrade() {
                Some(inner) => inner.on_signal(&signal_item, &signal_key),
                None => Ok(()),
            });

            // The attach callback may read the item; keep the table unborrowed.
            let handle = (this.attach)(item, signal);
            let state = (this.state_fn)(item);
            this.tracked.borrow_mut().insert(
                key,
                Tracked {
                    _signal: handle,
                    state,
                },
            );
        }
        Ok(())
    }

    fn untrack(&self, items: &[T]) -> Result<()> {
        for item in items {
            let key = (self.key_fn)(item);
            let removed = self.tracked.borrow_mut().remove(&key);
            match removed {
                // Dropping the entry detaches the item signal.
                Some(entry) => drop(entry),
                None => {
                    return Err(Error::invariant(format!(
                        "stateful notifier removed an item whose key was not tracked ({} tracked): \
                         either the key mutated or the item was added without an Added notification",
                        self.tracked.borrow().len()
                    )))
                }
            }
        }
        Ok(())
    }

    fn untrack_all(&self) {
        let entries = core::mem::take(&mut *self.tracked.borrow_mut());
        drop(entries);
    }

    fn on_signal(&self, item: &T, key: &K) -> Result<()> {
        let new_state = (self.state_fn)(item);
        let old_state = {
            let mut tracked = self.tracked.borrow_mut();
            match tracked.get_mut(key) {
                Some(entry) => core::mem::replace(&mut entry.state, new_state.clone()),
                // Late signal for an item that was already removed.
                None => return Ok(()),
            }
        };
        trace!("stateful notifier item state changed");
        self.channel.notify_all(&StatefulNotification::Changed(vec![StateChange::new(
            item.clone(),
            old_state,
            new_state,
        )]))
    }
}

impl<T, S, K> IncrementalChangeNotifier<T> for StatefulNotifier<T, S, K>
where
    T: Clone + 'static,
    S: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    fn items(&self) -> Vec<T> {
        self.inner.upstream.items()
    }

    fn len(&self) -> usize {
        self.inner.upstream.len()
    }

    fn subscribe(&self, callback: ChangeCallback<Notification<T>>) -> Subscription {
        self.inner
            .channel
            .subscribe_scoped(move |n: &StatefulNotification<T, S>| match n {
                StatefulNotification::Plain(plain) => callback(plain),
                StatefulNotification::Changed(_) => Ok(()),
            })
    }
}

impl<T, S, K> StatefulIncrementalChangeNotifier<T, S> for StatefulNotifier<T, S, K>
where
    T: Clone + 'static,
    S: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    fn state_of(&self, item: &T) -> S {
        (self.inner.state_fn)(item)
    }

    fn subscribe_stateful(&self, callback: ChangeCallback<StatefulNotification<T, S>>) -> Subscription {
        self.inner.channel.subscribe_rc_scoped(callback)
    }
}
