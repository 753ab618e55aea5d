//! Subscription management for change feeds.
//!
//! A `SubscriptionManager<E>` is one event channel: an ordered list of
//! callbacks invoked synchronously, in registration order, for every event.
//! Dispatch iterates over a copy of the handler list, so handlers may subscribe
//! or unsubscribe while an event is in flight. A handler removed during dispatch
//! is not invoked afterwards; a handler added during dispatch first runs on the
//! next event.

use crate::error::Result;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

/// Unique identifier for a subscription within one channel.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
///
/// A callback that returns an error aborts the dispatch; the error propagates
/// to whoever triggered the event.
pub type ChangeCallback<E> = Rc<dyn Fn(&E) -> Result<()>>;

/// A registered handler.
struct Handler<E> {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on changes
    callback: ChangeCallback<E>,
    /// Cleared on unsubscribe so in-flight dispatch snapshots skip it
    active: Rc<Cell<bool>>,
}

impl<E> Clone for Handler<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
            active: self.active.clone(),
        }
    }
}

impl<E> Handler<E> {
    fn notify(&self, event: &E) -> Result<()> {
        if self.active.get() {
            (self.callback)(event)
        } else {
            Ok(())
        }
    }
}

struct Registry<E> {
    handlers: Vec<Handler<E>>,
    next_id: SubscriptionId,
}

/// Manages the subscriptions of one event channel.
///
/// Cloning yields another handle to the same channel.
pub struct SubscriptionManager<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E> Clone for SubscriptionManager<E> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<E> Default for SubscriptionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SubscriptionManager<E> {
    /// Creates a new, empty channel.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                handlers: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Subscribes to events with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<()> + 'static,
    {
        self.subscribe_rc(Rc::new(callback))
    }

    /// Subscribes an already shared callback.
    pub fn subscribe_rc(&self, callback: ChangeCallback<E>) -> SubscriptionId {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push(Handler {
            id,
            callback,
            active: Rc::new(Cell::new(true)),
        });
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.borrow_mut();
        match registry.handlers.iter().position(|h| h.id == id) {
            Some(pos) => {
                let handler = registry.handlers.remove(pos);
                handler.active.set(false);
                true
            }
            None => false,
        }
    }

    /// Notifies all active subscriptions, in registration order.
    ///
    /// Stops at and returns the first handler error.
    pub fn notify_all(&self, event: &E) -> Result<()> {
        let snapshot: Vec<Handler<E>> = self.registry.borrow().handlers.clone();
        for handler in &snapshot {
            handler.notify(event)?;
        }
        Ok(())
    }

    /// Returns the number of active subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.registry.borrow().handlers.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().handlers.is_empty()
    }

    /// Returns all subscription IDs in registration order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.registry.borrow().handlers.iter().map(|h| h.id).collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&self) {
        let handlers = core::mem::take(&mut self.registry.borrow_mut().handlers);
        for handler in handlers {
            handler.active.set(false);
        }
    }
}

impl<E: 'static> SubscriptionManager<E> {
    /// Subscribes and returns a scoped handle that unsubscribes on drop.
    pub fn subscribe_scoped<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) -> Result<()> + 'static,
    {
        let id = self.subscribe(callback);
        self.scope(id)
    }

    /// Subscribes a shared callback and returns a scoped handle.
    pub fn subscribe_rc_scoped(&self, callback: ChangeCallback<E>) -> Subscription {
        let id = self.subscribe_rc(callback);
        self.scope(id)
    }

    fn scope(&self, id: SubscriptionId) -> Subscription {
        let registry: Weak<RefCell<Registry<E>>> = Rc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                SubscriptionManager { registry }.unsubscribe(id);
            }
        })
    }
}

/// A scoped detachment handle.
///
/// Dropping the handle (or calling `detach`) removes the registration. The
/// handle only holds the channel weakly, so it never keeps a source alive.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Creates a handle that runs `detach` exactly once.
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Creates a handle that does nothing when detached.
    pub fn empty() -> Self {
        Self { detach: None }
    }

    /// Combines several handles into one.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    /// Returns true if the handle has not been detached yet.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }

    /// Detaches now. Subsequent calls are no-ops.
    pub fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use alloc::vec;

    #[test]
    fn test_subscription_manager_subscribe() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();

        let id1 = manager.subscribe(|_| Ok(()));
        let id2 = manager.subscribe(|_| Ok(()));

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.subscription_ids(), vec![1, 2]);
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();

        let id = manager.subscribe(|_| Ok(()));
        assert_eq!(manager.len(), 1);

        assert!(manager.unsubscribe(id));
        assert_eq!(manager.len(), 0);

        assert!(!manager.unsubscribe(id)); // Already removed
    }

    #[test]
    fn test_notify_all_in_registration_order() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in 0..3 {
            let log = log.clone();
            manager.subscribe(move |e: &i32| {
                log.borrow_mut().push((tag, *e));
                Ok(())
            });
        }

        manager.notify_all(&7).unwrap();
        assert_eq!(*log.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_notify_all_stops_at_error() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let count = Rc::new(Cell::new(0));

        manager.subscribe(|_| Err(Error::invariant("boom")));
        let c = count.clone();
        manager.subscribe(move |_| {
            c.set(c.get() + 1);
            Ok(())
        });

        assert!(manager.notify_all(&1).unwrap_err().is_fault());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let count = Rc::new(Cell::new(0));

        // The first handler removes the second one mid-dispatch.
        let m = manager.clone();
        manager.subscribe(move |_| {
            m.unsubscribe(2);
            Ok(())
        });
        let c = count.clone();
        manager.subscribe(move |_| {
            c.set(c.get() + 1);
            Ok(())
        });

        manager.notify_all(&1).unwrap();
        assert_eq!(count.get(), 0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_subscribe_during_dispatch_runs_next_time() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let count = Rc::new(Cell::new(0));

        let m = manager.clone();
        let c = count.clone();
        let added = Rc::new(Cell::new(false));
        manager.subscribe(move |_| {
            if !added.replace(true) {
                let c = c.clone();
                m.subscribe(move |_| {
                    c.set(c.get() + 1);
                    Ok(())
                });
            }
            Ok(())
        });

        manager.notify_all(&1).unwrap();
        assert_eq!(count.get(), 0);
        manager.notify_all(&2).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_scoped_subscription_detaches_on_drop() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        {
            let sub = manager.subscribe_scoped(|_| Ok(()));
            assert!(sub.is_attached());
            assert_eq!(manager.len(), 1);
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn test_scoped_subscription_explicit_detach() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let mut sub = manager.subscribe_scoped(|_| Ok(()));
        sub.detach();
        assert!(!sub.is_attached());
        assert!(manager.is_empty());
        sub.detach();
    }

    #[test]
    fn test_subscription_outlives_manager() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let sub = manager.subscribe_scoped(|_| Ok(()));
        drop(manager);
        drop(sub);
    }

    #[test]
    fn test_subscription_manager_clear() {
        let manager: SubscriptionManager<i32> = SubscriptionManager::new();

        manager.subscribe(|_| Ok(()));
        manager.subscribe(|_| Ok(()));

        assert_eq!(manager.len(), 2);
        manager.clear();
        assert!(manager.is_empty());
    }
}
