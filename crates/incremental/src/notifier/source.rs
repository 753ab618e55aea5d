//! Notifier derived from a positional source.

use crate::notification::{IncrementalChangeNotifier, Notification};
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use cosync_core::{ChangeCallback, ChangeEvent, ObservableCollection, Result, Subscription, SubscriptionManager};
use tracing::trace;

struct Inner<T> {
    source: Rc<dyn ObservableCollection<T>>,
    channel: SubscriptionManager<Notification<T>>,
    subscription: RefCell<Subscription>,
}

/// Strips positions from a source's change feed.
///
/// `Replace` becomes `Removed` followed by `Added`; `Move` is dropped since it
/// does not change membership.
///
/// The notifier keeps its source alive; cloning yields another handle to the
/// same notifier.
pub struct SourceNotifier<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for SourceNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> SourceNotifier<T> {
    /// Creates a notifier over `source`.
    pub fn new<S>(source: S) -> Self
    where
        S: ObservableCollection<T> + 'static,
    {
        let inner = Rc::new(Inner {
            source: Rc::new(source) as Rc<dyn ObservableCollection<T>>,
            channel: SubscriptionManager::new(),
            subscription: RefCell::new(Subscription::empty()),
        });

        let weak: Weak<Inner<T>> = Rc::downgrade(&inner);
        let subscription = inner.source.subscribe(Rc::new(move |event: &ChangeEvent<T>| {
            match weak.upgrade() {
                Some(inner) => inner.on_source_changed(event),
                None => Ok(()),
            }
        }));
        *inner.subscription.borrow_mut() = subscription;

        Self { inner }
    }

    /// Stops listening to the source.
    pub fn detach(&self) {
        self.inner.subscription.borrow_mut().detach();
    }
}

impl<T: Clone> Inner<T> {
    fn on_source_changed(&self, event: &ChangeEvent<T>) -> Result<()> {
        match event {
            ChangeEvent::Add { items, .. } => self.forward(Notification::Added(items.clone())),
            ChangeEvent::Remove { items, .. } => self.forward(Notification::Removed(items.clone())),
            ChangeEvent::Replace {
                old_items,
                new_items,
                ..
            } => {
                self.forward(Notification::Removed(old_items.clone()))?;
                self.forward(Notification::Added(new_items.clone()))
            }
            ChangeEvent::Move { .. } => Ok(()),
            ChangeEvent::Reset => self.forward(Notification::Reset),
        }
    }

    fn forward(&self, notification: Notification<T>) -> Result<()> {
        if notification.is_empty() && !matches!(notification, Notification::Reset) {
            return Ok(());
        }
        trace!(count = notification.len(), "source notifier forwarding");
        self.channel.notify_all(&notification)
    }
}

impl<T: Clone + 'static> IncrementalChangeNotifier<T> for SourceNotifier<T> {
    fn items(&self) -> Vec<T> {
        self.inner.source.to_vec()
    }

    fn len(&self) -> usize {
        self.inner.source.len()
    }

    fn subscribe(&self, callback: ChangeCallback<Notification<T>>) -> Subscription {
        self.inner.channel.subscribe_rc_scoped(callback)
    }
}
