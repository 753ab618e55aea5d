//! Filtering notifiers.

use crate::notification::{
    IncrementalChangeNotifier, Notification, Predicate, StatefulIncrementalChangeNotifier, StatefulNotification,
};
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use cosync_core::{ChangeCallback, Result, Subscription, SubscriptionManager};

struct FilteredInner<T> {
    upstream: Rc<dyn IncrementalChangeNotifier<T>>,
    predicate: Predicate<T>,
    channel: SubscriptionManager<Notification<T>>,
    subscription: RefCell<Subscription>,
}

/// Forwards only the items that pass a predicate.
///
/// The predicate must be a pure function of the item: `Removed` is filtered
/// with the same predicate, so an item must evaluate the same way when it
/// leaves as when it entered.
pub struct FilteredNotifier<T> {
    inner: Rc<FilteredInner<T>>,
}

impl<T> Clone for FilteredNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> FilteredNotifier<T> {
    /// Creates a filtered notifier over `upstream`.
    pub fn new<N, F>(upstream: N, predicate: F) -> Self
    where
        N: IncrementalChangeNotifier<T> + 'static,
        F: Fn(&T) -> bool + 'static,
    {
        let inner = Rc::new(FilteredInner {
            upstream: Rc::new(upstream) as Rc<dyn IncrementalChangeNotifier<T>>,
            predicate: Rc::new(predicate) as Predicate<T>,
            channel: SubscriptionManager::new(),
            subscription: RefCell::new(Subscription::empty()),
        });

        let weak: Weak<FilteredInner<T>> = Rc::downgrade(&inner);
        let subscription = inner.upstream.subscribe(Rc::new(move |n: &Notification<T>| {
            match weak.upgrade() {
                Some(inner) => inner.on_notification(n),
                None => Ok(()),
            }
        }));
        *inner.subscription.borrow_mut() = subscription;

        Self { inner }
    }

    /// Stops listening to the upstream notifier.
    pub fn detach(&self) {
        self.inner.subscription.borrow_mut().detach();
    }
}

impl<T: Clone> FilteredInner<T> {
    fn passing(&self, items: &[T]) -> Vec<T> {
        items.iter().filter(|item| (self.predicate)(item)).cloned().collect()
    }

    fn on_notification(&self, notification: &Notification<T>) -> Result<()> {
        let filtered = match notification {
            Notification::Added(items) => Notification::Added(self.passing(items)),
            Notification::Removed(items) => Notification::Removed(self.passing(items)),
            Notification::Reset => Notification::Reset,
        };
        if filtered.is_empty() && !matches!(filtered, Notification::Reset) {
            return Ok(());
        }
        self.channel.notify_all(&filtered)
    }
}

impl<T: Clone + 'static> IncrementalChangeNotifier<T> for FilteredNotifier<T> {
    fn items(&self) -> Vec<T> {
        self.inner.passing(&self.inner.upstream.items())
    }

    fn subscribe(&self, callback: ChangeCallback<Notification<T>>) -> Subscription {
        self.inner.channel.subscribe_rc_scoped(callback)
    }
}

struct FilteredStatefulInner<T, S> {
    upstream: Rc<dyn StatefulIncrementalChangeNotifier<T, S>>,
    predicate: Rc<dyn Fn(&S) -> bool>,
    channel: SubscriptionManager<StatefulNotification<T, S>>,
    subscription: RefCell<Subscription>,
}

/// Filters a stateful notifier by a predicate on the item state.
///
/// State changes are reclassified:
///
/// | before | after | emitted   |
/// |--------|-------|-----------|
/// | out    | out   | nothing   |
/// | in     | in    | `Changed` |
/// | out    | in    | `Added`   |
/// | in     | out   | `Removed` |
///
/// `Reset` is forwarded as is.
pub struct FilteredStatefulNotifier<T, S> {
    inner: Rc<FilteredStatefulInner<T, S>>,
}

impl<T, S> Clone for FilteredStatefulNotifier<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static, S: Clone + 'static> FilteredStatefulNotifier<T, S> {
    /// Creates a filtered view of `upstream`'s items whose state passes
    /// `predicate`.
    pub fn new<N, F>(upstream: N, predicate: F) -> Self
    where
        N: StatefulIncrementalChangeNotifier<T, S> + 'static,
        F: Fn(&S) -> bool + 'static,
    {
        let inner = Rc::new(FilteredStatefulInner {
            upstream: Rc::new(upstream) as Rc<dyn StatefulIncrementalChangeNotifier<T, S>>,
            predicate: Rc::new(predicate) as Rc<dyn Fn(&S) -> bool>,
            channel: SubscriptionManager::new(),
            subscription: RefCell::new(Subscription::empty()),
        });

        let weak: Weak<FilteredStatefulInner<T, S>> = Rc::downgrade(&inner);
        let subscription = inner
            .upstream
            .subscribe_stateful(Rc::new(move |n: &StatefulNotification<T, S>| match weak.upgrade() {
                Some(inner) => inner.on_notification(n),
                None => Ok(()),
            }));
        *inner.subscription.borrow_mut() = subscription;

        Self { inner }
    }

    /// Stops listening to the upstream notifier.
    pub fn detach(&self) {
        self.inner.subscription.borrow_mut().detach();
    }
}

impl<T: Clone, S: Clone> FilteredStatefulInner<T, S> {
    fn passes(&self, item: &T) -> bool {
        (self.predicate)(&self.upstream.state_of(item))
    }

    fn passing(&self, items: &[T]) -> Vec<T> {
        items.iter().filter(|item| self.passes(item)).cloned().collect()
    }

    fn emit(&self, notification: Notification<T>) -> Result<()> {
        if notification.is_empty() && !matches!(notification, Notification::Reset) {
            return Ok(());
        }
        self.channel.notify_all(&StatefulNotification::Plain(notification))
    }

    fn on_notification(&self, notification: &StatefulNotification<T, S>) -> Result<()> {
        match notification {
            StatefulNotification::Plain(Notification::Added(items)) => {
                self.emit(Notification::Added(self.passing(items)))
            }
            StatefulNotification::Plain(Notification::Removed(items)) => {
                self.emit(Notification::Removed(self.passing(items)))
            }
            StatefulNotification::Plain(Notification::Reset) => self.emit(Notification::Reset),
            StatefulNotification::Changed(changes) => {
                for change in changes {
                    let was_in = (self.predicate)(&change.old_state);
                    let is_in = (self.predicate)(&change.new_state);
                    match (was_in, is_in) {
                        (true, true) => {
                            self.channel
                                .notify_all(&StatefulNotification::Changed(vec![change.clone()]))?;
                        }
                        (true, false) => self.emit(Notification::Removed(vec![change.item.clone()]))?,
                        (false, true) => self.emit(Notification::Added(vec![change.item.clone()]))?,
                        (false, false) => {}
                    }
                }
                Ok(())
            }
        }
    }
}

impl<T: Clone + 'static, S: Clone + 'static> IncrementalChangeNotifier<T> for FilteredStatefulNotifier<T, S> {
    fn items(&self) -> Vec<T> {
        self.inner.passing(&self.inner.upstream.items())
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

impl<T: Clone + 'static, S: Clone + 'static> StatefulIncrementalChangeNotifier<T, S>
    for FilteredStatefulNotifier<T, S>
{
    fn state_of(&self, item: &T) -> S {
        self.inner.upstream.state_of(item)
    }

    fn subscribe_stateful(&self, callback: ChangeCallback<StatefulNotification<T, S>>) -> Subscription {
        self.inner.channel.subscribe_rc_scoped(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::SourceNotifier;
    use cosync_reactive::ObservableList;

    #[test]
    fn test_filtered_notifier_forwards_passing_items() {
        let list = ObservableList::from_vec(vec![1, 2, 3, 4]);
        let notifier = FilteredNotifier::new(SourceNotifier::new(list.clone()), |x: &i32| x % 2 == 0);
        assert_eq!(notifier.items(), vec![2, 4]);
        assert_eq!(notifier.len(), 2);

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _sub = notifier.subscribe(Rc::new(move |n: &Notification<i32>| {
            sink.borrow_mut().push(n.clone());
            Ok(())
        }));

        list.insert_range(0, vec![5, 6, 7, 8]).unwrap();
        // Nothing passes: no notification at all
        list.push(9).unwrap();
        list.remove_at(1).unwrap();
        list.clear().unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                Notification::Added(vec![6, 8]),
                Notification::Removed(vec![6]),
                Notification::Reset,
            ]
        );
    }
}
