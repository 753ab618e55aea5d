//! Sorted set of keys projected from many items.

use super::feed::{Attachment, AttachmentSlot, ViewFeed};
use super::ordered::OrderedViewCore;
use crate::notification::{IncrementalChangeNotifier, Notification};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;
use cosync_core::{
    default_equality, ChangeCallback, ChangeEvent, Comparator, CountChanged, Error,
    ObservableCollection, Result, SharedComparator, Subscription,
};
use cosync_index::RefCountMap;
use hashbrown::HashMap;
use tracing::debug;

const VIEW: &str = "multiplexed_view";

/// Maps an item to the keys it contributes.
pub type Projection<T, K> = Rc<dyn Fn(&T) -> Vec<K>>;

struct Inner<T, K> {
    core: RefCell<OrderedViewCore<K>>,
    counts: RefCell<RefCountMap<K>>,
    projection: Projection<T, K>,
    feed: ViewFeed<K>,
    attachment: AttachmentSlot,
}

/// The distinct keys projected from a notifier's items, sorted.
///
/// Every item contributes zero or more keys. A key enters the view when its
/// first contributor arrives and leaves when its last one goes, so the view
/// holds each key exactly once no matter how many items share it.
pub struct MultiplexedView<T, K> {
    inner: Rc<Inner<T, K>>,
}

impl<T, K> Clone for MultiplexedView<T, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, K> MultiplexedView<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Creates a view of the keys `projection` yields for `notifier`'s items,
    /// ordered by `comparer`.
    pub fn new<N, P, C>(notifier: N, projection: P, comparer: C) -> Self
    where
        N: IncrementalChangeNotifier<T> + 'static,
        P: Fn(&T) -> Vec<K> + 'static,
        C: Comparator<K> + 'static,
    {
        let notifier: Rc<dyn IncrementalChangeNotifier<T>> = Rc::new(notifier);
        let comparer: SharedComparator<K> = Rc::new(comparer);
        let inner = Rc::new(Inner {
            core: RefCell::new(OrderedViewCore::new(comparer, default_equality())),
            counts: RefCell::new(RefCountMap::new()),
            projection: Rc::new(projection),
            feed: ViewFeed::new(),
            attachment: AttachmentSlot::empty(),
        });

        let first = inner.acquire(&notifier.items());
        inner.core.borrow_mut().insert_batch(first);
        debug!(view = VIEW, keys = inner.core.borrow().len(), "attached");

        let weak: Weak<Inner<T, K>> = Rc::downgrade(&inner);
        let subscription = notifier.subscribe(Rc::new(move |n: &Notification<T>| match weak.upgrade() {
            Some(inner) => inner.on_notification(n),
            None => Ok(()),
        }));
        inner
            .attachment
            .set(Attachment::new(Box::new(move || notifier.len()), subscription));

        Self { inner }
    }

    /// Returns how many items currently contribute `key`.
    pub fn contributors(&self, key: &K) -> usize {
        self.inner.counts.borrow().get(key).max(0) as usize
    }

    /// Stops following the notifier. The current content is kept.
    pub fn detach(&self) {
        self.inner.attachment.detach(VIEW);
    }

    /// Returns true while the view follows its notifier.
    pub fn is_attached(&self) -> bool {
        self.inner.attachment.is_attached()
    }
}

impl<T, K> Inner<T, K>
where
    K: Eq + Hash + Clone,
{
    /// Counts the keys of `items` in, returning those seen for the first time.
    fn acquire(&self, items: &[T]) -> Vec<K> {
        let mut counts = self.counts.borrow_mut();
        let mut fresh = Vec::new();
        for item in items {
            for key in (self.projection)(item) {
                if counts.increment(key.clone()) {
                    fresh.push(key);
                }
            }
        }
        fresh
    }

    /// Counts the keys of `items` out, returning those with no contributor left.
    ///
    /// Every key is checked before any count changes, so a failed release
    /// leaves the counts as they were.
    fn release(&self, items: &[T]) -> Result<Vec<K>> {
        let mut pending: HashMap<K, i64> = HashMap::new();
        let mut order = Vec::new();
        for item in items {
            for key in (self.projection)(item) {
                let owed = pending.entry(key.clone()).or_insert(0);
                if *owed == 0 {
                    order.push(key);
                }
                *owed += 1;
            }
        }

        let mut counts = self.counts.borrow_mut();
        if order.iter().any(|key| counts.get(key) < pending[key]) {
            return Err(Error::invariant("multiplexed view released a key it never counted"));
        }
        let mut gone = Vec::new();
        for key in order {
            let owed = pending[&key];
            if counts.increment_by(key.clone(), -owed)? {
                gone.push(key);
            }
        }
        Ok(gone)
    }

    fn on_notification(&self, notification: &Notification<T>) -> Result<()> {
        match notification {
            Notification::Added(items) => {
                let fresh = self.acquire(items);
                self.update(|sorted| Ok(sorted.insert_batch(fresh)))
            }
            Notification::Removed(items) => {
                let gone = self.release(items).map_err(|err| self.attachment.fail(VIEW, err))?;
                self.update(|sorted| sorted.remove_batch(&gone))
            }
            Notification::Reset => {
                if let Err(err) = self.attachment.check_reset(VIEW) {
                    return Err(self.attachment.fail(VIEW, err));
                }
                self.counts.borrow_mut().clear();
                let old_len = self.core.borrow_mut().clear();
                self.feed.publish(VIEW, vec![ChangeEvent::reset()], old_len, 0)
            }
        }
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut OrderedViewCore<K>) -> Result<Vec<ChangeEvent<K>>>,
    {
        let (events, old_len, new_len) = {
            let mut sorted = self.core.borrow_mut();
            let old_len = sorted.len();
            match mutate(&mut sorted) {
                Ok(events) => (events, old_len, sorted.len()),
                Err(err) => {
                    drop(sorted);
                    return Err(self.attachment.fail(VIEW, err));
                }
            }
        };
        self.feed.publish(VIEW, events, old_len, new_len)
    }
}

impl<T, K> ObservableCollection<K> for MultiplexedView<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    fn len(&self) -> usize {
        self.inner.core.borrow().len()
    }

    fn get(&self, index: usize) -> Option<K> {
        self.inner.core.borrow().items().get(index).cloned()
    }

    fn to_vec(&self) -> Vec<K> {
        self.inner.core.borrow().items().to_vec()
    }

    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<K>>) -> Subscription {
        self.inner.feed.changes.subscribe_rc_scoped(callback)
    }

    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription {
        self.inner.feed.counts.subscribe_rc_scoped(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::SourceNotifier;
    use crate::testing::ScriptedSource;
    use cosync_core::SimpleComparator;
    use cosync_reactive::ObservableList;

    type Post = (u32, Vec<&'static str>);

    fn tags(post: &Post) -> Vec<&'static str> {
        post.1.clone()
    }

    fn tag_cloud(list: &ObservableList<Post>) -> MultiplexedView<Post, &'static str> {
        MultiplexedView::new(SourceNotifier::new(list.clone()), tags, SimpleComparator::asc())
    }

    #[test]
    fn test_multiplexed_view_distinct_sorted_keys() {
        let list = ObservableList::from_vec(vec![(1, vec!["rust", "db"]), (2, vec!["db", "async"])]);
        let view = tag_cloud(&list);
        assert_eq!(view.to_vec(), vec!["async", "db", "rust"]);
        assert_eq!(view.contributors(&"db"), 2);
    }

    #[test]
    fn test_multiplexed_view_fan_in() {
        let list = ObservableList::from_vec(vec![(1, vec!["a", "b"])]);
        let view = tag_cloud(&list);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _sub = view.subscribe(Rc::new(move |event: &ChangeEvent<&'static str>| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));

        list.push((2, vec!["b", "c"])).unwrap();
        // Only "b" is shared, so dropping the first post releases "a" alone
        list.remove_at(0).unwrap();
        list.remove_at(0).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                ChangeEvent::added(vec!["c"], 2),
                ChangeEvent::removed(vec!["a"], 0),
                ChangeEvent::removed(vec!["b", "c"], 0),
            ]
        );
        assert!(view.is_empty());
    }

    #[test]
    fn test_multiplexed_view_three_contributors_one_removal() {
        let list = ObservableList::from_vec(vec![(1, vec!["k"]), (2, vec!["k"]), (3, vec!["k"])]);
        let view = tag_cloud(&list);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _sub = view.subscribe(Rc::new(move |event: &ChangeEvent<&'static str>| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));
        assert_eq!(view.to_vec(), vec!["k"]);
        assert_eq!(view.contributors(&"k"), 3);

        list.remove_at(0).unwrap();
        list.remove_at(0).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(view.to_vec(), vec!["k"]);
        assert_eq!(view.contributors(&"k"), 1);

        list.remove_at(0).unwrap();
        assert_eq!(*log.borrow(), vec![ChangeEvent::removed(vec!["k"], 0)]);
        assert!(view.is_empty());
    }

    #[test]
    fn test_multiplexed_view_failed_release_keeps_counts() {
        let source = ScriptedSource::new(vec![(1, vec!["a", "b"])]);
        let view = MultiplexedView::new(SourceNotifier::new(source.clone()), tags, SimpleComparator::asc());

        // "a" is owned once but released twice; "b" must stay counted
        let err = source
            .emit(ChangeEvent::removed(vec![(1, vec!["b", "a"]), (2, vec!["a"])], 0))
            .unwrap_err();
        assert!(err.is_fault());
        assert!(!view.is_attached());
        assert_eq!(view.contributors(&"a"), 1);
        assert_eq!(view.contributors(&"b"), 1);
        assert_eq!(view.to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn test_multiplexed_view_reset() {
        let list = ObservableList::from_vec(vec![(1, vec!["x"]), (2, vec!["x", "y"])]);
        let view = tag_cloud(&list);
        list.clear().unwrap();
        assert!(view.is_empty());
        assert_eq!(view.contributors(&"x"), 0);

        list.push((3, vec!["x"])).unwrap();
        assert_eq!(view.to_vec(), vec!["x"]);
    }
}
