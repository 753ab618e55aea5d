//! Sorted (and optionally filtered) views.

use super::feed::{Attachment, AttachmentSlot, ViewFeed};
use super::ordered::OrderedViewCore;
use crate::notification::{IncrementalChangeNotifier, Notification, Predicate};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::slice;
use cosync_core::{
    default_equality, ChangeCallback, ChangeEvent, Comparator, CountChanged, ObservableCollection,
    Result, SharedComparator, SharedEquality, Subscription,
};
use tracing::debug;

const VIEW: &str = "sorted_view";

struct Inner<T> {
    core: RefCell<OrderedViewCore<T>>,
    predicate: Option<Predicate<T>>,
    feed: ViewFeed<T>,
    attachment: AttachmentSlot,
}

/// A collection kept sorted by a comparer, mirroring a source or notifier.
///
/// Upstream additions are inserted at their sorted position, with ties placed
/// after existing equal items. Events are coalesced per contiguous run, so a
/// batch of `n` items landing next to each other produces a single `Add`.
///
/// Removal locates items by comparer and then by the identity equality, so
/// several equal-ranking items can coexist.
///
/// Cloning yields another handle to the same view.
pub struct SortedView<T> {
    inner: Rc<Inner<T>>,
}

/// A sorted view that only admits items passing a predicate.
pub type SortedFilteredView<T> = SortedView<T>;

impl<T> Clone for SortedView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Configures and attaches a [`SortedView`].
pub struct SortedViewBuilder<T> {
    comparer: SharedComparator<T>,
    equality: SharedEquality<T>,
    predicate: Option<Predicate<T>>,
}

impl<T: Clone + 'static> SortedViewBuilder<T> {
    /// Starts a builder ordering by `comparer`, with `==` as item identity.
    pub fn new<C>(comparer: C) -> Self
    where
        C: Comparator<T> + 'static,
        T: PartialEq,
    {
        Self::with_equality(comparer, |a: &T, b: &T| a == b)
    }

    /// Starts a builder with an explicit identity relation.
    pub fn with_equality<C, E>(comparer: C, equality: E) -> Self
    where
        C: Comparator<T> + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        Self {
            comparer: Rc::new(comparer),
            equality: Rc::new(equality),
            predicate: None,
        }
    }

    /// Admits only items passing `predicate`.
    ///
    /// The predicate must be a pure function of the item.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Attaches to a positional source, loading its current items.
    pub fn build_from_source<S>(self, source: S) -> SortedView<T>
    where
        S: ObservableCollection<T> + 'static,
    {
        let source: Rc<dyn ObservableCollection<T>> = Rc::new(source);
        let view = self.into_view(&source.to_vec());

        let weak = Rc::downgrade(&view.inner);
        let subscription = source.subscribe(Rc::new(move |event: &ChangeEvent<T>| {
            match Weak::upgrade(&weak) {
                Some(inner) => inner.on_source_event(event),
                None => Ok(()),
            }
        }));
        view.inner
            .attachment
            .set(Attachment::new(Box::new(move || source.len()), subscription));
        view
    }

    /// Attaches to a positionless notifier, loading its current items.
    pub fn build_from_notifier<N>(self, notifier: N) -> SortedView<T>
    where
        N: IncrementalChangeNotifier<T> + 'static,
    {
        let notifier: Rc<dyn IncrementalChangeNotifier<T>> = Rc::new(notifier);
        let view = self.into_view(&notifier.items());

        let weak = Rc::downgrade(&view.inner);
        let subscription = notifier.subscribe(Rc::new(move |n: &Notification<T>| {
            match Weak::upgrade(&weak) {
                Some(inner) => inner.on_notification(n),
                None => Ok(()),
            }
        }));
        view.inner
            .attachment
            .set(Attachment::new(Box::new(move || notifier.len()), subscription));
        view
    }

    fn into_view(self, initial: &[T]) -> SortedView<T> {
        let inner = Inner {
            core: RefCell::new(OrderedViewCore::new(self.comparer, self.equality)),
            predicate: self.predicate,
            feed: ViewFeed::new(),
            attachment: AttachmentSlot::empty(),
        };
        let batch = inner.passing(initial);
        inner.core.borrow_mut().insert_batch(batch);
        debug!(view = VIEW, len = inner.core.borrow().len(), "attached");
        SortedView { inner: Rc::new(inner) }
    }
}

impl<T: Clone + PartialEq + 'static> SortedView<T> {
    /// Creates a sorted view over `source`.
    pub fn new<S, C>(source: S, comparer: C) -> Self
    where
        S: ObservableCollection<T> + 'static,
        C: Comparator<T> + 'static,
    {
        SortedViewBuilder {
            comparer: Rc::new(comparer),
            equality: default_equality(),
            predicate: None,
        }
        .build_from_source(source)
    }
}

impl<T: Clone + 'static> SortedView<T> {
    /// Returns the position of `item` (by identity), if present.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.core.borrow().position_of(item)
    }

    /// Returns true if `item` is in the view.
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Stops following the upstream. The current content is kept.
    pub fn detach(&self) {
        self.inner.attachment.detach(VIEW);
    }

    /// Returns true while the view follows its upstream.
    pub fn is_attached(&self) -> bool {
        self.inner.attachment.is_attached()
    }
}

impl<T: Clone> Inner<T> {
    fn passes(&self, item: &T) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate(item))
    }

    fn passing(&self, items: &[T]) -> Vec<T> {
        items.iter().filter(|item| self.passes(item)).cloned().collect()
    }

    fn on_source_event(&self, event: &ChangeEvent<T>) -> Result<()> {
        match event {
            ChangeEvent::Add { items, .. } => self.on_added(items),
            ChangeEvent::Remove { items, .. } => self.on_removed(items),
            ChangeEvent::Replace {
                old_items,
                new_items,
                ..
            } => {
                for (old, new) in old_items.iter().zip(new_items) {
                    self.on_replaced(old, new)?;
                }
                Ok(())
            }
            ChangeEvent::Move { .. } => Ok(()),
            ChangeEvent::Reset => self.on_reset(),
        }
    }

    fn on_notification(&self, notification: &Notification<T>) -> Result<()> {
        match notification {
            Notification::Added(items) => self.on_added(items),
            Notification::Removed(items) => self.on_removed(items),
            Notification::Reset => self.on_reset(),
        }
    }

    fn on_added(&self, items: &[T]) -> Result<()> {
        let batch = self.passing(items);
        if batch.is_empty() {
            return Ok(());
        }
        self.update(|sorted| Ok(sorted.insert_batch(batch)))
    }

    fn on_removed(&self, items: &[T]) -> Result<()> {
        let batch = self.passing(items);
        if batch.is_empty() {
            return Ok(());
        }
        self.update(|sorted| sorted.remove_batch(&batch))
    }

    fn on_replaced(&self, old: &T, new: &T) -> Result<()> {
        match (self.passes(old), self.passes(new)) {
            (true, true) => self.update(|sorted| sorted.replace_one(old, new.clone())),
            (true, false) => self.update(|sorted| sorted.remove_batch(slice::from_ref(old))),
            (false, true) => self.update(|sorted| Ok(sorted.insert_batch(vec![new.clone()]))),
            (false, false) => Ok(()),
        }
    }

    fn on_reset(&self) -> Result<()> {
        if let Err(err) = self.attachment.check_reset(VIEW) {
            return Err(self.attachment.fail(VIEW, err));
        }
        let old_len = self.core.borrow_mut().clear();
        debug!(view = VIEW, dropped = old_len, "reset");
        self.feed.publish(VIEW, vec![ChangeEvent::reset()], old_len, 0)
    }

    /// Runs a core mutation, then publishes its events with no borrow held.
    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut OrderedViewCore<T>) -> Result<Vec<ChangeEvent<T>>>,
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

impl<T: Clone + 'static> ObservableCollection<T> for SortedView<T> {
    fn len(&self) -> usize {
        self.inner.core.borrow().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.core.borrow().items().get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.core.borrow().items().to_vec()
    }

    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<T>>) -> Subscription {
        self.inner.feed.changes.subscribe_rc_scoped(callback)
    }

    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription {
        self.inner.feed.counts.subscribe_rc_scoped(callback)
    }
}

impl<T: Clone + core::fmt::Debug + 'static> core::fmt::Debug for SortedView<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SortedView")
            .field("items", &self.inner.core.borrow().items())
            .field("attached", &self.is_attached())
            .finish()
    }
}
