//! Order-preserving filtered view.

use super::feed::{Attachment, AttachmentSlot, ViewFeed};
use crate::notification::Predicate;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use cosync_core::{
    ChangeCallback, ChangeEvent, CountChanged, Error, ObservableCollection, Result, Subscription,
};

const VIEW: &str = "filtered_view";

/// Source-aligned membership mask plus the passing items.
struct FilterState<T> {
    items: Vec<T>,
    /// One flag per source element: does it appear in `items`?
    mask: Vec<bool>,
}

impl<T: Clone> FilterState<T> {
    /// View position of the first passing element at or after `source_index`.
    ///
    /// Linear in `source_index`. Source edits shift the mask, which rules out
    /// a cached prefix count without reindexing on every event anyway.
    fn view_index(&self, source_index: usize) -> usize {
        self.mask[..source_index].iter().filter(|passes| **passes).count()
    }

    fn check_range(&self, start: usize, count: usize) -> Result<()> {
        if start + count > self.mask.len() {
            return Err(Error::invariant("filtered view is out of sync with its source"));
        }
        Ok(())
    }

    fn add(&mut self, items: &[T], start: usize, predicate: &Predicate<T>) -> Result<Vec<ChangeEvent<T>>> {
        self.check_range(start, 0)?;
        let flags: Vec<bool> = items.iter().map(|item| predicate(item)).collect();
        let passing: Vec<T> = items
            .iter()
            .zip(&flags)
            .filter(|(_, passes)| **passes)
            .map(|(item, _)| item.clone())
            .collect();
        let at = self.view_index(start);
        self.mask.splice(start..start, flags);
        if passing.is_empty() {
            return Ok(Vec::new());
        }
        self.items.splice(at..at, passing.iter().cloned());
        Ok(vec![ChangeEvent::added(passing, at)])
    }

    fn remove(&mut self, count: usize, start: usize) -> Result<Vec<ChangeEvent<T>>> {
        self.check_range(start, count)?;
        let at = self.view_index(start);
        let passing = self.mask.drain(start..start + count).filter(|passes| *passes).count();
        if passing == 0 {
            return Ok(Vec::new());
        }
        let removed: Vec<T> = self.items.drain(at..at + passing).collect();
        Ok(vec![ChangeEvent::removed(removed, at)])
    }

    fn replace(&mut self, new_items: &[T], index: usize, predicate: &Predicate<T>) -> Result<Vec<ChangeEvent<T>>> {
        self.check_range(index, new_items.len())?;
        let mut events = Vec::new();
        for (offset, new) in new_items.iter().enumerate() {
            let source_index = index + offset;
            let at = self.view_index(source_index);
            let was_in = self.mask[source_index];
            let is_in = predicate(new);
            self.mask[source_index] = is_in;
            match (was_in, is_in) {
                (true, true) => {
                    let old = core::mem::replace(&mut self.items[at], new.clone());
                    events.push(ChangeEvent::Replace {
                        old_items: vec![old],
                        new_items: vec![new.clone()],
                        index: at,
                    });
                }
                (true, false) => {
                    let old = self.items.remove(at);
                    events.push(ChangeEvent::removed(vec![old], at));
                }
                (false, true) => {
                    self.items.insert(at, new.clone());
                    events.push(ChangeEvent::added(vec![new.clone()], at));
                }
                (false, false) => {}
            }
        }
        Ok(events)
    }

    fn relocate(&mut self, count: usize, old_index: usize, new_index: usize) -> Result<Vec<ChangeEvent<T>>> {
        self.check_range(old_index, count)?;
        if new_index > self.mask.len() - count {
            return Err(Error::invariant("filtered view is out of sync with its source"));
        }
        let from = self.view_index(old_index);
        let segment: Vec<bool> = self.mask.drain(old_index..old_index + count).collect();
        let passing = segment.iter().filter(|passes| **passes).count();
        let to = self.view_index(new_index);
        self.mask.splice(new_index..new_index, segment);
        if passing == 0 {
            return Ok(Vec::new());
        }
        let moved: Vec<T> = self.items.drain(from..from + passing).collect();
        self.items.splice(to..to, moved.iter().cloned());
        if from == to {
            return Ok(Vec::new());
        }
        Ok(vec![ChangeEvent::moved(moved, from, to)])
    }
}

struct Inner<T> {
    state: RefCell<FilterState<T>>,
    predicate: Predicate<T>,
    feed: ViewFeed<T>,
    attachment: AttachmentSlot,
}

/// The items of a source that pass a predicate, in source order.
///
/// Every source event is translated to positions in the view. `Move` is
/// followed, so the view order always matches the source order.
pub struct FilteredView<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for FilteredView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> FilteredView<T> {
    /// Creates a filtered view over `source`.
    pub fn new<S, F>(source: S, predicate: F) -> Self
    where
        S: ObservableCollection<T> + 'static,
        F: Fn(&T) -> bool + 'static,
    {
        let source: Rc<dyn ObservableCollection<T>> = Rc::new(source);
        let predicate: Predicate<T> = Rc::new(predicate);

        let initial = source.to_vec();
        let mask: Vec<bool> = initial.iter().map(|item| predicate(item)).collect();
        let items: Vec<T> = initial
            .into_iter()
            .zip(&mask)
            .filter(|(_, passes)| **passes)
            .map(|(item, _)| item)
            .collect();

        let inner = Rc::new(Inner {
            state: RefCell::new(FilterState { items, mask }),
            predicate,
            feed: ViewFeed::new(),
            attachment: AttachmentSlot::empty(),
        });

        let weak: Weak<Inner<T>> = Rc::downgrade(&inner);
        let subscription = source.subscribe(Rc::new(move |event: &ChangeEvent<T>| match weak.upgrade() {
            Some(inner) => inner.on_source_event(event),
            None => Ok(()),
        }));
        inner
            .attachment
            .set(Attachment::new(Box::new(move || source.len()), subscription));

        Self { inner }
    }

    /// Stops following the source. The current content is kept.
    pub fn detach(&self) {
        self.inner.attachment.detach(VIEW);
    }

    /// Returns true while the view follows its source.
    pub fn is_attached(&self) -> bool {
        self.inner.attachment.is_attached()
    }
}

impl<T: Clone> Inner<T> {
    fn on_source_event(&self, event: &ChangeEvent<T>) -> Result<()> {
        if event.is_reset() {
            return self.on_reset();
        }
        let (events, old_len, new_len) = {
            let mut state = self.state.borrow_mut();
            let old_len = state.items.len();
            let outcome = match event {
                ChangeEvent::Add { items, start_index } => state.add(items, *start_index, &self.predicate),
                ChangeEvent::Remove { items, start_index } => state.remove(items.len(), *start_index),
                ChangeEvent::Replace { new_items, index, .. } => {
                    state.replace(new_items, *index, &self.predicate)
                }
                ChangeEvent::Move {
                    items,
                    old_index,
                    new_index,
                } => state.relocate(items.len(), *old_index, *new_index),
                ChangeEvent::Reset => Ok(Vec::new()),
            };
            match outcome {
                Ok(events) => (events, old_len, state.items.len()),
                Err(err) => {
                    drop(state);
                    return Err(self.attachment.fail(VIEW, err));
                }
            }
        };
        self.feed.publish(VIEW, events, old_len, new_len)
    }

    fn on_reset(&self) -> Result<()> {
        if let Err(err) = self.attachment.check_reset(VIEW) {
            return Err(self.attachment.fail(VIEW, err));
        }
        let old_len = {
            let mut state = self.state.borrow_mut();
            state.mask.clear();
            let old_len = state.items.len();
            state.items.clear();
            old_len
        };
        self.feed.publish(VIEW, vec![ChangeEvent::reset()], old_len, 0)
    }
}

impl<T: Clone + 'static> ObservableCollection<T> for FilteredView<T> {
    fn len(&self) -> usize {
        self.inner.state.borrow().items.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.state.borrow().items.get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.state.borrow().items.clone()
    }

    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<T>>) -> Subscription {
        self.inner.feed.changes.subscribe_rc_scoped(callback)
    }

    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription {
        self.inner.feed.counts.subscribe_rc_scoped(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSource;
    use cosync_reactive::ObservableList;

    fn even(x: &i32) -> bool {
        x % 2 == 0
    }

    /// Applies every view event to a mirror and checks it against the view.
    fn mirrored(view: &FilteredView<i32>) -> (Rc<RefCell<Vec<i32>>>, Subscription) {
        let mirror = Rc::new(RefCell::new(view.to_vec()));
        let sink = mirror.clone();
        let sub = view.subscribe(Rc::new(move |event: &ChangeEvent<i32>| {
            event.apply_to(&mut sink.borrow_mut())
        }));
        (mirror, sub)
    }

    #[test]
    fn test_filtered_view_keeps_source_order() {
        let list = ObservableList::from_vec(vec![4, 1, 2, 7, 6]);
        let view = FilteredView::new(list.clone(), even);
        assert_eq!(view.to_vec(), vec![4, 2, 6]);

        let (mirror, _sub) = mirrored(&view);
        list.insert(1, 8).unwrap();
        list.insert_range(3, vec![3, 10, 5]).unwrap();
        list.remove_at(0).unwrap();
        list.set(0, 9).unwrap();
        list.set(1, 12).unwrap();
        list.move_item(1, 4).unwrap();

        let expected: Vec<i32> = list.to_vec().into_iter().filter(even).collect();
        assert_eq!(view.to_vec(), expected);
        assert_eq!(*mirror.borrow(), expected);
    }

    #[test]
    fn test_filtered_view_ignores_failing_items() {
        let list = ObservableList::from_vec(vec![2]);
        let view = FilteredView::new(list.clone(), even);
        let (mirror, _sub) = mirrored(&view);

        list.push(3).unwrap();
        list.remove_at(1).unwrap();
        assert_eq!(*mirror.borrow(), vec![2]);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_filtered_view_move_emits_view_positions() {
        let list = ObservableList::from_vec(vec![2, 1, 4, 3, 6]);
        let view = FilteredView::new(list.clone(), even);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _sub = view.subscribe(Rc::new(move |event: &ChangeEvent<i32>| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));

        list.move_item(0, 4).unwrap();
        assert_eq!(*log.borrow(), vec![ChangeEvent::moved(vec![2], 0, 2)]);
        assert_eq!(view.to_vec(), vec![4, 6, 2]);
    }

    #[test]
    fn test_filtered_view_reset() {
        let list = ObservableList::from_vec(vec![2, 4]);
        let view = FilteredView::new(list.clone(), even);
        list.clear().unwrap();
        assert!(view.is_empty());

        list.push(6).unwrap();
        assert_eq!(view.to_vec(), vec![6]);
    }

    #[test]
    fn test_filtered_view_reset_on_nonempty_source_faults() {
        let source = ScriptedSource::new(vec![2, 3]);
        let view = FilteredView::new(source.clone(), even);

        assert!(source.emit(ChangeEvent::reset()).unwrap_err().is_fault());
        assert!(!view.is_attached());
        assert_eq!(view.to_vec(), vec![2]);
    }

    #[test]
    fn test_filtered_view_bad_move_keeps_mask() {
        let source = ScriptedSource::new(vec![2, 3, 4]);
        let view = FilteredView::new(source.clone(), even);

        let err = source.emit(ChangeEvent::moved(vec![2], 0, 3)).unwrap_err();
        assert!(err.is_fault());
        assert!(!view.is_attached());
        assert_eq!(view.inner.state.borrow().mask, vec![true, false, true]);
        assert_eq!(view.to_vec(), vec![2, 4]);
    }

    #[test]
    fn test_filtered_view_out_of_sync_event_faults() {
        let source = ScriptedSource::new(vec![2]);
        let view = FilteredView::new(source.clone(), even);

        let err = source.emit(ChangeEvent::removed(vec![4, 6], 0)).unwrap_err();
        assert!(err.is_fault());
        assert!(!view.is_attached());
    }
}
