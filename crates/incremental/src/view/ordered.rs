//! Sorted storage shared by the ordered views.
//!
//! `OrderedViewCore` owns the sorted items and turns membership changes into
//! positional events. It never notifies anyone itself; the owning view
//! publishes the returned events once its borrows are released.

use alloc::vec;
use alloc::vec::Vec;
use cosync_core::{ChangeEvent, Error, Result, SharedComparator, SharedEquality};
use cosync_index::ordered::{binary_search_by_identity, lower_bound, upper_bound};
use cosync_index::{contiguous_runs, insert_presorted_items, remove_presorted_items};

pub(crate) struct OrderedViewCore<E> {
    items: Vec<E>,
    comparer: SharedComparator<E>,
    equality: SharedEquality<E>,
}

impl<E: Clone> OrderedViewCore<E> {
    pub(crate) fn new(comparer: SharedComparator<E>, equality: SharedEquality<E>) -> Self {
        Self {
            items: Vec::new(),
            comparer,
            equality,
        }
    }

    #[inline]
    pub(crate) fn items(&self) -> &[E] {
        &self.items
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Index of the element identical to `item`, if present.
    pub(crate) fn position_of(&self, item: &E) -> Option<usize> {
        binary_search_by_identity(&self.items, item, &*self.comparer, &*self.equality).ok()
    }

    /// Inserts a batch, one `Add` per contiguous run of final positions.
    ///
    /// Ties are placed after existing equal elements. The events are in
    /// ascending order and apply in sequence.
    pub(crate) fn insert_batch(&mut self, mut batch: Vec<E>) -> Vec<ChangeEvent<E>> {
        if batch.is_empty() {
            return Vec::new();
        }
        let comparer = self.comparer.clone();
        batch.sort_by(|a, b| comparer.compare(a, b));
        let indices = insert_presorted_items(&mut self.items, batch, &*comparer);

        contiguous_runs(&indices)
            .into_iter()
            .map(|run| {
                let start = indices[run.start];
                ChangeEvent::added(self.items[start..start + run.len()].to_vec(), start)
            })
            .collect()
    }

    /// Removes a batch, one `Remove` per contiguous run of original positions.
    ///
    /// Each element must be present (by identity); otherwise nothing is
    /// removed and an invariant violation is returned.
    pub(crate) fn remove_batch(&mut self, batch: &[E]) -> Result<Vec<ChangeEvent<E>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let comparer = self.comparer.clone();
        let mut sorted = batch.to_vec();
        sorted.sort_by(|a, b| comparer.compare(a, b));
        let removed = remove_presorted_items(&mut self.items, &sorted, &*comparer, &*self.equality)?;

        let indices: Vec<usize> = removed.iter().map(|(index, _)| *index).collect();
        let runs = contiguous_runs(&indices);
        let mut removed = removed.into_iter();
        let mut shift = 0;
        let mut events = Vec::with_capacity(runs.len());
        for run in runs {
            let start = indices[run.start] - shift;
            let items: Vec<E> = removed.by_ref().take(run.len()).map(|(_, item)| item).collect();
            shift += items.len();
            events.push(ChangeEvent::removed(items, start));
        }
        Ok(events)
    }

    /// Replaces `old` by `new`.
    ///
    /// Emits `Replace` when `new` can take the same slot, otherwise `Remove`
    /// followed by `Add`.
    pub(crate) fn replace_one(&mut self, old: &E, new: E) -> Result<Vec<ChangeEvent<E>>> {
        let (index, old_item) = self.take(old)?;
        match self.reinsert(index, new.clone()) {
            None => Ok(vec![ChangeEvent::Replace {
                old_items: vec![old_item],
                new_items: vec![new],
                index,
            }]),
            Some(target) => Ok(vec![
                ChangeEvent::removed(vec![old_item], index),
                ChangeEvent::added(vec![new], target),
            ]),
        }
    }

    /// Moves `old` to wherever `updated` sorts, storing `updated` in its place.
    ///
    /// Returns `Move` only when the element actually changes position.
    pub(crate) fn reposition(&mut self, old: &E, updated: E) -> Result<Option<ChangeEvent<E>>> {
        let (index, _) = self.take(old)?;
        Ok(self
            .reinsert(index, updated.clone())
            .map(|target| ChangeEvent::moved(vec![updated], index, target)))
    }

    /// Clears the items, returning how many were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let len = self.items.len();
        self.items.clear();
        len
    }

    fn take(&mut self, item: &E) -> Result<(usize, E)> {
        let index = self
            .position_of(item)
            .ok_or_else(|| Error::invariant("element not found in the sorted view"))?;
        Ok((index, self.items.remove(index)))
    }

    /// Puts `item` back at `index` if the order allows, else at its upper
    /// bound. Returns the new index only when it differs.
    fn reinsert(&mut self, index: usize, item: E) -> Option<usize> {
        let lower = lower_bound(&self.items, &item, &*self.comparer);
        let upper = upper_bound(&self.items, &item, &*self.comparer);
        if (lower..=upper).contains(&index) {
            self.items.insert(index, item);
            None
        } else {
            self.items.insert(upper, item);
            Some(upper)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use cosync_core::{default_equality, SimpleComparator};

    fn core_of(items: Vec<i32>) -> OrderedViewCore<i32> {
        let mut core = OrderedViewCore::new(Rc::new(SimpleComparator::asc()), default_equality());
        core.insert_batch(items);
        core
    }

    fn replay(before: &[i32], events: &[ChangeEvent<i32>]) -> Vec<i32> {
        let mut list = before.to_vec();
        for event in events {
            event.apply_to(&mut list).unwrap();
        }
        list
    }

    #[test]
    fn test_insert_batch_coalesces_runs() {
        let mut core = core_of(vec![10, 20]);
        let events = core.insert_batch(vec![25, 5, 1, 30]);
        assert_eq!(
            events,
            vec![ChangeEvent::added(vec![1, 5], 0), ChangeEvent::added(vec![25, 30], 4)]
        );
        assert_eq!(core.items(), &[1, 5, 10, 20, 25, 30]);
        assert_eq!(replay(&[10, 20], &events), core.items());
    }

    #[test]
    fn test_insert_batch_into_empty_is_one_event() {
        let mut core = core_of(vec![]);
        let events = core.insert_batch(vec![3, 1, 2]);
        assert_eq!(events, vec![ChangeEvent::added(vec![1, 2, 3], 0)]);
    }

    #[test]
    fn test_remove_batch_shifts_start_indices() {
        let mut core = core_of(vec![1, 2, 3, 4, 5, 6]);
        let events = core.remove_batch(&[6, 1, 2, 4]).unwrap();
        assert_eq!(
            events,
            vec![
                ChangeEvent::removed(vec![1, 2], 0),
                ChangeEvent::removed(vec![4], 1),
                ChangeEvent::removed(vec![6], 2),
            ]
        );
        assert_eq!(replay(&[1, 2, 3, 4, 5, 6], &events), vec![3, 5]);
    }

    #[test]
    fn test_remove_missing_is_fault() {
        let mut core = core_of(vec![1, 2]);
        assert!(core.remove_batch(&[2, 9]).unwrap_err().is_fault());
        assert_eq!(core.items(), &[1, 2]);
    }

    #[test]
    fn test_replace_in_place_or_relocate() {
        let mut core = core_of(vec![10, 20, 30]);
        assert_eq!(
            core.replace_one(&20, 25).unwrap(),
            vec![ChangeEvent::Replace {
                old_items: vec![20],
                new_items: vec![25],
                index: 1
            }]
        );
        let events = core.replace_one(&10, 40).unwrap();
        assert_eq!(
            events,
            vec![ChangeEvent::removed(vec![10], 0), ChangeEvent::added(vec![40], 2)]
        );
        assert_eq!(core.items(), &[25, 30, 40]);
    }

    #[test]
    fn test_reposition_only_moves_when_needed() {
        let mut core = core_of(vec![10, 20, 30, 40]);
        assert_eq!(core.reposition(&20, 29).unwrap(), None);
        assert_eq!(core.items(), &[10, 29, 30, 40]);

        let before = core.items().to_vec();
        let event = core.reposition(&10, 35).unwrap().unwrap();
        assert_eq!(event, ChangeEvent::moved(vec![35], 0, 2));
        assert_eq!(core.items(), &[29, 30, 35, 40]);

        // A move reorders existing slots only
        let mut list = before;
        list[0] = 35;
        event.apply_to(&mut list).unwrap();
        assert_eq!(list, core.items());
    }

    #[test]
    fn test_reposition_to_front() {
        let mut core = core_of(vec![10, 20, 30]);
        let event = core.reposition(&30, 5).unwrap();
        assert_eq!(event, Some(ChangeEvent::moved(vec![5], 2, 0)));
        assert_eq!(core.items(), &[5, 10, 20]);
    }
}
