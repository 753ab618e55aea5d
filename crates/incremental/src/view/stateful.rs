//! Sorted view over a stateful notifier.

use super::feed::{Attachment, AttachmentSlot, ViewFeed};
use super::ordered::OrderedViewCore;
use crate::notification::{Notification, StateChange, StatefulIncrementalChangeNotifier, StatefulNotification};
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use cosync_core::{
    ChangeCallback, ChangeEvent, Comparator, CountChanged, Error, ObservableCollection, Result,
    SharedComparator, SharedEquality, Subscription,
};
use tracing::{debug, trace};

const VIEW: &str = "stateful_sorted_view";

struct Inner<T, S> {
    /// Items paired with the state they are currently sorted by
    core: RefCell<OrderedViewCore<(T, S)>>,
    notifier: Weak<dyn StatefulIncrementalChangeNotifier<T, S>>,
    equality: SharedEquality<T>,
    feed: ViewFeed<T>,
    attachment: AttachmentSlot,
}

/// Items of a stateful notifier, sorted by their state.
///
/// Each item is stored with the state it was last sorted by. On `Changed` the
/// item is found by its old state and moved only if its new state no longer
/// fits between its neighbours; the stored state is updated either way.
///
/// Cloning yields another handle to the same view.
pub struct StatefulSortedView<T, S> {
    inner: Rc<Inner<T, S>>,
}

impl<T, S> Clone for StatefulSortedView<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static, S: Clone + 'static> StatefulSortedView<T, S> {
    /// Creates a view of `notifier`'s items ordered by `comparer` on their
    /// state. `equality` identifies an item among those with equal states.
    pub fn new<N, C, E>(notifier: N, comparer: C, equality: E) -> Self
    where
        N: StatefulIncrementalChangeNotifier<T, S> + 'static,
        C: Comparator<S> + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let notifier: Rc<dyn StatefulIncrementalChangeNotifier<T, S>> = Rc::new(notifier);
        let by_state: SharedComparator<(T, S)> =
            Rc::new(move |a: &(T, S), b: &(T, S)| comparer.compare(&a.1, &b.1));
        let equality: SharedEquality<T> = Rc::new(equality);
        let item_eq = equality.clone();
        let by_item: SharedEquality<(T, S)> =
            Rc::new(move |a: &(T, S), b: &(T, S)| item_eq(&a.0, &b.0));

        let mut sorted = OrderedViewCore::new(by_state, by_item);
        let initial: Vec<(T, S)> = notifier
            .items()
            .into_iter()
            .map(|item| {
                let state = notifier.state_of(&item);
                (item, state)
            })
            .collect();
        sorted.insert_batch(initial);
        debug!(view = VIEW, len = sorted.len(), "attached");

        let inner = Rc::new(Inner {
            core: RefCell::new(sorted),
            notifier: Rc::downgrade(&notifier),
            equality,
            feed: ViewFeed::new(),
            attachment: AttachmentSlot::empty(),
        });

        let weak: Weak<Inner<T, S>> = Rc::downgrade(&inner);
        let subscription = notifier.subscribe_stateful(Rc::new(move |n: &StatefulNotification<T, S>| {
            match weak.upgrade() {
                Some(inner) => inner.on_notification(n),
                None => Ok(()),
            }
        }));
        inner
            .attachment
            .set(Attachment::new(Box::new(move || notifier.len()), subscription));

        Self { inner }
    }

    /// Returns the item at `index` with the state it is sorted by.
    pub fn get_with_state(&self, index: usize) -> Option<(T, S)> {
        self.inner.core.borrow().items().get(index).cloned()
    }

    /// Returns the recorded states, in view order.
    pub fn states(&self) -> Vec<S> {
        self.inner.core.borrow().items().iter().map(|(_, state)| state.clone()).collect()
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

impl<T: Clone, S: Clone> Inner<T, S> {
    fn on_notification(&self, notification: &StatefulNotification<T, S>) -> Result<()> {
        match notification {
            StatefulNotification::Plain(Notification::Added(items)) => {
                let pairs = self.with_states(items).map_err(|err| self.attachment.fail(VIEW, err))?;
                self.update(|sorted| Ok(sorted.insert_batch(pairs)))
            }
            StatefulNotification::Plain(Notification::Removed(items)) => {
                let pairs = self.stored_pairs(items).map_err(|err| self.attachment.fail(VIEW, err))?;
                self.update(|sorted| sorted.remove_batch(&pairs))
            }
            StatefulNotification::Plain(Notification::Reset) => self.on_reset(),
            StatefulNotification::Changed(changes) => {
                for change in changes {
                    self.on_changed(change)?;
                }
                Ok(())
            }
        }
    }

    fn with_states(&self, items: &[T]) -> Result<Vec<(T, S)>> {
        let notifier = match self.notifier.upgrade() {
            Some(notifier) => notifier,
            None => return Err(Error::invariant("stateful sorted view lost its notifier")),
        };
        Ok(items
            .iter()
            .map(|item| (item.clone(), notifier.state_of(item)))
            .collect())
    }

    /// Pairs each item with the state it is stored under.
    ///
    /// An item may leave after its state moved without a `Changed` reaching
    /// this view (a state filter upstream turns it into `Removed`), so the
    /// current state is only a first guess.
    fn stored_pairs(&self, items: &[T]) -> Result<Vec<(T, S)>> {
        let current = self.with_states(items)?;
        let sorted = self.core.borrow();
        current
            .into_iter()
            .map(|pair| {
                if sorted.position_of(&pair).is_some() {
                    return Ok(pair);
                }
                sorted
                    .items()
                    .iter()
                    .find(|(stored, _)| (self.equality)(stored, &pair.0))
                    .cloned()
                    .ok_or_else(|| Error::invariant("item to remove is not in the stateful sorted view"))
            })
            .collect()
    }

    fn on_changed(&self, change: &StateChange<T, S>) -> Result<()> {
        let old = (change.item.clone(), change.old_state.clone());
        let updated = (change.item.clone(), change.new_state.clone());
        self.update(|sorted| Ok(sorted.reposition(&old, updated)?.into_iter().collect()))
    }

    fn on_reset(&self) -> Result<()> {
        if let Err(err) = self.attachment.check_reset(VIEW) {
            return Err(self.attachment.fail(VIEW, err));
        }
        let old_len = self.core.borrow_mut().clear();
        self.feed.publish(VIEW, vec![ChangeEvent::reset()], old_len, 0)
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut OrderedViewCore<(T, S)>) -> Result<Vec<ChangeEvent<(T, S)>>>,
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
        if events.is_empty() {
            trace!(view = VIEW, "state change kept position");
        }
        let events = events.into_iter().map(|event| event.map(|(item, _)| item)).collect();
        self.feed.publish(VIEW, events, old_len, new_len)
    }
}

impl<T: Clone + 'static, S: Clone + 'static> ObservableCollection<T> for StatefulSortedView<T, S> {
    fn len(&self) -> usize {
        self.inner.core.borrow().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.core.borrow().items().get(index).map(|(item, _)| item.clone())
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.core.borrow().items().iter().map(|(item, _)| item.clone()).collect()
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
    use crate::notifier::FilteredStatefulNotifier;
    use crate::testing::{same_player, stateful_players, Player};
    use cosync_core::SimpleComparator;
    use cosync_reactive::ObservableList;

    type Log = Rc<RefCell<Vec<ChangeEvent<Rc<Player>>>>>;

    fn record(view: &StatefulSortedView<Rc<Player>, i32>) -> (Log, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let sub = view.subscribe(Rc::new(move |event: &ChangeEvent<Rc<Player>>| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));
        (log, sub)
    }

    fn ids(view: &StatefulSortedView<Rc<Player>, i32>) -> Vec<u32> {
        view.to_vec().iter().map(|p| p.id).collect()
    }

    fn leaderboard(list: &ObservableList<Rc<Player>>) -> StatefulSortedView<Rc<Player>, i32> {
        StatefulSortedView::new(stateful_players(list), SimpleComparator::desc(), same_player)
    }

    #[test]
    fn test_stateful_view_initial_order() {
        let list = ObservableList::from_vec(vec![Player::new(1, 10), Player::new(2, 30), Player::new(3, 20)]);
        let view = leaderboard(&list);
        assert_eq!(ids(&view), vec![2, 3, 1]);
        assert_eq!(view.states(), vec![30, 20, 10]);
    }

    #[test]
    fn test_stateful_view_moves_on_state_change() {
        let players = vec![Player::new(1, 10), Player::new(2, 30), Player::new(3, 20)];
        let list = ObservableList::from_vec(players.clone());
        let view = leaderboard(&list);
        let (log, _sub) = record(&view);

        players[0].set_score(40).unwrap();
        assert_eq!(ids(&view), vec![1, 2, 3]);
        assert_eq!(view.states(), vec![40, 30, 20]);

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        match &log[0] {
            ChangeEvent::Move {
                items,
                old_index,
                new_index,
            } => {
                assert_eq!((*old_index, *new_index), (2, 0));
                assert_eq!(items[0].id, 1);
            }
            other => panic!("expected a move, got {:?}", other),
        }
    }

    #[test]
    fn test_stateful_view_stays_when_order_holds() {
        let players = vec![Player::new(1, 10), Player::new(2, 30), Player::new(3, 20)];
        let list = ObservableList::from_vec(players.clone());
        let view = leaderboard(&list);
        let (log, _sub) = record(&view);

        // 20 -> 25 still sits between 30 and 10
        players[2].set_score(25).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(view.states(), vec![30, 25, 10]);

        // One step down is a real move
        players[1].set_score(24).unwrap();
        assert_eq!(ids(&view), vec![3, 2, 1]);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_stateful_view_membership() {
        let list = ObservableList::from_vec(vec![Player::new(1, 10)]);
        let view = leaderboard(&list);

        list.push(Player::new(2, 50)).unwrap();
        assert_eq!(ids(&view), vec![2, 1]);
        list.remove_at(0).unwrap();
        assert_eq!(ids(&view), vec![2]);
        list.clear().unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn test_stateful_view_over_state_filter() {
        let players = vec![Player::new(1, 10), Player::new(2, 30), Player::new(3, 20)];
        let list = ObservableList::from_vec(players.clone());
        let qualified = FilteredStatefulNotifier::new(stateful_players(&list), |score: &i32| *score >= 20);
        let view = StatefulSortedView::new(qualified, SimpleComparator::desc(), same_player);
        assert_eq!(ids(&view), vec![2, 3]);

        players[0].set_score(25).unwrap();
        assert_eq!(ids(&view), vec![2, 1, 3]);
        players[1].set_score(5).unwrap();
        assert_eq!(ids(&view), vec![1, 3]);
        players[2].set_score(26).unwrap();
        assert_eq!(ids(&view), vec![3, 1]);
    }
}
