//! Shared fixtures for unit tests.

use crate::notifier::{ItemSignal, SourceNotifier, StatefulNotifier};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use cosync_core::{
    ChangeCallback, ChangeEvent, CountChanged, ObservableCollection, Result, Subscription,
    SubscriptionManager,
};
use cosync_reactive::ObservableList;

/// An item with an observable score.
pub(crate) struct Player {
    pub id: u32,
    pub score: Cell<i32>,
    pub signals: SubscriptionManager<()>,
}

impl Player {
    pub fn new(id: u32, score: i32) -> Rc<Self> {
        Rc::new(Self {
            id,
            score: Cell::new(score),
            signals: SubscriptionManager::new(),
        })
    }

    pub fn set_score(&self, score: i32) -> Result<()> {
        self.score.set(score);
        self.signals.notify_all(&())
    }
}

impl core::fmt::Debug for Player {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Player({}, {})", self.id, self.score.get())
    }
}

pub(crate) fn attach_player(player: &Rc<Player>, signal: ItemSignal) -> Subscription {
    player.signals.subscribe_scoped(move |_: &()| signal())
}

/// Players tracked by score and keyed by id.
pub(crate) fn stateful_players(list: &ObservableList<Rc<Player>>) -> StatefulNotifier<Rc<Player>, i32, u32> {
    StatefulNotifier::new(
        SourceNotifier::new(list.clone()),
        |p: &Rc<Player>| p.score.get(),
        |p: &Rc<Player>| p.id,
        attach_player,
    )
    .unwrap()
}

/// Identity equality for shared players.
pub(crate) fn same_player(a: &Rc<Player>, b: &Rc<Player>) -> bool {
    Rc::ptr_eq(a, b)
}

/// A source whose content and events are set independently, for feeding
/// views sequences no well-behaved collection would produce.
#[derive(Clone)]
pub(crate) struct ScriptedSource<T> {
    items: Rc<RefCell<Vec<T>>>,
    changes: Rc<SubscriptionManager<ChangeEvent<T>>>,
    counts: Rc<SubscriptionManager<CountChanged>>,
}

impl<T: Clone + 'static> ScriptedSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
            changes: Rc::new(SubscriptionManager::new()),
            counts: Rc::new(SubscriptionManager::new()),
        }
    }

    /// Replaces the content without notifying anyone.
    pub fn set_items(&self, items: Vec<T>) {
        *self.items.borrow_mut() = items;
    }

    pub fn emit(&self, event: ChangeEvent<T>) -> Result<()> {
        self.changes.notify_all(&event)
    }
}

impl<T: Clone + 'static> ObservableCollection<T> for ScriptedSource<T> {
    fn len(&self) -> usize {
        self.items.borrow().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<T>>) -> Subscription {
        self.changes.subscribe_rc_scoped(callback)
    }

    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription {
        self.counts.subscribe_rc_scoped(callback)
    }
}
