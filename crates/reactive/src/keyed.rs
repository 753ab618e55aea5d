//! Ordered collection with a key index.

use alloc::format;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;
use cosync_core::{
    ChangeCallback, ChangeEvent, CountChanged, Error, ObservableCollection, ReentrancyMonitor, Result,
    Subscription, SubscriptionManager,
};
use cosync_index::{contiguous_runs, diff};
use hashbrown::{HashMap, HashSet};
use tracing::debug;

/// Backing sequence plus key index; always mutated together.
///
/// The index maps keys to items, not positions: positions shift on every
/// insert and remove, so key to position lookups scan `items`.
struct Store<T, K> {
    items: Vec<T>,
    by_key: HashMap<K, T>,
}

impl<T: Clone, K: Eq + Hash + Clone> Store<T, K> {
    fn position(&self, key: &K, key_fn: &dyn Fn(&T) -> K) -> Option<usize> {
        if !self.by_key.contains_key(key) {
            return None;
        }
        self.items.iter().position(|item| key_fn(item) == *key)
    }

    fn check(&self) -> Result<()> {
        if self.items.len() != self.by_key.len() {
            return Err(Error::invariant(format!(
                "keyed collection index diverged ({} items, {} keys)",
                self.items.len(),
                self.by_key.len()
            )));
        }
        Ok(())
    }
}

struct Inner<T, K> {
    store: RefCell<Store<T, K>>,
    key_fn: Rc<dyn Fn(&T) -> K>,
    changes: SubscriptionManager<ChangeEvent<T>>,
    counts: SubscriptionManager<CountChanged>,
    monitor: ReentrancyMonitor,
}

/// An ordered collection whose items are also indexed by a key.
///
/// Keys are unique. `add` treats a collision as an expected outcome and
/// returns false, while the positional `insert` reports it as
/// `Error::DuplicateKey`. Nested mutation from a change handler fails with
/// `Error::Reentrancy`.
///
/// Cloning yields another handle to the same collection.
pub struct KeyedCollection<T, K> {
    inner: Rc<Inner<T, K>>,
}

impl<T, K> Clone for KeyedCollection<T, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, K> KeyedCollection<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Creates an empty collection keyed by `key_fn`.
    pub fn new<F>(key_fn: F) -> Self
    where
        F: Fn(&T) -> K + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                store: RefCell::new(Store {
                    items: Vec::new(),
                    by_key: HashMap::new(),
                }),
                key_fn: Rc::new(key_fn),
                changes: SubscriptionManager::new(),
                counts: SubscriptionManager::new(),
                monitor: ReentrancyMonitor::new(),
            }),
        }
    }

    /// Creates a collection holding `items`. Fails on a repeated key.
    pub fn from_vec<F>(key_fn: F, items: Vec<T>) -> Result<Self>
    where
        F: Fn(&T) -> K + 'static,
    {
        let collection = Self::new(key_fn);
        {
            let mut store = collection.inner.store.borrow_mut();
            for item in items {
                let key = collection.key_of(&item);
                if store.by_key.insert(key, item.clone()).is_some() {
                    return Err(Error::DuplicateKey);
                }
                store.items.push(item);
            }
        }
        Ok(collection)
    }

    /// Computes the key of `item`.
    #[inline]
    pub fn key_of(&self, item: &T) -> K {
        (self.inner.key_fn)(item)
    }

    /// Returns the item stored under `key`.
    pub fn get(&self, key: &K) -> Option<T> {
        self.inner.store.borrow().by_key.get(key).cloned()
    }

    /// Returns true if an item is stored under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.store.borrow().by_key.contains_key(key)
    }

    /// Returns the position of the item stored under `key`.
    pub fn index_of_key(&self, key: &K) -> Option<usize> {
        self.inner.store.borrow().position(key, &*self.inner.key_fn)
    }

    /// Returns the keys in collection order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.store.borrow().items.iter().map(|item| self.key_of(item)).collect()
    }

    /// Appends `item` unless its key is already present.
    ///
    /// Returns false, without any event, on a collision.
    pub fn add(&self, item: T) -> Result<bool> {
        let key = self.key_of(&item);
        if self.contains_key(&key) {
            self.inner.monitor.check()?;
            return Ok(false);
        }
        self.mutate(|store| {
            let index = store.items.len();
            store.by_key.insert(key, item.clone());
            store.items.push(item.clone());
            Ok((true, vec![ChangeEvent::added(vec![item], index)]))
        })
    }

    /// Inserts `item` at `index`. A colliding key is an error.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        let key = self.key_of(&item);
        self.mutate(|store| {
            Error::check_insert_index(index, store.items.len())?;
            if store.by_key.contains_key(&key) {
                return Err(Error::DuplicateKey);
            }
            store.by_key.insert(key, item.clone());
            store.items.insert(index, item.clone());
            Ok(((), vec![ChangeEvent::added(vec![item], index)]))
        })
    }

    /// Stores `item` under `key`, replacing in place or appending.
    ///
    /// `key` must be the key of `item`.
    pub fn set_by_key(&self, key: K, item: T) -> Result<()> {
        if self.key_of(&item) != key {
            return Err(Error::invalid_argument("item", "key does not match the item"));
        }
        let key_fn = self.inner.key_fn.clone();
        self.mutate(|store| match store.position(&key, &*key_fn) {
            Some(index) => {
                let old = core::mem::replace(&mut store.items[index], item.clone());
                store.by_key.insert(key, item.clone());
                Ok(((), vec![ChangeEvent::replaced(vec![old], vec![item], index)?]))
            }
            None => {
                let index = store.items.len();
                store.by_key.insert(key, item.clone());
                store.items.push(item.clone());
                Ok(((), vec![ChangeEvent::added(vec![item], index)]))
            }
        })
    }

    /// Replaces the item stored under `old_key` by `new_value`, keeping its
    /// position. The new key may differ but must not collide with another item.
    pub fn replace(&self, old_key: &K, new_value: T) -> Result<T> {
        let new_key = self.key_of(&new_value);
        let key_fn = self.inner.key_fn.clone();
        self.mutate(|store| {
            let index = store
                .position(old_key, &*key_fn)
                .ok_or_else(|| Error::invalid_argument("old_key", "no item is stored under this key"))?;
            if new_key != *old_key && store.by_key.contains_key(&new_key) {
                return Err(Error::DuplicateKey);
            }
            store.by_key.remove(old_key);
            store.by_key.insert(new_key, new_value.clone());
            let old = core::mem::replace(&mut store.items[index], new_value.clone());
            let event = ChangeEvent::replaced(vec![old.clone()], vec![new_value], index)?;
            Ok((old, vec![event]))
        })
    }

    /// Removes the item stored under `key`, if any.
    pub fn remove_key(&self, key: &K) -> Result<Option<T>> {
        match self.index_of_key(key) {
            Some(index) => self.remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let key_fn = self.inner.key_fn.clone();
        self.mutate(|store| {
            Error::check_index(index, store.items.len())?;
            let item = store.items.remove(index);
            if store.by_key.remove(&key_fn(&item)).is_none() {
                return Err(Error::invariant("removed item was missing from the key index"));
            }
            Ok((item.clone(), vec![ChangeEvent::removed(vec![item], index)]))
        })
    }

    /// Removes everything and emits `Reset`.
    pub fn clear(&self) -> Result<()> {
        self.mutate(|store| {
            store.items.clear();
            store.by_key.clear();
            Ok(((), vec![ChangeEvent::reset()]))
        })
    }

    /// Reconciles the collection with an ordered key sequence.
    ///
    /// Kept keys keep their item. Items for new keys come from `create`, and
    /// an item whose key only moved is reused at its new position. Every
    /// created item is checked before the collection changes, so a failed
    /// sync leaves it untouched.
    pub fn sync_with_keys<C>(&self, keys: &[K], mut create: C) -> Result<()>
    where
        C: FnMut(&K) -> T,
    {
        let mut unique = HashSet::with_capacity(keys.len());
        if !keys.iter().all(|key| unique.insert(key)) {
            return Err(Error::invalid_argument("keys", "target keys must be unique"));
        }
        self.inner.monitor.check()?;

        let missing: Vec<K> = {
            let store = self.inner.store.borrow();
            keys.iter().filter(|key| !store.by_key.contains_key(*key)).cloned().collect()
        };
        let mut fresh: HashMap<K, T> = HashMap::with_capacity(missing.len());
        for key in missing {
            let item = create(&key);
            self.check_created("create", &key, &item)?;
            fresh.insert(key, item);
        }

        let key_fn = self.inner.key_fn.clone();
        self.mutate(|store| {
            let current: Vec<K> = store.items.iter().map(|item| key_fn(item)).collect();
            let script = diff(&current, keys);
            let mut events = Vec::new();

            // Deletions back to front, so earlier positions stay valid.
            let mut detached: HashMap<K, T> = HashMap::new();
            for op in script.iter().rev().filter(|op| op.deleted_left > 0) {
                let removed: Vec<T> = store
                    .items
                    .drain(op.start_left..op.start_left + op.deleted_left)
                    .collect();
                for item in &removed {
                    let key = key_fn(item);
                    store.by_key.remove(&key);
                    detached.insert(key, item.clone());
                }
                events.push(ChangeEvent::removed(removed, op.start_left));
            }

            // Insertions front to back, at their final positions.
            for op in script.iter().filter(|op| op.inserted_right > 0) {
                let added = keys[op.start_right..op.start_right + op.inserted_right]
                    .iter()
                    .map(|key| {
                        detached
                            .remove(key)
                            .or_else(|| fresh.remove(key))
                            .ok_or_else(|| Error::invariant("keyed collection lost an item during sync"))
                    })
                    .collect::<Result<Vec<T>>>()?;
                for item in &added {
                    store.by_key.insert(key_fn(item), item.clone());
                }
                store
                    .items
                    .splice(op.start_right..op.start_right, added.iter().cloned());
                events.push(ChangeEvent::added(added, op.start_right));
            }

            store.check()?;
            debug!(edits = script.len(), events = events.len(), "keyed collection synchronized");
            Ok(((), events))
        })
    }

    /// Reconciles the collection with an unordered set of keyed models.
    ///
    /// Items whose key is absent from `models` are removed. Present ones are
    /// offered to `update`, which may return a replacement stored in place.
    /// Models with a new key are appended, in iteration order, built by
    /// `create`.
    ///
    /// `update` and `create` all run before the collection changes. A
    /// replacement or created item whose key does not match fails the whole
    /// sync with `InvalidArgument` and leaves the collection untouched.
    pub fn sync_with_dictionary<M, I, C, U>(&self, models: I, mut create: C, mut update: U) -> Result<()>
    where
        I: IntoIterator<Item = (K, M)>,
        C: FnMut(&K, &M) -> T,
        U: FnMut(&T, &M) -> Option<T>,
    {
        let mut order: Vec<K> = Vec::new();
        let mut models_by_key: HashMap<K, M> = HashMap::new();
        for (key, model) in models {
            if models_by_key.insert(key.clone(), model).is_none() {
                order.push(key);
            }
        }
        self.inner.monitor.check()?;

        let snapshot = self.to_vec();
        let mut replacements: HashMap<K, T> = HashMap::new();
        for item in &snapshot {
            let key = self.key_of(item);
            if let Some(new_item) = models_by_key.get(&key).and_then(|model| update(item, model)) {
                self.check_created("update", &key, &new_item)?;
                replacements.insert(key, new_item);
            }
        }
        let mut created: Vec<T> = Vec::new();
        for key in order {
            if self.contains_key(&key) {
                continue;
            }
            if let Some(model) = models_by_key.get(&key) {
                let item = create(&key, model);
                self.check_created("create", &key, &item)?;
                created.push(item);
            }
        }

        let key_fn = self.inner.key_fn.clone();
        self.mutate(|store| {
            let mut events = Vec::new();

            let stale: Vec<usize> = store
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| !models_by_key.contains_key(&key_fn(item)))
                .map(|(index, _)| index)
                .collect();
            for run in contiguous_runs(&stale).into_iter().rev() {
                let start = stale[run.start];
                let removed: Vec<T> = store.items.drain(start..start + run.len()).collect();
                for item in &removed {
                    store.by_key.remove(&key_fn(item));
                }
                events.push(ChangeEvent::removed(removed, start));
            }

            for index in 0..store.items.len() {
                let key = key_fn(&store.items[index]);
                if let Some(new_item) = replacements.remove(&key) {
                    store.by_key.insert(key, new_item.clone());
                    let old = core::mem::replace(&mut store.items[index], new_item.clone());
                    events.push(ChangeEvent::replaced(vec![old], vec![new_item], index)?);
                }
            }

            let start = store.items.len();
            let mut appended = Vec::new();
            for item in created {
                let key = key_fn(&item);
                if store.by_key.contains_key(&key) {
                    continue;
                }
                store.by_key.insert(key, item.clone());
                appended.push(item);
            }
            if !appended.is_empty() {
                store.items.extend(appended.iter().cloned());
                events.push(ChangeEvent::added(appended, start));
            }

            store.check()?;
            debug!(events = events.len(), "keyed collection synchronized from dictionary");
            Ok(((), events))
        })
    }

    /// Rejects an item produced by a caller callback for `key` but carrying
    /// another key.
    fn check_created(&self, callback: &'static str, key: &K, item: &T) -> Result<()> {
        if self.key_of(item) != *key {
            return Err(Error::invalid_argument(callback, "produced an item with a different key"));
        }
        Ok(())
    }

    /// Applies `mutate` to the store, then publishes the events it returns.
    fn mutate<R, F>(&self, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Store<T, K>) -> Result<(R, Vec<ChangeEvent<T>>)>,
    {
        self.inner.monitor.check()?;
        let (result, events, old_len, new_len) = {
            let mut store = self.inner.store.borrow_mut();
            let old_len = store.items.len();
            let (result, events) = mutate(&mut store)?;
            (result, events, old_len, store.items.len())
        };

        let _guard = self.inner.monitor.enter();
        for event in &events {
            self.inner.changes.notify_all(event)?;
        }
        if old_len != new_len {
            self.inner.counts.notify_all(&CountChanged::new(old_len, new_len))?;
        }
        Ok(result)
    }
}

impl<T, K> ObservableCollection<T> for KeyedCollection<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    fn len(&self) -> usize {
        self.inner.store.borrow().items.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.inner.store.borrow().items.get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.inner.store.borrow().items.clone()
    }

    fn subscribe(&self, callback: ChangeCallback<ChangeEvent<T>>) -> Subscription {
        self.inner.changes.subscribe_rc_scoped(callback)
    }

    fn subscribe_count(&self, callback: ChangeCallback<CountChanged>) -> Subscription {
        self.inner.counts.subscribe_rc_scoped(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};

    #[derive(Clone, Debug, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    fn user(id: u32, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
        }
    }

    fn users() -> KeyedCollection<User, u32> {
        KeyedCollection::from_vec(|u: &User| u.id, vec![user(1, "ann"), user(2, "bob")]).unwrap()
    }

    type Log = Rc<RefCell<Vec<ChangeEvent<User>>>>;

    fn record(collection: &KeyedCollection<User, u32>) -> (Log, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let sub = collection.subscribe(Rc::new(move |event: &ChangeEvent<User>| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));
        (log, sub)
    }

    #[test]
    fn test_keyed_add_collision_is_silent() {
        let collection = users();
        let (log, _sub) = record(&collection);

        assert!(!collection.add(user(1, "other")).unwrap());
        assert!(log.borrow().is_empty());
        assert_eq!(collection.get(&1).unwrap().name, "ann");

        assert!(collection.add(user(3, "cat")).unwrap());
        assert_eq!(*log.borrow(), vec![ChangeEvent::added(vec![user(3, "cat")], 2)]);
    }

    #[test]
    fn test_keyed_insert_collision_is_error() {
        let collection = users();
        assert_eq!(collection.insert(0, user(2, "dup")), Err(Error::DuplicateKey));
        assert_eq!(collection.len(), 2);
        collection.insert(0, user(9, "zed")).unwrap();
        assert_eq!(collection.keys(), vec![9, 1, 2]);
    }

    #[test]
    fn test_keyed_from_vec_rejects_duplicates() {
        let result = KeyedCollection::from_vec(|u: &User| u.id, vec![user(1, "a"), user(1, "b")]);
        assert_eq!(result.err(), Some(Error::DuplicateKey));
    }

    #[test]
    fn test_keyed_set_by_key() {
        let collection = users();
        let (log, _sub) = record(&collection);

        collection.set_by_key(2, user(2, "bobby")).unwrap();
        collection.set_by_key(4, user(4, "dan")).unwrap();
        assert!(matches!(
            collection.set_by_key(5, user(6, "eve")),
            Err(Error::InvalidArgument { name: "item", .. })
        ));

        assert_eq!(
            *log.borrow(),
            vec![
                ChangeEvent::Replace {
                    old_items: vec![user(2, "bob")],
                    new_items: vec![user(2, "bobby")],
                    index: 1
                },
                ChangeEvent::added(vec![user(4, "dan")], 2),
            ]
        );
    }

    #[test]
    fn test_keyed_replace_keeps_position() {
        let collection = users();
        let old = collection.replace(&1, user(7, "ann")).unwrap();
        assert_eq!(old, user(1, "ann"));
        assert_eq!(collection.keys(), vec![7, 2]);
        assert!(!collection.contains_key(&1));
        assert_eq!(collection.replace(&7, user(2, "x")), Err(Error::DuplicateKey));
    }

    #[test]
    fn test_keyed_remove() {
        let collection = users();
        assert_eq!(collection.remove_key(&1).unwrap(), Some(user(1, "ann")));
        assert_eq!(collection.remove_key(&1).unwrap(), None);
        assert_eq!(collection.remove_at(0).unwrap(), user(2, "bob"));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_keyed_sync_with_keys_reuses_moved_items() {
        let collection = KeyedCollection::from_vec(
            |u: &User| u.id,
            vec![user(1, "a"), user(2, "b"), user(3, "c"), user(4, "d")],
        )
        .unwrap();
        let mirror = Rc::new(RefCell::new(collection.to_vec()));
        let sink = mirror.clone();
        let _sub = collection.subscribe(Rc::new(move |event: &ChangeEvent<User>| {
            event.apply_to(&mut sink.borrow_mut())
        }));

        collection
            .sync_with_keys(&[4, 1, 5, 3], |id| user(*id, "new"))
            .unwrap();
        assert_eq!(collection.keys(), vec![4, 1, 5, 3]);
        // Key 4 moved; its item travelled with it
        assert_eq!(collection.get(&4).unwrap().name, "d");
        assert_eq!(collection.get(&5).unwrap().name, "new");
        assert_eq!(*mirror.borrow(), collection.to_vec());
    }

    #[test]
    fn test_keyed_sync_with_keys_rejects_duplicates() {
        let collection = users();
        let result = collection.sync_with_keys(&[1, 1], |id| user(*id, "x"));
        assert!(matches!(result, Err(Error::InvalidArgument { name: "keys", .. })));
        assert_eq!(collection.keys(), vec![1, 2]);
    }

    #[test]
    fn test_keyed_sync_with_dictionary() {
        let collection = KeyedCollection::from_vec(
            |u: &User| u.id,
            vec![user(1, "a"), user(2, "b"), user(3, "c")],
        )
        .unwrap();
        let (log, _sub) = record(&collection);

        collection
            .sync_with_dictionary(
                vec![(3, "carol"), (4, "dave"), (1, "a")],
                |id, name| user(*id, name),
                |existing, name| (existing.name != *name).then(|| user(existing.id, name)),
            )
            .unwrap();

        assert_eq!(collection.keys(), vec![1, 3, 4]);
        assert_eq!(collection.get(&3).unwrap().name, "carol");
        assert_eq!(
            *log.borrow(),
            vec![
                ChangeEvent::removed(vec![user(2, "b")], 1),
                ChangeEvent::Replace {
                    old_items: vec![user(3, "c")],
                    new_items: vec![user(3, "carol")],
                    index: 1
                },
                ChangeEvent::added(vec![user(4, "dave")], 2),
            ]
        );
    }

    #[test]
    fn test_keyed_sync_with_dictionary_rejects_rekeyed_update() {
        let collection = KeyedCollection::from_vec(
            |u: &User| u.id,
            vec![user(1, "a"), user(2, "b"), user(3, "c")],
        )
        .unwrap();
        let mirror = Rc::new(RefCell::new(collection.to_vec()));
        let sink = mirror.clone();
        let _sub = collection.subscribe(Rc::new(move |event: &ChangeEvent<User>| {
            event.apply_to(&mut sink.borrow_mut())
        }));

        // Item 1 would be dropped and item 2 rekeyed to 9
        let result = collection.sync_with_dictionary(
            vec![(2, "b"), (3, "c")],
            |id, name| user(*id, name),
            |existing, _| (existing.id == 2).then(|| user(9, "nine")),
        );

        assert!(matches!(result, Err(Error::InvalidArgument { name: "update", .. })));
        assert_eq!(collection.keys(), vec![1, 2, 3]);
        assert_eq!(*mirror.borrow(), collection.to_vec());
        assert!(!collection.contains_key(&9));
    }

    #[test]
    fn test_keyed_sync_with_dictionary_rejects_rekeyed_create() {
        let collection = users();
        let (log, _sub) = record(&collection);

        let result = collection.sync_with_dictionary(
            vec![(5, "eve")],
            |_, name| user(6, name),
            |_, _| None,
        );

        assert!(matches!(result, Err(Error::InvalidArgument { name: "create", .. })));
        assert_eq!(collection.keys(), vec![1, 2]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_keyed_sync_with_keys_rejects_rekeyed_create() {
        let collection = users();
        let (log, _sub) = record(&collection);

        let result = collection.sync_with_keys(&[2, 7], |id| user(*id + 1, "off"));

        assert!(matches!(result, Err(Error::InvalidArgument { name: "create", .. })));
        assert_eq!(collection.keys(), vec![1, 2]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_keyed_reentrancy_guard() {
        let collection = users();
        let nested = collection.clone();
        let _sub = collection.subscribe(Rc::new(move |_: &ChangeEvent<User>| {
            nested.add(user(99, "nested")).map(|_| ())
        }));

        assert_eq!(collection.add(user(3, "cat")), Err(Error::Reentrancy));
        assert!(!collection.contains_key(&99));
    }
}
