//! Eager-population connectors.
//!
//! A connector mirrors a positional source into a list of derived values.
//! It drains the current snapshot first and only then subscribes, so no event
//! is missed and none is applied twice.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use cosync_core::{ChangeEvent, ObservableCollection, Result, Subscription};
use tracing::debug;

type Hook<R> = Box<dyn FnMut(&R)>;

struct Mirror<T, R> {
    items: Vec<R>,
    factory: Box<dyn FnMut(&T) -> R>,
    on_removed: Option<Hook<R>>,
}

impl<T, R> Mirror<T, R> {
    fn released(&mut self, start: usize, count: usize) {
        if let Some(hook) = self.on_removed.as_mut() {
            for item in &self.items[start..start + count] {
                hook(item);
            }
        }
    }

    fn apply(&mut self, event: &ChangeEvent<T>) -> Result<()> {
        let len = self.items.len();
        match event {
            ChangeEvent::Remove { items, start_index } if start_index + items.len() <= len => {
                self.released(*start_index, items.len());
            }
            ChangeEvent::Replace { old_items, index, .. } if index + old_items.len() <= len => {
                self.released(*index, old_items.len());
            }
            ChangeEvent::Reset => self.released(0, len),
            _ => {}
        }
        let Mirror { items, factory, .. } = self;
        event.apply_with(items, |item| factory(item))
    }
}

/// A derived list kept in step with a positional source.
pub struct ConnectedItems<R> {
    items: Rc<dyn Fn() -> Vec<R>>,
    len: Rc<dyn Fn() -> usize>,
    subscription: Subscription,
}

impl<R> ConnectedItems<R> {
    /// Returns a copy of the derived values, in source order.
    pub fn to_vec(&self) -> Vec<R> {
        (self.items)()
    }

    pub fn len(&self) -> usize {
        (self.len)()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops following the source. The derived values are kept.
    pub fn detach(&mut self) {
        self.subscription.detach();
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_attached()
    }
}

/// Mirrors `source` through `factory`.
pub fn connect_items<T, R, S, F>(source: &S, factory: F) -> ConnectedItems<R>
where
    T: 'static,
    R: Clone + 'static,
    S: ObservableCollection<T> + ?Sized,
    F: FnMut(&T) -> R + 'static,
{
    let factory: Box<dyn FnMut(&T) -> R> = Box::new(factory);
    connect::<T, R, S>(source, factory, None)
}

/// Mirrors `source` through `factory`, calling `on_removed` for every derived
/// value that leaves the list, including on `Reset`.
pub fn connect_items_with<T, R, S, F, H>(source: &S, factory: F, on_removed: H) -> ConnectedItems<R>
where
    T: 'static,
    R: Clone + 'static,
    S: ObservableCollection<T> + ?Sized,
    F: FnMut(&T) -> R + 'static,
    H: FnMut(&R) + 'static,
{
    let factory: Box<dyn FnMut(&T) -> R> = Box::new(factory);
    let on_removed: Hook<R> = Box::new(on_removed);
    connect::<T, R, S>(source, factory, Some(on_removed))
}

fn connect<T, R, S>(source: &S, mut factory: Box<dyn FnMut(&T) -> R>, on_removed: Option<Hook<R>>) -> ConnectedItems<R>
where
    T: 'static,
    R: Clone + 'static,
    S: ObservableCollection<T> + ?Sized,
{
    let items: Vec<R> = source.to_vec().iter().map(|item| factory(item)).collect();
    debug!(items = items.len(), "connected items populated");
    let mirror = Rc::new(RefCell::new(Mirror {
        items,
        factory,
        on_removed,
    }));

    let sink = mirror.clone();
    let subscription = source.subscribe(Rc::new(move |event: &ChangeEvent<T>| {
        sink.borrow_mut().apply(event)
    }));

    let snapshot = mirror.clone();
    ConnectedItems {
        items: Rc::new(move || snapshot.borrow().items.clone()),
        len: Rc::new(move || mirror.borrow().items.len()),
        subscription,
    }
}
