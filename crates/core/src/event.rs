//! Positional change events.
//!
//! A `ChangeEvent` describes one contiguous structural change to an ordered
//! collection. Multi-run changes are always delivered as several events, each
//! valid against the collection state left by the previous one.

use crate::error::{Error, Result};
use alloc::vec::Vec;

/// A positional change to an ordered collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent<T> {
    /// `items` were inserted starting at `start_index`.
    Add { items: Vec<T>, start_index: usize },
    /// `items` were removed; they used to start at `start_index`.
    Remove { items: Vec<T>, start_index: usize },
    /// `old_items` at `index` were overwritten by `new_items` (same length).
    Replace {
        old_items: Vec<T>,
        new_items: Vec<T>,
        index: usize,
    },
    /// `items` moved from `old_index` to `new_index`.
    Move {
        items: Vec<T>,
        old_index: usize,
        new_index: usize,
    },
    /// The collection content changed wholesale; consumers must rebuild.
    Reset,
}

impl<T> ChangeEvent<T> {
    /// Creates an add event.
    #[inline]
    pub fn added(items: Vec<T>, start_index: usize) -> Self {
        ChangeEvent::Add { items, start_index }
    }

    /// Creates a remove event.
    #[inline]
    pub fn removed(items: Vec<T>, start_index: usize) -> Self {
        ChangeEvent::Remove { items, start_index }
    }

    /// Creates a replace event, rejecting mismatched item counts.
    pub fn replaced(old_items: Vec<T>, new_items: Vec<T>, index: usize) -> Result<Self> {
        if old_items.len() != new_items.len() {
            return Err(Error::invariant(alloc::format!(
                "replace event has {} old items but {} new items",
                old_items.len(),
                new_items.len()
            )));
        }
        Ok(ChangeEvent::Replace {
            old_items,
            new_items,
            index,
        })
    }

    /// Creates a move event.
    #[inline]
    pub fn moved(items: Vec<T>, old_index: usize, new_index: usize) -> Self {
        ChangeEvent::Move {
            items,
            old_index,
            new_index,
        }
    }

    /// Creates a reset event.
    #[inline]
    pub fn reset() -> Self {
        ChangeEvent::Reset
    }

    /// Returns true for `Reset`.
    #[inline]
    pub fn is_reset(&self) -> bool {
        matches!(self, ChangeEvent::Reset)
    }

    /// Returns the number of items carried by this event.
    pub fn len(&self) -> usize {
        match self {
            ChangeEvent::Add { items, .. }
            | ChangeEvent::Remove { items, .. }
            | ChangeEvent::Move { items, .. } => items.len(),
            ChangeEvent::Replace { new_items, .. } => new_items.len(),
            ChangeEvent::Reset => 0,
        }
    }

    /// Returns true if the event carries no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the signed change in collection length caused by this event.
    ///
    /// `Reset` reports zero; its effect depends on the collection it targets.
    pub fn count_delta(&self) -> isize {
        match self {
            ChangeEvent::Add { items, .. } => items.len() as isize,
            ChangeEvent::Remove { items, .. } => -(items.len() as isize),
            _ => 0,
        }
    }

    /// Checks the Replace length invariant.
    pub fn validate(&self) -> Result<()> {
        if let ChangeEvent::Replace {
            old_items,
            new_items,
            ..
        } = self
        {
            if old_items.len() != new_items.len() {
                return Err(Error::invariant(
                    "replace event old and new item counts differ",
                ));
            }
        }
        Ok(())
    }

    /// Maps the carried items to a new type, preserving positions.
    pub fn map<U, F>(self, mut f: F) -> ChangeEvent<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            ChangeEvent::Add { items, start_index } => ChangeEvent::Add {
                items: items.into_iter().map(&mut f).collect(),
                start_index,
            },
            ChangeEvent::Remove { items, start_index } => ChangeEvent::Remove {
                items: items.into_iter().map(&mut f).collect(),
                start_index,
            },
            ChangeEvent::Replace {
                old_items,
                new_items,
                index,
            } => ChangeEvent::Replace {
                old_items: old_items.into_iter().map(&mut f).collect(),
                new_items: new_items.into_iter().map(&mut f).collect(),
                index,
            },
            ChangeEvent::Move {
                items,
                old_index,
                new_index,
            } => ChangeEvent::Move {
                items: items.into_iter().map(&mut f).collect(),
                old_index,
                new_index,
            },
            ChangeEvent::Reset => ChangeEvent::Reset,
        }
    }
}

impl<T: Clone> ChangeEvent<T> {
    /// Reflects this event onto a mirror list.
    ///
    /// For `Reset` the mirror is cleared; the caller repopulates it from the
    /// source snapshot.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<()> {
        self.apply_with(target, |item| item.clone())
    }
}

impl<T> ChangeEvent<T> {
    /// Reflects this event onto a list of derived values.
    pub fn apply_with<R, F>(&self, target: &mut Vec<R>, mut create: F) -> Result<()>
    where
        F: FnMut(&T) -> R,
    {
        match self {
            ChangeEvent::Add { items, start_index } => {
                Error::check_insert_index(*start_index, target.len())?;
                let tail = target.split_off(*start_index);
                target.extend(items.iter().map(&mut create));
                target.extend(tail);
            }
            ChangeEvent::Remove { items, start_index } => {
                let end = start_index + items.len();
                if end > target.len() {
                    return Err(Error::index_out_of_range(end, target.len()));
                }
                target.drain(*start_index..end);
            }
            ChangeEvent::Replace {
                old_items,
                new_items,
                index,
            } => {
                self.validate()?;
                let end = index + old_items.len();
                if end > target.len() {
                    return Err(Error::index_out_of_range(end, target.len()));
                }
                for (slot, item) in target[*index..end].iter_mut().zip(new_items) {
                    *slot = create(item);
                }
            }
            ChangeEvent::Move {
                items,
                old_index,
                new_index,
            } => {
                let count = items.len();
                let end = old_index + count;
                if end > target.len() {
                    return Err(Error::index_out_of_range(end, target.len()));
                }
                // Checked against the list without the moved run
                Error::check_insert_index(*new_index, target.len() - count)?;
                let moved: Vec<R> = target.drain(*old_index..end).collect();
                let tail = target.split_off(*new_index);
                target.extend(moved);
                target.extend(tail);
            }
            ChangeEvent::Reset => target.clear(),
        }
        Ok(())
    }
}

/// Derived notification emitted whenever a mutation changes `len()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountChanged {
    /// Length before the mutation.
    pub old: usize,
    /// Length after the mutation.
    pub new: usize,
}

impl CountChanged {
    /// Creates a count change notification.
    #[inline]
    pub fn new(old: usize, new: usize) -> Self {
        Self { old, new }
    }
}
