//! Comparer and equality abstractions used by ordered views.
//!
//! Sorted views order their content with a `Comparator`. Because sort keys need
//! not be unique, an identity equality may be paired with it: when the
//! comparator reports a tie, the equality decides whether two elements are the
//! same element.

use alloc::rc::Rc;
use core::cmp::Ordering;
use core::marker::PhantomData;

/// Sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Ascending order (smallest first)
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Order {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }
}

/// Trait for comparing elements.
pub trait Comparator<T: ?Sized> {
    /// Compares two elements according to the comparator's ordering.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Returns true if a < b according to this comparator.
    fn is_less(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Returns true if a > b according to this comparator.
    fn is_greater(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    /// Returns true if a and b tie according to this comparator.
    fn is_equal(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// A comparator for elements that implement Ord.
#[derive(Clone, Debug)]
pub struct SimpleComparator {
    order: Order,
}

impl SimpleComparator {
    /// Creates a new simple comparator with the given order.
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Creates an ascending comparator.
    pub fn asc() -> Self {
        Self::new(Order::Asc)
    }

    /// Creates a descending comparator.
    pub fn desc() -> Self {
        Self::new(Order::Desc)
    }

    /// Returns the order of this comparator.
    pub fn order(&self) -> Order {
        self.order
    }
}

impl<T: Ord> Comparator<T> for SimpleComparator {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.order.apply(a.cmp(b))
    }
}

/// Orders elements by a derived key.
pub struct KeyComparator<T, K, F> {
    key_fn: F,
    order: Order,
    _marker: PhantomData<fn(&T) -> K>,
}

impl<T, K, F> KeyComparator<T, K, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    /// Creates a key comparator with the given order.
    pub fn new(key_fn: F, order: Order) -> Self {
        Self {
            key_fn,
            order,
            _marker: PhantomData,
        }
    }

    /// Creates an ascending key comparator.
    pub fn asc(key_fn: F) -> Self {
        Self::new(key_fn, Order::Asc)
    }
}

impl<T, K, F> Comparator<T> for KeyComparator<T, K, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.order.apply((self.key_fn)(a).cmp(&(self.key_fn)(b)))
    }
}

/// A reference-counted comparator shared between a view and its helpers.
pub type SharedComparator<T> = Rc<dyn Comparator<T>>;

/// A reference-counted identity equality.
pub type SharedEquality<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Returns the `PartialEq`-based identity equality.
pub fn default_equality<T: PartialEq + 'static>() -> SharedEquality<T> {
    Rc::new(|a: &T, b: &T| a == b)
}
