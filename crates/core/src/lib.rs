//! Cosync Core - Core types for reactive collection synchronization.
//!
//! This crate provides the foundational types shared by every cosync crate:
//!
//! - `ChangeEvent`: Positional Add/Remove/Replace/Move/Reset notifications
//! - `SubscriptionManager`: An ordered, synchronous callback channel
//! - `Subscription`: A scoped detachment handle
//! - `Comparator`: Orderings used by sorted views, plus identity equality
//! - `ReentrancyMonitor`: Guards collections against nested mutation
//! - `ObservableCollection`: The positional source contract
//! - `Error`: Error types for collection and view operations
//!
//! # Example
//!
//! ```rust
//! use cosync_core::{ChangeEvent, SubscriptionManager};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let channel: SubscriptionManager<ChangeEvent<i32>> = SubscriptionManager::new();
//! let mirror = Rc::new(RefCell::new(Vec::new()));
//!
//! let m = mirror.clone();
//! let _sub = channel.subscribe_scoped(move |e: &ChangeEvent<i32>| e.apply_to(&mut m.borrow_mut()));
//!
//! channel.notify_all(&ChangeEvent::added(vec![1, 2, 3], 0)).unwrap();
//! assert_eq!(*mirror.borrow(), vec![1, 2, 3]);
//! ```

#![no_std]

extern crate alloc;

mod collection;
pub mod comparer;
mod error;
mod event;
mod monitor;
pub mod subscription;

pub use collection::ObservableCollection;
pub use comparer::{
    default_equality, Comparator, KeyComparator, Order, SharedComparator, SharedEquality,
    SimpleComparator,
};
pub use error::{Error, Result};
pub use event::{ChangeEvent, CountChanged};
pub use monitor::{MonitorGuard, ReentrancyMonitor};
pub use subscription::{ChangeCallback, Subscription, SubscriptionId, SubscriptionManager};
