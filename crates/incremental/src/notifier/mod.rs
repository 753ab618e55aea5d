//! Positionless notifiers.
//!
//! - `SourceNotifier`: membership feed of a positional source
//! - `FilteredNotifier`: items passing an item predicate
//! - `StatefulNotifier`: per-item state tracking with `Changed` notifications
//! - `FilteredStatefulNotifier`: items whose state passes a predicate

mod filter;
mod source;
mod stateful;

pub use filter::{FilteredNotifier, FilteredStatefulNotifier};
pub use source::SourceNotifier;
pub use stateful::{AttachFn, ItemSignal, StatefulNotifier};
