//! Output channels and upstream attachment shared by all views.

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;
use core::cell::RefCell;
use cosync_core::{ChangeEvent, CountChanged, Error, Result, Subscription, SubscriptionManager};
use tracing::{debug, trace};

/// The positional feed and count channel of a view.
pub(crate) struct ViewFeed<T> {
    pub(crate) changes: SubscriptionManager<ChangeEvent<T>>,
    pub(crate) counts: SubscriptionManager<CountChanged>,
}

impl<T> ViewFeed<T> {
    pub(crate) fn new() -> Self {
        Self {
            changes: SubscriptionManager::new(),
            counts: SubscriptionManager::new(),
        }
    }

    /// Emits `events` in order, then a count change if the length moved.
    pub(crate) fn publish(
        &self,
        view: &'static str,
        events: Vec<ChangeEvent<T>>,
        old_len: usize,
        new_len: usize,
    ) -> Result<()> {
        for event in &events {
            trace!(view, kind = event_kind(event), len = event.len(), "emit");
            self.changes.notify_all(event)?;
        }
        if old_len != new_len {
            self.counts.notify_all(&CountChanged::new(old_len, new_len))?;
        }
        Ok(())
    }
}

fn event_kind<T>(event: &ChangeEvent<T>) -> &'static str {
    match event {
        ChangeEvent::Add { .. } => "add",
        ChangeEvent::Remove { .. } => "remove",
        ChangeEvent::Replace { .. } => "replace",
        ChangeEvent::Move { .. } => "move",
        ChangeEvent::Reset => "reset",
    }
}

/// A live connection to the upstream collection or notifier.
///
/// Holds the upstream alive through `upstream_len` and the subscription for
/// as long as the view is attached.
pub(crate) struct Attachment {
    upstream_len: Box<dyn Fn() -> usize>,
    _subscription: Subscription,
}

impl Attachment {
    pub(crate) fn new(upstream_len: Box<dyn Fn() -> usize>, subscription: Subscription) -> Self {
        Self {
            upstream_len,
            _subscription: subscription,
        }
    }
}

/// Attachment state of a view. `None` once detached.
pub(crate) struct AttachmentSlot {
    slot: RefCell<Option<Attachment>>,
}

impl AttachmentSlot {
    pub(crate) fn empty() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    pub(crate) fn set(&self, attachment: Attachment) {
        *self.slot.borrow_mut() = Some(attachment);
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Drops the attachment. Content stays as it was.
    pub(crate) fn detach(&self, view: &'static str) {
        let attachment = self.slot.borrow_mut().take();
        if attachment.is_some() {
            debug!(view, "detached");
        }
        drop(attachment);
    }

    /// Checks the Reset contract: the upstream must already be empty.
    pub(crate) fn check_reset(&self, view: &'static str) -> Result<()> {
        let len = self
            .slot
            .borrow()
            .as_ref()
            .map(|attachment| (attachment.upstream_len)())
            .unwrap_or(0);
        if len == 0 {
            Ok(())
        } else {
            Err(Error::invariant(format!(
                "{}: source collection should be empty during a reset (found {} items)",
                view, len
            )))
        }
    }

    /// Detaches after a fault raised by the view itself, then returns the
    /// error for propagation.
    pub(crate) fn fail(&self, view: &'static str, err: Error) -> Error {
        if err.is_fault() {
            debug!(view, error = %err, "fault, detaching");
            self.detach(view);
        }
        err
    }
}
