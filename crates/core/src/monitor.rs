//! Reentrancy monitor for mutable collections.

use crate::error::{Error, Result};
use alloc::rc::Rc;
use core::cell::Cell;

/// Tracks whether a collection is currently dispatching its own change
/// notification.
///
/// Mutators call `check` before touching state and hold the guard returned by
/// `enter` while notifying; the guard releases the monitor when dropped, also
/// on the error path.
#[derive(Clone, Debug, Default)]
pub struct ReentrancyMonitor {
    depth: Rc<Cell<usize>>,
}

impl ReentrancyMonitor {
    /// Creates an idle monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a notification is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.depth.get() > 0
    }

    /// Fails with `Error::Reentrancy` if a notification is in flight.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_busy() {
            Err(Error::Reentrancy)
        } else {
            Ok(())
        }
    }

    /// Marks the monitor busy until the returned guard is dropped.
    pub fn enter(&self) -> MonitorGuard {
        self.depth.set(self.depth.get() + 1);
        MonitorGuard {
            depth: self.depth.clone(),
        }
    }
}

/// Releases the monitor on drop.
#[derive(Debug)]
pub struct MonitorGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_guard_scope() {
        let monitor = ReentrancyMonitor::new();
        assert!(monitor.check().is_ok());
        {
            let _guard = monitor.enter();
            assert!(monitor.is_busy());
            assert_eq!(monitor.check(), Err(Error::Reentrancy));
        }
        assert!(!monitor.is_busy());
    }

    #[test]
    fn test_monitor_released_on_error_path() {
        let monitor = ReentrancyMonitor::new();
        let run = |m: &ReentrancyMonitor| -> Result<()> {
            let _guard = m.enter();
            Err(Error::invariant("handler failed"))
        };
        assert!(run(&monitor).is_err());
        assert!(monitor.check().is_ok());
    }
}
