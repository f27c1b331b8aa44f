//! Re-entrancy guard and cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Held for the duration of a sweep; released on drop
#[derive(Debug)]
pub struct SweepGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    /// Take the guard, or `None` if a sweep already holds it
    pub fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Cooperative stop request, checked between top-level entities
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear a previous request so the next sweep runs to completion
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_until_dropped() {
        let running = AtomicBool::new(false);
        let guard = SweepGuard::acquire(&running).unwrap();
        assert!(SweepGuard::acquire(&running).is_none());

        drop(guard);
        assert!(SweepGuard::acquire(&running).is_some());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        handle.cancel();
        assert!(flag.is_cancelled());

        flag.reset();
        assert!(!handle.is_cancelled());
    }
}
