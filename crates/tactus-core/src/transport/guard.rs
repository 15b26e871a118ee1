//! Scoped inhibition of playback graph reallocation.
//!
//! While any [`ReallocationGuard`] is alive, changes that would rebuild the
//! graph are recorded as pending instead. Dropping the last guard posts a
//! reconcile message; the state machine drains it and applies the pending
//! change once.

use crate::AtomicFlag;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct ReallocationInhibitor {
    count: AtomicUsize,
    pending: AtomicFlag,
    reconcile_tx: Sender<()>,
    reconcile_rx: Receiver<()>,
}

impl ReallocationInhibitor {
    pub fn new() -> Arc<Self> {
        let (reconcile_tx, reconcile_rx) = bounded(1);
        Arc::new(Self {
            count: AtomicUsize::new(0),
            pending: AtomicFlag::new(false),
            reconcile_tx,
            reconcile_rx,
        })
    }

    /// Hold off reallocation until the returned guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> ReallocationGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        ReallocationGuard {
            inhibitor: Arc::clone(self),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_inhibited(&self) -> bool {
        self.count() > 0
    }

    /// Record a reallocation to apply once the inhibitors clear.
    pub fn defer(&self) {
        self.pending.set(true);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.get()
    }

    pub(crate) fn clear_pending(&self) {
        self.pending.set(false);
    }

    /// Drain reconcile messages and claim the pending change if it may run now.
    ///
    /// Returns `true` at most once per deferred change.
    pub fn take_ready(&self) -> bool {
        while self.reconcile_rx.try_recv().is_ok() {}
        !self.is_inhibited() && self.pending.swap(false)
    }

    pub(crate) fn release(&self) {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
        {
            Ok(1) => {
                if self.pending.get() {
                    // A full channel already carries the wake-up.
                    let _ = self.reconcile_tx.try_send(());
                }
            }
            Ok(_) => {}
            Err(_) => {
                debug_assert!(false, "reallocation inhibitor released more often than acquired");
                tracing::error!("reallocation inhibitor underflow, count held at zero");
            }
        }
    }

    /// Whether a reconcile message is waiting.
    pub fn has_reconcile_message(&self) -> bool {
        !self.reconcile_rx.is_empty()
    }
}

/// RAII inhibitor handle; releases on drop.
#[derive(Debug)]
#[must_use = "reallocation is only inhibited while the guard is held"]
pub struct ReallocationGuard {
    inhibitor: Arc<ReallocationInhibitor>,
}

impl Drop for ReallocationGuard {
    fn drop(&mut self) {
        self.inhibitor.release();
    }
}
