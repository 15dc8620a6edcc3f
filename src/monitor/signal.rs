//! Coalescing change notification between the monitor and its observers.
//!
//! Posting bumps a version counter on a `watch` channel: it never blocks,
//! and any number of posts between two looks collapse into a single
//! "something changed". Closing drops the sender exactly once.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

/// Sending half, owned by a monitor.
#[derive(Debug)]
pub(crate) struct ChangeNotifier {
    sender: Mutex<Option<watch::Sender<u64>>>,
    receiver: watch::Receiver<u64>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = watch::channel(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// A notifier that starts out closed and never signals.
    pub(crate) fn closed() -> Self {
        let notifier = Self::new();
        notifier.close();
        notifier
    }

    /// Records that something changed. No-op once closed.
    pub(crate) fn post(&self) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            sender.send_modify(|version| *version = version.wrapping_add(1));
        }
    }

    /// Closes the channel. Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Creates an observer handle that starts with nothing pending.
    pub(crate) fn subscribe(&self) -> ChangeSignal {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => self.receiver.clone(),
        };
        let seen = *receiver.borrow();
        ChangeSignal { receiver, seen }
    }
}

/// Observer handle for monitor changes.
///
/// Carries at-least-one-change semantics: after any number of mutations the
/// handle reports a single pending change until it is acknowledged.
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    receiver: watch::Receiver<u64>,
    /// Last version this handle acknowledged.
    seen: u64,
}

impl ChangeSignal {
    /// Waits for the next change and acknowledges it.
    ///
    /// Returns `false` once the monitor has shut down and no unseen change
    /// remains.
    pub async fn changed(&mut self) -> bool {
        if self.has_pending() {
            self.acknowledge();
            return true;
        }
        let open = self.receiver.changed().await.is_ok();
        if open {
            self.acknowledge();
        }
        open
    }

    /// Returns true if a change was posted since the last acknowledgement.
    ///
    /// A change posted right before shutdown stays pending until it is
    /// acknowledged.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        *self.receiver.borrow() != self.seen
    }

    /// Marks all changes so far as seen.
    pub fn acknowledge(&mut self) {
        self.seen = *self.receiver.borrow_and_update();
    }

    /// Returns true once the monitor has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.has_changed().is_err()
    }
}
