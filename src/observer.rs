//! Single-slot observer mailbox.
//!
//! Holds at most one pending one-shot callback. Registering replaces the
//! previous callback, which is dropped without ever being called. Delivery
//! takes the callback out under the lock and runs it after the lock is
//! released, so an observer may re-register from inside its own body.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::capture::CapturedEvent;

/// A one-shot recipient of the next captured event.
pub type Observer = Box<dyn FnOnce(CapturedEvent) + Send + 'static>;

/// Outcome of offering an event to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// An observer consumed the event.
    Delivered,
    /// No observer was pending; the event was discarded.
    Dropped,
}

#[derive(Default)]
pub struct ObserverSlot {
    pending: Mutex<Option<Observer>>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer`, returning true if it replaced a pending one.
    pub fn register(&self, observer: Observer) -> bool {
        let replaced = self.pending.lock().replace(observer).is_some();
        if replaced {
            debug!("Pending observer replaced before it fired");
        }
        replaced
    }

    /// Register a oneshot sender; the receiver errors if the registration is
    /// later replaced or cleared.
    pub fn register_channel(&self) -> (oneshot::Receiver<CapturedEvent>, bool) {
        let (tx, rx) = oneshot::channel();
        let replaced = self.register(Box::new(move |event| {
            // Receiver may have given up waiting.
            let _ = tx.send(event);
        }));
        (rx, replaced)
    }

    /// Hand `event` to the pending observer, if any, clearing the slot.
    pub fn deliver(&self, event: CapturedEvent) -> Delivery {
        let observer = self.pending.lock().take();
        match observer {
            Some(observer) => {
                trace!(url = event.url(), "Delivering captured event");
                observer(event);
                Delivery::Delivered
            }
            None => {
                debug!(url = event.url(), "No observer registered, dropping event");
                Delivery::Dropped
            }
        }
    }

    /// Drop any pending observer without calling it.
    pub fn clear(&self) -> bool {
        self.pending.lock().take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl std::fmt::Debug for ObserverSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSlot")
            .field("armed", &self.is_armed())
            .finish()
    }
}
