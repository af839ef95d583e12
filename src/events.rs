//! View events from the presentation layer
//!
//! Uses `tokio::sync::broadcast` so any number of listeners can register.
//! A listener deregisters by dropping its [`ViewSubscription`] or calling
//! [`ViewSubscription::unsubscribe`].

use tokio::sync::broadcast;

/// Something the user did to the list view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The list was scrolled to a new offset.
    Scrolled { scroll_top: f64 },
    /// The viewport changed height.
    Resized { height: f64 },
    /// The search box text changed.
    QueryEdited { query: String },
    /// The user asked to retry after an error.
    Retry,
}

impl ViewEvent {
    /// Returns true for events that only move the viewport.
    pub fn is_geometry(&self) -> bool {
        matches!(self, ViewEvent::Scrolled { .. } | ViewEvent::Resized { .. })
    }
}

/// Broadcast sender for view events.
///
/// Clone this to share between components that emit events.
/// Sending with no listeners silently succeeds.
#[derive(Clone)]
pub struct ViewEventSender {
    tx: broadcast::Sender<ViewEvent>,
}

impl ViewEventSender {
    /// Create a sender buffering up to `capacity` events per listener.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn send(&self, event: ViewEvent) {
        let _ = self.tx.send(event);
    }

    /// Register a new listener.
    pub fn subscribe(&self) -> ViewSubscription {
        ViewSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ViewEventSender {
    fn default() -> Self {
        // scroll events arrive in bursts
        Self::new(64)
    }
}

/// A registered listener.
///
/// A listener that falls behind skips the events it missed rather than
/// blocking the sender.
pub struct ViewSubscription {
    rx: broadcast::Receiver<ViewEvent>,
}

impl ViewSubscription {
    /// Receive the next event.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ViewEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("view subscription lagged by {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an event without waiting.
    pub fn try_recv(&mut self) -> Option<ViewEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Deregister this listener.
    pub fn unsubscribe(self) {
        drop(self.rx);
    }
}
