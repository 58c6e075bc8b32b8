//! Signal fan-out.
//!
//! A [`SignalHub`] is the single broadcaster for "the condition may have
//! changed" notifications. Every watcher subscribes once and owns its own
//! throttle state; the hub only forwards.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Notification that a watched condition may have changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Scroll,
    Resize,
    Custom(String),
}

pub type SubscriptionId = u64;

type Handler = Rc<dyn Fn(&Signal)>;

#[derive(Default)]
struct Subscribers {
    next_id: SubscriptionId,
    handlers: Vec<(SubscriptionId, Handler)>,
}

/// Single-threaded publish/subscribe registry. Clones share subscribers.
#[derive(Clone, Default)]
pub struct SignalHub {
    subscribers: Rc<RefCell<Subscribers>>,
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: impl Fn(&Signal) + 'static) -> SubscriptionId {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.next_id += 1;
        let id = subscribers.next_id;
        subscribers.handlers.push((id, Rc::new(handler)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.handlers.len();
        subscribers.handlers.retain(|(sid, _)| *sid != id);
        subscribers.handlers.len() != before
    }

    /// Deliver `signal` to every current subscriber, returning how many were reached.
    ///
    /// Handlers run against a snapshot, so they may subscribe or unsubscribe
    /// while the signal is being delivered.
    pub fn emit(&self, signal: &Signal) -> usize {
        let snapshot: Vec<Handler> = self
            .subscribers
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in &snapshot {
            handler(signal);
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().handlers.len()
    }

    /// Emit every signal received on `rx` until all senders are dropped.
    pub async fn pump(&self, mut rx: UnboundedReceiver<Signal>) {
        while let Some(signal) = rx.recv().await {
            let reached = self.emit(&signal);
            tracing::trace!(target: "tripwire::signal", ?signal, reached, "signal delivered");
        }
        tracing::debug!(target: "tripwire::signal", "signal source closed");
    }
}

/// Channel pair feeding a hub from producers that live elsewhere
/// (other tasks or threads). Payloads crossing the boundary are `Send`.
pub struct SignalChannels {
    pub sender: UnboundedSender<Signal>,
    pub receiver: UnboundedReceiver<Signal>,
}

impl SignalChannels {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self { sender, receiver }
    }
}

impl Default for SignalChannels {
    fn default() -> Self {
        Self::new()
    }
}
