//! Typed in-process signal bus.
//!
//! Signals are scoped by `(kind, node id)`. Node controllers subscribe when
//! they are mounted and the returned [`Subscription`] unsubscribes them when
//! dropped. Delivery is synchronous: `publish` calls every handler of the
//! channel before returning, which is what makes an invalidation cascade
//! complete before the publisher continues.
//!
//! Gateway calls run as tracked tasks ([`SignalBus::spawn`]) so callers can
//! tell whether work is still in flight and wait for it to settle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;

use signal_types::SignalTable;

use crate::sync::lock;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// A subscription key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Execute(String),
    Invalidate(String),
    /// Global "start execution" trigger, only the Input node listens.
    StartExecution,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Run the node on the given upstream table.
    Execute { node_id: String, table: SignalTable },
    /// Clear the node's table and cascade to its target.
    Invalidate { node_id: String },
    StartExecution,
}

impl Signal {
    pub fn channel(&self) -> Channel {
        match self {
            Signal::Execute { node_id, .. } => Channel::Execute(node_id.clone()),
            Signal::Invalidate { node_id } => Channel::Invalidate(node_id.clone()),
            Signal::StartExecution => Channel::StartExecution,
        }
    }
}

pub trait SignalHandler: Send + Sync {
    fn handle(&self, signal: &Signal);
}

// ---------------------------------------------------------------------------
// SignalBus
// ---------------------------------------------------------------------------

type Subscribers = HashMap<Channel, Vec<(u64, Arc<dyn SignalHandler>)>>;

#[derive(Clone, Default)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Keeps a handler subscribed; unsubscribes on drop.
pub struct Subscription {
    bus: Weak<BusInner>,
    channel: Channel,
    id: u64,
}

impl Subscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut subscribers = lock(&inner.subscribers);
        if let Some(handlers) = subscribers.get_mut(&self.channel) {
            handlers.retain(|(id, _)| *id != self.id);
            if handlers.is_empty() {
                subscribers.remove(&self.channel);
            }
        }
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "the handler is unsubscribed when the subscription is dropped"]
    pub fn subscribe(&self, channel: Channel, handler: Arc<dyn SignalHandler>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers)
            .entry(channel.clone())
            .or_default()
            .push((id, handler));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            channel,
            id,
        }
    }

    /// Deliver `signal` to every handler on its channel. Returns how many
    /// handlers received it; a signal with no subscriber is dropped.
    pub fn publish(&self, signal: Signal) -> usize {
        let channel = signal.channel();
        let handlers: Vec<Arc<dyn SignalHandler>> = lock(&self.inner.subscribers)
            .get(&channel)
            .map(|hs| hs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::trace!(channel = ?channel, "signal dropped, no subscriber");
        }
        for handler in &handlers {
            handler.handle(&signal);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        lock(&self.inner.subscribers)
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Spawn a task on the current tokio runtime and count it as in flight
    /// until it finishes (or panics).
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self.inner.clone());
        tokio::spawn(async move {
            let _guard = guard;
            future.await;
        });
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once no spawned task is in flight. Tasks spawned while waiting
    /// (forward propagation) are waited for as well.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct InFlight(Arc<BusInner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}
