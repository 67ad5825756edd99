//! Typed fan-out of terminal events
//!
//! Subscribers register either for one pane or for every pane. Each
//! subscriber owns an unbounded channel, so a slow consumer never causes
//! another to miss output and nothing is dropped on lag.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::TerminalEvent;

#[derive(Default)]
struct Subscribers {
    by_pane: HashMap<String, Vec<mpsc::UnboundedSender<TerminalEvent>>>,
    all: Vec<mpsc::UnboundedSender<TerminalEvent>>,
}

/// Event bus for [`TerminalEvent`]s
#[derive(Default)]
pub struct TerminalEventBus {
    subscribers: Mutex<Subscribers>,
}

/// Receiving end of a bus subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<TerminalEvent>,
}

impl Subscription {
    /// Next event, or `None` once the subscription has been dropped by the bus
    /// (for example after the pane was detached).
    pub async fn recv(&mut self) -> Option<TerminalEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TerminalEvent> {
        self.rx.try_recv().ok()
    }
}

impl TerminalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `data` and `exit` events of one pane.
    pub fn subscribe(&self, pane_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .by_pane
            .entry(pane_id.to_string())
            .or_default()
            .push(tx);
        Subscription { rx }
    }

    /// Subscribe to events of every pane.
    pub fn subscribe_all(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().all.push(tx);
        Subscription { rx }
    }

    /// Deliver an event to the pane's subscribers and to global subscribers.
    ///
    /// Returns the number of subscribers that received it. Closed
    /// subscriptions are pruned along the way.
    pub fn publish(&self, event: TerminalEvent) -> usize {
        let mut subs = self.lock();
        let mut delivered = 0;

        if let Some(pane_subs) = subs.by_pane.get_mut(event.pane_id()) {
            pane_subs.retain(|tx| {
                let ok = tx.send(event.clone()).is_ok();
                delivered += usize::from(ok);
                ok
            });
            if pane_subs.is_empty() {
                subs.by_pane.remove(event.pane_id());
            }
        }

        subs.all.retain(|tx| {
            let ok = tx.send(event.clone()).is_ok();
            delivered += usize::from(ok);
            ok
        });

        delivered
    }

    /// Drop every per-pane subscription for `pane_id`; their `recv` returns
    /// `None` once drained. Returns how many were dropped.
    pub fn unsubscribe_pane(&self, pane_id: &str) -> usize {
        self.lock()
            .by_pane
            .remove(pane_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Live per-pane subscriptions for `pane_id`.
    pub fn subscriber_count(&self, pane_id: &str) -> usize {
        self.lock()
            .by_pane
            .get(pane_id)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
