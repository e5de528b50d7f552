use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::{broadcast, watch, Notify};

use crate::broadcast::snapshot::{build_snapshot, RupiahCache};
use crate::feed::gate::{QuoteRecord, RateRecord};
use crate::store::{BoundedHistory, InfoRegister};

/// Coalescing data-changed signal shared by all producers.
///
/// Built on `tokio::sync::Notify`: `notify` stores at most one permit, so any
/// number of signals arriving before the dispatcher wakes collapse into a
/// single broadcast cycle.
#[derive(Clone)]
pub struct ChangeSignal {
    notify: Arc<Notify>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks connected subscriber sessions. Mutated from several contexts (new
/// connections, delivery failures, normal disconnects), so everything goes
/// through one mutex-guarded map.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<u64, String>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, peer_addr: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().unwrap().insert(id, peer_addr.clone());
        info!("Registered subscriber #{} from {}", id, peer_addr);
        id
    }

    pub fn deregister(&self, id: u64) {
        if let Some(peer_addr) = self.connections.lock().unwrap().remove(&id) {
            info!("Deregistered subscriber #{} from {}", id, peer_addr);
        }
    }

    pub fn count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Decouples the producers from the subscriber set.
///
/// A single dispatcher task drains the change signal and performs one fan-out
/// per batch: the snapshot is serialized exactly once and shared across all
/// recipients as an `Arc<String>`, so broadcast cost does not scale with
/// subscriber count. Delivery to individual sockets happens in each session's
/// own write task; a failing or lagging session only removes itself.
pub struct BroadcastHub {
    rate_history: BoundedHistory<RateRecord>,
    quote_history: BoundedHistory<QuoteRecord>,
    info: InfoRegister,
    changed: ChangeSignal,
    registry: ConnectionRegistry,
    tx: broadcast::Sender<Arc<String>>,
    shutdown_tx: watch::Sender<bool>,
    rupiah_cache: RupiahCache,
}

impl BroadcastHub {
    pub fn new(
        rate_history: BoundedHistory<RateRecord>,
        quote_history: BoundedHistory<QuoteRecord>,
        info: InfoRegister,
        changed: ChangeSignal,
        channel_size: usize,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(channel_size);
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            rate_history,
            quote_history,
            info,
            changed,
            registry: ConnectionRegistry::new(),
            tx,
            shutdown_tx,
            rupiah_cache: RupiahCache::new(),
        }
    }

    /// Asks every live session to send a close frame and end. Stopping new
    /// connections is the accept loop's job: its listener drops with it.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Watch handle a session selects on; the watch keeps the value, so a
    /// shutdown that fires while the session is mid-write is still seen on
    /// the next loop iteration.
    pub fn shutdown_watch(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rate_history(&self) -> &BoundedHistory<RateRecord> {
        &self.rate_history
    }

    pub fn quote_history(&self) -> &BoundedHistory<QuoteRecord> {
        &self.quote_history
    }

    /// Subscribes to future broadcasts. Sessions must call this before
    /// building their initial snapshot so no change can slip between the
    /// snapshot and the first received broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<String>> {
        self.tx.subscribe()
    }

    /// Serializes the current state of all three sources into one message.
    pub fn current_snapshot(&self) -> Arc<String> {
        Arc::new(build_snapshot(
            &self.rate_history,
            &self.quote_history,
            &self.info,
            &self.rupiah_cache,
        ))
    }

    /// Builds one snapshot and hands it to every subscribed session. Returns
    /// the number of receivers the message reached.
    pub fn broadcast(&self) -> usize {
        let snapshot = self.current_snapshot();
        match self.tx.send(snapshot) {
            Ok(receiver_count) => {
                debug!("Broadcasted snapshot to {} subscribers", receiver_count);
                receiver_count
            }
            Err(_) => {
                // No subscribers connected; nothing to deliver.
                0
            }
        }
    }

    /// Dispatcher loop: one broadcast per batch of change signals. Runs until
    /// the task is aborted at shutdown.
    pub async fn run(self: Arc<Self>) {
        info!("📡 Broadcast dispatcher started");
        loop {
            self.changed.changed().await;
            let delivered = self.broadcast();
            if delivered == 0 && self.registry.count() > 0 {
                warn!(
                    "Snapshot reached no receivers despite {} registered connections",
                    self.registry.count()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_hub() -> (Arc<BroadcastHub>, ChangeSignal) {
        let signal = ChangeSignal::new();
        let hub = Arc::new(BroadcastHub::new(
            BoundedHistory::new(16),
            BoundedHistory::new(4),
            InfoRegister::new(signal.clone()),
            signal.clone(),
            32,
        ));
        (hub, signal)
    }

    #[test]
    fn test_registry_register_deregister() {
        let registry = ConnectionRegistry::new();
        let a = registry.register("127.0.0.1:1000".to_string());
        let b = registry.register("127.0.0.1:1001".to_string());
        assert_ne!(a, b);
        assert_eq!(registry.count(), 2);

        registry.deregister(a);
        assert_eq!(registry.count(), 1);
        // Deregistering twice is harmless.
        registry.deregister(a);
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let (hub, _signal) = test_hub();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        assert_eq!(hub.broadcast(), 2);
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_affect_others() {
        let (hub, _signal) = test_hub();
        let mut rx1 = hub.subscribe();
        let rx2 = hub.subscribe();
        let mut rx3 = hub.subscribe();

        // Subscriber #2 goes away; #1 and #3 still get the message.
        drop(rx2);
        assert_eq!(hub.broadcast(), 2);
        assert!(rx1.recv().await.is_ok());
        assert!(rx3.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_signals_coalesce_into_one_cycle() {
        let (hub, signal) = test_hub();
        let mut rx = hub.subscribe();

        let dispatcher = tokio::spawn(hub.clone().run());

        // Rapid-fire signals before the dispatcher can process them.
        for _ in 0..50 {
            signal.notify();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        dispatcher.abort();

        // At most one cycle for the batch, plus at most one extra cycle if a
        // signal landed while the first broadcast was in flight.
        let mut cycles = 0;
        while rx.try_recv().is_ok() {
            cycles += 1;
        }
        assert!(cycles >= 1, "expected at least one broadcast");
        assert!(cycles <= 2, "expected coalesced broadcasts, got {}", cycles);
    }

    #[tokio::test]
    async fn test_snapshot_is_shared_not_recloned() {
        let (hub, _signal) = test_hub();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.broadcast();
        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        // Both receivers hold the same serialized buffer.
        assert!(Arc::ptr_eq(&a, &b));
    }
}
