//! Change Broadcasting
//!
//! Fans out change events to every live subscriber. Each subscriber owns a
//! bounded queue; a subscriber whose queue is full when an event arrives is
//! disconnected so that `publish` never waits on a slow reader.

use super::events::ChangeEvent;
use crate::error::{StoreError, StoreResult};
use crate::metrics;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Default number of events buffered per subscriber
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Identifier of one subscription, unique for the broker's lifetime
pub type SubscriberId = u64;

/// In-process publish/subscribe hub for change events
///
/// Cheap to clone; clones share the same subscriber set.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    capacity: usize,
    state: Mutex<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    subscribers: HashMap<SubscriberId, mpsc::Sender<ChangeEvent>>,
    next_id: SubscriberId,
    closed: bool,
}

impl BrokerInner {
    // The state holds no invariant a panicking holder could break halfway,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut state = self.lock();
        let removed = state.subscribers.remove(&id).is_some();
        metrics::record_subscriber_count(state.subscribers.len());
        removed
    }
}

impl Broker {
    /// Create a broker
    ///
    /// # Arguments
    /// * `capacity` - Events buffered per subscriber (at least 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                capacity: capacity.max(1),
                state: Mutex::new(BrokerState::default()),
            }),
        }
    }

    /// Register a new subscriber.
    ///
    /// The subscription sees every event published after this call and none
    /// published before it.
    pub fn subscribe(&self) -> StoreResult<Subscription> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);

        let id = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(StoreError::BrokerUnavailable("broker is closed".to_string()));
            }
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.insert(id, tx);
            metrics::record_subscriber_count(state.subscribers.len());
            id
        };

        info!(subscriber = id, "change stream subscriber connected");

        Ok(Subscription {
            id,
            rx,
            broker: Arc::downgrade(&self.inner),
        })
    }

    /// Hand `event` to every subscriber without waiting on any of them.
    ///
    /// Returns the number of subscribers the event was queued for.
    /// Subscribers with a full queue are disconnected; their streams end
    /// after draining what was already queued.
    pub fn publish(&self, event: ChangeEvent) -> StoreResult<usize> {
        let mut state = self.inner.lock();
        if state.closed {
            return Err(StoreError::BrokerUnavailable("broker is closed".to_string()));
        }

        let mut delivered = 0;
        let mut lagging = Vec::new();
        let mut gone = Vec::new();

        for (id, tx) in state.subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => lagging.push(*id),
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        for id in &lagging {
            state.subscribers.remove(id);
            warn!(
                subscriber = id,
                capacity = self.inner.capacity,
                "disconnecting slow change stream subscriber"
            );
        }
        for id in &gone {
            state.subscribers.remove(id);
            debug!(subscriber = id, "dropping closed change stream subscriber");
        }

        if !lagging.is_empty() {
            metrics::record_lagged_disconnects(lagging.len());
        }
        if !lagging.is_empty() || !gone.is_empty() {
            metrics::record_subscriber_count(state.subscribers.len());
        }
        metrics::record_published();

        Ok(delivered)
    }

    /// Stop delivery to `id` and release its queue.
    ///
    /// Returns false when the subscriber was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            info!(subscriber = id, "change stream subscriber disconnected");
        }
        removed
    }

    /// Shut the broker down. Every subscription stream ends and further
    /// `subscribe`/`publish` calls fail with `BrokerUnavailable`.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let dropped = state.subscribers.len();
        state.subscribers.clear();
        metrics::record_subscriber_count(0);
        info!(subscribers = dropped, "change broker closed");
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Per-subscriber queue capacity
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Handle yielding the events of one subscriber, in publish order.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<ChangeEvent>,
    broker: Weak<BrokerInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. `None` once the subscriber was disconnected
    /// and its queue is drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ChangeEvent>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            if broker.remove(self.id) {
                debug!(subscriber = self.id, "change stream subscription dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_stream::StreamExt;

    fn added(key: &str) -> ChangeEvent {
        ChangeEvent::item_added(None, "users", key, json!({ "id": key }))
    }

    #[tokio::test]
    async fn test_broker_creation() {
        let broker = Broker::new(10);
        assert_eq!(broker.subscriber_count(), 0);
        assert_eq!(broker.capacity(), 10);
        assert!(!broker.is_closed());
    }

    #[tokio::test]
    async fn test_subscribe_and_receive_in_order() {
        let broker = Broker::new(10);
        let mut sub = broker.subscribe().unwrap();

        for key in ["1", "2", "3"] {
            assert_eq!(broker.publish(added(key)).unwrap(), 1);
        }

        for key in ["1", "2", "3"] {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.key.as_deref(), Some(key));
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let broker = Broker::new(10);
        let mut subs: Vec<_> = (0..3).map(|_| broker.subscribe().unwrap()).collect();
        assert_eq!(broker.subscriber_count(), 3);

        let event = ChangeEvent::namespace_deleted(Some("bob".into()), "users");
        assert_eq!(broker.publish(event.clone()).unwrap(), 3);

        for sub in subs.iter_mut() {
            assert_eq!(sub.next().await.unwrap(), event);
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let broker = Broker::new(10);
        broker.publish(added("1")).unwrap();

        let mut sub = broker.subscribe().unwrap();
        broker.publish(added("2")).unwrap();

        assert_eq!(sub.recv().await.unwrap().key.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let broker = Broker::default();
        assert_eq!(broker.publish(added("1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_unsubscribes() {
        let broker = Broker::new(10);
        {
            let _sub = broker.subscribe().unwrap();
            assert_eq!(broker.subscriber_count(), 1);
        }
        assert_eq!(broker.subscriber_count(), 0);
        assert_eq!(broker.publish(added("1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_explicit_unsubscribe() {
        let broker = Broker::new(10);
        let mut sub = broker.subscribe().unwrap();

        assert!(broker.unsubscribe(sub.id()));
        assert!(!broker.unsubscribe(sub.id()));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_disconnected() {
        let broker = Broker::new(2);
        let mut slow = broker.subscribe().unwrap();
        let mut fast = broker.subscribe().unwrap();

        broker.publish(added("1")).unwrap();
        broker.publish(added("2")).unwrap();
        assert_eq!(fast.recv().await.unwrap().key.as_deref(), Some("1"));
        assert_eq!(fast.recv().await.unwrap().key.as_deref(), Some("2"));

        // slow's queue is full: it gets dropped, fast still receives
        assert_eq!(broker.publish(added("3")).unwrap(), 1);
        assert_eq!(broker.subscriber_count(), 1);
        assert_eq!(fast.recv().await.unwrap().key.as_deref(), Some("3"));

        // slow drains what was queued, then its stream ends
        assert_eq!(slow.recv().await.unwrap().key.as_deref(), Some("1"));
        assert_eq!(slow.recv().await.unwrap().key.as_deref(), Some("2"));
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let broker = Broker::new(10);
        let mut sub = broker.subscribe().unwrap();
        broker.publish(added("1")).unwrap();

        broker.close();
        assert!(broker.is_closed());

        assert_eq!(sub.next().await.unwrap().key.as_deref(), Some("1"));
        assert!(sub.next().await.is_none());

        assert!(matches!(
            broker.publish(added("2")),
            Err(StoreError::BrokerUnavailable(_))
        ));
        assert!(matches!(
            broker.subscribe(),
            Err(StoreError::BrokerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_publish_and_unsubscribe() {
        let broker = Broker::new(1024);
        let sub = broker.subscribe().unwrap();
        let id = sub.id();

        let publisher = {
            let broker = broker.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    broker.publish(added(&i.to_string())).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        tokio::task::yield_now().await;
        broker.unsubscribe(id);
        drop(sub);

        publisher.await.unwrap();
        assert_eq!(broker.subscriber_count(), 0);
    }
}
