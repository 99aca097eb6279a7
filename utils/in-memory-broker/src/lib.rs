/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! In-process [`MessageBroker`] with durable queues.
//!
//! Queues, bindings and pending messages live in the broker value itself, so any
//! number of gateway instances sharing a clone observe the same state; a gateway
//! restart never loses messages. Each queue delivers in order through a single
//! pump task, and a message leaves its queue only once a consumer acknowledges it.
//!
//! ```
//! use in_memory_broker::InMemoryBroker;
//! use smart_router::{BrokerStatus, ClientIdentity, MessageBroker, RoutingKey};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let broker = InMemoryBroker::new();
//! broker.connect().await.unwrap();
//! assert_eq!(*broker.status().borrow(), BrokerStatus::Connected);
//!
//! let queue = broker.get_or_create_queue(&ClientIdentity::new("agent456")).await.unwrap();
//! broker.bind(&queue, &RoutingKey::new("agent456")).await.unwrap();
//! assert_eq!(broker.binding_count().await, 1);
//! # });
//! ```

use async_trait::async_trait;
use smart_router::{
    BrokerError, BrokerMessage, BrokerStatus, ClientIdentity, DeliveryListener, DeliveryOutcome,
    MessageBroker, QueueHandle, RoutingKey, SubscriptionHandle,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, trace};

const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(50);

struct Consumer {
    tag: u64,
    listener: Arc<dyn DeliveryListener>,
}

struct DurableQueue {
    name: String,
    messages: Mutex<VecDeque<BrokerMessage>>,
    consumers: Mutex<Vec<Consumer>>,
    next_consumer: AtomicUsize,
    wakeup: Notify,
}

impl DurableQueue {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Mutex::new(VecDeque::new()),
            consumers: Mutex::new(Vec::new()),
            next_consumer: AtomicUsize::new(0),
            wakeup: Notify::new(),
        }
    }

    async fn push(&self, message: BrokerMessage) {
        self.messages.lock().await.push_back(message);
        self.wakeup.notify_one();
    }

    async fn head(&self) -> Option<BrokerMessage> {
        self.messages.lock().await.front().cloned()
    }

    async fn pick_consumer(&self) -> Option<Arc<dyn DeliveryListener>> {
        let consumers = self.consumers.lock().await;
        if consumers.is_empty() {
            return None;
        }
        let index = self.next_consumer.fetch_add(1, Ordering::Relaxed) % consumers.len();
        Some(consumers[index].listener.clone())
    }
}

#[derive(Default)]
struct Topology {
    queues: HashMap<String, Arc<DurableQueue>>,
    bindings: HashMap<String, BTreeSet<String>>,
    // messages published to a routing key nobody has bound yet
    parked: HashMap<String, VecDeque<BrokerMessage>>,
}

struct BrokerState {
    topology: Mutex<Topology>,
    connected: AtomicBool,
    available: AtomicBool,
    status: watch::Sender<BrokerStatus>,
    next_consumer_tag: AtomicU64,
    redelivery_delay: Duration,
}

impl BrokerState {
    fn is_online(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.available.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), BrokerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(
                "in-memory broker is switched off".to_string(),
            ));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        Ok(())
    }

    async fn wake_all(&self) {
        for queue in self.topology.lock().await.queues.values() {
            queue.wakeup.notify_one();
        }
    }
}

/// Shared in-process broker. Clones share queues, bindings and connection state.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_redelivery_delay(DEFAULT_REDELIVERY_DELAY)
    }

    /// Broker that waits `redelivery_delay` before offering a requeued message again.
    pub fn with_redelivery_delay(redelivery_delay: Duration) -> Self {
        Self {
            state: Arc::new(BrokerState {
                topology: Mutex::new(Topology::default()),
                connected: AtomicBool::new(false),
                available: AtomicBool::new(true),
                status: watch::channel(BrokerStatus::Disconnected).0,
                next_consumer_tag: AtomicU64::new(1),
                redelivery_delay,
            }),
        }
    }

    /// Simulates an outage. While unavailable every operation fails with
    /// [`BrokerError::Unavailable`] and deliveries pause; queues, bindings and
    /// consumers survive and resume when the broker comes back.
    pub async fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
        if self.state.connected.load(Ordering::SeqCst) {
            let status = if available {
                BrokerStatus::Connected
            } else {
                BrokerStatus::Unavailable
            };
            self.state.status.send_replace(status);
        }
        debug!("in-memory broker availability set to {available}");
        if available {
            self.state.wake_all().await;
        }
    }

    pub async fn queue_count(&self) -> usize {
        self.state.topology.lock().await.queues.len()
    }

    /// Number of (routing key, queue) bindings.
    pub async fn binding_count(&self) -> usize {
        self.state
            .topology
            .lock()
            .await
            .bindings
            .values()
            .map(BTreeSet::len)
            .sum()
    }

    /// Messages waiting in a queue, including one currently being delivered.
    pub async fn queue_depth(&self, queue: &str) -> usize {
        let queue = self.state.topology.lock().await.queues.get(queue).cloned();
        match queue {
            Some(queue) => queue.messages.lock().await.len(),
            None => 0,
        }
    }

    pub async fn consumer_count(&self, queue: &str) -> usize {
        let queue = self.state.topology.lock().await.queues.get(queue).cloned();
        match queue {
            Some(queue) => queue.consumers.lock().await.len(),
            None => 0,
        }
    }

    /// Messages held for a routing key without bound queues.
    pub async fn parked_count(&self, routing_key: &str) -> usize {
        self.state
            .topology
            .lock()
            .await
            .parked
            .get(routing_key)
            .map_or(0, VecDeque::len)
    }

    async fn queue(&self, queue: &QueueHandle) -> Result<Arc<DurableQueue>, BrokerError> {
        self.state
            .topology
            .lock()
            .await
            .queues
            .get(queue.name())
            .cloned()
            .ok_or_else(|| BrokerError::UnknownQueue(queue.name().to_string()))
    }
}

/// Delivers the head of `queue` to its consumers until the broker is dropped.
async fn pump(queue: Arc<DurableQueue>, state: Weak<BrokerState>) {
    loop {
        let wakeup = queue.wakeup.notified();

        let Some(broker) = state.upgrade() else {
            return;
        };
        let online = broker.is_online();
        let redelivery_delay = broker.redelivery_delay;
        drop(broker);

        let next = if online {
            match queue.head().await {
                Some(message) => queue.pick_consumer().await.map(|c| (message, c)),
                None => None,
            }
        } else {
            None
        };

        let Some((message, consumer)) = next else {
            wakeup.await;
            continue;
        };

        match consumer.on_delivery(message).await {
            DeliveryOutcome::Ack => {
                queue.messages.lock().await.pop_front();
            }
            DeliveryOutcome::Requeue => {
                trace!("delivery on queue {} requeued", queue.name);
                tokio::time::sleep(redelivery_delay).await;
            }
        }
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(
                "in-memory broker is switched off".to_string(),
            ));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        self.state.status.send_replace(BrokerStatus::Connected);
        self.state.wake_all().await;
        Ok(())
    }

    async fn disconnect(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
        let topology = self.state.topology.lock().await;
        for queue in topology.queues.values() {
            queue.consumers.lock().await.clear();
        }
        drop(topology);
        self.state.status.send_replace(BrokerStatus::Disconnected);
        debug!("in-memory broker disconnected; consumers cancelled");
    }

    fn status(&self) -> watch::Receiver<BrokerStatus> {
        self.state.status.subscribe()
    }

    async fn get_or_create_queue(
        &self,
        identity: &ClientIdentity,
    ) -> Result<QueueHandle, BrokerError> {
        self.state.ensure_online()?;
        let handle = QueueHandle::for_identity(identity);

        let mut topology = self.state.topology.lock().await;
        if !topology.queues.contains_key(handle.name()) {
            let queue = Arc::new(DurableQueue::new(handle.name()));
            tokio::spawn(pump(queue.clone(), Arc::downgrade(&self.state)));
            topology.queues.insert(handle.name().to_string(), queue);
            debug!("queue {} declared", handle.name());
        }

        Ok(handle)
    }

    async fn bind(&self, queue: &QueueHandle, routing_key: &RoutingKey) -> Result<(), BrokerError> {
        self.state.ensure_online()?;

        let mut topology = self.state.topology.lock().await;
        let target = topology
            .queues
            .get(queue.name())
            .cloned()
            .ok_or_else(|| BrokerError::UnknownQueue(queue.name().to_string()))?;

        let inserted = topology
            .bindings
            .entry(routing_key.as_str().to_string())
            .or_default()
            .insert(queue.name().to_string());
        if inserted {
            debug!("queue {} bound to {}", queue.name(), routing_key);
        }

        // parked messages go in before the lock is released so that later
        // publishes to the same key queue up behind them
        if let Some(parked) = topology.parked.remove(routing_key.as_str()) {
            debug!(
                "moving {} parked messages for {} into queue {}",
                parked.len(),
                routing_key,
                queue.name()
            );
            for message in parked {
                target.push(message).await;
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &QueueHandle,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<SubscriptionHandle, BrokerError> {
        self.state.ensure_online()?;
        let target = self.queue(queue).await?;

        let tag = self.state.next_consumer_tag.fetch_add(1, Ordering::SeqCst);
        target.consumers.lock().await.push(Consumer { tag, listener });
        target.wakeup.notify_one();
        debug!("consumer {tag} subscribed to queue {}", queue.name());

        Ok(SubscriptionHandle {
            queue: queue.clone(),
            consumer_tag: tag,
        })
    }

    async fn unsubscribe(&self, subscription: &SubscriptionHandle) -> Result<(), BrokerError> {
        let target = self.queue(&subscription.queue).await?;
        let mut consumers = target.consumers.lock().await;

        let before = consumers.len();
        consumers.retain(|consumer| consumer.tag != subscription.consumer_tag);
        if consumers.len() == before {
            return Err(BrokerError::UnknownSubscription(subscription.consumer_tag));
        }

        debug!(
            "consumer {} unsubscribed from queue {}",
            subscription.consumer_tag,
            subscription.queue.name()
        );
        Ok(())
    }

    async fn publish(
        &self,
        routing_key: &RoutingKey,
        message: BrokerMessage,
    ) -> Result<(), BrokerError> {
        self.state.ensure_online()?;

        let mut topology = self.state.topology.lock().await;
        let targets: Vec<Arc<DurableQueue>> = topology
            .bindings
            .get(routing_key.as_str())
            .into_iter()
            .flatten()
            .filter_map(|name| topology.queues.get(name).cloned())
            .collect();

        if targets.is_empty() {
            trace!("no queue bound to {routing_key}; parking message");
            topology
                .parked
                .entry(routing_key.as_str().to_string())
                .or_default()
                .push_back(message);
            return Ok(());
        }

        for target in targets {
            target.push(message.clone()).await;
        }
        drop(topology);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryBroker;
    use async_trait::async_trait;
    use serde_json::json;
    use smart_router::{
        BrokerError, BrokerMessage, BrokerStatus, ClientIdentity, DeliveryListener,
        DeliveryOutcome, MessageBroker, RoutingKey,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelListener {
        sender: mpsc::UnboundedSender<BrokerMessage>,
    }

    #[async_trait]
    impl DeliveryListener for ChannelListener {
        async fn on_delivery(&self, message: BrokerMessage) -> DeliveryOutcome {
            let _ = self.sender.send(message);
            DeliveryOutcome::Ack
        }
    }

    /// Requeues the first `refusals` deliveries.
    struct StubbornListener {
        refusals: usize,
        seen: AtomicUsize,
        sender: mpsc::UnboundedSender<BrokerMessage>,
    }

    #[async_trait]
    impl DeliveryListener for StubbornListener {
        async fn on_delivery(&self, message: BrokerMessage) -> DeliveryOutcome {
            if self.seen.fetch_add(1, Ordering::SeqCst) < self.refusals {
                return DeliveryOutcome::Requeue;
            }
            let _ = self.sender.send(message);
            DeliveryOutcome::Ack
        }
    }

    fn message(n: u64) -> BrokerMessage {
        BrokerMessage::from_json("talk", &json!({ "n": n })).expect("payload encodes")
    }

    async fn recv(receiver: &mut mpsc::UnboundedReceiver<BrokerMessage>) -> BrokerMessage {
        tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .expect("delivery should arrive")
            .expect("listener channel open")
    }

    #[tokio::test]
    async fn get_or_create_queue_is_idempotent() {
        let broker = InMemoryBroker::new();
        broker.connect().await.expect("connect");
        let identity = ClientIdentity::new("agent456");

        let first = broker.get_or_create_queue(&identity).await.expect("queue");
        let second = broker.get_or_create_queue(&identity).await.expect("queue");
        broker
            .bind(&first, &RoutingKey::new("agent456"))
            .await
            .expect("bind");
        broker
            .bind(&second, &RoutingKey::new("agent456"))
            .await
            .expect("bind");

        assert_eq!(first, second);
        assert_eq!(broker.queue_count().await, 1);
        assert_eq!(broker.binding_count().await, 1);
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let broker = InMemoryBroker::new();
        broker.connect().await.expect("connect");
        let queue = broker
            .get_or_create_queue(&ClientIdentity::new("ui456"))
            .await
            .expect("queue");
        let key = RoutingKey::new("ui456");
        broker.bind(&queue, &key).await.expect("bind");

        for n in 0..5 {
            broker.publish(&key, message(n)).await.expect("publish");
        }
        let (sender, mut receiver) = mpsc::unbounded_channel();
        broker
            .subscribe(&queue, Arc::new(ChannelListener { sender }))
            .await
            .expect("subscribe");

        for n in 0..5 {
            let delivered = recv(&mut receiver).await;
            assert_eq!(delivered.body_json().expect("json"), json!({ "n": n }));
        }
    }

    #[tokio::test]
    async fn unbound_messages_are_parked_until_first_binding() {
        let broker = InMemoryBroker::new();
        broker.connect().await.expect("connect");
        let key = RoutingKey::new("agent789");

        broker.publish(&key, message(1)).await.expect("publish");
        assert_eq!(broker.parked_count("agent789").await, 1);

        let queue = broker
            .get_or_create_queue(&ClientIdentity::new("agent789"))
            .await
            .expect("queue");
        broker.bind(&queue, &key).await.expect("bind");

        assert_eq!(broker.parked_count("agent789").await, 0);
        assert_eq!(broker.queue_depth("agent789").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parked_messages_stay_ahead_of_publishes_racing_the_bind() {
        let broker = InMemoryBroker::new();
        broker.connect().await.expect("connect");

        for round in 0..32 {
            let name = format!("ui{round}");
            let key = RoutingKey::new(&name);
            broker.publish(&key, message(1)).await.expect("park");
            let queue = broker
                .get_or_create_queue(&ClientIdentity::new(&name))
                .await
                .expect("queue");

            let binding = tokio::spawn({
                let broker = broker.clone();
                let queue = queue.clone();
                let key = key.clone();
                async move { broker.bind(&queue, &key).await }
            });
            let publishing = tokio::spawn({
                let broker = broker.clone();
                let key = key.clone();
                async move { broker.publish(&key, message(2)).await }
            });
            binding.await.expect("bind task").expect("bind");
            publishing.await.expect("publish task").expect("publish");

            let (sender, mut receiver) = mpsc::unbounded_channel();
            broker
                .subscribe(&queue, Arc::new(ChannelListener { sender }))
                .await
                .expect("subscribe");
            assert_eq!(recv(&mut receiver).await.body_json().expect("json"), json!({ "n": 1 }));
            assert_eq!(recv(&mut receiver).await.body_json().expect("json"), json!({ "n": 2 }));
        }
    }

    #[tokio::test]
    async fn requeued_message_stays_at_head() {
        let broker = InMemoryBroker::with_redelivery_delay(Duration::from_millis(5));
        broker.connect().await.expect("connect");
        let queue = broker
            .get_or_create_queue(&ClientIdentity::new("ui456"))
            .await
            .expect("queue");
        let key = RoutingKey::new("ui456");
        broker.bind(&queue, &key).await.expect("bind");
        broker.publish(&key, message(1)).await.expect("publish");
        broker.publish(&key, message(2)).await.expect("publish");

        let (sender, mut receiver) = mpsc::unbounded_channel();
        broker
            .subscribe(
                &queue,
                Arc::new(StubbornListener {
                    refusals: 3,
                    seen: AtomicUsize::new(0),
                    sender,
                }),
            )
            .await
            .expect("subscribe");

        assert_eq!(recv(&mut receiver).await.body_json().expect("json"), json!({ "n": 1 }));
        assert_eq!(recv(&mut receiver).await.body_json().expect("json"), json!({ "n": 2 }));
    }

    #[tokio::test]
    async fn outage_rejects_operations_and_keeps_state() {
        let broker = InMemoryBroker::new();
        broker.connect().await.expect("connect");
        let queue = broker
            .get_or_create_queue(&ClientIdentity::new("ui456"))
            .await
            .expect("queue");
        let key = RoutingKey::new("ui456");
        broker.bind(&queue, &key).await.expect("bind");
        let (sender, mut receiver) = mpsc::unbounded_channel();
        broker
            .subscribe(&queue, Arc::new(ChannelListener { sender }))
            .await
            .expect("subscribe");

        broker.set_available(false).await;
        assert_eq!(*broker.status().borrow(), BrokerStatus::Unavailable);
        assert!(matches!(
            broker.publish(&key, message(1)).await,
            Err(BrokerError::Unavailable(_))
        ));

        broker.set_available(true).await;
        broker.publish(&key, message(2)).await.expect("publish after recovery");

        assert_eq!(recv(&mut receiver).await.body_json().expect("json"), json!({ "n": 2 }));
        assert_eq!(broker.consumer_count("ui456").await, 1);
    }

    #[tokio::test]
    async fn disconnect_cancels_consumers_but_keeps_messages() {
        let broker = InMemoryBroker::new();
        broker.connect().await.expect("connect");
        let queue = broker
            .get_or_create_queue(&ClientIdentity::new("agent456"))
            .await
            .expect("queue");
        broker
            .bind(&queue, &RoutingKey::new("agent456"))
            .await
            .expect("bind");
        let (sender, _receiver) = mpsc::unbounded_channel();
        broker
            .subscribe(&queue, Arc::new(ChannelListener { sender }))
            .await
            .expect("subscribe");

        broker.disconnect().await;
        assert_eq!(broker.consumer_count("agent456").await, 0);
        assert!(matches!(
            broker.publish(&RoutingKey::new("agent456"), message(1)).await,
            Err(BrokerError::NotConnected)
        ));

        broker.connect().await.expect("reconnect");
        broker
            .publish(&RoutingKey::new("agent456"), message(1))
            .await
            .expect("publish");
        assert_eq!(broker.queue_depth("agent456").await, 1);
        assert_eq!(broker.binding_count().await, 1);
    }
}
