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

//! Gateway-side adapter over a [`MessageBroker`].

use crate::broker::{
    BrokerError, BrokerMessage, BrokerStatus, DeliveryListener, MessageBroker, QueueHandle,
    SubscriptionHandle,
};
use crate::observability::events;
use crate::routing::client_identity::ClientIdentity;
use crate::routing::routing_key::RoutingKey;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::shutdown::ShutdownSignal;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "broker_bridge";

/// Shared handle to the broker used by the binder, the dispatcher and route actions.
///
/// Cloning is cheap; every clone talks to the same broker connection.
#[derive(Clone)]
pub struct BrokerBridge {
    broker: Arc<dyn MessageBroker>,
    retry: RetryPolicy,
}

impl BrokerBridge {
    pub fn new(broker: Arc<dyn MessageBroker>, retry: RetryPolicy) -> Self {
        Self { broker, retry }
    }

    pub fn status(&self) -> watch::Receiver<BrokerStatus> {
        self.broker.status()
    }

    pub async fn connect(&self) -> Result<(), BrokerError> {
        match self.broker.connect().await {
            Ok(()) => {
                info!(
                    event = events::BROKER_CONNECT_OK,
                    component = COMPONENT,
                    "broker connection established"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::BROKER_CONNECT_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "broker connection failed; running degraded"
                );
                Err(err)
            }
        }
    }

    pub async fn disconnect(&self) {
        self.broker.disconnect().await;
    }

    pub async fn get_or_create_queue(
        &self,
        identity: &ClientIdentity,
    ) -> Result<QueueHandle, BrokerError> {
        self.broker.get_or_create_queue(identity).await
    }

    pub async fn bind(
        &self,
        queue: &QueueHandle,
        routing_key: &RoutingKey,
    ) -> Result<(), BrokerError> {
        self.broker.bind(queue, routing_key).await
    }

    pub async fn subscribe(
        &self,
        queue: &QueueHandle,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<SubscriptionHandle, BrokerError> {
        self.broker.subscribe(queue, listener).await
    }

    pub async fn unsubscribe(&self, subscription: &SubscriptionHandle) -> Result<(), BrokerError> {
        self.broker.unsubscribe(subscription).await
    }

    /// Publishes `payload` tagged with `type_tag`, retrying transient failures.
    pub async fn publish(
        &self,
        routing_key: &RoutingKey,
        type_tag: &str,
        payload: &Value,
    ) -> Result<(), BrokerError> {
        let message = BrokerMessage::from_json(type_tag, payload)
            .map_err(|err| BrokerError::Encoding(err.to_string()))?;

        let attempts = self.retry.publish_attempts.max(1);
        let mut backoff = self.retry.backoff();

        for attempt in 1..=attempts {
            match self.broker.publish(routing_key, message.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = backoff.next_delay();
                    debug!(
                        event = events::BROKER_PUBLISH_RETRY,
                        component = COMPONENT,
                        routing_key = routing_key.as_str(),
                        msg_type = type_tag,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        err = %err,
                        "publish failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        event = events::BROKER_PUBLISH_FAILED,
                        component = COMPONENT,
                        routing_key = routing_key.as_str(),
                        msg_type = type_tag,
                        attempt,
                        err = %err,
                        "publish failed"
                    );
                    return Err(err);
                }
            }
        }

        Err(BrokerError::NotConnected)
    }

    /// Watches broker status until shutdown, logging transitions and
    /// re-establishing the connection whenever it is reported disconnected.
    pub(crate) fn spawn_supervisor(&self, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        let bridge = self.clone();

        tokio::spawn(async move {
            let mut status = bridge.status();
            let mut backoff = bridge.retry.backoff();

            loop {
                let current = *status.borrow_and_update();

                if current == BrokerStatus::Disconnected {
                    let delay = backoff.next_delay();
                    tokio::select! {
                        _ = shutdown.triggered() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if shutdown.is_triggered() {
                        return;
                    }
                    if bridge.connect().await.is_ok() {
                        backoff = bridge.retry.backoff();
                    }
                    continue;
                }

                tokio::select! {
                    _ = shutdown.triggered() => return,
                    changed = status.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let next = *status.borrow();
                        info!(
                            event = events::BROKER_STATUS_CHANGED,
                            component = COMPONENT,
                            status = %next,
                            "broker status changed"
                        );
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::BrokerBridge;
    use crate::broker::{
        BrokerError, BrokerMessage, BrokerStatus, DeliveryListener, MessageBroker, QueueHandle,
        SubscriptionHandle,
    };
    use crate::routing::client_identity::ClientIdentity;
    use crate::routing::routing_key::RoutingKey;
    use crate::runtime::retry::RetryPolicy;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::watch;

    /// Fails the first `failures` publishes with `Unavailable`.
    struct FlakyBroker {
        failures: usize,
        attempts: AtomicUsize,
        published: Mutex<Vec<(RoutingKey, BrokerMessage)>>,
        status: watch::Sender<BrokerStatus>,
    }

    impl FlakyBroker {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                attempts: AtomicUsize::new(0),
                published: Mutex::new(Vec::new()),
                status: watch::channel(BrokerStatus::Connected).0,
            }
        }
    }

    #[async_trait]
    impl MessageBroker for FlakyBroker {
        async fn connect(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        fn status(&self) -> watch::Receiver<BrokerStatus> {
            self.status.subscribe()
        }

        async fn get_or_create_queue(
            &self,
            identity: &ClientIdentity,
        ) -> Result<QueueHandle, BrokerError> {
            Ok(QueueHandle::for_identity(identity))
        }

        async fn bind(
            &self,
            _queue: &QueueHandle,
            _routing_key: &RoutingKey,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn subscribe(
            &self,
            queue: &QueueHandle,
            _listener: Arc<dyn DeliveryListener>,
        ) -> Result<SubscriptionHandle, BrokerError> {
            Ok(SubscriptionHandle {
                queue: queue.clone(),
                consumer_tag: 1,
            })
        }

        async fn unsubscribe(&self, _subscription: &SubscriptionHandle) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish(
            &self,
            routing_key: &RoutingKey,
            message: BrokerMessage,
        ) -> Result<(), BrokerError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(BrokerError::Unavailable("flaky".to_string()));
            }
            self.published
                .lock()
                .expect("published lock")
                .push((routing_key.clone(), message));
            Ok(())
        }
    }

    fn fast_retry(publish_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            publish_attempts,
        }
    }

    #[tokio::test]
    async fn publish_retries_transient_failures() {
        let broker = Arc::new(FlakyBroker::new(2));
        let bridge = BrokerBridge::new(broker.clone(), fast_retry(5));

        bridge
            .publish(&RoutingKey::new("agent456"), "talk", &json!({ "text": "hi" }))
            .await
            .expect("publish should succeed after retries");

        assert_eq!(broker.attempts.load(Ordering::SeqCst), 3);
        let published = broker.published.lock().expect("published lock");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0.as_str(), "agent456");
        assert_eq!(published[0].1.type_tag, "talk");
    }

    #[tokio::test]
    async fn publish_gives_up_after_configured_attempts() {
        let broker = Arc::new(FlakyBroker::new(10));
        let bridge = BrokerBridge::new(broker.clone(), fast_retry(3));

        let result = bridge
            .publish(&RoutingKey::new("agent456"), "talk", &json!(null))
            .await;

        assert!(matches!(result, Err(BrokerError::Unavailable(_))));
        assert_eq!(broker.attempts.load(Ordering::SeqCst), 3);
    }
}
