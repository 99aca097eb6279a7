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

//! Durable queue binding for accepted connections.

use crate::broker::{BrokerError, DeliveryListener, SubscriptionHandle};
use crate::broker_bridge::BrokerBridge;
use crate::endpoint::NamespacePath;
use crate::observability::{events, fields};
use crate::routing::client_identity::ClientIdentity;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::shutdown::ShutdownSignal;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "connection_binder";

/// Active subscription owned by a connection session.
#[derive(Debug)]
pub(crate) struct BoundQueue {
    subscription: SubscriptionHandle,
}

impl BoundQueue {
    pub(crate) fn subscription(&self) -> &SubscriptionHandle {
        &self.subscription
    }
}

/// Runs the create-or-get, bind, subscribe sequence for connections.
#[derive(Clone)]
pub(crate) struct ConnectionBinder {
    broker: BrokerBridge,
    retry: RetryPolicy,
}

impl ConnectionBinder {
    pub(crate) fn new(broker: BrokerBridge, retry: RetryPolicy) -> Self {
        Self { broker, retry }
    }

    async fn bind_once(
        &self,
        namespace: &NamespacePath,
        identity: &ClientIdentity,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<SubscriptionHandle, BrokerError> {
        let queue = self.broker.get_or_create_queue(identity).await?;
        self.broker.bind(&queue, &namespace.routing_key()).await?;
        self.broker.subscribe(&queue, listener).await
    }

    /// Binds the identity's mailbox to the namespace routing key and subscribes.
    ///
    /// Transient broker failures are retried with backoff until the sequence
    /// succeeds or `cancel` fires. Returns `None` when the sequence was abandoned;
    /// a subscription made after cancellation is released before returning.
    pub(crate) async fn bind_with_retry(
        &self,
        namespace: &NamespacePath,
        identity: &ClientIdentity,
        listener: Arc<dyn DeliveryListener>,
        mut cancel: ShutdownSignal,
    ) -> Option<BoundQueue> {
        let routing_key = namespace.routing_key();
        let mut backoff = self.retry.backoff();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_triggered() {
                Self::log_abandoned(namespace, identity, fields::REASON_CONNECTION_CLOSED);
                return None;
            }
            attempt += 1;

            match self.bind_once(namespace, identity, listener.clone()).await {
                Ok(subscription) => {
                    let bound = BoundQueue { subscription };
                    if cancel.is_triggered() {
                        self.release(namespace, identity, bound).await;
                        Self::log_abandoned(namespace, identity, fields::REASON_CONNECTION_CLOSED);
                        return None;
                    }

                    info!(
                        event = events::BINDER_BIND_OK,
                        component = COMPONENT,
                        namespace = %namespace,
                        client_id = identity.as_str(),
                        routing_key = routing_key.as_str(),
                        queue = bound.subscription.queue.name(),
                        attempt,
                        "connection queue bound"
                    );
                    return Some(bound);
                }
                Err(err) if err.is_retryable() => {
                    let delay = backoff.next_delay();
                    debug!(
                        event = events::BINDER_BIND_RETRY,
                        component = COMPONENT,
                        namespace = %namespace,
                        client_id = identity.as_str(),
                        routing_key = routing_key.as_str(),
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        err = %err,
                        "broker unavailable; retrying queue binding"
                    );
                    tokio::select! {
                        _ = cancel.triggered() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    warn!(
                        event = events::BINDER_BIND_ABANDONED,
                        component = COMPONENT,
                        namespace = %namespace,
                        client_id = identity.as_str(),
                        routing_key = routing_key.as_str(),
                        attempt,
                        err = %err,
                        "queue binding failed permanently"
                    );
                    return None;
                }
            }
        }
    }

    /// Cancels the subscription. The queue and its bindings stay on the broker.
    pub(crate) async fn release(
        &self,
        namespace: &NamespacePath,
        identity: &ClientIdentity,
        bound: BoundQueue,
    ) {
        match self.broker.unsubscribe(bound.subscription()).await {
            Ok(()) => debug!(
                event = events::BINDER_RELEASE_OK,
                component = COMPONENT,
                namespace = %namespace,
                client_id = identity.as_str(),
                queue = bound.subscription.queue.name(),
                "subscription released"
            ),
            Err(err) => debug!(
                event = events::BINDER_RELEASE_FAILED,
                component = COMPONENT,
                namespace = %namespace,
                client_id = identity.as_str(),
                queue = bound.subscription.queue.name(),
                err = %err,
                "unable to release subscription"
            ),
        }
    }

    fn log_abandoned(namespace: &NamespacePath, identity: &ClientIdentity, reason: &str) {
        debug!(
            event = events::BINDER_BIND_ABANDONED,
            component = COMPONENT,
            namespace = %namespace,
            client_id = identity.as_str(),
            reason,
            "queue binding abandoned"
        );
    }
}
