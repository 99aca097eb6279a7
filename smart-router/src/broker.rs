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

//! Broker boundary consumed by the gateway.
//!
//! A [`MessageBroker`] owns durable queues: queues outlive consumers and gateway
//! instances, which is what lets in-flight messages survive a client disconnect
//! or a gateway restart.

use crate::routing::client_identity::ClientIdentity;
use crate::routing::routing_key::RoutingKey;
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::watch;

/// Reference to a broker-owned durable queue.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct QueueHandle {
    name: String,
}

impl QueueHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Queue handle addressing the mailbox of one client identity.
    pub fn for_identity(identity: &ClientIdentity) -> Self {
        Self::new(identity.as_str())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reference to one active consumer on a queue.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionHandle {
    pub queue: QueueHandle,
    pub consumer_tag: u64,
}

/// A message as stored by the broker.
///
/// `type_tag` travels as delivery metadata and becomes the outbound event name;
/// `body` is the serialized JSON payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BrokerMessage {
    pub type_tag: String,
    pub body: Vec<u8>,
}

impl BrokerMessage {
    pub fn new(type_tag: &str, body: Vec<u8>) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            body,
        }
    }

    pub fn from_json(type_tag: &str, payload: &Value) -> Result<Self, serde_json::Error> {
        Ok(Self::new(type_tag, serde_json::to_vec(payload)?))
    }

    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Consumer verdict for one delivery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryOutcome {
    /// The message was handed over and may be removed from the queue.
    Ack,
    /// The message must stay at the head of the queue and be redelivered.
    Requeue,
}

/// Callback invoked by the broker for every delivery on a subscription.
#[async_trait]
pub trait DeliveryListener: Send + Sync {
    async fn on_delivery(&self, message: BrokerMessage) -> DeliveryOutcome;
}

/// Observable broker connection state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BrokerStatus {
    Disconnected,
    Connected,
    Unavailable,
}

impl Display for BrokerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerStatus::Disconnected => write!(f, "disconnected"),
            BrokerStatus::Connected => write!(f, "connected"),
            BrokerStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Broker operation failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BrokerError {
    Unavailable(String),
    NotConnected,
    UnknownQueue(String),
    UnknownSubscription(u64),
    Encoding(String),
    Operation(String),
}

impl BrokerError {
    /// Whether waiting for the broker to recover may make the operation succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::Unavailable(_) | BrokerError::NotConnected | BrokerError::Operation(_)
        )
    }
}

impl Display for BrokerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::Unavailable(reason) => write!(f, "broker unavailable: {reason}"),
            BrokerError::NotConnected => write!(f, "broker connection is not established"),
            BrokerError::UnknownQueue(queue) => write!(f, "unknown queue: {queue}"),
            BrokerError::UnknownSubscription(tag) => {
                write!(f, "unknown subscription with consumer tag {tag}")
            }
            BrokerError::Encoding(reason) => write!(f, "unable to encode message: {reason}"),
            BrokerError::Operation(reason) => write!(f, "broker operation failed: {reason}"),
        }
    }
}

impl Error for BrokerError {}

/// Durable-queue broker capability.
///
/// Implementations must make [`MessageBroker::get_or_create_queue`] safe to call
/// concurrently with the same identity and [`MessageBroker::bind`] idempotent.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Closes the connection. Consumers are cancelled; queues and bindings stay.
    async fn disconnect(&self);

    fn status(&self) -> watch::Receiver<BrokerStatus>;

    async fn get_or_create_queue(
        &self,
        identity: &ClientIdentity,
    ) -> Result<QueueHandle, BrokerError>;

    async fn bind(&self, queue: &QueueHandle, routing_key: &RoutingKey)
        -> Result<(), BrokerError>;

    async fn subscribe(
        &self,
        queue: &QueueHandle,
        listener: Arc<dyn DeliveryListener>,
    ) -> Result<SubscriptionHandle, BrokerError>;

    async fn unsubscribe(&self, subscription: &SubscriptionHandle) -> Result<(), BrokerError>;

    async fn publish(
        &self,
        routing_key: &RoutingKey,
        message: BrokerMessage,
    ) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::{BrokerError, BrokerMessage, QueueHandle};
    use crate::routing::client_identity::ClientIdentity;
    use serde_json::json;

    #[test]
    fn broker_message_keeps_json_body_intact() {
        let payload = json!({ "payload": { "text": "Hey is there someone?" } });
        let message = BrokerMessage::from_json("talk", &payload).expect("payload should encode");

        assert_eq!(message.type_tag, "talk");
        assert_eq!(message.body_json().expect("body should decode"), payload);
    }

    #[test]
    fn queue_handle_is_keyed_by_identity() {
        let identity = ClientIdentity::new("ui456");

        assert_eq!(QueueHandle::for_identity(&identity), QueueHandle::new("ui456"));
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(BrokerError::Unavailable("down".to_string()).is_retryable());
        assert!(BrokerError::NotConnected.is_retryable());
        assert!(!BrokerError::UnknownQueue("q".to_string()).is_retryable());
        assert!(!BrokerError::Encoding("bad".to_string()).is_retryable());
    }
}
