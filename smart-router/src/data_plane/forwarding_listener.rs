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

//! Broker delivery listener forwarding queue messages to one connection.

use crate::broker::{BrokerMessage, DeliveryListener, DeliveryOutcome};
use crate::data_plane::outbound_worker::{EmitError, OutboundSender};
use crate::endpoint::NamespacePath;
use crate::observability::{events, fields};
use crate::routing::client_identity::ClientIdentity;
use async_trait::async_trait;
use tracing::{debug, warn};

const COMPONENT: &str = "forwarding_listener";

/// Turns each delivery into an outbound `{type, data}` event.
///
/// A delivery is acknowledged only once the transport has taken the event. A
/// full buffer, a closed connection, or an event discarded before the hand-off
/// requeues the delivery so the broker keeps it at the head of the queue.
pub(crate) struct ForwardingListener {
    namespace: NamespacePath,
    identity: ClientIdentity,
    outbound: OutboundSender,
}

impl ForwardingListener {
    pub(crate) fn new(
        namespace: NamespacePath,
        identity: ClientIdentity,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            namespace,
            identity,
            outbound,
        }
    }
}

#[async_trait]
impl DeliveryListener for ForwardingListener {
    async fn on_delivery(&self, message: BrokerMessage) -> DeliveryOutcome {
        let data = match message.body_json() {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    event = events::FORWARD_DROP_UNDECODABLE,
                    component = COMPONENT,
                    namespace = %self.namespace,
                    client_id = self.identity.as_str(),
                    msg_type = message.type_tag.as_str(),
                    err = %err,
                    "dropping delivery with undecodable body"
                );
                return DeliveryOutcome::Ack;
            }
        };

        match self.outbound.try_hand_off(&message.type_tag, data) {
            Ok(receipt) => {
                if receipt.await.is_ok() {
                    debug!(
                        event = events::FORWARD_DELIVERY,
                        component = COMPONENT,
                        namespace = %self.namespace,
                        client_id = self.identity.as_str(),
                        msg_type = message.type_tag.as_str(),
                        "forwarded delivery to connection"
                    );
                    DeliveryOutcome::Ack
                } else {
                    debug!(
                        event = events::FORWARD_REQUEUE_CONNECTION_CLOSED,
                        component = COMPONENT,
                        namespace = %self.namespace,
                        client_id = self.identity.as_str(),
                        msg_type = message.type_tag.as_str(),
                        reason = fields::REASON_CONNECTION_CLOSED,
                        "connection closed before hand-off; requeueing delivery"
                    );
                    DeliveryOutcome::Requeue
                }
            }
            Err(EmitError::Full) => {
                debug!(
                    event = events::FORWARD_REQUEUE_BUFFER_FULL,
                    component = COMPONENT,
                    namespace = %self.namespace,
                    client_id = self.identity.as_str(),
                    msg_type = message.type_tag.as_str(),
                    "outbound buffer full; requeueing delivery"
                );
                DeliveryOutcome::Requeue
            }
            Err(EmitError::Closed) => {
                debug!(
                    event = events::FORWARD_REQUEUE_CONNECTION_CLOSED,
                    component = COMPONENT,
                    namespace = %self.namespace,
                    client_id = self.identity.as_str(),
                    msg_type = message.type_tag.as_str(),
                    reason = fields::REASON_CONNECTION_CLOSED,
                    "connection closed; requeueing delivery"
                );
                DeliveryOutcome::Requeue
            }
        }
    }
}
