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

//! Dispatch of client-emitted messages to route handlers.

use crate::broker_bridge::BrokerBridge;
use crate::control_plane::dispatch_table::DispatchTable;
use crate::data_plane::outbound_worker::OutboundSender;
use crate::endpoint::NamespacePath;
use crate::observability::events;
use crate::route::RouteContext;
use crate::routing::client_identity::ClientIdentity;
use crate::transport::WireMessage;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const COMPONENT: &str = "route_dispatcher";

#[derive(Clone)]
pub(crate) struct RouteDispatcher {
    table: Arc<DispatchTable>,
    broker: BrokerBridge,
}

impl RouteDispatcher {
    pub(crate) fn new(table: Arc<DispatchTable>, broker: BrokerBridge) -> Self {
        Self { table, broker }
    }

    /// Runs the handler registered for the message on a task in `handlers`.
    ///
    /// Returns `false` for unrouted messages. Handler errors and panics are
    /// logged inside the task and never reach the caller's connection.
    pub(crate) fn dispatch(
        &self,
        handlers: &mut JoinSet<()>,
        namespace: &NamespacePath,
        identity: &ClientIdentity,
        reply: &OutboundSender,
        message: WireMessage,
    ) -> bool {
        let Some(action) = self
            .table
            .lookup(namespace.endpoint(), &message.message_type)
        else {
            debug!(
                event = events::DISPATCH_UNROUTED,
                component = COMPONENT,
                namespace = %namespace,
                client_id = identity.as_str(),
                msg_type = message.message_type.as_str(),
                "no route for message; ignoring"
            );
            return false;
        };

        let ctx = RouteContext::new(
            namespace.clone(),
            identity.clone(),
            &message.message_type,
            self.broker.clone(),
            reply.clone(),
        );
        let namespace = namespace.clone();
        let identity = identity.clone();
        let message_type = message.message_type;

        handlers.spawn(async move {
            let outcome = AssertUnwindSafe(action.handle(ctx, message.data))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => debug!(
                    event = events::DISPATCH_HANDLER_OK,
                    component = COMPONENT,
                    namespace = %namespace,
                    client_id = identity.as_str(),
                    msg_type = message_type.as_str(),
                    "route handler completed"
                ),
                Ok(Err(err)) => warn!(
                    event = events::DISPATCH_HANDLER_FAILED,
                    component = COMPONENT,
                    namespace = %namespace,
                    client_id = identity.as_str(),
                    msg_type = message_type.as_str(),
                    err = %err,
                    "route handler failed"
                ),
                Err(_) => warn!(
                    event = events::DISPATCH_HANDLER_PANICKED,
                    component = COMPONENT,
                    namespace = %namespace,
                    client_id = identity.as_str(),
                    msg_type = message_type.as_str(),
                    "route handler panicked"
                ),
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::RouteDispatcher;
    use crate::broker::{
        BrokerError, BrokerMessage, BrokerStatus, DeliveryListener, MessageBroker, QueueHandle,
        SubscriptionHandle,
    };
    use crate::broker_bridge::BrokerBridge;
    use crate::control_plane::dispatch_table::DispatchTable;
    use crate::data_plane::outbound_worker::spawn_outbound_worker;
    use crate::endpoint::{EndpointSpec, NamespacePath};
    use crate::route::{route_fn, EchoAction, HandlerError, RouteSpec};
    use crate::routing::client_identity::ClientIdentity;
    use crate::routing::routing_key::RoutingKey;
    use crate::runtime::retry::RetryPolicy;
    use crate::transport::WireMessage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::{mpsc, watch};
    use tokio::task::JoinSet;

    struct NoopBroker;

    #[async_trait]
    impl MessageBroker for NoopBroker {
        async fn connect(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        fn status(&self) -> watch::Receiver<BrokerStatus> {
            watch::channel(BrokerStatus::Connected).1
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
                consumer_tag: 0,
            })
        }

        async fn unsubscribe(&self, _subscription: &SubscriptionHandle) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish(
            &self,
            _routing_key: &RoutingKey,
            _message: BrokerMessage,
        ) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    fn dispatcher(routes: &[RouteSpec]) -> RouteDispatcher {
        let table = DispatchTable::build(&[EndpointSpec::new("agent", &["456"])], routes)
            .expect("routes are valid");
        RouteDispatcher::new(
            Arc::new(table),
            BrokerBridge::new(Arc::new(NoopBroker), RetryPolicy::default()),
        )
    }

    #[tokio::test]
    async fn echo_route_replies_on_same_connection() {
        let dispatcher = dispatcher(&[RouteSpec::new("agent", "echo", EchoAction)]);
        let namespace = NamespacePath::new("agent", "456");
        let identity = ClientIdentity::new("rawActor");
        let (transport_tx, mut transport_rx) = mpsc::channel(4);
        let (reply, _worker) =
            spawn_outbound_worker(namespace.clone(), identity.clone(), 4, transport_tx);

        let mut handlers = JoinSet::new();
        assert!(dispatcher.dispatch(
            &mut handlers,
            &namespace,
            &identity,
            &reply,
            WireMessage::new("echo", json!({ "payload": "quack!!" })),
        ));
        handlers
            .join_next()
            .await
            .expect("echo is routed")
            .expect("handler task completes");

        let echoed = transport_rx.recv().await.expect("echo reply");
        assert_eq!(echoed.message_type, "echo");
        assert_eq!(echoed.data, json!({ "payload": "quack!!" }));
    }

    #[tokio::test]
    async fn unrouted_message_is_ignored() {
        let dispatcher = dispatcher(&[]);
        let namespace = NamespacePath::new("agent", "456");
        let identity = ClientIdentity::new("agent456");
        let (transport_tx, _transport_rx) = mpsc::channel(4);
        let (reply, _worker) =
            spawn_outbound_worker(namespace.clone(), identity.clone(), 4, transport_tx);

        let mut handlers = JoinSet::new();
        let routed = dispatcher.dispatch(
            &mut handlers,
            &namespace,
            &identity,
            &reply,
            WireMessage::new("talk", json!(null)),
        );

        assert!(!routed);
        assert!(handlers.is_empty());
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_are_contained() {
        let dispatcher = dispatcher(&[
            RouteSpec::new(
                "agent",
                "fail",
                route_fn(|_ctx, _payload| async { Err(HandlerError::failed("boom")) }),
            ),
            RouteSpec::new(
                "agent",
                "panic",
                route_fn(|_ctx, payload| async move {
                    if payload.is_null() {
                        panic!("handler exploded");
                    }
                    Ok(())
                }),
            ),
        ]);
        let namespace = NamespacePath::new("agent", "456");
        let identity = ClientIdentity::new("agent456");
        let (transport_tx, _transport_rx) = mpsc::channel(4);
        let (reply, _worker) =
            spawn_outbound_worker(namespace.clone(), identity.clone(), 4, transport_tx);

        let mut handlers = JoinSet::new();
        for message_type in ["fail", "panic"] {
            assert!(dispatcher.dispatch(
                &mut handlers,
                &namespace,
                &identity,
                &reply,
                WireMessage::new(message_type, json!(null)),
            ));
            handlers
                .join_next()
                .await
                .expect("message is routed")
                .expect("dispatch task itself must not panic");
        }
    }

    #[tokio::test]
    async fn dropping_the_handler_set_aborts_running_handlers() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let (finished_tx, mut finished_rx) = mpsc::unbounded_channel::<()>();
        let dispatcher = dispatcher(&[RouteSpec::new(
            "agent",
            "slow",
            route_fn(move |_ctx, _payload| {
                let started_tx = started_tx.clone();
                let finished_tx = finished_tx.clone();
                async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    let _ = finished_tx.send(());
                    Ok(())
                }
            }),
        )]);
        let namespace = NamespacePath::new("agent", "456");
        let identity = ClientIdentity::new("agent456");
        let (transport_tx, _transport_rx) = mpsc::channel(4);
        let (reply, _worker) =
            spawn_outbound_worker(namespace.clone(), identity.clone(), 4, transport_tx);

        let mut handlers = JoinSet::new();
        assert!(dispatcher.dispatch(
            &mut handlers,
            &namespace,
            &identity,
            &reply,
            WireMessage::new("slow", json!(null)),
        ));
        started_rx.recv().await.expect("handler started");

        drop(handlers);
        drop(dispatcher);

        assert!(finished_rx.recv().await.is_none());
    }
}
