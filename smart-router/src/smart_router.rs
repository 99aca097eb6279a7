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

use crate::broker::{BrokerStatus, MessageBroker};
use crate::broker_bridge::BrokerBridge;
use crate::control_plane::dispatch_table::DispatchTable;
use crate::control_plane::endpoint_registrar::{open_namespaces, plan_namespaces};
use crate::control_plane::lifecycle::{GatewayState, Lifecycle, LifecycleError};
use crate::data_plane::connection_binder::ConnectionBinder;
use crate::data_plane::namespace_acceptor::spawn_namespace_acceptor;
use crate::data_plane::route_dispatcher::RouteDispatcher;
use crate::data_plane::session::SessionServices;
use crate::endpoint::{EndpointSpec, NamespacePath};
use crate::observability::events;
use crate::route::RouteSpec;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::shutdown::{join_with_grace, ShutdownSignal, ShutdownTrigger};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const COMPONENT: &str = "smart_router";
const DEFAULT_OUTBOUND_BUFFER_SIZE: usize = 256;
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Static configuration of a [`SmartRouter`].
#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub endpoints: Vec<EndpointSpec>,
    pub routes: Vec<RouteSpec>,
    /// Capacity of each connection's outbound buffer.
    pub outbound_buffer_size: usize,
    pub retry: RetryPolicy,
    /// How long `stop()` waits for sessions before aborting them.
    pub shutdown_grace: Duration,
}

impl RouterConfig {
    pub fn new(endpoints: Vec<EndpointSpec>, routes: Vec<RouteSpec>) -> Self {
        Self {
            endpoints,
            routes,
            outbound_buffer_size: DEFAULT_OUTBOUND_BUFFER_SIZE,
            retry: RetryPolicy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_outbound_buffer_size(mut self, outbound_buffer_size: usize) -> Self {
        self.outbound_buffer_size = outbound_buffer_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }
}

struct RunningGateway {
    namespaces: usize,
    routes: usize,
    trigger: ShutdownTrigger,
    acceptors: Vec<JoinHandle<()>>,
    supervisor: JoinHandle<()>,
}

///
/// [`SmartRouter`] is the gateway: it serves one namespace per declared endpoint
/// instance, gives every connecting client a durable mailbox on the broker and
/// dispatches client messages to the configured routes.
///
/// The router is an explicit value owned by the caller. Its state moves
/// Stopped → Starting → Running → Stopping → Stopped and can be observed with
/// [`SmartRouter::subscribe_state`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio::sync::{mpsc, watch};
/// use smart_router::{
///     BrokerError, BrokerMessage, BrokerStatus, ClientConnection, ClientIdentity,
///     DeliveryListener, EndpointSpec, ForwardAction, GatewayState, MessageBroker,
///     NamespacePath, QueueHandle, RouteSpec, RouterConfig, RoutingKey, SmartRouter,
///     SubscriptionHandle, Transport, TransportError,
/// };
///
/// # struct NullTransport;
/// #
/// # #[async_trait]
/// # impl Transport for NullTransport {
/// #     async fn listen(&self) -> Result<(), TransportError> { Ok(()) }
/// #     async fn open_namespace(
/// #         &self,
/// #         _namespace: &NamespacePath,
/// #     ) -> Result<mpsc::Receiver<ClientConnection>, TransportError> {
/// #         Ok(mpsc::channel(1).1)
/// #     }
/// #     async fn close(&self) {}
/// # }
/// #
/// # struct NullBroker;
/// #
/// # #[async_trait]
/// # impl MessageBroker for NullBroker {
/// #     async fn connect(&self) -> Result<(), BrokerError> { Ok(()) }
/// #     async fn disconnect(&self) {}
/// #     fn status(&self) -> watch::Receiver<BrokerStatus> {
/// #         watch::channel(BrokerStatus::Connected).1
/// #     }
/// #     async fn get_or_create_queue(
/// #         &self,
/// #         identity: &ClientIdentity,
/// #     ) -> Result<QueueHandle, BrokerError> {
/// #         Ok(QueueHandle::for_identity(identity))
/// #     }
/// #     async fn bind(&self, _q: &QueueHandle, _k: &RoutingKey) -> Result<(), BrokerError> { Ok(()) }
/// #     async fn subscribe(
/// #         &self,
/// #         queue: &QueueHandle,
/// #         _listener: Arc<dyn DeliveryListener>,
/// #     ) -> Result<SubscriptionHandle, BrokerError> {
/// #         Ok(SubscriptionHandle { queue: queue.clone(), consumer_tag: 1 })
/// #     }
/// #     async fn unsubscribe(&self, _s: &SubscriptionHandle) -> Result<(), BrokerError> { Ok(()) }
/// #     async fn publish(&self, _k: &RoutingKey, _m: BrokerMessage) -> Result<(), BrokerError> { Ok(()) }
/// # }
/// #
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let config = RouterConfig::new(
///     vec![EndpointSpec::new("agent", &["456"]), EndpointSpec::new("ui", &["456"])],
///     vec![RouteSpec::new("ui", "talk", ForwardAction::to("agent"))],
/// );
/// let router = SmartRouter::new("doc-gateway", config, Arc::new(NullTransport), Arc::new(NullBroker));
///
/// router.start().await.unwrap();
/// assert_eq!(router.state(), GatewayState::Running);
/// assert_eq!(router.namespaces().len(), 2);
///
/// router.stop().await.unwrap();
/// assert_eq!(router.state(), GatewayState::Stopped);
/// # });
/// ```
pub struct SmartRouter {
    name: String,
    config: RouterConfig,
    transport: Arc<dyn Transport>,
    broker: BrokerBridge,
    lifecycle: Lifecycle,
    running: Mutex<Option<RunningGateway>>,
}

impl SmartRouter {
    pub fn new(
        name: &str,
        config: RouterConfig,
        transport: Arc<dyn Transport>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        let broker = BrokerBridge::new(broker, config.retry.clone());
        Self {
            name: name.to_string(),
            config,
            transport,
            broker,
            lifecycle: Lifecycle::new(),
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> GatewayState {
        self.lifecycle.current()
    }

    /// Watch channel receiving every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<GatewayState> {
        self.lifecycle.subscribe()
    }

    pub fn broker(&self) -> &BrokerBridge {
        &self.broker
    }

    pub fn broker_status(&self) -> BrokerStatus {
        *self.broker.status().borrow()
    }

    /// Namespaces served by this configuration, in declaration order.
    ///
    /// Empty if the endpoint declarations are invalid.
    pub fn namespaces(&self) -> Vec<NamespacePath> {
        plan_namespaces(&self.config.endpoints).unwrap_or_default()
    }

    /// Starts serving. Only valid while Stopped.
    ///
    /// An unreachable broker does not fail the start: sessions keep retrying
    /// their queue binding until it recovers.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle
            .transition(GatewayState::Stopped, GatewayState::Starting)?;
        info!(
            event = events::GATEWAY_START,
            component = COMPONENT,
            gateway = self.name.as_str(),
            "starting gateway"
        );

        let mut running = self.running.lock().await;
        match self.start_inner().await {
            Ok(gateway) => {
                info!(
                    event = events::GATEWAY_STARTED,
                    component = COMPONENT,
                    gateway = self.name.as_str(),
                    namespaces = gateway.namespaces,
                    routes = gateway.routes,
                    "gateway started"
                );
                *running = Some(gateway);
                self.lifecycle.force(GatewayState::Running);
                Ok(())
            }
            Err(err) => {
                self.lifecycle.force(GatewayState::Stopped);
                warn!(
                    event = events::GATEWAY_START_FAILED,
                    component = COMPONENT,
                    gateway = self.name.as_str(),
                    err = %err,
                    "gateway start failed"
                );
                Err(err)
            }
        }
    }

    async fn start_inner(&self) -> Result<RunningGateway, LifecycleError> {
        let namespaces = plan_namespaces(&self.config.endpoints)?;
        let table = DispatchTable::build(&self.config.endpoints, &self.config.routes)?;
        let routes = table.route_count();

        self.transport.listen().await?;

        // failure leaves the gateway degraded; the supervisor keeps reconnecting
        let _ = self.broker.connect().await;

        let (trigger, shutdown) = ShutdownSignal::channel();
        let supervisor = self.broker.spawn_supervisor(shutdown.clone());

        let opened = match open_namespaces(&self.name, &self.transport, &namespaces).await {
            Ok(opened) => opened,
            Err(err) => {
                trigger.trigger();
                supervisor.abort();
                self.transport.close().await;
                self.broker.disconnect().await;
                return Err(err.into());
            }
        };

        let services = SessionServices {
            binder: ConnectionBinder::new(self.broker.clone(), self.config.retry.clone()),
            dispatcher: RouteDispatcher::new(Arc::new(table), self.broker.clone()),
            outbound_buffer_size: self.config.outbound_buffer_size,
        };

        let acceptors = opened
            .into_iter()
            .map(|(namespace, connections)| {
                spawn_namespace_acceptor(
                    self.name.clone(),
                    namespace,
                    connections,
                    services.clone(),
                    shutdown.clone(),
                )
            })
            .collect();

        Ok(RunningGateway {
            namespaces: namespaces.len(),
            routes,
            trigger,
            acceptors,
            supervisor,
        })
    }

    /// Stops serving. Only valid while Running.
    ///
    /// Queues and bindings stay on the broker, so a later `start()` resumes
    /// delivery of everything published in between.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle
            .transition(GatewayState::Running, GatewayState::Stopping)?;
        info!(
            event = events::GATEWAY_STOP,
            component = COMPONENT,
            gateway = self.name.as_str(),
            "stopping gateway"
        );

        self.transport.close().await;

        if let Some(gateway) = self.running.lock().await.take() {
            gateway.trigger.trigger();
            if !join_with_grace(gateway.acceptors, self.config.shutdown_grace).await {
                warn!(
                    event = events::GATEWAY_SHUTDOWN_GRACE_EXPIRED,
                    component = COMPONENT,
                    gateway = self.name.as_str(),
                    grace_ms = self.config.shutdown_grace.as_millis() as u64,
                    "sessions still running after grace period; aborted"
                );
            }
            gateway.supervisor.abort();
        }

        self.broker.disconnect().await;
        self.lifecycle.force(GatewayState::Stopped);
        info!(
            event = events::GATEWAY_STOPPED,
            component = COMPONENT,
            gateway = self.name.as_str(),
            "gateway stopped"
        );
        Ok(())
    }
}
