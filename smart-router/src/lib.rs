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

//! # smart-router
//!
//! `smart-router` is a routing gateway between streaming clients and a durable
//! publish/subscribe broker.
//!
//! Clients connect to a namespace `/<endpoint>/<id>` (or `/<endpoint>`). Every
//! connection gets a broker queue keyed by its [`ClientIdentity`], bound to the
//! routing key `<endpoint><id>`, so messages published while the client is away
//! wait on the broker and are delivered once it reconnects. Messages emitted by
//! clients are dispatched to the [`RouteSpec`]s declared for their endpoint.
//!
//! Typical usage is API-first and centered on [`SmartRouter`] and [`RouterConfig`];
//! the transport and the broker are plugged in through the [`Transport`] and
//! [`MessageBroker`] traits.
//!
//! ```
//! use smart_router::{EchoAction, EndpointSpec, ForwardAction, RouteSpec, RouterConfig};
//!
//! let config = RouterConfig::new(
//!     vec![
//!         EndpointSpec::new("agent", &["456"]),
//!         EndpointSpec::new("ui", &["456"]),
//!         EndpointSpec::new("livechat", &[]),
//!     ],
//!     vec![
//!         RouteSpec::new("ui", "talk", ForwardAction::to("agent")),
//!         RouteSpec::new("agent", "talkback", ForwardAction::to("ui")),
//!         RouteSpec::new("agent", "sessionrequest", ForwardAction::to("livechat").with_id("")),
//!         RouteSpec::new("agent", "echo", EchoAction),
//!     ],
//! );
//! assert_eq!(config.outbound_buffer_size, 256);
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: `SmartRouter`, `RouterConfig`, endpoint and route declarations
//! - Control plane: configuration validation, namespace planning, dispatch table, state machine
//! - Routing: client identity and routing-key derivation
//! - Data plane: namespace acceptors, connection sessions, queue binding, outbound buffers
//! - Runtime: retry backoff and bounded shutdown
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

mod broker;
pub use broker::{
    BrokerError, BrokerMessage, BrokerStatus, DeliveryListener, DeliveryOutcome, MessageBroker,
    QueueHandle, SubscriptionHandle,
};

mod broker_bridge;
pub use broker_bridge::BrokerBridge;

mod control_plane;
pub use control_plane::configuration::ConfigurationError;
pub use control_plane::lifecycle::{GatewayState, LifecycleError};

mod data_plane;
pub use data_plane::outbound_worker::{EmitError, OutboundSender};

mod endpoint;
pub use endpoint::{EndpointSpec, NamespacePath};

#[doc(hidden)]
pub mod observability;

mod route;
pub use route::{
    route_fn, EchoAction, FnAction, ForwardAction, HandlerError, RouteAction, RouteContext,
    RouteSpec, TargetId, ECHO_EVENT,
};

mod routing;
pub use routing::client_identity::ClientIdentity;
pub use routing::routing_key::RoutingKey;

mod runtime;
pub use runtime::retry::RetryPolicy;

mod smart_router;
pub use smart_router::{RouterConfig, SmartRouter};

mod transport;
pub use transport::{ClientConnection, Transport, TransportError, WireMessage};

/// Event sent to every client right after its connection is accepted.
pub const HELLO_EVENT: &str = "hello";
