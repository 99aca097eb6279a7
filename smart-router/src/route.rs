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

use crate::broker::BrokerError;
use crate::broker_bridge::BrokerBridge;
use crate::data_plane::outbound_worker::{EmitError, OutboundSender};
use crate::endpoint::NamespacePath;
use crate::routing::client_identity::ClientIdentity;
use crate::routing::routing_key::RoutingKey;
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::sync::Arc;

/// Event name used by [`EchoAction`] replies.
pub const ECHO_EVENT: &str = "echo";

///
/// [`RouteSpec`] binds a client-emitted message type on one endpoint to a [`RouteAction`].
///
/// Routes are declared once and compiled into a dispatch table when the router starts.
///
/// # Examples
///
/// ```
/// use smart_router::{EchoAction, ForwardAction, RouteSpec};
///
/// let talk = RouteSpec::new("ui", "talk", ForwardAction::to("agent"));
/// let echo = RouteSpec::new("agent", "echo", EchoAction);
///
/// assert_eq!(talk.endpoint_name, "ui");
/// assert_eq!(echo.message_type, "echo");
/// ```
#[derive(Clone)]
pub struct RouteSpec {
    pub endpoint_name: String,
    pub message_type: String,
    pub action: Arc<dyn RouteAction>,
}

impl RouteSpec {
    pub fn new(
        endpoint_name: &str,
        message_type: &str,
        action: impl RouteAction + 'static,
    ) -> Self {
        Self::with_action(endpoint_name, message_type, Arc::new(action))
    }

    pub fn with_action(
        endpoint_name: &str,
        message_type: &str,
        action: Arc<dyn RouteAction>,
    ) -> Self {
        Self {
            endpoint_name: endpoint_name.to_string(),
            message_type: message_type.to_string(),
            action,
        }
    }
}

impl Debug for RouteSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("endpoint_name", &self.endpoint_name)
            .field("message_type", &self.message_type)
            .finish_non_exhaustive()
    }
}

/// Failure reported by a route handler.
#[derive(Debug)]
pub enum HandlerError {
    Broker(BrokerError),
    Reply(EmitError),
    InvalidPayload(String),
    Failed(String),
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed(reason.into())
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Broker(err) => write!(f, "publish failed: {err}"),
            HandlerError::Reply(err) => write!(f, "reply failed: {err}"),
            HandlerError::InvalidPayload(reason) => write!(f, "invalid payload: {reason}"),
            HandlerError::Failed(reason) => write!(f, "handler failed: {reason}"),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandlerError::Broker(err) => Some(err),
            HandlerError::Reply(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BrokerError> for HandlerError {
    fn from(err: BrokerError) -> Self {
        HandlerError::Broker(err)
    }
}

impl From<EmitError> for HandlerError {
    fn from(err: EmitError) -> Self {
        HandlerError::Reply(err)
    }
}

/// Everything a handler knows about the message it is handling.
#[derive(Clone)]
pub struct RouteContext {
    namespace: NamespacePath,
    client: ClientIdentity,
    message_type: String,
    broker: BrokerBridge,
    reply: OutboundSender,
}

impl RouteContext {
    pub(crate) fn new(
        namespace: NamespacePath,
        client: ClientIdentity,
        message_type: &str,
        broker: BrokerBridge,
        reply: OutboundSender,
    ) -> Self {
        Self {
            namespace,
            client,
            message_type: message_type.to_string(),
            broker,
            reply,
        }
    }

    /// Namespace the message arrived on.
    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    pub fn client(&self) -> &ClientIdentity {
        &self.client
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn broker(&self) -> &BrokerBridge {
        &self.broker
    }

    /// Publishes to the mailbox bound to `<endpoint><id>`.
    pub async fn publish(
        &self,
        endpoint: &str,
        id: &str,
        message_type: &str,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        let routing_key = RoutingKey::for_endpoint(endpoint, id);
        self.broker
            .publish(&routing_key, message_type, payload)
            .await?;
        Ok(())
    }

    /// Sends an event straight back to the originating connection.
    pub async fn reply(&self, message_type: &str, payload: Value) -> Result<(), HandlerError> {
        self.reply.emit(message_type, payload).await?;
        Ok(())
    }
}

/// Handler invoked for a routed client message.
#[async_trait]
pub trait RouteAction: Send + Sync {
    async fn handle(&self, ctx: RouteContext, payload: Value) -> Result<(), HandlerError>;
}

/// Instance id a [`ForwardAction`] publishes to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TargetId {
    /// Reuse the id of the namespace the message arrived on.
    SameAsSource,
    Fixed(String),
}

/// Publishes the payload to another endpoint's routing key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForwardAction {
    pub endpoint: String,
    pub id: TargetId,
    pub rename: Option<String>,
}

impl ForwardAction {
    pub fn to(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            id: TargetId::SameAsSource,
            rename: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = TargetId::Fixed(id.to_string());
        self
    }

    /// Publishes under `message_type` instead of the incoming type.
    pub fn renamed(mut self, message_type: &str) -> Self {
        self.rename = Some(message_type.to_string());
        self
    }

    fn target(&self, ctx: &RouteContext) -> RoutingKey {
        match &self.id {
            TargetId::SameAsSource => RoutingKey::for_endpoint(&self.endpoint, ctx.namespace().id()),
            TargetId::Fixed(id) => RoutingKey::for_endpoint(&self.endpoint, id),
        }
    }
}

#[async_trait]
impl RouteAction for ForwardAction {
    async fn handle(&self, ctx: RouteContext, payload: Value) -> Result<(), HandlerError> {
        let message_type = self.rename.as_deref().unwrap_or(ctx.message_type());
        ctx.broker()
            .publish(&self.target(&ctx), message_type, &payload)
            .await?;
        Ok(())
    }
}

/// Replies to the sender with an `echo` event carrying the same payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoAction;

#[async_trait]
impl RouteAction for EchoAction {
    async fn handle(&self, ctx: RouteContext, payload: Value) -> Result<(), HandlerError> {
        ctx.reply(ECHO_EVENT, payload).await
    }
}

/// [`RouteAction`] backed by an async closure, see [`route_fn`].
pub struct FnAction<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> RouteAction for FnAction<F>
where
    F: Fn(RouteContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: RouteContext, payload: Value) -> Result<(), HandlerError> {
        (self.handler)(ctx, payload).await
    }
}

/// Adapts an async closure into a [`RouteAction`].
///
/// ```
/// use smart_router::{route_fn, RouteSpec};
///
/// let route = RouteSpec::new(
///     "ui",
///     "ping",
///     route_fn(|ctx, payload| async move { ctx.reply("pong", payload).await }),
/// );
/// assert_eq!(route.message_type, "ping");
/// ```
pub fn route_fn<F, Fut>(handler: F) -> FnAction<F>
where
    F: Fn(RouteContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnAction { handler }
}
