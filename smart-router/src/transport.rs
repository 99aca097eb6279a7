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

//! Duplex transport boundary consumed by the gateway.

use crate::endpoint::NamespacePath;
use crate::routing::client_identity::ClientIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc;

/// Named message exchanged with a client, on the wire `{ "type": ..., "data": ... }`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}

impl WireMessage {
    pub fn new(message_type: &str, data: Value) -> Self {
        Self {
            message_type: message_type.to_string(),
            data,
        }
    }
}

/// One live client session accepted on a namespace.
///
/// The transport keeps the other ends of both channels: it drains `outbound` to
/// the client and feeds client frames into `inbound`. Dropping the inbound
/// sender signals a disconnect.
pub struct ClientConnection {
    identity: ClientIdentity,
    namespace: NamespacePath,
    outbound: mpsc::Sender<WireMessage>,
    inbound: mpsc::Receiver<WireMessage>,
}

impl ClientConnection {
    pub fn new(
        identity: ClientIdentity,
        namespace: NamespacePath,
        outbound: mpsc::Sender<WireMessage>,
        inbound: mpsc::Receiver<WireMessage>,
    ) -> Self {
        Self {
            identity,
            namespace,
            outbound,
            inbound,
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        ClientIdentity,
        NamespacePath,
        mpsc::Sender<WireMessage>,
        mpsc::Receiver<WireMessage>,
    ) {
        (self.identity, self.namespace, self.outbound, self.inbound)
    }
}

/// Transport failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    Listen(String),
    NotListening,
    NamespaceAlreadyOpen(String),
    UnknownNamespace(String),
    Closed,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Listen(reason) => write!(f, "unable to open listener: {reason}"),
            TransportError::NotListening => write!(f, "transport listener is not open"),
            TransportError::NamespaceAlreadyOpen(namespace) => {
                write!(f, "namespace already open: {namespace}")
            }
            TransportError::UnknownNamespace(path) => write!(f, "no namespace at {path}"),
            TransportError::Closed => write!(f, "transport closed"),
        }
    }
}

impl Error for TransportError {}

/// Realtime duplex transport capability.
///
/// A transport listens once, then serves any number of namespaces; each opened
/// namespace yields its accepted connections on the returned channel until the
/// transport closes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn listen(&self) -> Result<(), TransportError>;

    async fn open_namespace(
        &self,
        namespace: &NamespacePath,
    ) -> Result<mpsc::Receiver<ClientConnection>, TransportError>;

    /// Stops accepting connections and closes every namespace.
    async fn close(&self);
}
