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

use async_trait::async_trait;
use serde_json::Value;
use smart_router::{
    ClientConnection, ClientIdentity, NamespacePath, Transport, TransportError, WireMessage,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

const ACCEPT_BACKLOG: usize = 64;
const DEFAULT_CLIENT_BUFFER: usize = 64;

/// [`Transport`] whose clients live in the same process as the gateway.
///
/// Clones share the same listener, so a test keeps one clone to connect actors
/// while the gateway owns another.
#[derive(Clone)]
pub struct InMemoryTransport {
    listening: Arc<AtomicBool>,
    namespaces: Arc<Mutex<HashMap<String, mpsc::Sender<ClientConnection>>>>,
    client_buffer: usize,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_client_buffer(DEFAULT_CLIENT_BUFFER)
    }

    /// Transport whose client-side receive buffers hold `client_buffer` events.
    pub fn with_client_buffer(client_buffer: usize) -> Self {
        Self {
            listening: Arc::new(AtomicBool::new(false)),
            namespaces: Arc::new(Mutex::new(HashMap::new())),
            client_buffer: client_buffer.max(1),
        }
    }

    pub async fn open_namespace_count(&self) -> usize {
        self.namespaces.lock().await.len()
    }

    /// Connects a client to `path` (`/agent/456`, `livechat`, ...) as `identity`.
    pub async fn connect(
        &self,
        path: &str,
        identity: &str,
    ) -> Result<ActorSocket, TransportError> {
        if !self.listening.load(Ordering::SeqCst) {
            return Err(TransportError::NotListening);
        }
        let namespace = NamespacePath::parse(path)
            .ok_or_else(|| TransportError::UnknownNamespace(path.to_string()))?;

        let acceptor = self
            .namespaces
            .lock()
            .await
            .get(&namespace.to_transport_path())
            .cloned()
            .ok_or_else(|| TransportError::UnknownNamespace(namespace.to_transport_path()))?;

        let (outbound_tx, outbound_rx) = mpsc::channel(self.client_buffer);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.client_buffer);
        let identity = ClientIdentity::new(identity);

        acceptor
            .send(ClientConnection::new(
                identity.clone(),
                namespace.clone(),
                outbound_tx,
                inbound_rx,
            ))
            .await
            .map_err(|_| TransportError::Closed)?;
        debug!("client {identity} connected to {namespace}");

        Ok(ActorSocket {
            identity,
            namespace,
            events: outbound_rx,
            emitter: inbound_tx,
            backlog: VecDeque::new(),
        })
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn listen(&self) -> Result<(), TransportError> {
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn open_namespace(
        &self,
        namespace: &NamespacePath,
    ) -> Result<mpsc::Receiver<ClientConnection>, TransportError> {
        if !self.listening.load(Ordering::SeqCst) {
            return Err(TransportError::NotListening);
        }

        let mut namespaces = self.namespaces.lock().await;
        let path = namespace.to_transport_path();
        if namespaces.contains_key(&path) {
            return Err(TransportError::NamespaceAlreadyOpen(path));
        }

        let (sender, receiver) = mpsc::channel(ACCEPT_BACKLOG);
        namespaces.insert(path, sender);
        Ok(receiver)
    }

    async fn close(&self) {
        self.listening.store(false, Ordering::SeqCst);
        self.namespaces.lock().await.clear();
    }
}

/// Client end of an in-memory connection.
///
/// Dropping the socket (or calling [`ActorSocket::disconnect`]) is seen by the
/// gateway as the client going away.
pub struct ActorSocket {
    identity: ClientIdentity,
    namespace: NamespacePath,
    events: mpsc::Receiver<WireMessage>,
    emitter: mpsc::Sender<WireMessage>,
    backlog: VecDeque<WireMessage>,
}

impl ActorSocket {
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    pub async fn emit(&self, message_type: &str, data: Value) -> Result<(), TransportError> {
        self.emitter
            .send(WireMessage::new(message_type, data))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Next event from the gateway, in arrival order.
    pub async fn next_event(&mut self, timeout: Duration) -> Option<WireMessage> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        tokio::time::timeout(timeout, self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Waits for the first event named `message_type`; other events stay queued.
    pub async fn wait_for(&mut self, message_type: &str, timeout: Duration) -> Option<WireMessage> {
        if let Some(position) = self
            .backlog
            .iter()
            .position(|event| event.message_type == message_type)
        {
            return self.backlog.remove(position);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .ok()
                .flatten()?;
            if event.message_type == message_type {
                return Some(event);
            }
            self.backlog.push_back(event);
        }
    }

    pub fn disconnect(self) {}
}
