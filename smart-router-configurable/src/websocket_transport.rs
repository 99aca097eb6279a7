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

//! WebSocket implementation of the gateway [`Transport`].
//!
//! Clients connect to `ws://host:port/<endpoint>[/<id>][?clientid=<identity>]`.
//! The `clientid` value is form-decoded; a missing or undecodable value gets a
//! generated UUID v4 identity.
//! The namespace is resolved during the HTTP handshake so unknown paths are
//! refused with `404` before the upgrade. Frames are JSON text
//! `{ "type": ..., "data": ... }` in both directions.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use smart_router::{
    ClientConnection, ClientIdentity, NamespacePath, Transport, TransportError, WireMessage,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ACCEPT_BACKLOG: usize = 64;
const DEFAULT_CLIENT_BUFFER: usize = 64;
const CLIENT_ID_PARAM: &str = "clientid";

type Acceptors = HashMap<String, mpsc::Sender<ClientConnection>>;

struct TransportState {
    namespaces: RwLock<Acceptors>,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

pub struct WebSocketTransport {
    bind_addr: SocketAddr,
    client_buffer: usize,
    state: Arc<TransportState>,
}

impl WebSocketTransport {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            state: Arc::new(TransportState {
                namespaces: RwLock::new(HashMap::new()),
                shutdown: watch::channel(false).0,
                accept_task: Mutex::new(None),
                local_addr: Mutex::new(None),
            }),
        }
    }

    /// Address actually bound, once listening. Useful with port `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .state
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn listen(&self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|err| TransportError::Listen(format!("{}: {err}", self.bind_addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| TransportError::Listen(err.to_string()))?;

        self.state.shutdown.send_replace(false);
        *self
            .state
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        let task = tokio::spawn(accept_loop(
            listener,
            self.state.clone(),
            self.client_buffer,
        ));
        let previous = self
            .state
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }

        info!("websocket transport listening on {local_addr}");
        Ok(())
    }

    async fn open_namespace(
        &self,
        namespace: &NamespacePath,
    ) -> Result<mpsc::Receiver<ClientConnection>, TransportError> {
        if self.local_addr().is_none() || *self.state.shutdown.borrow() {
            return Err(TransportError::NotListening);
        }

        let path = namespace.to_transport_path();
        let mut namespaces = self
            .state
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if namespaces.contains_key(&path) {
            return Err(TransportError::NamespaceAlreadyOpen(path));
        }

        let (sender, receiver) = mpsc::channel(ACCEPT_BACKLOG);
        namespaces.insert(path, sender);
        Ok(receiver)
    }

    async fn close(&self) {
        self.state.shutdown.send_replace(true);
        self.state
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .state
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        let task = self
            .state
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        info!("websocket transport closed");
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<TransportState>, client_buffer: usize) {
    let mut shutdown = state.shutdown.subscribe();

    loop {
        tokio::select! {
            _ = closed(&mut shutdown) => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_client(stream, peer, state.clone(), client_buffer));
                }
                Err(err) => warn!("failed to accept tcp connection: {err}"),
            }
        }
    }
}

async fn closed(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Namespace, identity and acceptor resolved from the handshake request.
struct HandshakeTarget {
    namespace: NamespacePath,
    identity: ClientIdentity,
    acceptor: mpsc::Sender<ClientConnection>,
}

fn resolve_target(namespaces: &RwLock<Acceptors>, request: &Request) -> Option<HandshakeTarget> {
    let namespace = NamespacePath::parse(request.uri().path())?;
    let acceptor = namespaces
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&namespace.to_transport_path())
        .cloned()?;
    let identity = client_id_from_query(request.uri().query())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Some(HandshakeTarget {
        namespace,
        identity: ClientIdentity::new(&identity),
        acceptor,
    })
}

fn client_id_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == CLIENT_ID_PARAM && !value.is_empty())
        .and_then(|(_, value)| decode_query_value(value))
        .filter(|value| !value.is_empty())
}

/// Decodes a form-encoded query value: `+` is a space, `%XX` a byte.
///
/// Returns `None` for truncated escapes and for bytes that are not UTF-8.
fn decode_query_value(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut input = value.bytes();

    while let Some(byte) = input.next() {
        match byte {
            b'+' => bytes.push(b' '),
            b'%' => {
                let high = hex_digit(input.next()?)?;
                let low = hex_digit(input.next()?)?;
                bytes.push((high << 4) | low);
            }
            other => bytes.push(other),
        }
    }

    String::from_utf8(bytes).ok()
}

fn hex_digit(byte: u8) -> Option<u8> {
    char::from(byte).to_digit(16).map(|digit| digit as u8)
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("no namespace at {path}")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<TransportState>,
    client_buffer: usize,
) {
    let mut target = None;
    let callback = |request: &Request, response: Response| {
        match resolve_target(&state.namespaces, request) {
            Some(resolved) => {
                target = Some(resolved);
                Ok(response)
            }
            None => {
                debug!(%peer, path = request.uri().path(), "rejecting handshake for unknown namespace");
                Err(not_found(request.uri().path()))
            }
        }
    };

    let socket = match accept_hdr_async(stream, callback).await {
        Ok(socket) => socket,
        Err(err) => {
            debug!(%peer, "websocket handshake failed: {err}");
            return;
        }
    };
    let Some(HandshakeTarget {
        namespace,
        identity,
        acceptor,
    }) = target
    else {
        return;
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<WireMessage>(client_buffer);
    let (inbound_tx, inbound_rx) = mpsc::channel::<WireMessage>(client_buffer);
    let connection = ClientConnection::new(identity.clone(), namespace.clone(), outbound_tx, inbound_rx);
    if acceptor.send(connection).await.is_err() {
        debug!(%peer, "namespace {namespace} closed before the connection was accepted");
        return;
    }
    debug!(%peer, "client {identity} connected to {namespace}");

    let (mut sink, mut frames) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    warn!("unable to encode {} event: {err}", message.message_type);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut shutdown = state.shutdown.subscribe();
    loop {
        let frame = tokio::select! {
            _ = closed(&mut shutdown) => break,
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<WireMessage>(&text) {
                Ok(message) => {
                    if inbound_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(%peer, "ignoring malformed frame from {identity}: {err}"),
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(%peer, "websocket read failed for {identity}: {err}");
                break;
            }
        }
    }

    drop(inbound_tx);
    if *state.shutdown.borrow() {
        writer.abort();
    }
    debug!(%peer, "client {identity} disconnected from {namespace}");
}

#[cfg(test)]
mod tests {
    use super::{client_id_from_query, WebSocketTransport};
    use futures::{SinkExt, StreamExt};
    use in_memory_broker::InMemoryBroker;
    use serde_json::{json, Value};
    use smart_router::{
        EchoAction, EndpointSpec, RouteSpec, RouterConfig, SmartRouter, Transport, HELLO_EVENT,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    const WAIT: Duration = Duration::from_secs(3);

    async fn started_router() -> (SmartRouter, Arc<WebSocketTransport>) {
        let transport = Arc::new(WebSocketTransport::new(
            "127.0.0.1:0".parse().expect("valid socket address"),
        ));
        let config = RouterConfig::new(
            vec![EndpointSpec::new("agent", &["456"])],
            vec![RouteSpec::new("agent", "echo", EchoAction)],
        );
        let router = SmartRouter::new(
            "websocket-test",
            config,
            transport.clone(),
            Arc::new(InMemoryBroker::new()),
        );
        router.start().await.expect("router should start");
        (router, transport)
    }

    async fn next_json<S>(frames: &mut S) -> Value
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(WAIT, frames.next())
                .await
                .expect("frame within timeout")
                .expect("stream open")
                .expect("frame readable");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).expect("frame is json");
            }
        }
    }

    #[test]
    fn client_id_is_read_from_query() {
        assert_eq!(
            client_id_from_query(Some("foo=1&clientid=agent-7")),
            Some("agent-7".to_string())
        );
        assert_eq!(client_id_from_query(Some("clientid=")), None);
        assert_eq!(client_id_from_query(None), None);
    }

    #[test]
    fn client_id_is_percent_decoded() {
        assert_eq!(
            client_id_from_query(Some("clientid=a%2Fb")),
            Some("a/b".to_string())
        );
        assert_eq!(
            client_id_from_query(Some("clientid=ui+456%C3%A9")),
            Some("ui 456é".to_string())
        );
        assert_eq!(client_id_from_query(Some("clientid=%2")), None);
        assert_eq!(client_id_from_query(Some("clientid=%ZZ")), None);
        assert_eq!(client_id_from_query(Some("clientid=%FF")), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn client_receives_hello_and_echo_over_websocket() {
        let (router, transport) = started_router().await;
        let addr = transport.local_addr().expect("transport is listening");

        let (mut socket, _) = connect_async(format!("ws://{addr}/agent/456?clientid=agent456"))
            .await
            .expect("handshake should succeed");

        let hello = next_json(&mut socket).await;
        assert_eq!(hello["type"], HELLO_EVENT);
        assert_eq!(hello["data"]["clientid"], "agent456");

        socket
            .send(Message::Text("not json".to_string()))
            .await
            .expect("send malformed frame");
        socket
            .send(Message::Text(
                json!({ "type": "echo", "data": { "text": "quack" } }).to_string(),
            ))
            .await
            .expect("send echo frame");

        let echo = next_json(&mut socket).await;
        assert_eq!(echo, json!({ "type": "echo", "data": { "text": "quack" } }));

        router.stop().await.expect("router should stop");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_namespace_is_refused_during_handshake() {
        let (router, transport) = started_router().await;
        let addr = transport.local_addr().expect("transport is listening");

        let result = connect_async(format!("ws://{addr}/ui/456")).await;

        match result {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 404);
            }
            Err(err) => panic!("expected 404 rejection, got {err}"),
            Ok(_) => panic!("handshake to an unknown namespace should fail"),
        }

        router.stop().await.expect("router should stop");
    }

    #[tokio::test]
    async fn open_namespace_requires_listener() {
        let transport =
            WebSocketTransport::new("127.0.0.1:0".parse().expect("valid socket address"));

        let result = transport
            .open_namespace(&smart_router::NamespacePath::new("agent", "456"))
            .await;

        assert_eq!(result.err(), Some(smart_router::TransportError::NotListening));
    }
}
