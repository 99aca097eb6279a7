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

//! Per-connection session: acknowledgement, queue binding and inbound dispatch.

use crate::data_plane::connection_binder::ConnectionBinder;
use crate::data_plane::forwarding_listener::ForwardingListener;
use crate::data_plane::outbound_worker::spawn_outbound_worker;
use crate::data_plane::route_dispatcher::RouteDispatcher;
use crate::observability::{events, fields};
use crate::runtime::shutdown::ShutdownSignal;
use crate::transport::ClientConnection;
use crate::HELLO_EVENT;
use serde_json::json;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

const COMPONENT: &str = "session";

/// Aborts the outbound worker when the session ends, also when it is aborted.
struct WorkerGuard(JoinHandle<()>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Gateway services shared by every session.
#[derive(Clone)]
pub(crate) struct SessionServices {
    pub(crate) binder: ConnectionBinder,
    pub(crate) dispatcher: RouteDispatcher,
    pub(crate) outbound_buffer_size: usize,
}

/// Serves one connection until the client leaves or the gateway shuts down.
///
/// The queue subscription lives exactly as long as this function; the queue
/// itself is left on the broker. Route handlers started by the connection are
/// awaited before the session ends and aborted if the session is dropped.
pub(crate) async fn run_session(
    connection: ClientConnection,
    services: SessionServices,
    mut shutdown: ShutdownSignal,
) {
    let (identity, namespace, transport, mut inbound) = connection.into_parts();
    let (outbound, worker) = spawn_outbound_worker(
        namespace.clone(),
        identity.clone(),
        services.outbound_buffer_size,
        transport,
    );
    let outbound_worker = WorkerGuard(worker);

    info!(
        event = events::CONNECTION_ACCEPTED,
        component = COMPONENT,
        namespace = %namespace,
        client_id = identity.as_str(),
        "connection accepted"
    );

    let hello = json!({
        "namespace": namespace.to_string(),
        "clientid": identity.as_str(),
    });
    if let Err(err) = outbound.try_emit(HELLO_EVENT, hello) {
        warn!(
            event = events::CONNECTION_ACK_FAILED,
            component = COMPONENT,
            namespace = %namespace,
            client_id = identity.as_str(),
            err = %err,
            "unable to acknowledge connection"
        );
    }

    let listener = Arc::new(ForwardingListener::new(
        namespace.clone(),
        identity.clone(),
        outbound.clone(),
    ));
    let (cancel_binding, binding_cancelled) = ShutdownSignal::channel();
    let bind_task = {
        let binder = services.binder.clone();
        let namespace = namespace.clone();
        let identity = identity.clone();
        tokio::spawn(async move {
            binder
                .bind_with_retry(&namespace, &identity, listener, binding_cancelled)
                .await
        })
    };

    let mut handlers = JoinSet::new();
    let reason = loop {
        tokio::select! {
            message = inbound.recv() => match message {
                Some(message) => {
                    services
                        .dispatcher
                        .dispatch(&mut handlers, &namespace, &identity, &outbound, message);
                }
                None => break fields::REASON_CONNECTION_CLOSED,
            },
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
            _ = shutdown.triggered() => break fields::REASON_GATEWAY_SHUTDOWN,
        }
    };

    cancel_binding.trigger();
    if let Ok(Some(bound)) = bind_task.await {
        services.binder.release(&namespace, &identity, bound).await;
    }
    while handlers.join_next().await.is_some() {}
    drop(outbound_worker);

    info!(
        event = events::CONNECTION_CLOSED,
        component = COMPONENT,
        namespace = %namespace,
        client_id = identity.as_str(),
        reason,
        "connection closed"
    );
}
