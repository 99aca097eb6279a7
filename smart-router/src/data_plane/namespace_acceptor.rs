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

//! Acceptor task owning the sessions of one namespace.

use crate::data_plane::session::{run_session, SessionServices};
use crate::endpoint::NamespacePath;
use crate::observability::{events, fields};
use crate::runtime::shutdown::ShutdownSignal;
use crate::transport::ClientConnection;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

const COMPONENT: &str = "namespace_acceptor";

/// Spawns the accept loop for one namespace.
///
/// Sessions are owned by the acceptor's `JoinSet`; aborting the acceptor
/// aborts every session it still holds.
pub(crate) fn spawn_namespace_acceptor(
    gateway: String,
    namespace: NamespacePath,
    mut connections: mpsc::Receiver<ClientConnection>,
    services: SessionServices,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sessions = JoinSet::new();

        let reason = loop {
            tokio::select! {
                accepted = connections.recv() => match accepted {
                    Some(connection) => {
                        sessions.spawn(run_session(connection, services.clone(), shutdown.clone()));
                    }
                    None => break fields::REASON_TRANSPORT_CLOSED,
                },
                _ = shutdown.triggered() => break fields::REASON_GATEWAY_SHUTDOWN,
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(err) = finished {
                        debug!(
                            event = events::CONNECTION_CLOSED,
                            component = COMPONENT,
                            gateway = gateway.as_str(),
                            namespace = %namespace,
                            err = %err,
                            "session task ended abnormally"
                        );
                    }
                }
            }
        };

        info!(
            event = events::NAMESPACE_ACCEPTOR_CLOSED,
            component = COMPONENT,
            gateway = gateway.as_str(),
            namespace = %namespace,
            reason,
            sessions = sessions.len(),
            "namespace acceptor stopping"
        );

        while sessions.join_next().await.is_some() {}
    })
}
