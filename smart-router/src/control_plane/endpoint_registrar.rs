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

//! Namespace planning and opening for declared endpoints.

use crate::control_plane::configuration::ConfigurationError;
use crate::endpoint::{EndpointSpec, NamespacePath};
use crate::observability::{events, fields};
use crate::transport::{ClientConnection, Transport, TransportError};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const COMPONENT: &str = "endpoint_registrar";

/// Validates the endpoint declarations and expands them into namespaces.
///
/// The result is deterministic: the same declarations always yield the same
/// paths in the same order, so a restart reopens identical namespaces.
pub(crate) fn plan_namespaces(
    endpoints: &[EndpointSpec],
) -> Result<Vec<NamespacePath>, ConfigurationError> {
    let mut names = HashSet::new();
    let mut namespaces = Vec::new();

    for endpoint in endpoints {
        if endpoint.name.is_empty() {
            return Err(ConfigurationError::EmptyEndpointName);
        }
        if endpoint.name.contains('/') {
            return Err(ConfigurationError::InvalidEndpointName(
                endpoint.name.clone(),
            ));
        }
        if !names.insert(endpoint.name.as_str()) {
            return Err(ConfigurationError::DuplicateEndpoint(endpoint.name.clone()));
        }

        let mut ids = HashSet::new();
        for id in &endpoint.ids {
            if id.is_empty() {
                return Err(ConfigurationError::EmptyInstanceId {
                    endpoint: endpoint.name.clone(),
                });
            }
            if !ids.insert(id.as_str()) {
                return Err(ConfigurationError::DuplicateInstanceId {
                    endpoint: endpoint.name.clone(),
                    id: id.clone(),
                });
            }
        }

        namespaces.extend(endpoint.namespaces());
    }

    Ok(namespaces)
}

/// Opens every planned namespace on the transport.
///
/// Stops at the first failure; the caller closes the transport, which releases
/// the namespaces already opened.
pub(crate) async fn open_namespaces(
    gateway: &str,
    transport: &Arc<dyn Transport>,
    namespaces: &[NamespacePath],
) -> Result<Vec<(NamespacePath, mpsc::Receiver<ClientConnection>)>, TransportError> {
    let mut opened = Vec::with_capacity(namespaces.len());

    for namespace in namespaces {
        match transport.open_namespace(namespace).await {
            Ok(connections) => {
                info!(
                    event = events::NAMESPACE_OPEN_OK,
                    component = COMPONENT,
                    gateway,
                    namespace = fields::format_namespace(namespace),
                    routing_key = namespace.routing_key().as_str(),
                    "namespace opened"
                );
                opened.push((namespace.clone(), connections));
            }
            Err(err) => {
                warn!(
                    event = events::NAMESPACE_OPEN_FAILED,
                    component = COMPONENT,
                    gateway,
                    namespace = fields::format_namespace(namespace),
                    err = %err,
                    "unable to open namespace"
                );
                return Err(err);
            }
        }
    }

    Ok(opened)
}
