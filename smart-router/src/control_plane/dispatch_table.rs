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

//! Static per-endpoint dispatch table built once at start.

use crate::control_plane::configuration::ConfigurationError;
use crate::endpoint::EndpointSpec;
use crate::observability::events;
use crate::route::{RouteAction, RouteSpec};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

const COMPONENT: &str = "dispatch_table";

/// Immutable `endpoint -> message type -> action` lookup shared by all sessions.
#[derive(Clone, Default)]
pub(crate) struct DispatchTable {
    routes: HashMap<String, HashMap<String, Arc<dyn RouteAction>>>,
}

impl DispatchTable {
    /// Compiles route declarations.
    ///
    /// A second route for the same (endpoint, message type) is rejected. Routes
    /// naming an undeclared endpoint are kept but can never fire, so they are
    /// only reported.
    pub(crate) fn build(
        endpoints: &[EndpointSpec],
        routes: &[RouteSpec],
    ) -> Result<Self, ConfigurationError> {
        let declared: HashSet<&str> = endpoints.iter().map(|e| e.name.as_str()).collect();
        let mut table: HashMap<String, HashMap<String, Arc<dyn RouteAction>>> = HashMap::new();

        for route in routes {
            if route.message_type.is_empty() {
                return Err(ConfigurationError::EmptyRouteMessage {
                    endpoint: route.endpoint_name.clone(),
                });
            }

            if !declared.contains(route.endpoint_name.as_str()) {
                warn!(
                    event = events::ROUTE_UNKNOWN_ENDPOINT,
                    component = COMPONENT,
                    namespace = route.endpoint_name.as_str(),
                    msg_type = route.message_type.as_str(),
                    "route targets an undeclared endpoint and will never fire"
                );
            }

            let by_type = table.entry(route.endpoint_name.clone()).or_default();
            if by_type.contains_key(&route.message_type) {
                return Err(ConfigurationError::DuplicateRoute {
                    endpoint: route.endpoint_name.clone(),
                    message_type: route.message_type.clone(),
                });
            }
            by_type.insert(route.message_type.clone(), route.action.clone());
        }

        Ok(Self { routes: table })
    }

    pub(crate) fn lookup(&self, endpoint: &str, message_type: &str) -> Option<Arc<dyn RouteAction>> {
        self.routes
            .get(endpoint)
            .and_then(|by_type| by_type.get(message_type))
            .cloned()
    }

    pub(crate) fn route_count(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }
}
