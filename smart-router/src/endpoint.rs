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

use crate::routing::routing_key::RoutingKey;
use std::fmt::{Display, Formatter};

///
/// [`EndpointSpec`] declares a role class of client (`agent`, `ui`, `livechat`, ...)
/// together with the instance ids it is partitioned into.
///
/// An endpoint without ids is served by a single namespace named after the endpoint,
/// otherwise one namespace is opened per id.
///
/// # Examples
///
/// ```
/// use smart_router::EndpointSpec;
///
/// let agent = EndpointSpec::new("agent", &["456", "789"]);
/// let paths: Vec<String> = agent.namespaces().iter().map(|ns| ns.to_string()).collect();
/// assert_eq!(paths, vec!["agent/456", "agent/789"]);
///
/// let livechat = EndpointSpec::new("livechat", &[]);
/// assert_eq!(livechat.namespaces()[0].to_string(), "livechat");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointSpec {
    pub name: String,
    pub ids: Vec<String>,
}

impl EndpointSpec {
    pub fn new(name: &str, ids: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    /// Expands the endpoint into its namespaces, in declaration order.
    pub fn namespaces(&self) -> Vec<NamespacePath> {
        if self.ids.is_empty() {
            return vec![NamespacePath::new(&self.name, "")];
        }

        self.ids
            .iter()
            .map(|id| NamespacePath::new(&self.name, id))
            .collect()
    }
}

/// Addressable channel identifier for one (endpoint, id) pair.
///
/// The id is empty when the endpoint declares no instance partition.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NamespacePath {
    endpoint: String,
    id: String,
}

impl NamespacePath {
    pub fn new(endpoint: &str, id: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            id: id.to_string(),
        }
    }

    /// Parses a transport path such as `/agent/456` or `agent`.
    ///
    /// Returns `None` for empty paths and paths with more than two segments.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        let mut segments = trimmed.splitn(2, '/');
        let endpoint = segments.next()?;
        let id = segments.next().unwrap_or("");
        if endpoint.is_empty() || id.contains('/') {
            return None;
        }

        Some(Self::new(endpoint, id))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::for_namespace(self)
    }

    /// Path form used by transports, with a leading slash.
    pub fn to_transport_path(&self) -> String {
        format!("/{self}")
    }
}

impl Display for NamespacePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.endpoint)
        } else {
            write!(f, "{}/{}", self.endpoint, self.id)
        }
    }
}
