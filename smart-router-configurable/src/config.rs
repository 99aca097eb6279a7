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

use serde::{Deserialize, Serialize};
use smart_router::{
    EchoAction, EndpointSpec, ForwardAction, RetryPolicy, RouteSpec, RouterConfig,
};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub(crate) port: u16,
    #[serde(default)]
    pub(crate) broker: BrokerConfig,
    #[serde(default)]
    pub(crate) router: RouterSettings,
    pub(crate) endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub(crate) routes: Vec<RouteConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct BrokerConfig {
    pub(crate) kind: BrokerKind,
    pub(crate) redelivery_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::InMemory,
            redelivery_delay_ms: 50,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    #[default]
    InMemory,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct RouterSettings {
    pub(crate) outbound_buffer_size: usize,
    pub(crate) shutdown_grace_ms: u64,
    pub(crate) initial_backoff_ms: u64,
    pub(crate) max_backoff_ms: u64,
    pub(crate) publish_attempts: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            outbound_buffer_size: 256,
            shutdown_grace_ms: 2000,
            initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            max_backoff_ms: retry.max_backoff.as_millis() as u64,
            publish_attempts: retry.publish_attempts,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) ids: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub(crate) name: String,
    pub(crate) message: String,
    pub(crate) action: ActionConfig,
}

/// `"echo"` or `{ forward: { endpoint, id?, rename? } }`.
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActionConfig {
    Echo,
    Forward(ForwardConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ForwardConfig {
    pub(crate) endpoint: String,
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) rename: Option<String>,
}

impl Config {
    pub fn redelivery_delay(&self) -> Duration {
        Duration::from_millis(self.broker.redelivery_delay_ms)
    }

    /// Builds the library configuration; validation happens when the router starts.
    pub fn router_config(&self) -> RouterConfig {
        let endpoints = self
            .endpoints
            .iter()
            .map(|endpoint| EndpointSpec {
                name: endpoint.name.clone(),
                ids: endpoint.ids.clone(),
            })
            .collect();

        let routes = self.routes.iter().map(RouteConfig::to_route_spec).collect();

        RouterConfig::new(endpoints, routes)
            .with_outbound_buffer_size(self.router.outbound_buffer_size)
            .with_shutdown_grace(Duration::from_millis(self.router.shutdown_grace_ms))
            .with_retry(RetryPolicy {
                initial_backoff: Duration::from_millis(self.router.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.router.max_backoff_ms),
                publish_attempts: self.router.publish_attempts,
            })
    }
}

impl RouteConfig {
    fn to_route_spec(&self) -> RouteSpec {
        match &self.action {
            ActionConfig::Echo => RouteSpec::new(&self.name, &self.message, EchoAction),
            ActionConfig::Forward(forward) => {
                let mut action = ForwardAction::to(&forward.endpoint);
                if let Some(id) = &forward.id {
                    action = action.with_id(id);
                }
                if let Some(rename) = &forward.rename {
                    action = action.renamed(rename);
                }
                RouteSpec::new(&self.name, &self.message, action)
            }
        }
    }
}
