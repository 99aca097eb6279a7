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

#![allow(dead_code)]

use in_memory_broker::InMemoryBroker;
use integration_test_utils::InMemoryTransport;
use smart_router::{
    EchoAction, EndpointSpec, ForwardAction, RetryPolicy, RouteSpec, RouterConfig, SmartRouter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const WAIT: Duration = Duration::from_secs(3);
const POLL: Duration = Duration::from_millis(10);

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
        publish_attempts: 5,
    }
}

pub fn endpoints() -> Vec<EndpointSpec> {
    vec![
        EndpointSpec::new("agent", &["456", "789"]),
        EndpointSpec::new("ui", &["456", "789"]),
        EndpointSpec::new("livechat", &["456"]),
    ]
}

/// Routes used by the chat scenarios: ui talks to its agent, the agent and the
/// livechat talk back to the ui, the agent can hand over to the livechat.
pub fn chat_routes() -> Vec<RouteSpec> {
    vec![
        RouteSpec::new("ui", "talk", ForwardAction::to("agent")),
        RouteSpec::new("agent", "talkback", ForwardAction::to("ui")),
        RouteSpec::new("agent", "sessionrequest", ForwardAction::to("livechat")),
        RouteSpec::new("livechat", "talkback", ForwardAction::to("ui")),
        RouteSpec::new("agent", "echo", EchoAction),
    ]
}

pub fn chat_config() -> RouterConfig {
    RouterConfig::new(endpoints(), chat_routes())
        .with_retry(fast_retry())
        .with_shutdown_grace(Duration::from_millis(500))
}

/// A gateway wired to a shared in-memory transport and broker.
pub struct Harness {
    pub router: SmartRouter,
    pub transport: InMemoryTransport,
    pub broker: InMemoryBroker,
}

impl Harness {
    pub fn new(config: RouterConfig) -> Self {
        Self::with_broker(config, InMemoryBroker::with_redelivery_delay(Duration::from_millis(10)))
    }

    pub fn with_broker(config: RouterConfig, broker: InMemoryBroker) -> Self {
        Self::with_parts(config, InMemoryTransport::new(), broker)
    }

    pub fn with_parts(
        config: RouterConfig,
        transport: InMemoryTransport,
        broker: InMemoryBroker,
    ) -> Self {
        let router = SmartRouter::new(
            "integration-gateway",
            config,
            Arc::new(transport.clone()),
            Arc::new(broker.clone()),
        );

        Self {
            router,
            transport,
            broker,
        }
    }

    pub async fn started(config: RouterConfig) -> Self {
        let harness = Self::new(config);
        harness
            .router
            .start()
            .await
            .expect("gateway should start");
        harness
    }

    /// Polls until `queue` has exactly `expected` consumers.
    pub async fn wait_for_consumers(&self, queue: &str, expected: usize) {
        let deadline = Instant::now() + WAIT;
        while self.broker.consumer_count(queue).await != expected {
            assert!(
                Instant::now() < deadline,
                "queue {queue} never reached {expected} consumers"
            );
            tokio::time::sleep(POLL).await;
        }
    }

    /// Polls until `queue` holds exactly `expected` messages.
    pub async fn wait_for_depth(&self, queue: &str, expected: usize) {
        let deadline = Instant::now() + WAIT;
        while self.broker.queue_depth(queue).await != expected {
            assert!(
                Instant::now() < deadline,
                "queue {queue} never reached depth {expected}"
            );
            tokio::time::sleep(POLL).await;
        }
    }
}
