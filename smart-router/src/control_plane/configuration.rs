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

//! Startup validation failures for endpoint and route declarations.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Malformed router configuration, reported by `start()` before Running.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigurationError {
    EmptyEndpointName,
    InvalidEndpointName(String),
    EmptyInstanceId {
        endpoint: String,
    },
    DuplicateInstanceId {
        endpoint: String,
        id: String,
    },
    DuplicateEndpoint(String),
    EmptyRouteMessage {
        endpoint: String,
    },
    DuplicateRoute {
        endpoint: String,
        message_type: String,
    },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::EmptyEndpointName => write!(f, "endpoint name must not be empty"),
            ConfigurationError::InvalidEndpointName(name) => {
                write!(f, "endpoint name must not contain '/': {name}")
            }
            ConfigurationError::EmptyInstanceId { endpoint } => {
                write!(f, "endpoint {endpoint} declares an empty instance id")
            }
            ConfigurationError::DuplicateInstanceId { endpoint, id } => {
                write!(f, "endpoint {endpoint} declares instance id {id} twice")
            }
            ConfigurationError::DuplicateEndpoint(name) => {
                write!(f, "endpoint {name} is declared twice")
            }
            ConfigurationError::EmptyRouteMessage { endpoint } => {
                write!(f, "route on endpoint {endpoint} has an empty message type")
            }
            ConfigurationError::DuplicateRoute {
                endpoint,
                message_type,
            } => write!(
                f,
                "route for message {message_type} on endpoint {endpoint} is declared twice"
            ),
        }
    }
}

impl Error for ConfigurationError {}
