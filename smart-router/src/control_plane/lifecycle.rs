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

//! Gateway state machine and lifecycle errors.

use crate::control_plane::configuration::ConfigurationError;
use crate::transport::TransportError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::watch;

/// Observable gateway state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GatewayState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl Display for GatewayState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayState::Stopped => write!(f, "stopped"),
            GatewayState::Starting => write!(f, "starting"),
            GatewayState::Running => write!(f, "running"),
            GatewayState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Failures for `start()` and `stop()`.
#[derive(Debug)]
pub enum LifecycleError {
    InvalidTransition {
        from: GatewayState,
        to: GatewayState,
    },
    Configuration(ConfigurationError),
    Transport(TransportError),
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::InvalidTransition { from, to } => {
                write!(f, "cannot move from {from} to {to}")
            }
            LifecycleError::Configuration(err) => write!(f, "invalid configuration: {err}"),
            LifecycleError::Transport(err) => write!(f, "transport failure: {err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LifecycleError::Configuration(err) => Some(err),
            LifecycleError::Transport(err) => Some(err),
            LifecycleError::InvalidTransition { .. } => None,
        }
    }
}

impl From<ConfigurationError> for LifecycleError {
    fn from(err: ConfigurationError) -> Self {
        LifecycleError::Configuration(err)
    }
}

impl From<TransportError> for LifecycleError {
    fn from(err: TransportError) -> Self {
        LifecycleError::Transport(err)
    }
}

/// Owner of the state watch channel.
pub(crate) struct Lifecycle {
    state: watch::Sender<GatewayState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::channel(GatewayState::Stopped).0,
        }
    }

    pub(crate) fn current(&self) -> GatewayState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<GatewayState> {
        self.state.subscribe()
    }

    /// Atomically moves `from -> to`; fails if the current state is not `from`.
    pub(crate) fn transition(
        &self,
        from: GatewayState,
        to: GatewayState,
    ) -> Result<(), LifecycleError> {
        let mut observed = from;
        let moved = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });

        if moved {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition { from: observed, to })
        }
    }

    /// Sets the state unconditionally; used to roll a failed start back.
    pub(crate) fn force(&self, state: GatewayState) {
        self.state.send_replace(state);
    }
}
