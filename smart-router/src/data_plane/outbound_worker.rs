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

//! Per-connection outbound worker draining a bounded buffer into the transport.

use crate::endpoint::NamespacePath;
use crate::observability::{events, fields};
use crate::routing::client_identity::ClientIdentity;
use crate::transport::WireMessage;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, Level};

const COMPONENT: &str = "outbound_worker";

/// Failures when queueing an outbound message for a connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmitError {
    /// The connection buffer is full; the caller may retry later.
    Full,
    /// The connection is gone.
    Closed,
}

impl Display for EmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::Full => write!(f, "outbound buffer is full"),
            EmitError::Closed => write!(f, "connection closed"),
        }
    }
}

impl Error for EmitError {}

/// Buffered message, optionally waiting for the transport to take it.
#[derive(Debug)]
struct Outbound {
    message: WireMessage,
    handed_off: Option<oneshot::Sender<()>>,
}

/// Cloneable sender into one connection's bounded outbound buffer.
#[derive(Clone, Debug)]
pub struct OutboundSender {
    buffer: mpsc::Sender<Outbound>,
}

impl OutboundSender {
    /// Queues a message without waiting for buffer space.
    pub fn try_emit(&self, message_type: &str, data: Value) -> Result<(), EmitError> {
        self.try_push(WireMessage::new(message_type, data), None)
    }

    /// Queues a message, waiting for buffer space.
    pub async fn emit(&self, message_type: &str, data: Value) -> Result<(), EmitError> {
        let outbound = Outbound {
            message: WireMessage::new(message_type, data),
            handed_off: None,
        };
        self.buffer
            .send(outbound)
            .await
            .map_err(|_| EmitError::Closed)
    }

    /// Queues a message without waiting for buffer space.
    ///
    /// The returned receiver resolves once the transport has accepted the
    /// message and fails if the message is discarded before that.
    pub(crate) fn try_hand_off(
        &self,
        message_type: &str,
        data: Value,
    ) -> Result<oneshot::Receiver<()>, EmitError> {
        let (handed_off, receipt) = oneshot::channel();
        self.try_push(WireMessage::new(message_type, data), Some(handed_off))?;
        Ok(receipt)
    }

    fn try_push(
        &self,
        message: WireMessage,
        handed_off: Option<oneshot::Sender<()>>,
    ) -> Result<(), EmitError> {
        self.buffer
            .try_send(Outbound {
                message,
                handed_off,
            })
            .map_err(|err| match err {
                TrySendError::Full(_) => EmitError::Full,
                TrySendError::Closed(_) => EmitError::Closed,
            })
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }
}

/// Spawns the worker that moves buffered messages onto the transport sender.
///
/// The worker stops when every [`OutboundSender`] is dropped or when the
/// transport side of the connection goes away; later emits fail with
/// [`EmitError::Closed`]. Messages still buffered at that point are dropped
/// together with their hand-off receipts.
pub(crate) fn spawn_outbound_worker(
    namespace: NamespacePath,
    identity: ClientIdentity,
    buffer_size: usize,
    transport: mpsc::Sender<WireMessage>,
) -> (OutboundSender, JoinHandle<()>) {
    let (buffer, receiver) = mpsc::channel(buffer_size.max(1));
    let handle = tokio::spawn(outbound_loop(namespace, identity, receiver, transport));

    (OutboundSender { buffer }, handle)
}

async fn outbound_loop(
    namespace: NamespacePath,
    identity: ClientIdentity,
    mut receiver: mpsc::Receiver<Outbound>,
    transport: mpsc::Sender<WireMessage>,
) {
    while let Some(Outbound {
        message,
        handed_off,
    }) = receiver.recv().await
    {
        let message_type = message.message_type.clone();
        if transport.send(message).await.is_ok() {
            if let Some(handed_off) = handed_off {
                let _ = handed_off.send(());
            }
        } else {
            debug!(
                event = events::OUTBOUND_SEND_FAILED,
                component = COMPONENT,
                namespace = %namespace,
                client_id = identity.as_str(),
                msg_type = message_type.as_str(),
                reason = fields::REASON_CONNECTION_CLOSED,
                "transport rejected outbound message; stopping worker"
            );
            receiver.close();
            return;
        }
    }

    if tracing::enabled!(Level::DEBUG) {
        debug!(
            event = events::OUTBOUND_CLOSED,
            component = COMPONENT,
            namespace = %namespace,
            client_id = identity.as_str(),
            "outbound buffer closed; stopping worker"
        );
    }
}
