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

//! Scripted clients playing the ui, agent, livechat and raw roles.
//!
//! Every actor talks the same payload shape:
//! `{ ids: { ui, agent, ... }, payload: { text } }`.

use crate::in_memory_transport::{ActorSocket, InMemoryTransport};
use serde_json::{json, Value};
use smart_router::{TransportError, WireMessage};
use std::time::Duration;

pub const AGENT_REPLY: &str = "hello from agent";
pub const LIVECHAT_TRIGGER: &str = "livechat";

fn text_of(message: &WireMessage) -> Option<&str> {
    message.data.pointer("/payload/text").and_then(Value::as_str)
}

/// End-user client emitting `talk` towards its agent.
pub struct Ui {
    id: String,
    socket: ActorSocket,
}

impl Ui {
    pub async fn connect(
        transport: &InMemoryTransport,
        path: &str,
        id: &str,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            id: id.to_string(),
            socket: transport.connect(path, id).await?,
        })
    }

    pub async fn talk(&self, text: &str) -> Result<(), TransportError> {
        self.socket
            .emit(
                "talk",
                json!({ "ids": { "ui": self.id }, "payload": { "text": text } }),
            )
            .await
    }

    pub async fn wait_for(&mut self, message_type: &str, timeout: Duration) -> Option<WireMessage> {
        self.socket.wait_for(message_type, timeout).await
    }

    pub fn socket(&mut self) -> &mut ActorSocket {
        &mut self.socket
    }

    pub fn disconnect(self) {
        self.socket.disconnect();
    }
}

/// Agent answering every `talk` with a `talkback`.
///
/// When the ui says [`LIVECHAT_TRIGGER`] the agent also emits a
/// `sessionrequest` so the livechat picks the conversation up.
pub struct Agent {
    id: String,
    socket: ActorSocket,
}

impl Agent {
    pub async fn connect(
        transport: &InMemoryTransport,
        path: &str,
        id: &str,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            id: id.to_string(),
            socket: transport.connect(path, id).await?,
        })
    }

    /// Sends `text` back to `ui` as `talkback`.
    pub async fn talk(&self, ui: &str, text: &str) -> Result<(), TransportError> {
        self.socket
            .emit(
                "talkback",
                json!({
                    "ids": { "ui": ui, "agent": self.id },
                    "payload": { "text": text },
                }),
            )
            .await
    }

    /// Waits for one `talk` and answers it; returns the message answered.
    pub async fn respond_once(&mut self, timeout: Duration) -> Option<WireMessage> {
        let talk = self.socket.wait_for("talk", timeout).await?;
        let ui = talk
            .data
            .pointer("/ids/ui")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if text_of(&talk) == Some(LIVECHAT_TRIGGER) {
            let _ = self
                .socket
                .emit(
                    "sessionrequest",
                    json!({ "ids": { "ui": ui, "agent": self.id } }),
                )
                .await;
        }
        let _ = self.talk(&ui, AGENT_REPLY).await;

        Some(talk)
    }

    pub async fn wait_for(&mut self, message_type: &str, timeout: Duration) -> Option<WireMessage> {
        self.socket.wait_for(message_type, timeout).await
    }

    pub fn socket(&mut self) -> &mut ActorSocket {
        &mut self.socket
    }

    pub fn disconnect(self) {
        self.socket.disconnect();
    }
}

/// Human operator taking over conversations on `sessionrequest`.
pub struct LiveChat {
    socket: ActorSocket,
}

impl LiveChat {
    pub async fn connect(
        transport: &InMemoryTransport,
        path: &str,
        id: &str,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            socket: transport.connect(path, id).await?,
        })
    }

    pub async fn talk(&self, ui: &str, text: &str) -> Result<(), TransportError> {
        self.socket
            .emit(
                "talkback",
                json!({
                    "ids": { "ui": ui, "livechat": self.socket.identity().as_str() },
                    "payload": { "text": text },
                }),
            )
            .await
    }

    pub async fn wait_for(&mut self, message_type: &str, timeout: Duration) -> Option<WireMessage> {
        self.socket.wait_for(message_type, timeout).await
    }
}

/// Bare client that only knows how to ask for an echo.
pub struct RawActor {
    actor_id: String,
    socket: ActorSocket,
}

impl RawActor {
    pub async fn connect(
        transport: &InMemoryTransport,
        path: &str,
        id: &str,
    ) -> Result<Self, TransportError> {
        let socket = transport.connect(path, id).await?;
        Ok(Self {
            actor_id: format!("{}/{id}", socket.namespace()),
            socket,
        })
    }

    pub async fn echo(&self) -> Result<(), TransportError> {
        self.socket
            .emit(
                "echo",
                json!({ "from": self.actor_id, "payload": "quack!!" }),
            )
            .await
    }

    pub async fn wait_for(&mut self, message_type: &str, timeout: Duration) -> Option<WireMessage> {
        self.socket.wait_for(message_type, timeout).await
    }
}
