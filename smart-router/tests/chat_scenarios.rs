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

mod support;

use integration_test_utils::{Agent, LiveChat, RawActor, Ui, AGENT_REPLY, LIVECHAT_TRIGGER};
use std::time::Duration;
use support::{chat_config, Harness, WAIT};

#[tokio::test(flavor = "multi_thread")]
async fn raw_actor_gets_its_echo_back() {
    integration_test_utils::init_logging();
    let harness = Harness::started(chat_config()).await;

    let mut actor = RawActor::connect(&harness.transport, "agent/456", "rawActor")
        .await
        .expect("raw actor connects");
    actor.wait_for("hello", WAIT).await.expect("handshake");
    actor.echo().await.expect("emit echo");

    let echo = actor.wait_for("echo", WAIT).await.expect("echo received");
    assert_eq!(echo.data["payload"], "quack!!");
    assert_eq!(echo.data["from"], "agent/456/rawActor");

    harness.router.stop().await.expect("stop");
}

#[tokio::test(flavor = "multi_thread")]
async fn ui_talks_to_agent_which_replies() {
    integration_test_utils::init_logging();
    let harness = Harness::started(chat_config()).await;

    let mut agent = Agent::connect(&harness.transport, "agent/456", "agent456")
        .await
        .expect("agent connects");
    let mut ui = Ui::connect(&harness.transport, "ui/456", "ui456")
        .await
        .expect("ui connects");
    let responder = tokio::spawn(async move { agent.respond_once(WAIT).await });

    ui.wait_for("hello", WAIT).await.expect("handshake");
    ui.talk("Hey is there someone?").await.expect("talk");

    let talk = responder
        .await
        .expect("responder task")
        .expect("agent received talk");
    assert_eq!(talk.data["payload"]["text"], "Hey is there someone?");
    assert_eq!(talk.data["ids"]["ui"], "ui456");

    let talkback = ui.wait_for("talkback", WAIT).await.expect("agent reply");
    assert_eq!(talkback.data["payload"]["text"], AGENT_REPLY);

    harness.router.stop().await.expect("stop");
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_talks_to_ui_connected_earlier() {
    integration_test_utils::init_logging();
    let harness = Harness::started(chat_config()).await;

    let mut ui = Ui::connect(&harness.transport, "ui/456", "ui456")
        .await
        .expect("ui connects");
    ui.wait_for("hello", WAIT).await.expect("handshake");

    let mut agent = Agent::connect(&harness.transport, "agent/456", "agent456")
        .await
        .expect("agent connects");
    agent.wait_for("hello", WAIT).await.expect("handshake");
    agent
        .talk("ui456", "Hello, I am your agent")
        .await
        .expect("talkback");

    let talkback = ui.wait_for("talkback", WAIT).await.expect("agent message");
    assert_eq!(talkback.data["payload"]["text"], "Hello, I am your agent");

    harness.router.stop().await.expect("stop");
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_requests_livechat_session() {
    integration_test_utils::init_logging();
    let harness = Harness::started(chat_config()).await;

    let mut agent = Agent::connect(&harness.transport, "agent/456", "agent456")
        .await
        .expect("agent connects");
    let mut livechat = LiveChat::connect(&harness.transport, "livechat/456", "livechat456")
        .await
        .expect("livechat connects");
    let mut ui = Ui::connect(&harness.transport, "ui/456", "ui456")
        .await
        .expect("ui connects");
    let responder = tokio::spawn(async move { agent.respond_once(WAIT).await });

    ui.wait_for("hello", WAIT).await.expect("handshake");
    ui.talk(LIVECHAT_TRIGGER).await.expect("talk");

    let request = livechat
        .wait_for("sessionrequest", WAIT)
        .await
        .expect("session request");
    assert_eq!(request.data["ids"]["ui"], "ui456");
    assert_eq!(request.data["ids"]["agent"], "agent456");
    responder.await.expect("responder task");

    harness.router.stop().await.expect("stop");
}

#[tokio::test(flavor = "multi_thread")]
async fn livechat_talks_to_ui() {
    integration_test_utils::init_logging();
    let harness = Harness::started(chat_config()).await;

    let mut ui = Ui::connect(&harness.transport, "ui/456", "ui456")
        .await
        .expect("ui connects");
    ui.wait_for("hello", WAIT).await.expect("handshake");

    let mut livechat = LiveChat::connect(&harness.transport, "livechat/456", "livechat456")
        .await
        .expect("livechat connects");
    livechat.wait_for("hello", WAIT).await.expect("handshake");
    livechat
        .talk("ui456", "Hello, how can I help you?")
        .await
        .expect("talkback");

    let talkback = ui.wait_for("talkback", WAIT).await.expect("livechat message");
    assert_eq!(talkback.data["payload"]["text"], "Hello, how can I help you?");

    harness.router.stop().await.expect("stop");
}

#[tokio::test(flavor = "multi_thread")]
async fn message_waits_in_queue_until_agent_connects() {
    integration_test_utils::init_logging();
    let harness = Harness::started(chat_config()).await;

    let mut ui = Ui::connect(&harness.transport, "ui/456", "ui456")
        .await
        .expect("ui connects");
    ui.wait_for("hello", WAIT).await.expect("handshake");
    ui.talk("This message will not be delivered immediately")
        .await
        .expect("talk");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut agent = Agent::connect(&harness.transport, "agent/456", "agent456")
        .await
        .expect("agent connects");
    let talk = agent.wait_for("talk", WAIT).await.expect("kept message");

    assert_eq!(
        talk.data["payload"]["text"],
        "This message will not be delivered immediately"
    );
    assert_eq!(talk.data["ids"]["ui"], "ui456");

    harness.router.stop().await.expect("stop");
}
