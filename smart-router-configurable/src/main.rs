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

mod config;
mod websocket_transport;

use crate::config::{BrokerKind, Config};
use crate::websocket_transport::WebSocketTransport;
use clap::Parser;
use in_memory_broker::InMemoryBroker;
use smart_router::{MessageBroker, SmartRouter};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command()]
struct RouterArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    info!("Started smart-router-configurable");

    // Get the config file.
    let args = RouterArgs::parse();
    let mut file = File::open(&args.config)
        .map_err(|e| format!("Unable to open config file {}: {e}", args.config))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| format!("Unable to read config file: {e}"))?;

    let config: Config =
        json5::from_str(&contents).map_err(|e| format!("Unable to parse config file: {e}"))?;

    let broker: Arc<dyn MessageBroker> = match config.broker.kind {
        BrokerKind::InMemory => Arc::new(InMemoryBroker::with_redelivery_delay(
            config.redelivery_delay(),
        )),
    };
    let transport = Arc::new(WebSocketTransport::new(SocketAddr::from((
        Ipv4Addr::UNSPECIFIED,
        config.port,
    ))));

    let router = SmartRouter::new(
        "smart-router",
        config.router_config(),
        transport,
        broker,
    );
    router.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    router.stop().await?;

    Ok(())
}
