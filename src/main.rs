// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! RFCOMM Link console client

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rfcomm_link::bluetooth::bluez::{BluezAdapter, BluezTransportFactory};
use rfcomm_link::bluetooth::{
    probe_adapter, AdapterRecovery, ConnectionSession, DiscoveryController,
};
use rfcomm_link::commands::{Console, ConsoleCommand, Flow, HELP_TEXT};
use rfcomm_link::config::Config;
use rfcomm_link::events::EventPrinter;
use rfcomm_link::pairing::PairingManager;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting RFCOMM Link v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", Config::path().display());

    let adapter = Arc::new(BluezAdapter::open(config.bluetooth.adapter.as_deref()).await?);
    probe_adapter(adapter.as_ref()).await?;

    let recovery = match config.recovery_config() {
        Some(recovery_config) => Some(AdapterRecovery::new(adapter.clone(), recovery_config)),
        None => {
            info!("Adapter recovery after disconnect is disabled");
            None
        }
    };
    let session = ConnectionSession::new(
        Arc::new(BluezTransportFactory),
        recovery,
        config.session_config(),
    );
    tokio::spawn(EventPrinter::new(session.subscribe(), std::io::stdout()).run());

    let mut console = Console::new(
        session,
        DiscoveryController::new(Box::new(adapter.discovery_agent())),
        PairingManager::new(adapter.clone()),
        config.scan_timeout(),
        std::io::stdout(),
    );

    if let Some(address) = std::env::args().nth(1) {
        console
            .execute(ConsoleCommand::Connect {
                address,
                channel: None,
            })
            .await?;
    }

    println!("{}", HELP_TEXT);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    console.execute(ConsoleCommand::Exit).await?;
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleCommand::parse(&line) {
                    Ok(command) => {
                        if console.execute(command).await? == Flow::Exit {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            _ = console.session_mut().next_event() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                console.execute(ConsoleCommand::Exit).await?;
                break;
            }
        }
    }

    info!("Goodbye");
    Ok(())
}
