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

//! Runs parsed console commands.

use anyhow::Result;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

use super::{ConsoleCommand, HELP_TEXT};
use crate::bluetooth::{ConnectionSession, DiscoveryController};
use crate::pairing::PairingManager;

/// Whether the console loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The interactive console: one session, one scanner, one pairing manager.
pub struct Console<W: Write> {
    session: ConnectionSession,
    discovery: DiscoveryController,
    pairing: PairingManager,
    scan_timeout: Duration,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(
        session: ConnectionSession,
        discovery: DiscoveryController,
        pairing: PairingManager,
        scan_timeout: Duration,
        out: W,
    ) -> Self {
        Self {
            session,
            discovery,
            pairing,
            scan_timeout,
            out,
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ConnectionSession {
        &mut self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Execute one command.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow> {
        debug!("Executing command: {:?}", command);

        match command {
            ConsoleCommand::Connect { address, channel } => {
                if let Some(current) = self.session.status().address {
                    writeln!(
                        self.out,
                        "Already connected to {}. Use 'disconnect' first.",
                        current
                    )?;
                    return Ok(Flow::Continue);
                }
                let channel = channel.unwrap_or(self.session.config().rfcomm_channel);
                let timeout = self.session.config().connect_timeout;
                match self.session.connect(&address, channel, timeout).await {
                    Ok(()) => writeln!(self.out, "Connected to {}", address)?,
                    Err(e) => writeln!(self.out, "Connect failed: {}", e)?,
                }
            }
            ConsoleCommand::Disconnect => {
                if self.session.disconnect().await {
                    writeln!(self.out, "Disconnected")?;
                } else {
                    writeln!(self.out, "Not connected")?;
                }
            }
            ConsoleCommand::Send(payload) => match self.session.send(payload.as_str()).await {
                Ok(written) => writeln!(self.out, "Sent {} bytes", written)?,
                Err(e) => writeln!(self.out, "Send failed: {}", e)?,
            },
            ConsoleCommand::Scan => {
                writeln!(self.out, "Scanning for {} s...", self.scan_timeout.as_secs())?;
                let devices = self.discovery.scan(self.scan_timeout).await;
                if devices.is_empty() {
                    writeln!(self.out, "No devices found")?;
                }
                for device in devices {
                    writeln!(
                        self.out,
                        "{}  {:<24} {:?} {:?}",
                        device.address, device.name, device.pairing_state, device.kind
                    )?;
                }
            }
            ConsoleCommand::Pair(address) => match self.pairing.pair(&address).await {
                Ok(()) => writeln!(self.out, "Paired with {}", address)?,
                Err(e) => writeln!(self.out, "{}", e)?,
            },
            ConsoleCommand::Unpair(address) => match self.pairing.unpair(&address).await {
                Ok(()) => writeln!(self.out, "Unpaired {}", address)?,
                Err(e) => writeln!(self.out, "{}", e)?,
            },
            ConsoleCommand::Status => {
                writeln!(self.out, "{}", serde_json::to_string(&self.session.status())?)?;
            }
            ConsoleCommand::Help => writeln!(self.out, "{}", HELP_TEXT)?,
            ConsoleCommand::Exit => {
                // A failed session can still hold an open socket
                self.session.disconnect().await;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }
}
