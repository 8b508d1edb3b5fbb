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

//! Session event printing for the console.

use std::io::{self, Write};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::bluetooth::{describe_received, ConnectionEvent};

/// Prints session events to a writer.
pub struct EventPrinter<W: Write> {
    events: broadcast::Receiver<ConnectionEvent>,
    out: W,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(events: broadcast::Receiver<ConnectionEvent>, out: W) -> Self {
        Self { events, out }
    }

    /// Print events until the session goes away. Returns the writer.
    pub async fn run(mut self) -> W {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if let Err(e) = self.print(&event) {
                        warn!("Failed to print event: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event printer fell behind, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed");
                    break;
                }
            }
        }
        self.out
    }

    /// Process a single event.
    pub fn print(&mut self, event: &ConnectionEvent) -> io::Result<()> {
        match event {
            ConnectionEvent::Connected(address) => writeln!(self.out, "[connected] {}", address),
            ConnectionEvent::Disconnected => writeln!(self.out, "[disconnected]"),
            ConnectionEvent::MessageReceived(bytes) => {
                let frame = describe_received(bytes);
                writeln!(self.out, "[received] 0x{} ({} bytes)", frame.hex, bytes.len())?;
                if let Some(ascii) = frame.ascii_preview {
                    writeln!(self.out, "           ASCII: {}", ascii)?;
                }
                Ok(())
            }
            ConnectionEvent::Error(message) => writeln!(self.out, "[error] {}", message),
        }
    }
}
