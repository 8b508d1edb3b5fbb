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

//! Connection session: the single active RFCOMM link.
//!
//! The session owns one transport at a time together with the receiving
//! end of that transport's event channel. Replacing the transport replaces
//! the channel, so a discarded transport can never resolve a later wait.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::frame::{decode_send_payload, describe_received, Payload};
use super::recovery::AdapterRecovery;
use super::transport::{
    Transport, TransportError, TransportErrorKind, TransportEvent, TransportFactory,
    TransportState,
};
use super::DeviceAddress;
use crate::error::{ConnectError, SendError};

/// Capacity of the session event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events published to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Link established.
    Connected(DeviceAddress),
    /// Link closed, locally or by the remote device.
    Disconnected,
    /// Bytes drained from the transport in one read.
    MessageReceived(Vec<u8>),
    /// Transport error while connected.
    Error(String),
}

/// State of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Disconnecting,
    Failed,
}

/// Session timing and channel settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rfcomm_channel: u8,
    pub connect_timeout: Duration,
    pub disconnect_poll_interval: Duration,
    /// Upper bound on waiting for the transport to report closed.
    pub disconnect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rfcomm_channel: 1,
            connect_timeout: Duration::from_secs(10),
            disconnect_poll_interval: Duration::from_millis(100),
            disconnect_timeout: Duration::from_secs(3),
        }
    }
}

/// Snapshot returned by [`ConnectionSession::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub address: Option<DeviceAddress>,
}

/// The live transport and everything recorded about it.
struct SessionHandle {
    transport: Box<dyn Transport>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    state: ConnectionState,
    last_error: Option<String>,
    device: Option<DeviceAddress>,
}

impl SessionHandle {
    fn open(factory: &dyn TransportFactory) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        Self {
            transport: factory.create(event_tx),
            events,
            state: ConnectionState::Unconnected,
            last_error: None,
            device: None,
        }
    }
}

enum WaitOutcome {
    Connected,
    Failed(TransportError),
    Closed,
    TimedOut,
}

/// A single bounded wait for the outcome of a connect request.
struct PendingWait {
    deadline: Instant,
}

impl PendingWait {
    fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    async fn resolve(self, events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> WaitOutcome {
        loop {
            match tokio::time::timeout_at(self.deadline, events.recv()).await {
                Err(_) => return WaitOutcome::TimedOut,
                Ok(Some(TransportEvent::Connected)) => return WaitOutcome::Connected,
                Ok(Some(TransportEvent::Error(err))) => return WaitOutcome::Failed(err),
                Ok(Some(TransportEvent::Disconnected)) => return WaitOutcome::Closed,
                Ok(Some(TransportEvent::ReadyToRead)) => {
                    debug!("Data ready before connect completed, leaving it buffered");
                }
                Ok(None) => {
                    return WaitOutcome::Failed(TransportError::new(
                        TransportErrorKind::Operation,
                        "transport event channel closed",
                    ))
                }
            }
        }
    }
}

/// Number of checks that fit in `timeout`, at least one.
fn poll_count(timeout: Duration, interval: Duration) -> u32 {
    let checks = timeout.as_millis() / interval.as_millis().max(1);
    u32::try_from(checks).unwrap_or(u32::MAX).max(1)
}

/// Owns the single active connection.
pub struct ConnectionSession {
    factory: Arc<dyn TransportFactory>,
    recovery: Option<AdapterRecovery>,
    config: SessionConfig,
    handle: SessionHandle,
    event_tx: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionSession {
    /// Create a session. Without `recovery` the adapter is never power
    /// cycled after a disconnect.
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        recovery: Option<AdapterRecovery>,
        config: SessionConfig,
    ) -> Self {
        let handle = SessionHandle::open(factory.as_ref());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            factory,
            recovery,
            config,
            handle,
            event_tx,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state
    }

    /// Message of the most recent failure. Cleared on every connect attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.handle.last_error.as_deref()
    }

    pub fn device(&self) -> Option<DeviceAddress> {
        self.handle.device
    }

    pub fn is_connected(&self) -> bool {
        self.handle.state == ConnectionState::Connected
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connected: self.is_connected(),
            address: self.handle.device,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    /// Open a link to `address` on RFCOMM `channel`.
    ///
    /// A live session is torn down first. Returns once the transport reports
    /// connected, reports an error, or `timeout` elapses.
    pub async fn connect(
        &mut self,
        address: &str,
        channel: u8,
        timeout: Duration,
    ) -> Result<(), ConnectError> {
        let address = DeviceAddress::parse(address).map_err(|e| {
            warn!("{}", e);
            ConnectError::from(e)
        })?;

        if self.handle.state == ConnectionState::Connected {
            info!("Already connected, closing current session first");
            self.disconnect().await;
        }

        if self.handle.transport.state() != TransportState::Unconnected {
            debug!(
                "Transport in state {:?}, replacing it",
                self.handle.transport.state()
            );
            self.replace_transport();
        }
        self.drain_stale_events();

        self.handle.last_error = None;
        self.handle.state = ConnectionState::Connecting;
        info!("Connecting to {} on channel {}...", address, channel);
        self.handle.transport.connect(address, channel);

        match PendingWait::new(timeout).resolve(&mut self.handle.events).await {
            WaitOutcome::Connected => {
                self.handle.state = ConnectionState::Connected;
                self.handle.device = Some(address);
                info!("Connected to {}", address);
                self.publish(ConnectionEvent::Connected(address));
                Ok(())
            }
            WaitOutcome::Failed(err) => Err(self.connect_failed(ConnectError::from(err))),
            WaitOutcome::Closed => Err(self.connect_failed(ConnectError::Refused(
                "remote host closed the connection".to_string(),
            ))),
            WaitOutcome::TimedOut => {
                // the abandoned attempt may still complete; start over clean
                self.replace_transport();
                Err(self.connect_failed(ConnectError::Timeout))
            }
        }
    }

    /// Tear down the active link, then power cycle the adapter.
    ///
    /// Returns whether a live connection was torn down.
    pub async fn disconnect(&mut self) -> bool {
        if self.handle.transport.state() != TransportState::Connected {
            info!("Not connected, nothing to disconnect");
            if self.handle.state == ConnectionState::Connected {
                self.mark_closed();
            }
            return false;
        }

        let device = self.handle.device;
        self.handle.state = ConnectionState::Disconnecting;
        match device {
            Some(addr) => info!("Disconnecting from {}...", addr),
            None => info!("Disconnecting..."),
        }
        self.handle.transport.disconnect();

        if !self.wait_for_transport_close().await {
            warn!(
                "Transport still {:?} after {:?}, continuing teardown",
                self.handle.transport.state(),
                self.config.disconnect_timeout
            );
        }

        self.handle.state = ConnectionState::Unconnected;
        self.handle.device = None;
        info!("Disconnected");
        self.publish(ConnectionEvent::Disconnected);

        match &self.recovery {
            Some(recovery) => match recovery.recover().await {
                Ok(()) => info!("Bluetooth adapter reset complete"),
                Err(e) => warn!("Adapter recovery failed: {}", e),
            },
            None => debug!("Adapter recovery disabled"),
        }

        if self.handle.transport.state() != TransportState::Unconnected {
            self.replace_transport();
        }
        true
    }

    /// Write a payload to the connected device.
    ///
    /// Text payloads are hex (optional `0x` prefix). A short or empty write
    /// is reported as the byte count, not as an error.
    pub async fn send(&mut self, payload: impl Into<Payload>) -> Result<usize, SendError> {
        if self.handle.state != ConnectionState::Connected {
            warn!("Cannot send: not connected");
            return Err(SendError::NotConnected);
        }

        let bytes = decode_send_payload(payload.into())?;
        let written = self.handle.transport.write(&bytes).await.map_err(|e| {
            error!("Write failed: {}", e);
            SendError::Io(e.to_string())
        })?;

        if written < bytes.len() {
            warn!("Short write: {} of {} bytes", written, bytes.len());
        }
        info!(
            "Sent {} bytes: 0x{}",
            written,
            hex::encode_upper(&bytes[..written])
        );
        Ok(written)
    }

    /// Wait for the next session event produced by the transport.
    ///
    /// Drives asynchronous receive; call it from the caller's event loop.
    /// Cancel safe. Pends forever if the transport has gone away.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            let Some(event) = self.handle.events.recv().await else {
                return std::future::pending().await;
            };
            if let Some(out) = self.handle_transport_event(event) {
                return out;
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) -> Option<ConnectionEvent> {
        match event {
            TransportEvent::ReadyToRead => {
                let data = self.handle.transport.read_all();
                if data.is_empty() {
                    return None;
                }
                if self.handle.state != ConnectionState::Connected {
                    debug!("Discarding {} bytes received while not connected", data.len());
                    return None;
                }

                let frame = describe_received(&data);
                info!("Received: 0x{} ({} bytes)", frame.hex, data.len());
                if let Some(ascii) = &frame.ascii_preview {
                    info!("ASCII: {}", ascii);
                }
                let event = ConnectionEvent::MessageReceived(data);
                self.publish(event.clone());
                Some(event)
            }
            TransportEvent::Disconnected if self.handle.state == ConnectionState::Connected => {
                info!("Remote device closed the connection");
                self.mark_closed();
                Some(ConnectionEvent::Disconnected)
            }
            TransportEvent::Error(err) if self.handle.state == ConnectionState::Connected => {
                error!("Connection error: {}", err);
                self.handle.state = ConnectionState::Failed;
                self.handle.last_error = Some(err.message.clone());
                if self.handle.transport.state() == TransportState::Unconnected {
                    self.handle.state = ConnectionState::Unconnected;
                    self.handle.device = None;
                }
                let event = ConnectionEvent::Error(err.message);
                self.publish(event.clone());
                Some(event)
            }
            other => {
                debug!("Ignoring transport event {:?} in state {:?}", other, self.handle.state);
                None
            }
        }
    }

    /// Record a connect failure. The session settles back to `Unconnected`;
    /// `Failed` is only held by a mid-session error.
    fn connect_failed(&mut self, err: ConnectError) -> ConnectError {
        error!("Connection failed: {}", err);
        self.handle.last_error = Some(err.to_string());
        self.handle.device = None;
        self.handle.state = ConnectionState::Unconnected;
        err
    }

    fn mark_closed(&mut self) {
        self.handle.state = ConnectionState::Unconnected;
        self.handle.device = None;
        self.publish(ConnectionEvent::Disconnected);
    }

    /// Poll until the transport reports unconnected. Returns false once the
    /// disconnect budget is spent.
    async fn wait_for_transport_close(&self) -> bool {
        let interval = self.config.disconnect_poll_interval;
        let polls = poll_count(self.config.disconnect_timeout, interval);

        for attempt in 1..=polls {
            if self.handle.transport.state() == TransportState::Unconnected {
                debug!("Transport closed after {} checks", attempt);
                return true;
            }
            if attempt < polls {
                tokio::time::sleep(interval).await;
            }
        }
        false
    }

    fn replace_transport(&mut self) {
        let last_error = self.handle.last_error.take();
        let device = self.handle.device;
        let state = self.handle.state;
        self.handle = SessionHandle::open(self.factory.as_ref());
        self.handle.last_error = last_error;
        self.handle.device = device;
        self.handle.state = state;
        debug!("Created fresh transport");
    }

    fn drain_stale_events(&mut self) {
        while let Ok(event) = self.handle.events.try_recv() {
            debug!("Dropping stale transport event {:?}", event);
        }
    }

    fn publish(&self, event: ConnectionEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
