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

//! BlueZ backend.
//!
//! Implements the adapter, transport and discovery seams on top of `bluer`.

use anyhow::Result;
use async_trait::async_trait;
use bluer::rfcomm::stream::{OwnedReadHalf, OwnedWriteHalf};
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Address, AddressType, AdapterEvent, ErrorKind, Session};
use futures::{pin_mut, StreamExt};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::adapter::{AdapterHandle, AdapterMode, DeviceKind, PairingState};
use super::discovery::{DiscoveredDevice, DiscoveryAgent, DiscoveryErrorKind, DiscoveryEvent};
use super::transport::{
    Transport, TransportError, TransportEvent, TransportEventSender, TransportFactory,
    TransportState,
};
use super::DeviceAddress;
use crate::error::{DiscoveryError, PlatformError};

/// Read buffer size for the RFCOMM stream.
const READ_BUFFER_SIZE: usize = 1024;

fn to_bluer(address: DeviceAddress) -> Address {
    Address::new(address.octets())
}

fn from_bluer(address: Address) -> DeviceAddress {
    DeviceAddress::new(address.0)
}

/// Errno-style code for a BlueZ error kind.
fn error_code(kind: &ErrorKind) -> i32 {
    match kind {
        ErrorKind::DoesNotExist => 2,
        ErrorKind::NotReady => 19,
        ErrorKind::NotAuthorized => 13,
        ErrorKind::InvalidArguments => 22,
        ErrorKind::InProgress => 115,
        ErrorKind::AlreadyExists => 17,
        ErrorKind::NotSupported => 95,
        _ => 5,
    }
}

fn platform_error(err: bluer::Error) -> PlatformError {
    PlatformError::new(error_code(&err.kind), err.message)
}

fn discovery_error(err: &bluer::Error) -> DiscoveryErrorKind {
    match &err.kind {
        ErrorKind::NotReady => DiscoveryErrorKind::PoweredOff,
        ErrorKind::NotAuthorized => DiscoveryErrorKind::MissingPermissions,
        ErrorKind::DoesNotExist => DiscoveryErrorKind::InvalidAdapter,
        ErrorKind::Failed | ErrorKind::InProgress => DiscoveryErrorKind::InputOutput,
        ErrorKind::NotSupported => DiscoveryErrorKind::UnsupportedDiscoveryMethod,
        kind => DiscoveryErrorKind::Unknown(error_code(kind)),
    }
}

async fn device_pairing_state(device: &bluer::Device) -> PairingState {
    match (device.is_paired().await, device.is_trusted().await) {
        (Ok(true), Ok(true)) => PairingState::AuthorizedPaired,
        (Ok(true), _) => PairingState::Paired,
        (Ok(false), _) => PairingState::Unpaired,
        (Err(e), _) => {
            debug!("Cannot read pairing state of {}: {}", device.address(), e);
            PairingState::Unknown
        }
    }
}

async fn device_kind(device: &bluer::Device) -> DeviceKind {
    // BR/EDR class of device next to an LE address means both radios
    let has_class = matches!(device.class().await, Ok(Some(_)));
    match device.address_type().await {
        Ok(AddressType::BrEdr) => DeviceKind::Classic,
        Ok(AddressType::LePublic) | Ok(AddressType::LeRandom) if has_class => DeviceKind::Dual,
        Ok(AddressType::LePublic) | Ok(AddressType::LeRandom) => DeviceKind::LowEnergy,
        _ => DeviceKind::Unknown,
    }
}

async fn describe_device(adapter: &bluer::Adapter, addr: Address) -> DiscoveredDevice {
    let address = from_bluer(addr);
    let device = match adapter.device(addr) {
        Ok(device) => device,
        Err(e) => {
            debug!("No device object for {}: {}", addr, e);
            return DiscoveredDevice::new(address, None);
        }
    };

    let name = device.name().await.ok().flatten();
    DiscoveredDevice::new(address, name)
        .with_pairing_state(device_pairing_state(&device).await)
        .with_kind(device_kind(&device).await)
}

/// Host adapter reached through BlueZ.
pub struct BluezAdapter {
    _session: Session,
    adapter: bluer::Adapter,
}

impl BluezAdapter {
    /// Open the named adapter, or the system default.
    pub async fn open(name: Option<&str>) -> Result<Self> {
        let session = Session::new().await?;
        debug!("BlueZ session created");

        let adapter = match name {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self {
            _session: session,
            adapter,
        })
    }

    pub fn discovery_agent(&self) -> BluezDiscoveryAgent {
        BluezDiscoveryAgent::new(self.adapter.clone())
    }
}

#[async_trait]
impl AdapterHandle for BluezAdapter {
    async fn is_valid(&self) -> bool {
        self.adapter.is_powered().await.is_ok()
    }

    async fn mode(&self) -> Result<AdapterMode, PlatformError> {
        if !self.adapter.is_powered().await.map_err(platform_error)? {
            return Ok(AdapterMode::PoweredOff);
        }
        if self.adapter.is_discoverable().await.map_err(platform_error)? {
            Ok(AdapterMode::Discoverable)
        } else {
            Ok(AdapterMode::Connectable)
        }
    }

    async fn set_mode(&self, mode: AdapterMode) -> Result<(), PlatformError> {
        debug!("Setting adapter {} {}", self.adapter.name(), mode);
        match mode {
            AdapterMode::PoweredOff => self.adapter.set_powered(false).await,
            AdapterMode::Connectable => {
                self.adapter.set_powered(true).await.map_err(platform_error)?;
                self.adapter.set_discoverable(false).await
            }
            AdapterMode::Discoverable => {
                self.adapter.set_powered(true).await.map_err(platform_error)?;
                self.adapter.set_discoverable(true).await
            }
        }
        .map_err(platform_error)
    }

    async fn local_address(&self) -> Result<DeviceAddress, PlatformError> {
        let address = self.adapter.address().await.map_err(platform_error)?;
        Ok(from_bluer(address))
    }

    async fn local_name(&self) -> Result<String, PlatformError> {
        self.adapter.alias().await.map_err(platform_error)
    }

    async fn pairing_state(&self, address: DeviceAddress) -> PairingState {
        match self.adapter.device(to_bluer(address)) {
            Ok(device) => device_pairing_state(&device).await,
            Err(_) => PairingState::Unknown,
        }
    }

    async fn request_pairing(&self, address: DeviceAddress) -> Result<(), PlatformError> {
        let device = self
            .adapter
            .device(to_bluer(address))
            .map_err(platform_error)?;
        device.pair().await.map_err(platform_error)
    }

    async fn remove_paired_device(&self, native_address: [u8; 6]) -> Result<(), PlatformError> {
        let address = DeviceAddress::from_reversed_bytes(native_address);
        self.adapter
            .remove_device(to_bluer(address))
            .await
            .map_err(platform_error)
    }
}

struct Shared {
    state: TransportState,
    inbound: Vec<u8>,
}

type Writer = Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>;

/// RFCOMM client socket.
pub struct BluezTransport {
    shared: Arc<Mutex<Shared>>,
    writer: Writer,
    events: TransportEventSender,
    task: Option<JoinHandle<()>>,
}

impl BluezTransport {
    pub fn new(events: TransportEventSender) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: TransportState::Unconnected,
                inbound: Vec::new(),
            })),
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            events,
            task: None,
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    async fn read_loop(
        mut reader: OwnedReadHalf,
        shared: Arc<Mutex<Shared>>,
        writer: Writer,
        events: TransportEventSender,
    ) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("RFCOMM stream closed by remote");
                    writer.lock().await.take();
                    shared.lock().state = TransportState::Unconnected;
                    let _ = events.send(TransportEvent::Disconnected);
                    break;
                }
                Ok(n) => {
                    shared.lock().inbound.extend_from_slice(&buf[..n]);
                    let _ = events.send(TransportEvent::ReadyToRead);
                }
                Err(e) => {
                    warn!("RFCOMM read error: {}", e);
                    writer.lock().await.take();
                    shared.lock().state = TransportState::Unconnected;
                    let _ = events.send(TransportEvent::Error(TransportError::from_io(&e)));
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for BluezTransport {
    fn connect(&mut self, address: DeviceAddress, channel: u8) {
        self.abort_task();
        self.shared.lock().state = TransportState::Connecting;

        let shared = self.shared.clone();
        let writer = self.writer.clone();
        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            let target = SocketAddr::new(to_bluer(address), channel);
            match Stream::connect(target).await {
                Ok(stream) => {
                    let (reader, write_half) = stream.into_split();
                    *writer.lock().await = Some(write_half);
                    shared.lock().state = TransportState::Connected;
                    let _ = events.send(TransportEvent::Connected);
                    Self::read_loop(reader, shared, writer, events).await;
                }
                Err(e) => {
                    error!("RFCOMM connect to {} failed: {}", address, e);
                    shared.lock().state = TransportState::Unconnected;
                    let _ = events.send(TransportEvent::Error(TransportError::from_io(&e)));
                }
            }
        }));
    }

    fn disconnect(&mut self) {
        self.shared.lock().state = TransportState::Closing;
        self.abort_task();

        let shared = self.shared.clone();
        let writer = self.writer.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(mut write_half) = writer.lock().await.take() {
                if let Err(e) = write_half.shutdown().await {
                    debug!("RFCOMM shutdown: {}", e);
                }
            }
            shared.lock().state = TransportState::Unconnected;
            let _ = events.send(TransportEvent::Disconnected);
        });
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket not connected"))?;
        let written = stream.write(data).await?;
        stream.flush().await?;
        Ok(written)
    }

    fn read_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.shared.lock().inbound)
    }

    fn state(&self) -> TransportState {
        self.shared.lock().state
    }
}

impl Drop for BluezTransport {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Creates [`BluezTransport`]s.
pub struct BluezTransportFactory;

impl TransportFactory for BluezTransportFactory {
    fn create(&self, events: TransportEventSender) -> Box<dyn Transport> {
        Box::new(BluezTransport::new(events))
    }
}

/// Device discovery through the BlueZ discovery session.
///
/// BlueZ keeps discovering until the session is dropped, so a scan never
/// finishes on its own and always ends at the caller's timeout.
pub struct BluezDiscoveryAgent {
    adapter: bluer::Adapter,
    task: Option<JoinHandle<()>>,
}

impl BluezDiscoveryAgent {
    pub fn new(adapter: bluer::Adapter) -> Self {
        Self {
            adapter,
            task: None,
        }
    }
}

#[async_trait]
impl DiscoveryAgent for BluezDiscoveryAgent {
    async fn start(
        &mut self,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError> {
        self.stop().await;

        let stream = self.adapter.discover_devices().await.map_err(|e| {
            error!("Failed to start discovery: {}", e);
            DiscoveryError::from(discovery_error(&e))
        })?;

        let adapter = self.adapter.clone();
        self.task = Some(tokio::spawn(async move {
            pin_mut!(stream);
            while let Some(event) = stream.next().await {
                if let AdapterEvent::DeviceAdded(addr) = event {
                    let device = describe_device(&adapter, addr).await;
                    if events.send(DiscoveryEvent::DeviceDiscovered(device)).is_err() {
                        return;
                    }
                }
            }
            let _ = events.send(DiscoveryEvent::Finished);
        }));
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Discovery stopped");
        }
    }
}

impl Drop for BluezDiscoveryAgent {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bluer_error(kind: ErrorKind) -> bluer::Error {
        bluer::Error {
            kind,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_platform_error_codes() {
        let err = platform_error(bluer_error(ErrorKind::DoesNotExist));
        assert_eq!(err.code, 2);
        assert_eq!(err.message, "boom");
        assert_eq!(platform_error(bluer_error(ErrorKind::NotReady)).code, 19);
        assert_eq!(platform_error(bluer_error(ErrorKind::Failed)).code, 5);
    }

    #[test]
    fn test_discovery_error_kinds() {
        assert_eq!(
            discovery_error(&bluer_error(ErrorKind::NotReady)),
            DiscoveryErrorKind::PoweredOff
        );
        assert_eq!(
            discovery_error(&bluer_error(ErrorKind::NotAuthorized)),
            DiscoveryErrorKind::MissingPermissions
        );
        assert_eq!(
            discovery_error(&bluer_error(ErrorKind::Failed)),
            DiscoveryErrorKind::InputOutput
        );
    }

    #[tokio::test]
    async fn test_unconnected_transport_has_no_writer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = BluezTransport::new(tx);

        let err = transport.write(&[0x01]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        transport.disconnect();
        assert!(matches!(rx.recv().await, Some(TransportEvent::Disconnected)));
        assert_eq!(transport.state(), TransportState::Unconnected);
    }

    #[test]
    fn test_address_conversion_keeps_octet_order() {
        let address = DeviceAddress::parse("00:1A:7D:DA:71:13").unwrap();
        let converted = to_bluer(address);
        assert_eq!(converted.to_string(), "00:1A:7D:DA:71:13");
        assert_eq!(from_bluer(converted), address);
    }
}
