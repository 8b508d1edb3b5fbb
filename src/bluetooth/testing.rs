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

//! In-memory adapter, transport and discovery doubles for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::adapter::{AdapterHandle, AdapterMode, PairingState};
use super::discovery::{DiscoveryAgent, DiscoveryErrorKind, DiscoveryEvent};
use super::transport::{
    Transport, TransportError, TransportErrorKind, TransportEvent, TransportEventSender,
    TransportFactory, TransportState,
};
use super::DeviceAddress;
use crate::error::{DiscoveryError, PlatformError};

// ---------------------------------------------------------------------------
// Adapter

#[derive(Debug)]
struct AdapterInner {
    valid: bool,
    mode: AdapterMode,
    refused: HashSet<AdapterMode>,
    mode_queries: usize,
    mode_requests: Vec<AdapterMode>,
    pairing: HashMap<DeviceAddress, PairingState>,
    pair_requests: Vec<DeviceAddress>,
    pair_failure: Option<PlatformError>,
    removed: Vec<[u8; 6]>,
    remove_failure: Option<PlatformError>,
}

/// Adapter whose mode changes apply instantly unless refused.
#[derive(Debug)]
pub struct FakeAdapter {
    inner: Mutex<AdapterInner>,
}

impl FakeAdapter {
    pub const LOCAL_ADDRESS: DeviceAddress =
        DeviceAddress::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]);

    pub fn new(mode: AdapterMode) -> Self {
        Self {
            inner: Mutex::new(AdapterInner {
                valid: true,
                mode,
                refused: HashSet::new(),
                mode_queries: 0,
                mode_requests: Vec::new(),
                pairing: HashMap::new(),
                pair_requests: Vec::new(),
                pair_failure: None,
                removed: Vec::new(),
                remove_failure: None,
            }),
        }
    }

    pub fn set_valid(&self, valid: bool) {
        self.inner.lock().valid = valid;
    }

    /// Accept requests for `mode` without ever entering it.
    pub fn refuse_mode(&self, mode: AdapterMode) {
        self.inner.lock().refused.insert(mode);
    }

    pub fn mode_queries(&self) -> usize {
        self.inner.lock().mode_queries
    }

    pub fn mode_requests(&self) -> Vec<AdapterMode> {
        self.inner.lock().mode_requests.clone()
    }

    pub fn current_mode(&self) -> AdapterMode {
        self.inner.lock().mode
    }

    pub fn set_pairing_state(&self, address: DeviceAddress, state: PairingState) {
        self.inner.lock().pairing.insert(address, state);
    }

    pub fn fail_pairing(&self, err: PlatformError) {
        self.inner.lock().pair_failure = Some(err);
    }

    pub fn pair_requests(&self) -> Vec<DeviceAddress> {
        self.inner.lock().pair_requests.clone()
    }

    pub fn fail_removal(&self, err: PlatformError) {
        self.inner.lock().remove_failure = Some(err);
    }

    /// Native addresses passed to `remove_paired_device`.
    pub fn removed(&self) -> Vec<[u8; 6]> {
        self.inner.lock().removed.clone()
    }
}

#[async_trait]
impl AdapterHandle for FakeAdapter {
    async fn is_valid(&self) -> bool {
        self.inner.lock().valid
    }

    async fn mode(&self) -> Result<AdapterMode, PlatformError> {
        let mut inner = self.inner.lock();
        inner.mode_queries += 1;
        Ok(inner.mode)
    }

    async fn set_mode(&self, mode: AdapterMode) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.mode_requests.push(mode);
        if !inner.refused.contains(&mode) {
            inner.mode = mode;
        }
        Ok(())
    }

    async fn local_address(&self) -> Result<DeviceAddress, PlatformError> {
        Ok(Self::LOCAL_ADDRESS)
    }

    async fn local_name(&self) -> Result<String, PlatformError> {
        Ok("fake-hci0".to_string())
    }

    async fn pairing_state(&self, address: DeviceAddress) -> PairingState {
        self.inner
            .lock()
            .pairing
            .get(&address)
            .copied()
            .unwrap_or(PairingState::Unpaired)
    }

    async fn request_pairing(&self, address: DeviceAddress) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.pair_requests.push(address);
        if let Some(err) = inner.pair_failure.clone() {
            return Err(err);
        }
        inner.pairing.insert(address, PairingState::Paired);
        Ok(())
    }

    async fn remove_paired_device(&self, native_address: [u8; 6]) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.removed.push(native_address);
        match inner.remove_failure.clone() {
            Some(err) => Err(err),
            None => {
                inner
                    .pairing
                    .remove(&DeviceAddress::from_reversed_bytes(native_address));
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Transport

/// How a fake transport answers `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Accept,
    Fail(TransportErrorKind),
    /// Never report an outcome.
    Silent,
}

/// Calls seen by fake transports, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect(DeviceAddress, u8),
    Disconnect,
    Write(Vec<u8>),
}

#[derive(Debug)]
struct LinkInner {
    behavior: ConnectBehavior,
    disconnect_completes: bool,
    write_limit: Option<usize>,
    write_error: Option<io::ErrorKind>,
    state: TransportState,
    inbound: Vec<u8>,
    calls: Vec<TransportCall>,
    created: usize,
    events: Option<TransportEventSender>,
}

/// Shared control surface over every transport a factory creates.
/// Only the newest transport is live; creating one resets the link.
#[derive(Debug, Clone)]
pub struct FakeLink {
    inner: Arc<Mutex<LinkInner>>,
}

impl Default for FakeLink {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LinkInner {
                behavior: ConnectBehavior::Accept,
                disconnect_completes: true,
                write_limit: None,
                write_error: None,
                state: TransportState::Unconnected,
                inbound: Vec::new(),
                calls: Vec::new(),
                created: 0,
                events: None,
            })),
        }
    }

    pub fn factory(&self) -> Arc<dyn TransportFactory> {
        Arc::new(FakeTransportFactory { link: self.clone() })
    }

    pub fn set_behavior(&self, behavior: ConnectBehavior) {
        self.inner.lock().behavior = behavior;
    }

    /// When false, `disconnect()` leaves the transport stuck in `Closing`.
    pub fn set_disconnect_completes(&self, completes: bool) {
        self.inner.lock().disconnect_completes = completes;
    }

    /// Accept at most `limit` bytes per write.
    pub fn set_write_limit(&self, limit: usize) {
        self.inner.lock().write_limit = Some(limit);
    }

    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.inner.lock().write_error = Some(kind);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Connect(..)))
    }

    pub fn disconnect_calls(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Disconnect))
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of transports created so far.
    pub fn created(&self) -> usize {
        self.inner.lock().created
    }

    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Deliver inbound bytes to the live transport.
    pub fn push_inbound(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock();
        inner.inbound.extend_from_slice(bytes);
        Self::send(&inner, TransportEvent::ReadyToRead);
    }

    /// Simulate the remote side closing the link.
    pub fn remote_close(&self) {
        let mut inner = self.inner.lock();
        inner.state = TransportState::Unconnected;
        Self::send(&inner, TransportEvent::Disconnected);
    }

    /// Inject a raw event on the live transport's channel.
    pub fn emit(&self, event: TransportEvent) {
        Self::send(&self.inner.lock(), event);
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn send(inner: &LinkInner, event: TransportEvent) {
        if let Some(events) = &inner.events {
            let _ = events.send(event);
        }
    }
}

pub struct FakeTransportFactory {
    link: FakeLink,
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self, events: TransportEventSender) -> Box<dyn Transport> {
        let mut inner = self.link.inner.lock();
        inner.created += 1;
        inner.state = TransportState::Unconnected;
        inner.inbound.clear();
        inner.events = Some(events);
        Box::new(FakeTransport {
            link: self.link.clone(),
        })
    }
}

pub struct FakeTransport {
    link: FakeLink,
}

#[async_trait]
impl Transport for FakeTransport {
    fn connect(&mut self, address: DeviceAddress, channel: u8) {
        let mut inner = self.link.inner.lock();
        inner.calls.push(TransportCall::Connect(address, channel));
        inner.state = TransportState::Connecting;
        match inner.behavior {
            ConnectBehavior::Accept => {
                inner.state = TransportState::Connected;
                FakeLink::send(&inner, TransportEvent::Connected);
            }
            ConnectBehavior::Fail(kind) => {
                inner.state = TransportState::Unconnected;
                let err = TransportError::new(kind, kind.description());
                FakeLink::send(&inner, TransportEvent::Error(err));
            }
            ConnectBehavior::Silent => {}
        }
    }

    fn disconnect(&mut self) {
        let mut inner = self.link.inner.lock();
        inner.calls.push(TransportCall::Disconnect);
        if inner.disconnect_completes {
            inner.state = TransportState::Unconnected;
            FakeLink::send(&inner, TransportEvent::Disconnected);
        } else {
            inner.state = TransportState::Closing;
        }
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut inner = self.link.inner.lock();
        inner.calls.push(TransportCall::Write(data.to_vec()));
        if let Some(kind) = inner.write_error {
            return Err(io::Error::new(kind, "fake write failure"));
        }
        Ok(inner.write_limit.map_or(data.len(), |l| l.min(data.len())))
    }

    fn read_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.link.inner.lock().inbound)
    }

    fn state(&self) -> TransportState {
        self.link.inner.lock().state
    }
}

// ---------------------------------------------------------------------------
// Discovery

/// Start/stop counters for a [`FakeDiscoveryAgent`].
#[derive(Debug, Clone, Default)]
pub struct DiscoveryProbe {
    counts: Arc<Mutex<(usize, usize)>>,
}

impl DiscoveryProbe {
    pub fn starts(&self) -> usize {
        self.counts.lock().0
    }

    pub fn stops(&self) -> usize {
        self.counts.lock().1
    }
}

/// Replays a fixed list of events on every start. Without a trailing
/// `Finished` the scan runs until its timeout.
pub struct FakeDiscoveryAgent {
    script: Vec<DiscoveryEvent>,
    start_error: Option<DiscoveryErrorKind>,
    probe: DiscoveryProbe,
    // kept so the receiver does not see the channel close
    events: Option<mpsc::UnboundedSender<DiscoveryEvent>>,
}

impl FakeDiscoveryAgent {
    pub fn scripted(script: Vec<DiscoveryEvent>) -> Self {
        Self {
            script,
            start_error: None,
            probe: DiscoveryProbe::default(),
            events: None,
        }
    }

    pub fn failing(kind: DiscoveryErrorKind) -> Self {
        Self {
            start_error: Some(kind),
            ..Self::scripted(Vec::new())
        }
    }

    pub fn probe(&self) -> DiscoveryProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl DiscoveryAgent for FakeDiscoveryAgent {
    async fn start(
        &mut self,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError> {
        self.probe.counts.lock().0 += 1;
        if let Some(kind) = self.start_error {
            return Err(kind.into());
        }
        for event in &self.script {
            let _ = events.send(event.clone());
        }
        self.events = Some(events);
        Ok(())
    }

    async fn stop(&mut self) {
        self.probe.counts.lock().1 += 1;
        self.events = None;
    }
}
