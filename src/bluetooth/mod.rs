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

//! Bluetooth communication module.
//!
//! RFCOMM client session, adapter recovery and device discovery. The core
//! talks to the OS through the [`Transport`], [`AdapterHandle`] and
//! [`DiscoveryAgent`] traits; [`bluez`] implements them on Linux.

mod adapter;
mod address;
pub mod bluez;
mod connection;
mod discovery;
mod frame;
mod recovery;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{
    probe_adapter, AdapterHandle, AdapterMode, DeviceKind, LocalAdapterInfo, PairingState,
};
pub use address::DeviceAddress;
pub use connection::{
    ConnectionEvent, ConnectionSession, ConnectionState, SessionConfig, SessionStatus,
};
pub use discovery::{
    DiscoveredDevice, DiscoveryAgent, DiscoveryController, DiscoveryErrorKind, DiscoveryEvent,
    DiscoveryState, DEFAULT_SCAN_TIMEOUT, UNKNOWN_DEVICE_NAME,
};
pub use frame::{decode_send_payload, describe_received, Payload, ReceivedFrame};
pub use recovery::{AdapterRecovery, RecoveryConfig};
pub use transport::{
    Transport, TransportError, TransportErrorKind, TransportEvent, TransportEventSender,
    TransportFactory, TransportState,
};
