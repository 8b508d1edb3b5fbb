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

//! Local Bluetooth adapter abstraction.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::info;

use super::DeviceAddress;
use crate::error::PlatformError;

/// Power/visibility mode of the local radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AdapterMode {
    PoweredOff,
    Connectable,
    Discoverable,
}

impl fmt::Display for AdapterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PoweredOff => "powered off",
            Self::Connectable => "connectable",
            Self::Discoverable => "discoverable",
        };
        f.write_str(name)
    }
}

/// Trust relationship between the host and a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairingState {
    Unpaired,
    Paired,
    AuthorizedPaired,
    Unknown,
}

/// Radio technologies a remote device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    Classic,
    LowEnergy,
    Dual,
    Unknown,
}

/// Handle to the host adapter.
#[async_trait]
pub trait AdapterHandle: Send + Sync {
    /// Whether the handle still refers to a usable adapter.
    async fn is_valid(&self) -> bool;

    async fn mode(&self) -> Result<AdapterMode, PlatformError>;

    async fn set_mode(&self, mode: AdapterMode) -> Result<(), PlatformError>;

    async fn local_address(&self) -> Result<DeviceAddress, PlatformError>;

    async fn local_name(&self) -> Result<String, PlatformError>;

    async fn pairing_state(&self, address: DeviceAddress) -> PairingState;

    async fn request_pairing(&self, address: DeviceAddress) -> Result<(), PlatformError>;

    /// Native "remove paired device" primitive. Takes the address octets
    /// least significant first.
    async fn remove_paired_device(&self, native_address: [u8; 6]) -> Result<(), PlatformError>;
}

/// Identity of the local adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalAdapterInfo {
    pub name: String,
    pub address: DeviceAddress,
    pub mode: AdapterMode,
}

/// Check that the adapter is usable before starting a session.
pub async fn probe_adapter(adapter: &dyn AdapterHandle) -> Result<LocalAdapterInfo> {
    if !adapter.is_valid().await {
        bail!("Bluetooth is not available on this host");
    }

    let mode = adapter.mode().await?;
    if mode == AdapterMode::PoweredOff {
        bail!("Bluetooth is powered off, enable it and try again");
    }

    let info = LocalAdapterInfo {
        name: adapter.local_name().await?,
        address: adapter.local_address().await?,
        mode,
    };
    info!(
        "Local Bluetooth adapter: {} ({}), {}",
        info.name, info.address, info.mode
    );
    Ok(info)
}
