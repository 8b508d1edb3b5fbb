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

//! Pairing management: pair, unpair and query remote devices.
//!
//! Independent of any connection session. Callers normally disconnect
//! before unpairing but nothing here enforces it.

use std::sync::Arc;
use tracing::{error, info};

use crate::bluetooth::{AdapterHandle, DeviceAddress, PairingState};
use crate::error::{AddressError, PairError, UnpairError};

/// Pairing manager over the host adapter.
pub struct PairingManager {
    adapter: Arc<dyn AdapterHandle>,
}

impl PairingManager {
    /// Create a new pairing manager.
    pub fn new(adapter: Arc<dyn AdapterHandle>) -> Self {
        Self { adapter }
    }

    /// Remove the pairing with `address`.
    pub async fn unpair(&self, address: &str) -> Result<(), UnpairError> {
        let address = DeviceAddress::parse(address)?;

        match self
            .adapter
            .remove_paired_device(address.to_reversed_bytes())
            .await
        {
            Ok(()) => {
                info!("Successfully unpaired {}", address);
                Ok(())
            }
            Err(e) => {
                error!("Unpair of {} failed: {}", address, e);
                Err(e.into())
            }
        }
    }

    /// Ask the OS to pair with `address`.
    pub async fn pair(&self, address: &str) -> Result<(), PairError> {
        let address = DeviceAddress::parse(address)?;
        info!("Requesting pairing with {}", address);

        self.adapter.request_pairing(address).await.map_err(|e| {
            error!("Pairing with {} failed: {}", address, e);
            PairError::from(e)
        })?;

        info!(
            "Pairing finished with {} ({:?})",
            address,
            self.adapter.pairing_state(address).await
        );
        Ok(())
    }

    /// Current pairing state of `address`.
    pub async fn pairing_state(&self, address: &str) -> Result<PairingState, AddressError> {
        let address = DeviceAddress::parse(address)?;
        Ok(self.adapter.pairing_state(address).await)
    }
}
