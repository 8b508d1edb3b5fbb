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

//! Adapter power cycling after a session teardown.
//!
//! Some adapters keep the RFCOMM channel half-closed after a disconnect and
//! refuse new connections until the radio is power cycled. Recovery turns
//! the adapter off, brings it back as discoverable (or connectable as a
//! fallback) and restores the original mode if neither comes up.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::adapter::{AdapterHandle, AdapterMode};
use crate::error::RecoveryError;

/// Poll budgets for a recovery run.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub poll_interval: Duration,
    /// Checks allowed while waiting for the adapter to power off.
    pub power_off_polls: u32,
    /// Checks allowed per attempt while waiting for it to power back on.
    pub power_on_polls: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            power_off_polls: 10,
            power_on_polls: 15,
        }
    }
}

/// Power cycles the host adapter.
pub struct AdapterRecovery {
    adapter: Arc<dyn AdapterHandle>,
    config: RecoveryConfig,
}

impl AdapterRecovery {
    pub fn new(adapter: Arc<dyn AdapterHandle>, config: RecoveryConfig) -> Self {
        Self { adapter, config }
    }

    /// Run one power cycle. Safe to call on an already healthy adapter.
    pub async fn recover(&self) -> Result<(), RecoveryError> {
        if !self.adapter.is_valid().await {
            warn!("Adapter handle is not valid, skipping recovery");
            return Err(RecoveryError::AdapterUnavailable);
        }

        let original = self.adapter.mode().await.map_err(|e| {
            warn!("Cannot read adapter mode: {}", e);
            RecoveryError::AdapterUnavailable
        })?;
        debug!("Adapter mode before recovery: {}", original);

        self.request_mode(AdapterMode::PoweredOff).await;
        info!("Bluetooth temporarily powered off");
        if self
            .wait_for_mode(self.config.power_off_polls, |mode| {
                mode == AdapterMode::PoweredOff
            })
            .await
            .is_none()
        {
            warn!("Adapter never reported powered off, continuing anyway");
        }

        for target in [AdapterMode::Discoverable, AdapterMode::Connectable] {
            self.request_mode(target).await;
            if let Some(polls) = self
                .wait_for_mode(self.config.power_on_polls, |mode| {
                    mode != AdapterMode::PoweredOff
                })
                .await
            {
                info!("Bluetooth back up as {} after {} checks", target, polls);
                return Ok(());
            }
            warn!("Adapter still powered off after requesting {}", target);
        }

        let restored = match self.adapter.set_mode(original).await {
            Ok(()) => {
                info!("Restored original adapter mode: {}", original);
                true
            }
            Err(e) => {
                warn!("Failed to restore adapter mode {}: {}", original, e);
                false
            }
        };
        Err(RecoveryError::RecoveryFailed { restored })
    }

    async fn request_mode(&self, mode: AdapterMode) {
        if let Err(e) = self.adapter.set_mode(mode).await {
            warn!("Failed to set adapter mode to {}: {}", mode, e);
        }
    }

    /// Poll the adapter mode until `accept` holds. Returns the number of
    /// checks it took, or `None` once the budget is spent.
    async fn wait_for_mode(
        &self,
        budget: u32,
        accept: impl Fn(AdapterMode) -> bool,
    ) -> Option<u32> {
        for attempt in 1..=budget {
            match self.adapter.mode().await {
                Ok(mode) if accept(mode) => return Some(attempt),
                Ok(mode) => debug!("Adapter mode {} (check {}/{})", mode, attempt, budget),
                Err(e) => debug!("Adapter mode unreadable (check {}/{}): {}", attempt, budget, e),
            }
            if attempt < budget {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        None
    }
}
