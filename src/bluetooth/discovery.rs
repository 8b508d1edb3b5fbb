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

//! Timed device discovery.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::adapter::{DeviceKind, PairingState};
use super::DeviceAddress;
use crate::error::DiscoveryError;

/// Name reported when the adapter supplies none.
pub const UNKNOWN_DEVICE_NAME: &str = "unknown";

/// Default scan duration.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(20);

/// A device seen during one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub address: DeviceAddress,
    pub name: String,
    pub pairing_state: PairingState,
    pub kind: DeviceKind,
}

impl DiscoveredDevice {
    pub fn new(address: DeviceAddress, name: Option<String>) -> Self {
        Self {
            address,
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string()),
            pairing_state: PairingState::Unknown,
            kind: DeviceKind::Unknown,
        }
    }

    pub fn with_pairing_state(mut self, state: PairingState) -> Self {
        self.pairing_state = state;
        self
    }

    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Discovery agent error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryErrorKind {
    PoweredOff,
    InputOutput,
    InvalidAdapter,
    UnsupportedPlatform,
    UnsupportedDiscoveryMethod,
    LocationServiceOff,
    MissingPermissions,
    Unknown(i32),
}

impl DiscoveryErrorKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::PoweredOff => "Bluetooth is powered off",
            Self::InputOutput => "Input/output error",
            Self::InvalidAdapter => "Invalid Bluetooth adapter",
            Self::UnsupportedPlatform => "Unsupported platform",
            Self::UnsupportedDiscoveryMethod => "Unsupported discovery method",
            Self::LocationServiceOff => "Location service turned off",
            Self::MissingPermissions => "Missing permissions",
            Self::Unknown(_) => "Unknown error",
        }
    }
}

/// Notifications from a running discovery agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    DeviceDiscovered(DiscoveredDevice),
    Finished,
    Error(DiscoveryErrorKind),
}

/// OS discovery agent.
#[async_trait]
pub trait DiscoveryAgent: Send {
    /// Begin discovery, reporting on `events` until stopped.
    async fn start(
        &mut self,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Result<(), DiscoveryError>;

    async fn stop(&mut self);
}

/// Lifecycle of the most recent scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Scanning,
    Completed,
    Failed,
    TimedOut,
}

/// Runs bounded scans on a discovery agent.
pub struct DiscoveryController {
    agent: Box<dyn DiscoveryAgent>,
    state: DiscoveryState,
    devices: Vec<DiscoveredDevice>,
}

impl DiscoveryController {
    pub fn new(agent: Box<dyn DiscoveryAgent>) -> Self {
        Self {
            agent,
            state: DiscoveryState::Idle,
            devices: Vec::new(),
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Results of the last scan, in arrival order.
    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    /// Scan for `timeout` and return every device reported, in arrival
    /// order and without deduplication. Agent errors end the scan early
    /// but are never returned; whatever was collected is kept.
    pub async fn scan(&mut self, timeout: Duration) -> Vec<DiscoveredDevice> {
        info!("Starting Bluetooth device scan ({:?})", timeout);
        self.state = DiscoveryState::Scanning;
        self.devices.clear();

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        if let Err(e) = self.agent.start(event_tx).await {
            error!("Could not start discovery: {}", e);
            self.state = DiscoveryState::Failed;
            return Vec::new();
        }
        debug!("Discovery agent started");

        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, event_rx.recv()).await {
                Ok(Some(DiscoveryEvent::DeviceDiscovered(device))) => {
                    info!("Found: {} - {}", device.name, device.address);
                    self.devices.push(device);
                }
                Ok(Some(DiscoveryEvent::Finished)) => {
                    info!("Scan finished, {} devices found", self.devices.len());
                    self.state = DiscoveryState::Completed;
                    break;
                }
                Ok(Some(DiscoveryEvent::Error(kind))) => {
                    error!("{}", DiscoveryError::from(kind));
                    self.agent.stop().await;
                    self.state = DiscoveryState::Failed;
                    break;
                }
                Ok(None) => {
                    warn!("Discovery agent went away without finishing");
                    self.agent.stop().await;
                    self.state = DiscoveryState::Completed;
                    break;
                }
                Err(_) => {
                    warn!("Scan timed out, stopping discovery");
                    self.agent.stop().await;
                    self.state = DiscoveryState::TimedOut;
                    break;
                }
            }
        }

        self.devices.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::testing::FakeDiscoveryAgent;

    fn device(last: u8, name: Option<&str>) -> DiscoveredDevice {
        DiscoveredDevice::new(
            DeviceAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, last]),
            name.map(str::to_string),
        )
    }

    #[test]
    fn test_missing_name_defaults_to_unknown() {
        assert_eq!(device(1, None).name, UNKNOWN_DEVICE_NAME);
        assert_eq!(device(1, Some("")).name, UNKNOWN_DEVICE_NAME);
        assert_eq!(device(1, Some("Sensor")).name, "Sensor");
    }

    #[tokio::test]
    async fn test_scan_keeps_order_and_duplicates() {
        let agent = FakeDiscoveryAgent::scripted(vec![
            DiscoveryEvent::DeviceDiscovered(device(2, Some("B"))),
            DiscoveryEvent::DeviceDiscovered(device(1, Some("A"))),
            DiscoveryEvent::DeviceDiscovered(device(2, Some("B"))),
            DiscoveryEvent::Finished,
        ]);
        let probe = agent.probe();
        let mut controller = DiscoveryController::new(Box::new(agent));

        let found = controller.scan(Duration::from_secs(5)).await;

        let names: Vec<_> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "B"]);
        assert_eq!(controller.state(), DiscoveryState::Completed);
        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_agent_and_keeps_results() {
        let agent = FakeDiscoveryAgent::scripted(vec![DiscoveryEvent::DeviceDiscovered(
            device(7, Some("Slow")),
        )]);
        let probe = agent.probe();
        let mut controller = DiscoveryController::new(Box::new(agent));

        let found = controller.scan(DEFAULT_SCAN_TIMEOUT).await;

        assert_eq!(found.len(), 1);
        assert_eq!(controller.state(), DiscoveryState::TimedOut);
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn test_error_ends_scan_with_partial_results() {
        let agent = FakeDiscoveryAgent::scripted(vec![
            DiscoveryEvent::DeviceDiscovered(device(1, Some("First"))),
            DiscoveryEvent::Error(DiscoveryErrorKind::InputOutput),
            DiscoveryEvent::DeviceDiscovered(device(2, Some("Late"))),
        ]);
        let probe = agent.probe();
        let mut controller = DiscoveryController::new(Box::new(agent));

        let found = controller.scan(Duration::from_secs(5)).await;

        assert_eq!(found, vec![device(1, Some("First"))]);
        assert_eq!(controller.state(), DiscoveryState::Failed);
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_returns_empty() {
        let agent = FakeDiscoveryAgent::failing(DiscoveryErrorKind::PoweredOff);
        let mut controller = DiscoveryController::new(Box::new(agent));

        assert!(controller.scan(Duration::from_secs(5)).await.is_empty());
        assert_eq!(controller.state(), DiscoveryState::Failed);
    }

    #[tokio::test]
    async fn test_new_scan_clears_previous_results() {
        let agent = FakeDiscoveryAgent::scripted(vec![
            DiscoveryEvent::DeviceDiscovered(device(3, None)),
            DiscoveryEvent::Finished,
        ]);
        let mut controller = DiscoveryController::new(Box::new(agent));

        controller.scan(Duration::from_secs(5)).await;
        let second = controller.scan(Duration::from_secs(5)).await;

        assert_eq!(second.len(), 1);
        assert_eq!(controller.devices().len(), 1);
    }
}
