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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::{RecoveryConfig, SessionConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Adapter recovery after disconnect.
    pub recovery: RecoveryLoopConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter name such as `hci0`. The system default when unset.
    pub adapter: Option<String>,

    /// RFCOMM channel used when none is given.
    pub rfcomm_channel: u8,

    pub connect_timeout_ms: u64,

    pub scan_timeout_ms: u64,

    /// Interval between transport state checks while disconnecting.
    pub disconnect_poll_interval_ms: u64,

    /// Upper bound on the wait for the transport to close.
    pub disconnect_timeout_ms: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            rfcomm_channel: 1,
            connect_timeout_ms: 10_000,
            scan_timeout_ms: 20_000,
            disconnect_poll_interval_ms: 100,
            disconnect_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryLoopConfig {
    /// Power cycle the adapter after every disconnect.
    pub enabled: bool,

    pub poll_interval_ms: u64,

    pub power_off_polls: u32,

    pub power_on_polls: u32,
}

impl Default for RecoveryLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 200,
            power_off_polls: 10,
            power_on_polls: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rfcomm-link")
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load from `path`, writing the defaults there when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            rfcomm_channel: self.bluetooth.rfcomm_channel,
            connect_timeout: Duration::from_millis(self.bluetooth.connect_timeout_ms),
            disconnect_poll_interval: Duration::from_millis(
                self.bluetooth.disconnect_poll_interval_ms,
            ),
            disconnect_timeout: Duration::from_millis(self.bluetooth.disconnect_timeout_ms),
        }
    }

    /// Recovery settings, or `None` when recovery is disabled.
    pub fn recovery_config(&self) -> Option<RecoveryConfig> {
        self.recovery.enabled.then(|| RecoveryConfig {
            poll_interval: Duration::from_millis(self.recovery.poll_interval_ms),
            power_off_polls: self.recovery.power_off_polls,
            power_on_polls: self.recovery.power_on_polls,
        })
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.bluetooth.scan_timeout_ms)
    }
}
