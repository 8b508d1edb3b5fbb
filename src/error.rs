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

//! Error types returned by the Bluetooth core.
//!
//! Platform and transport failures are converted into these types at the
//! point where they occur; nothing backend-specific crosses the core API.

use thiserror::Error;

use crate::bluetooth::{DiscoveryErrorKind, TransportError, TransportErrorKind};

/// A MAC-style address could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid Bluetooth address: {0:?}")]
    InvalidAddress(String),
}

/// A send payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("invalid payload {input:?}: {reason}")]
    InvalidPayload { input: String, reason: String },
}

/// Failure reported by a native platform primitive (result code + message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct PlatformError {
    pub code: i32,
    pub message: String,
}

impl PlatformError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Outcome of a failed `connect()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("connection timed out")]
    Timeout,

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("Bluetooth adapter is powered off")]
    AdapterOff,

    #[error("connection failed: {message} (code {code})")]
    Unknown { code: i32, message: String },
}

impl From<TransportError> for ConnectError {
    fn from(err: TransportError) -> Self {
        match err.kind {
            TransportErrorKind::HostNotFound
            | TransportErrorKind::ServiceNotFound
            | TransportErrorKind::RemoteHostClosed => Self::Refused(err.message),
            TransportErrorKind::PoweredOff => Self::AdapterOff,
            kind => Self::Unknown {
                code: kind.code(),
                message: err.message,
            },
        }
    }
}

/// Outcome of a failed `send()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),

    #[error("write failed: {0}")]
    Io(String),
}

/// Outcome of a failed adapter power cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    #[error("Bluetooth adapter is unavailable")]
    AdapterUnavailable,

    #[error("adapter did not come back up (original mode restored: {restored})")]
    RecoveryFailed { restored: bool },
}

/// Outcome of a failed unpair request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnpairError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("unpair failed: {0}")]
    Platform(#[from] PlatformError),
}

/// Outcome of a failed pair request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("pairing failed: {0}")]
    Platform(#[from] PlatformError),
}

/// Error reported by a discovery agent. Never returned from `scan()`,
/// only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("discovery error: {}", .kind.description())]
pub struct DiscoveryError {
    pub kind: DiscoveryErrorKind,
}

impl From<DiscoveryErrorKind> for DiscoveryError {
    fn from(kind: DiscoveryErrorKind) -> Self {
        Self { kind }
    }
}
