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

//! Byte-stream transport used by a connection session.
//!
//! A transport is socket-like: connect and disconnect are requests whose
//! outcome is reported later as a [`TransportEvent`] on the channel the
//! transport was created with.

use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::sync::mpsc;

use super::DeviceAddress;

/// Socket state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unconnected,
    Connecting,
    Connected,
    Closing,
}

/// Socket error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    HostNotFound,
    ServiceNotFound,
    Network,
    UnsupportedProtocol,
    Operation,
    RemoteHostClosed,
    MissingPermissions,
    PoweredOff,
    Unknown(i32),
}

impl TransportErrorKind {
    /// Numeric code reported alongside `ConnectError::Unknown`.
    pub fn code(&self) -> i32 {
        match self {
            Self::HostNotFound => 1,
            Self::ServiceNotFound => 2,
            Self::Network => 3,
            Self::UnsupportedProtocol => 4,
            Self::Operation => 5,
            Self::RemoteHostClosed => 6,
            Self::MissingPermissions => 7,
            Self::PoweredOff => 8,
            Self::Unknown(code) => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::HostNotFound => "Host not found",
            Self::ServiceNotFound => "Service not found",
            Self::Network => "Network error",
            Self::UnsupportedProtocol => "Unsupported protocol",
            Self::Operation => "Operation error",
            Self::RemoteHostClosed => "Remote host closed the connection",
            Self::MissingPermissions => "Missing permissions",
            Self::PoweredOff => "Bluetooth adapter powered off",
            Self::Unknown(_) => "Unknown error",
        }
    }

    /// Classify an OS socket error.
    pub fn from_io(err: &io::Error) -> Self {
        // Linux errno values returned by Bluetooth sockets.
        match err.raw_os_error() {
            Some(112) | Some(113) => Self::HostNotFound, // EHOSTDOWN, EHOSTUNREACH
            Some(111) => Self::ServiceNotFound,          // ECONNREFUSED
            Some(104) | Some(103) => Self::RemoteHostClosed, // ECONNRESET, ECONNABORTED
            Some(1) | Some(13) => Self::MissingPermissions,  // EPERM, EACCES
            Some(19) | Some(100) => Self::PoweredOff,        // ENODEV, ENETDOWN
            Some(93) | Some(97) => Self::UnsupportedProtocol, // EPROTONOSUPPORT, EAFNOSUPPORT
            Some(110) | Some(101) => Self::Network,          // ETIMEDOUT, ENETUNREACH
            Some(code) => Self::Unknown(code),
            None => match err.kind() {
                io::ErrorKind::ConnectionRefused => Self::ServiceNotFound,
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    Self::RemoteHostClosed
                }
                io::ErrorKind::PermissionDenied => Self::MissingPermissions,
                io::ErrorKind::TimedOut => Self::Network,
                _ => Self::Operation,
            },
        }
    }
}

/// Error reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_io(err: &io::Error) -> Self {
        let kind = TransportErrorKind::from_io(err);
        Self::new(kind, format!("{}: {}", kind.description(), err))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Asynchronous notifications from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// Bytes are waiting to be collected with [`Transport::read_all`].
    ReadyToRead,
    Error(TransportError),
}

/// Sender half handed to each new transport.
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// A single RFCOMM-style byte stream.
#[async_trait]
pub trait Transport: Send {
    /// Start connecting. Completion arrives as `Connected` or `Error`.
    fn connect(&mut self, address: DeviceAddress, channel: u8);

    /// Start closing. Completion shows up in [`state`](Self::state) and as
    /// a `Disconnected` event.
    fn disconnect(&mut self);

    /// Write bytes, returning how many were accepted.
    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Take every byte currently buffered.
    fn read_all(&mut self) -> Vec<u8>;

    fn state(&self) -> TransportState;
}

/// Creates fresh transports for a session.
pub trait TransportFactory: Send + Sync {
    fn create(&self, events: TransportEventSender) -> Box<dyn Transport>;
}
