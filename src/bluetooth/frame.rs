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

//! Payload encoding for frames sent to and received from the device.

use crate::error::PayloadError;

/// Data handed to `send()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Raw bytes, sent unchanged.
    Raw(Vec<u8>),
    /// Hex text, optionally prefixed with `0x`.
    Hex(String),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Raw(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Hex(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Hex(text.to_string())
    }
}

/// Turn a send payload into the bytes to write.
pub fn decode_send_payload(input: Payload) -> Result<Vec<u8>, PayloadError> {
    match input {
        Payload::Raw(bytes) => Ok(bytes),
        Payload::Hex(text) => {
            let digits = text.strip_prefix("0x").unwrap_or(&text);
            hex::decode(digits).map_err(|e| PayloadError::InvalidPayload {
                input: text.clone(),
                reason: e.to_string(),
            })
        }
    }
}

/// Log-friendly rendering of a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Uppercase hex, no separators.
    pub hex: String,
    /// Printable rendering, present only for pure ASCII data with at least
    /// one printable character. Non-printable bytes render as `.`.
    pub ascii_preview: Option<String>,
}

/// Describe received bytes for logging. Never rejects data.
pub fn describe_received(bytes: &[u8]) -> ReceivedFrame {
    ReceivedFrame {
        hex: hex::encode_upper(bytes),
        ascii_preview: ascii_preview(bytes),
    }
}

fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte)
}

fn ascii_preview(bytes: &[u8]) -> Option<String> {
    if !bytes.is_ascii() || !bytes.iter().copied().any(is_printable) {
        return None;
    }

    Some(
        bytes
            .iter()
            .map(|&b| if is_printable(b) { b as char } else { '.' })
            .collect(),
    )
}
