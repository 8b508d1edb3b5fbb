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

//! Bluetooth device address parsing and formatting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// 48-bit Bluetooth device address, most significant octet first.
///
/// Displays as six colon-separated uppercase hex octets
/// (`AA:BB:CC:DD:EE:FF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Build an address from its octets, most significant first.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Parse `XX:XX:XX:XX:XX:XX` (hex digits in either case).
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::InvalidAddress(text.to_string());

        let groups: Vec<&str> = text.split(':').collect();
        if groups.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (octet, group) in octets.iter_mut().zip(groups) {
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }

    /// Octets in display order.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Octets least significant first, the layout native pairing-removal
    /// calls expect.
    pub fn to_reversed_bytes(&self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Inverse of [`to_reversed_bytes`](Self::to_reversed_bytes).
    pub fn from_reversed_bytes(mut bytes: [u8; 6]) -> Self {
        bytes.reverse();
        Self(bytes)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let addr = DeviceAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(addr.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");

        let samples = [
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0xB8, 0xD5, 0x0B, 0xE7, 0xC7, 0x0B],
            [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ];
        for octets in samples {
            let addr = DeviceAddress::new(octets);
            assert_eq!(DeviceAddress::parse(&addr.to_string()), Ok(addr));
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for text in [
            "AA:BB:CC:DD:EE",
            "GG:00:00:00:00:00",
            "AA:BB:CC:DD:EE:FF:00",
            "AA-BB-CC-DD-EE-FF",
            "AABBCCDDEEFF",
            "A:BB:CC:DD:EE:FFF",
            "+A:BB:CC:DD:EE:FF",
            " AA:BB:CC:DD:EE:FF",
            "AA:BB:CC:DD:EE:FF\n",
            "",
        ] {
            assert_eq!(
                DeviceAddress::parse(text),
                Err(AddressError::InvalidAddress(text.to_string())),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_reversed_bytes() {
        let addr: DeviceAddress = "B8:D5:0B:E7:C7:0B".parse().unwrap();
        assert_eq!(
            addr.to_reversed_bytes(),
            [0x0B, 0xC7, 0xE7, 0x0B, 0xD5, 0xB8]
        );
        assert_eq!(DeviceAddress::from_reversed_bytes(addr.to_reversed_bytes()), addr);
    }

    #[test]
    fn test_serde_as_string() {
        let addr = DeviceAddress::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"01:02:03:04:05:06\"");
        let parsed: DeviceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
        assert!(serde_json::from_str::<DeviceAddress>("\"nope\"").is_err());
    }
}
