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

//! Console command module.
//!
//! Parses console input lines and runs them against the Bluetooth core.

mod console;

pub use console::{Console, Flow};

use thiserror::Error;

/// Usage summary printed by `help`.
pub const HELP_TEXT: &str = "\
Commands:
  connect <MAC> [channel]  connect to a device (default channel from config)
  disconnect               close the connection and reset the adapter
  send <hex>               send hex bytes, e.g. send 0x0102FF
  scan                     scan for nearby devices
  pair <MAC>               pair with a device
  unpair <MAC>             remove a pairing
  status                   show connection status
  help                     show this help
  exit                     disconnect and quit";

/// Console command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect { address: String, channel: Option<u8> },
    Disconnect,
    Send(String),
    Scan,
    Pair(String),
    Unpair(String),
    Status,
    Help,
    Exit,
}

/// Rejected console input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}, type 'help' for a list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid channel {0:?}")]
    InvalidChannel(String),
}

impl ConsoleCommand {
    /// Parse one input line. Command names are case-insensitive.
    ///
    /// `send` takes the rest of the line, so `send 01 02 FF` sends three
    /// bytes. Every other command rejects surplus arguments.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or(ParseError::Empty)?;
        let args: Vec<&str> = parts.collect();

        let command = match name.to_lowercase().as_str() {
            "connect" => match args.as_slice() {
                [address] => Self::Connect {
                    address: address.to_string(),
                    channel: None,
                },
                [address, channel] => Self::Connect {
                    address: address.to_string(),
                    channel: Some(
                        channel
                            .parse::<u8>()
                            .map_err(|_| ParseError::InvalidChannel(channel.to_string()))?,
                    ),
                },
                _ => return Err(ParseError::Usage("connect <MAC> [channel]")),
            },
            "send" if !args.is_empty() => Self::Send(args.concat()),
            "send" => return Err(ParseError::Usage("send <hex>")),
            "pair" => Self::Pair(single(&args, "pair <MAC>")?),
            "unpair" => Self::Unpair(single(&args, "unpair <MAC>")?),
            "disconnect" => none(&args, "disconnect", Self::Disconnect)?,
            "scan" => none(&args, "scan", Self::Scan)?,
            "status" => none(&args, "status", Self::Status)?,
            "help" | "?" => none(&args, "help", Self::Help)?,
            "exit" | "quit" => none(&args, "exit", Self::Exit)?,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn single(args: &[&str], usage: &'static str) -> Result<String, ParseError> {
    match args {
        [arg] => Ok(arg.to_string()),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn none(
    args: &[&str],
    usage: &'static str,
    command: ConsoleCommand,
) -> Result<ConsoleCommand, ParseError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::Usage(usage))
    }
}
