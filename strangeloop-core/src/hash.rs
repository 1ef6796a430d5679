// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Content hashes
//!
//! Command output is stored under a key derived from its own bytes, so
//! identical output is only ever stored once.

use crate::error::LoopError;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BLAKE3 digest (32 bytes) of a byte string.
///
/// Serialized as a 64-character lowercase hex string, which is also the file
/// name of the blob in the output store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary content
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Hash text, returning `None` for empty input.
    ///
    /// Empty output never gets a stored object, so it never gets a hash either.
    pub fn of_text(text: &str) -> Option<Self> {
        if text.is_empty() {
            None
        } else {
            Some(Self::from_content(text.as_bytes()))
        }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, LoopError> {
        let bytes =
            hex::decode(hex_str).map_err(|_| LoopError::InvalidHash(hex_str.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LoopError::InvalidHash(hex_str.to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = LoopError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}
