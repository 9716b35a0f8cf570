// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity keys for participants and endpoints.
//!
//! Discovery feeds report entities by their RTPS GUID. The graph treats the
//! value as an opaque 128-bit key, but keeps the prefix/entity split so an
//! endpoint's owning participant can be derived when the feed omits it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Entity ID of the participant entity itself (RTPS `ENTITYID_PARTICIPANT`).
pub const ENTITYID_PARTICIPANT: [u8; 4] = [0x00, 0x00, 0x01, 0xC1];

/// 16-byte globally unique identifier.
///
/// # Display Format
/// Hex with dots: "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Guid {
    pub prefix: [u8; 12],
    pub entity_id: [u8; 4],
}

impl Guid {
    /// Create GUID from separate prefix and entity ID.
    pub const fn new(prefix: [u8; 12], entity_id: [u8; 4]) -> Self {
        Self { prefix, entity_id }
    }

    /// Create GUID from raw bytes (16 bytes total).
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; 12];
        let mut entity_id = [0u8; 4];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self { prefix, entity_id }
    }

    /// Convert GUID to 16-byte array.
    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix);
        bytes[12..16].copy_from_slice(&self.entity_id);
        bytes
    }

    /// GUID with all zeros (invalid/placeholder).
    pub const fn zero() -> Self {
        Self {
            prefix: [0; 12],
            entity_id: [0; 4],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.prefix.iter().all(|&b| b == 0) && self.entity_id.iter().all(|&b| b == 0)
    }

    /// GUID of the participant owning this entity (same prefix, participant entity ID).
    pub fn participant_guid(&self) -> Self {
        Self {
            prefix: self.prefix,
            entity_id: ENTITYID_PARTICIPANT,
        }
    }

    /// True if this GUID names a participant rather than an endpoint.
    pub fn is_participant(&self) -> bool {
        self.entity_id == ENTITYID_PARTICIPANT
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.prefix.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        for byte in &self.entity_id {
            write!(f, ".{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// Error returned when a GUID string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuidParseError {
    #[error("expected 32 hex digits, found {0}")]
    InvalidLength(usize),

    #[error("invalid hex digit '{0}'")]
    InvalidDigit(char),
}

impl FromStr for Guid {
    type Err = GuidParseError;

    /// Accepts dotted ("01.0f..."), colon/dash separated, or plain 32-digit hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<char> = s
            .chars()
            .filter(|c| !matches!(c, '.' | ':' | '-' | ' '))
            .collect();
        if digits.len() != 32 {
            return Err(GuidParseError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; 16];
        for (i, pair) in digits.chunks(2).enumerate() {
            let hi = pair[0]
                .to_digit(16)
                .ok_or(GuidParseError::InvalidDigit(pair[0]))?;
            let lo = pair[1]
                .to_digit(16)
                .ok_or(GuidParseError::InvalidDigit(pair[1]))?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Ok(Self::from_bytes(bytes))
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
