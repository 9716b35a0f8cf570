// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovered entities: participants and reader/writer endpoints.

use crate::guid::Guid;
use crate::qos::{MatchSide, MismatchKind, QosAttributes};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Endpoint direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Reader,
    Writer,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Reader => Self::Writer,
            Self::Writer => Self::Reader,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => f.write_str("reader"),
            Self::Writer => f.write_str("writer"),
        }
    }
}

/// Participant QoS property bag (hostname, process name, pid, ...).
pub type Properties = BTreeMap<String, String>;

/// A discovered domain participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub key: Guid,
    #[serde(default)]
    pub properties: Properties,
}

impl Participant {
    pub fn new(key: Guid) -> Self {
        Self {
            key,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Merge an update: properties are added, existing names overwritten.
    pub fn merge(&mut self, update: &ParticipantUpdate) {
        for (name, value) in &update.properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Out-of-band participant metadata (e.g. host/process info from a legacy
/// built-in topic). May arrive before the participant itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub key: Guid,
    #[serde(default)]
    pub properties: Properties,
}

impl ParticipantUpdate {
    pub fn new(key: Guid) -> Self {
        Self {
            key,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Fold a later update into this one.
    pub fn absorb(&mut self, later: ParticipantUpdate) {
        self.properties.extend(later.properties);
    }
}

/// A discovered reader or writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub key: Guid,
    pub direction: Direction,
    /// Owning participant as announced; the participant itself may be unknown yet.
    pub participant_key: Option<Guid>,
    /// Owning participant snapshot, filled once the participant is known.
    #[serde(default)]
    pub participant: Option<Participant>,
    pub topic_name: String,
    pub type_name: String,
    /// Opaque type identifier (e.g. XTypes TypeIdentifier bytes).
    #[serde(default)]
    pub type_id: Option<Vec<u8>>,
    #[serde(default)]
    pub qos: QosAttributes,
    /// Peer endpoint -> incompatible policies, in discovery order.
    #[serde(default)]
    pub mismatches: IndexMap<Guid, Vec<MismatchKind>>,
}

impl Endpoint {
    pub fn new(
        key: Guid,
        direction: Direction,
        topic_name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            key,
            direction,
            participant_key: None,
            participant: None,
            topic_name: topic_name.into(),
            type_name: type_name.into(),
            type_id: None,
            qos: QosAttributes::default(),
            mismatches: IndexMap::new(),
        }
    }

    pub fn reader(key: Guid, topic_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(key, Direction::Reader, topic_name, type_name)
    }

    pub fn writer(key: Guid, topic_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(key, Direction::Writer, topic_name, type_name)
    }

    pub fn with_qos(mut self, qos: QosAttributes) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_participant_key(mut self, key: Guid) -> Self {
        self.participant_key = Some(key);
        self
    }

    pub fn with_type_id(mut self, type_id: Vec<u8>) -> Self {
        self.type_id = Some(type_id);
        self
    }

    pub fn is_reader(&self) -> bool {
        self.direction == Direction::Reader
    }

    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }

    /// This endpoint as one side of a compatibility check.
    pub fn match_side(&self) -> MatchSide<'_> {
        MatchSide::new(&self.topic_name, &self.type_name, &self.qos)
    }

    /// Replace the mismatch entry for `peer`; an empty list clears it.
    ///
    /// Returns true if the stored entry changed.
    pub(crate) fn set_mismatch(&mut self, peer: Guid, kinds: &[MismatchKind]) -> bool {
        if kinds.is_empty() {
            return self.mismatches.shift_remove(&peer).is_some();
        }
        match self.mismatches.get_mut(&peer) {
            Some(existing) if existing.as_slice() == kinds => false,
            Some(existing) => {
                *existing = kinds.to_vec();
                true
            }
            None => {
                self.mismatches.insert(peer, kinds.to_vec());
                true
            }
        }
    }
}
