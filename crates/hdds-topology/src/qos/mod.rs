// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS attribute sets as announced by discovered endpoints.
//!
//! Every policy is optional: a remote implementation may omit a policy from
//! its announcement, and the compatibility checker treats a missing policy
//! as "no constraint" for that comparison.
//!
//! Ordered policy kinds derive `Ord` in their RxO order, so "reader requests
//! more than writer offers" is a plain `reader > writer` comparison.

pub mod compat;
pub mod partition;

pub use compat::{check_compatibility, MatchSide, MismatchKind};
pub use partition::{glob_match, has_wildcards, matches_default_partition, partitions_match};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// RELIABILITY kinds (BEST_EFFORT < RELIABLE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    #[default]
    BestEffort,
    Reliable,
}

/// DURABILITY kinds (VOLATILE < TRANSIENT_LOCAL < TRANSIENT < PERSISTENT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    #[default]
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

/// Presentation access scope, ordered INSTANCE < GROUP < TOPIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationAccessScope {
    #[default]
    Instance,
    Group,
    Topic,
}

/// PRESENTATION policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Presentation {
    pub access_scope: PresentationAccessScope,
    pub coherent_access: bool,
    pub ordered_access: bool,
}

impl Presentation {
    pub fn new(
        access_scope: PresentationAccessScope,
        coherent_access: bool,
        ordered_access: bool,
    ) -> Self {
        Self {
            access_scope,
            coherent_access,
            ordered_access,
        }
    }
}

/// OWNERSHIP kinds. Unordered: only equality matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipKind {
    #[default]
    Shared,
    Exclusive,
}

/// LIVELINESS kinds (AUTOMATIC < MANUAL_BY_PARTICIPANT < MANUAL_BY_TOPIC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivelinessKind {
    #[default]
    Automatic,
    ManualByParticipant,
    ManualByTopic,
}

/// LIVELINESS policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveliness {
    #[serde(default)]
    pub kind: LivelinessKind,
    /// Lease duration; `Duration::MAX` means infinite.
    #[serde(default = "infinite", with = "millis")]
    pub lease_duration: Duration,
}

impl Default for Liveliness {
    fn default() -> Self {
        Self {
            kind: LivelinessKind::Automatic,
            lease_duration: Duration::MAX,
        }
    }
}

impl Liveliness {
    pub fn new(kind: LivelinessKind, lease_duration: Duration) -> Self {
        Self {
            kind,
            lease_duration,
        }
    }

    pub fn automatic_secs(secs: u64) -> Self {
        Self::new(LivelinessKind::Automatic, Duration::from_secs(secs))
    }
}

/// DESTINATION_ORDER kinds (BY_RECEPTION_TIMESTAMP < BY_SOURCE_TIMESTAMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationOrderKind {
    #[default]
    ByReceptionTimestamp,
    BySourceTimestamp,
}

/// Data representation identifiers (XTypes v1.3 Sec.7.6.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRepresentation {
    Xcdr1 = 0,
    Xml = 1,
    Xcdr2 = 2,
}

/// Policies advertised by a discovered reader or writer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QosAttributes {
    pub reliability: Option<Reliability>,
    pub durability: Option<Durability>,
    pub presentation: Option<Presentation>,
    #[serde(with = "opt_millis")]
    pub deadline: Option<Duration>,
    #[serde(with = "opt_millis")]
    pub latency_budget: Option<Duration>,
    pub ownership: Option<OwnershipKind>,
    pub liveliness: Option<Liveliness>,
    pub destination_order: Option<DestinationOrderKind>,
    /// Partition name patterns; empty means the default partition.
    pub partition: Vec<String>,
    /// Advertised encodings; an advertised empty list means `[Xcdr1]`.
    pub data_representation: Option<Vec<DataRepresentation>>,
}

impl QosAttributes {
    /// Attribute set with no policies announced.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_effort() -> Self {
        Self::new().reliability(Reliability::BestEffort)
    }

    pub fn reliable() -> Self {
        Self::new().reliability(Reliability::Reliable)
    }

    pub fn reliability(mut self, kind: Reliability) -> Self {
        self.reliability = Some(kind);
        self
    }

    pub fn durability(mut self, kind: Durability) -> Self {
        self.durability = Some(kind);
        self
    }

    pub fn transient_local(self) -> Self {
        self.durability(Durability::TransientLocal)
    }

    pub fn presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = Some(presentation);
        self
    }

    pub fn deadline(mut self, period: Duration) -> Self {
        self.deadline = Some(period);
        self
    }

    pub fn latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = Some(budget);
        self
    }

    pub fn ownership(mut self, kind: OwnershipKind) -> Self {
        self.ownership = Some(kind);
        self
    }

    pub fn liveliness(mut self, liveliness: Liveliness) -> Self {
        self.liveliness = Some(liveliness);
        self
    }

    pub fn destination_order(mut self, kind: DestinationOrderKind) -> Self {
        self.destination_order = Some(kind);
        self
    }

    pub fn partition<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.partition = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn data_representation(mut self, ids: &[DataRepresentation]) -> Self {
        self.data_representation = Some(ids.to_vec());
        self
    }
}

fn infinite() -> Duration {
    Duration::MAX
}

fn duration_to_millis(d: Duration) -> u64 {
    if d == Duration::MAX {
        u64::MAX
    } else {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
    }
}

fn millis_to_duration(ms: u64) -> Duration {
    if ms == u64::MAX {
        Duration::MAX
    } else {
        Duration::from_millis(ms)
    }
}

/// `Duration` as integer milliseconds (`u64::MAX` = infinite).
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(super::duration_to_millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(super::millis_to_duration)
    }
}

/// `Option<Duration>` as optional integer milliseconds.
mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&super::duration_to_millis(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(super::millis_to_duration))
    }
}
