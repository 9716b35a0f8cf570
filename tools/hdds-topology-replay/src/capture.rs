// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON-lines discovery captures.
//!
//! One record per line:
//!
//! ```text
//! {"domain":0,"kind":"participant_arrived","participant_key":"01.02...c1","properties":{"hostname":"rig-1"}}
//! {"domain":0,"kind":"endpoint_arrived","endpoint_key":"01.02...02","participant_key":"01.02...c1",
//!  "topic_name":"chatter","direction":"writer","type_name":"String","qos":{"reliability":"best_effort"}}
//! {"domain":0,"kind":"endpoint_disposed","endpoint_key":"01.02...02"}
//! ```
//!
//! Blank lines are skipped.

use hdds_topology::{
    DiscoveryEvent, DiscoveryFeed, Direction, Endpoint, FeedError, FeedEvent, Guid, Participant,
    ParticipantUpdate, Properties, QosAttributes,
};
use serde::Deserialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot read capture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {kind} record without '{field}'")]
    MissingField {
        line: usize,
        kind: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordKind {
    ParticipantArrived,
    ParticipantDisposed,
    ParticipantUpdated,
    EndpointArrived,
    EndpointDisposed,
}

impl RecordKind {
    fn name(self) -> &'static str {
        match self {
            Self::ParticipantArrived => "participant_arrived",
            Self::ParticipantDisposed => "participant_disposed",
            Self::ParticipantUpdated => "participant_updated",
            Self::EndpointArrived => "endpoint_arrived",
            Self::EndpointDisposed => "endpoint_disposed",
        }
    }
}

/// One line of a capture, as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRecord {
    domain: u32,
    timestamp_ms: Option<u64>,
    kind: RecordKind,
    participant_key: Option<Guid>,
    endpoint_key: Option<Guid>,
    topic_name: Option<String>,
    direction: Option<Direction>,
    type_name: Option<String>,
    type_id: Option<Vec<u8>>,
    qos: Option<QosAttributes>,
    properties: Option<Properties>,
}

impl CaptureRecord {
    pub fn domain(&self) -> u32 {
        self.domain
    }

    /// Validate the record into a typed event; `line` is used for error reporting.
    pub fn into_feed_event(self, line: usize) -> Result<FeedEvent, CaptureError> {
        let kind = self.kind;
        let missing = |field| CaptureError::MissingField {
            line,
            kind: kind.name(),
            field,
        };

        let timestamp = self
            .timestamp_ms
            .map_or_else(SystemTime::now, |ms| UNIX_EPOCH + Duration::from_millis(ms));
        let properties = self.properties.unwrap_or_default();

        let event = match kind {
            RecordKind::ParticipantArrived => {
                let key = self.participant_key.ok_or_else(|| missing("participant_key"))?;
                DiscoveryEvent::ParticipantArrived(Participant { key, properties })
            }
            RecordKind::ParticipantUpdated => {
                let key = self.participant_key.ok_or_else(|| missing("participant_key"))?;
                DiscoveryEvent::ParticipantUpdated(ParticipantUpdate { key, properties })
            }
            RecordKind::ParticipantDisposed => DiscoveryEvent::ParticipantDisposed {
                key: self.participant_key.ok_or_else(|| missing("participant_key"))?,
            },
            RecordKind::EndpointArrived => {
                let key = self.endpoint_key.ok_or_else(|| missing("endpoint_key"))?;
                let topic_name = self.topic_name.ok_or_else(|| missing("topic_name"))?;
                let direction = self.direction.ok_or_else(|| missing("direction"))?;

                let mut endpoint =
                    Endpoint::new(key, direction, topic_name, self.type_name.unwrap_or_default())
                        .with_qos(self.qos.unwrap_or_default());
                endpoint.participant_key = self.participant_key;
                endpoint.type_id = self.type_id;
                DiscoveryEvent::EndpointArrived(endpoint)
            }
            RecordKind::EndpointDisposed => DiscoveryEvent::EndpointDisposed {
                key: self.endpoint_key.ok_or_else(|| missing("endpoint_key"))?,
            },
        };
        Ok(FeedEvent::at(timestamp, event))
    }
}

/// Parse capture text into per-domain event lists, in file order.
pub fn parse_capture(text: &str) -> Result<BTreeMap<u32, Vec<FeedEvent>>, CaptureError> {
    let mut domains: BTreeMap<u32, Vec<FeedEvent>> = BTreeMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let record: CaptureRecord =
            serde_json::from_str(raw).map_err(|source| CaptureError::Parse { line, source })?;
        let domain = record.domain();
        domains
            .entry(domain)
            .or_default()
            .push(record.into_feed_event(line)?);
    }
    Ok(domains)
}

pub fn load_capture(path: &Path) -> Result<BTreeMap<u32, Vec<FeedEvent>>, CaptureError> {
    let text = std::fs::read_to_string(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_capture(&text)
}

/// Replays a recorded domain in fixed-size batches, then reports `Closed`.
pub struct CaptureFeed {
    events: VecDeque<FeedEvent>,
    batch: usize,
}

impl CaptureFeed {
    pub fn new(events: Vec<FeedEvent>, batch: usize) -> Self {
        Self {
            events: events.into(),
            batch: batch.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl DiscoveryFeed for CaptureFeed {
    fn wait(&mut self, _timeout: Duration) -> Result<Vec<FeedEvent>, FeedError> {
        if self.events.is_empty() {
            return Err(FeedError::Closed);
        }
        let n = self.batch.min(self.events.len());
        Ok(self.events.drain(..n).collect())
    }
}
