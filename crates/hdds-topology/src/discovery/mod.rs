// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery feeds and per-domain aggregation.
//!
//! A [`DiscoveryFeed`] is the source of raw discovery events for one domain
//! (built-in topic readers, a capture file, a test channel...). The
//! aggregator thread polls it with a bounded wait, filters out built-in
//! topic endpoints and forwards non-empty batches to the dispatcher.

pub mod aggregator;
pub mod channel_feed;

pub use aggregator::{AggregatorHandle, AggregatorStats};
pub use channel_feed::{ChannelFeed, FeedSender};

use crate::config::TopologyConfig;
use crate::guid::Guid;
use crate::model::{Endpoint, Participant, ParticipantUpdate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Names of the DDS built-in discovery topics.
pub const BUILTIN_TOPIC_NAMES: &[&str] = &[
    "DCPSParticipant",
    "DCPSPublication",
    "DCPSSubscription",
    "DCPSTopic",
    "DCPSParticipantMessage",
    "DCPSParticipantStatelessMessage",
    "DCPSParticipantVolatileMessageSecure",
    "DCPSParticipantSecure",
    "DCPSPublicationsSecure",
    "DCPSSubscriptionsSecure",
    "DCPSParticipantMessageSecure",
    "DCPSTypeLookupRequest",
    "DCPSTypeLookupReply",
];

pub fn is_builtin_topic(name: &str) -> bool {
    BUILTIN_TOPIC_NAMES.contains(&name)
}

/// A single discovery observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    ParticipantArrived(Participant),
    ParticipantDisposed { key: Guid },
    ParticipantUpdated(ParticipantUpdate),
    EndpointArrived(Endpoint),
    EndpointDisposed { key: Guid },
}

impl DiscoveryEvent {
    /// Key of the entity the event is about.
    pub fn key(&self) -> Guid {
        match self {
            Self::ParticipantArrived(p) => p.key,
            Self::ParticipantUpdated(u) => u.key,
            Self::EndpointArrived(e) => e.key,
            Self::ParticipantDisposed { key } | Self::EndpointDisposed { key } => *key,
        }
    }
}

/// Discovery event stamped with its source time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub timestamp: SystemTime,
    pub event: DiscoveryEvent,
}

impl FeedEvent {
    pub fn new(event: DiscoveryEvent) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event,
        }
    }

    pub fn at(timestamp: SystemTime, event: DiscoveryEvent) -> Self {
        Self { timestamp, event }
    }
}

/// Errors reported by a discovery feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Recoverable failure; the aggregator logs it and keeps polling.
    #[error("transient feed error: {0}")]
    Transient(String),

    /// The feed has no more events; the aggregator stops.
    #[error("feed closed")]
    Closed,

    /// A feed could not be created for the domain.
    #[error("cannot open feed for domain {domain_id}: {reason}")]
    Open { domain_id: u32, reason: String },
}

/// Source of discovery events for one domain.
pub trait DiscoveryFeed: Send {
    /// Block up to `timeout` and return whatever events arrived.
    ///
    /// An empty vector is a normal timeout.
    fn wait(&mut self, timeout: Duration) -> Result<Vec<FeedEvent>, FeedError>;
}

/// Creates the feed for a domain when it is added to the supervisor.
pub trait FeedProvider: Send + Sync {
    fn open(&self, domain_id: u32) -> Result<Box<dyn DiscoveryFeed>, FeedError>;
}

impl<F> FeedProvider for F
where
    F: Fn(u32) -> Result<Box<dyn DiscoveryFeed>, FeedError> + Send + Sync,
{
    fn open(&self, domain_id: u32) -> Result<Box<dyn DiscoveryFeed>, FeedError> {
        self(domain_id)
    }
}

/// Provider for supervisors whose domains are all added with an explicit feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedProvider;

impl FeedProvider for NoFeedProvider {
    fn open(&self, domain_id: u32) -> Result<Box<dyn DiscoveryFeed>, FeedError> {
        Err(FeedError::Open {
            domain_id,
            reason: "no feed provider configured".to_string(),
        })
    }
}

/// Drops endpoint announcements for topics that are not user data.
///
/// The built-in discovery topics are always dropped; `ignored` adds to them.
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    ignored: HashSet<String>,
}

impl TopicFilter {
    pub fn new(ignored: impl IntoIterator<Item = String>) -> Self {
        Self {
            ignored: ignored.into_iter().collect(),
        }
    }

    pub fn from_config(config: &TopologyConfig) -> Self {
        Self::new(config.ignored_topics.iter().cloned())
    }

    pub fn is_filtered(&self, topic_name: &str) -> bool {
        is_builtin_topic(topic_name) || self.ignored.contains(topic_name)
    }

    /// True if the event should reach the graph.
    pub fn accepts(&self, event: &DiscoveryEvent) -> bool {
        match event {
            DiscoveryEvent::EndpointArrived(endpoint) => !self.is_filtered(&endpoint.topic_name),
            _ => true,
        }
    }
}
