// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS Topology - live DDS discovery graph
//!
//! Tracks the participants, topics, readers and writers discovered in one or
//! more DDS domains, and flags every reader/writer pair whose QoS policies
//! are incompatible under the DDS "requested vs offered" rules.
//!
//! ## Quick Start
//!
//! ```rust
//! use hdds_topology::{ChannelFeed, DomainSupervisor, Endpoint, Guid, Notification,
//!     QosAttributes, TopologyConfig};
//!
//! let supervisor = DomainSupervisor::new(TopologyConfig::default()).unwrap();
//! supervisor.start().unwrap();
//! let notifications = supervisor.subscribe_channel().unwrap();
//!
//! let (feed_tx, feed) = ChannelFeed::new();
//! supervisor.add_domain_with_feed(0, feed).unwrap();
//!
//! let writer = Guid::new([1; 12], [0, 0, 1, 0x02]);
//! let reader = Guid::new([2; 12], [0, 0, 1, 0x07]);
//! feed_tx.endpoint_arrived(
//!     Endpoint::writer(writer, "chatter", "String").with_qos(QosAttributes::best_effort()),
//! );
//! feed_tx.endpoint_arrived(
//!     Endpoint::reader(reader, "chatter", "String").with_qos(QosAttributes::reliable()),
//! );
//!
//! let mismatch = notifications
//!     .iter()
//!     .find(|n| matches!(n, Notification::MismatchesChanged { .. }));
//! assert!(mismatch.is_some());
//!
//! supervisor.stop();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  DomainSupervisor        start / stop / add_domain / queries        |
//! +---------------------------------------------------------------------+
//! |  Aggregators (1/domain)  DiscoveryFeed::wait -> filter -> batch     |
//! +---------------------------------------------------------------------+
//! |  EventDispatcher         apply event -> notify subscribers          |
//! +---------------------------------------------------------------------+
//! |  DomainGraph             topics, participants, pending updates      |
//! |  TopicRegistry           readers/writers + symmetric mismatches     |
//! +---------------------------------------------------------------------+
//! |  qos                     RxO compatibility checker, partitions      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`qos`] - QoS attribute sets, compatibility checker, partition matcher
//! - [`graph`] - Per-domain graph and per-topic registries
//! - [`discovery`] - Discovery feeds and the per-domain aggregator
//! - [`dispatcher`] - Notifications and the dispatcher thread
//! - [`supervisor`] - Lifecycle and queries

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod guid;
pub mod model;
pub mod qos;
pub mod supervisor;

pub use config::{ConfigError, TopologyConfig};
pub use discovery::{
    AggregatorStats, ChannelFeed, DiscoveryEvent, DiscoveryFeed, FeedError, FeedEvent,
    FeedProvider, FeedSender, TopicFilter,
};
pub use dispatcher::{apply_event, DispatcherStats, Notification, Subscriber};
pub use error::{Result, TopologyError};
pub use graph::{DomainGraph, EndpointAdded, EndpointRemoved, TopicRegistry, TopicSummary};
pub use guid::{Guid, GuidParseError};
pub use model::{Direction, Endpoint, Participant, ParticipantUpdate, Properties};
pub use qos::{check_compatibility, partitions_match, MatchSide, MismatchKind, QosAttributes};
pub use supervisor::{DomainSupervisor, SupervisorStats};
