// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain supervisor: lifecycle owner of the dispatcher and every aggregator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Command::Discovery   ┌────────────────────────────┐
//! │ agg-<domain> │ ────────────────────> │                            │
//! └──────────────┘                       │        dispatch thread     │
//! ┌──────────────┐                       │  BTreeMap<u32, DomainGraph>│ ──> subscribers
//! │ agg-<domain> │ ────────────────────> │                            │
//! └──────────────┘                       └────────────────────────────┘
//!                                          ^  AddDomain / RemoveDomain
//!       DomainSupervisor ──────────────────┘  Subscribe / Inspect (queries)
//! ```
//!
//! Subscribers run on the dispatcher thread and must not call back into the
//! supervisor synchronously.

use crate::config::TopologyConfig;
use crate::discovery::aggregator::{self, AggregatorConfig};
use crate::discovery::{
    AggregatorHandle, AggregatorStats, DiscoveryFeed, FeedProvider, NoFeedProvider, TopicFilter,
};
use crate::dispatcher::{self, Command, DispatcherStats, EventDispatcher, Notification, Subscriber};
use crate::error::{Result, TopologyError};
use crate::graph::{DomainGraph, TopicSummary};
use crate::guid::Guid;
use crate::model::{Direction, Endpoint, Participant};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Counters of the dispatcher and of each supervised domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub dispatcher: DispatcherStats,
    pub aggregators: BTreeMap<u32, AggregatorStats>,
}

#[derive(Default)]
struct Inner {
    dispatcher: Option<EventDispatcher>,
    aggregators: BTreeMap<u32, AggregatorHandle>,
    /// Domains whose graph is not dropped yet by an in-flight `remove_domain`.
    removing: BTreeSet<u32>,
}

/// Supervises discovery of a set of domains.
///
/// # Examples
///
/// ```
/// use hdds_topology::{ChannelFeed, DomainSupervisor, TopologyConfig};
///
/// let supervisor = DomainSupervisor::new(TopologyConfig::default()).unwrap();
/// supervisor.start().unwrap();
///
/// let (_sender, feed) = ChannelFeed::new();
/// supervisor.add_domain_with_feed(0, feed).unwrap();
/// assert_eq!(supervisor.domains(), vec![0]);
///
/// supervisor.stop();
/// ```
pub struct DomainSupervisor {
    config: TopologyConfig,
    provider: Box<dyn FeedProvider>,
    filter: TopicFilter,
    inner: Mutex<Inner>,
}

impl DomainSupervisor {
    /// Supervisor whose domains are all added with an explicit feed.
    pub fn new(config: TopologyConfig) -> Result<Self> {
        Self::with_provider(config, NoFeedProvider)
    }

    /// Supervisor opening feeds for [`add_domain`](Self::add_domain) through `provider`.
    pub fn with_provider(config: TopologyConfig, provider: impl FeedProvider + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: TopicFilter::from_config(&config),
            config,
            provider: Box::new(provider),
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Spawn the dispatcher thread.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.dispatcher.is_some() {
            return Err(TopologyError::AlreadyRunning);
        }
        let dispatcher = EventDispatcher::spawn(self.config.dispatcher_thread_name())
            .map_err(TopologyError::ThreadSpawn)?;
        inner.dispatcher = Some(dispatcher);
        log::info!("[TOPO-DISPATCH] supervisor started");
        Ok(())
    }

    /// Stop and join every aggregator, then the dispatcher. Idempotent.
    pub fn stop(&self) {
        let (aggregators, dispatcher) = {
            let mut inner = self.inner.lock();
            (
                std::mem::take(&mut inner.aggregators),
                inner.dispatcher.take(),
            )
        };

        for (_, mut handle) in aggregators {
            handle.stop();
        }
        if let Some(mut dispatcher) = dispatcher {
            dispatcher.shutdown();
            log::info!("[TOPO-DISPATCH] supervisor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().dispatcher.is_some()
    }

    /// Start supervising a domain with a feed from the configured provider.
    pub fn add_domain(&self, domain_id: u32) -> Result<()> {
        {
            let inner = self.inner.lock();
            Self::check_can_add(&inner, domain_id)?;
        }
        let feed = self.provider.open(domain_id)?;
        self.attach(domain_id, feed)
    }

    /// Start supervising a domain with an explicit feed.
    pub fn add_domain_with_feed<F>(&self, domain_id: u32, feed: F) -> Result<()>
    where
        F: DiscoveryFeed + 'static,
    {
        self.attach(domain_id, Box::new(feed))
    }

    fn check_can_add(inner: &Inner, domain_id: u32) -> Result<()> {
        if inner.dispatcher.is_none() {
            return Err(TopologyError::NotRunning);
        }
        if inner.aggregators.contains_key(&domain_id) || inner.removing.contains(&domain_id) {
            return Err(TopologyError::DomainExists(domain_id));
        }
        Ok(())
    }

    fn attach(&self, domain_id: u32, feed: Box<dyn DiscoveryFeed>) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_can_add(&inner, domain_id)?;
        let tx = Self::dispatcher_tx(&inner)?;

        // Graph first, so the first batch never races its domain.
        if tx.send(Command::AddDomain(domain_id)).is_err() {
            return Err(TopologyError::DispatcherStopped);
        }

        let config = AggregatorConfig {
            domain_id,
            poll_interval: self.config.poll_interval(),
            filter: self.filter.clone(),
            thread_name: self.config.aggregator_thread_name(domain_id),
        };
        match aggregator::spawn(config, feed, tx.clone()) {
            Ok(handle) => {
                inner.aggregators.insert(domain_id, handle);
                Ok(())
            }
            Err(err) => {
                let _ = tx.send(Command::RemoveDomain(domain_id));
                Err(TopologyError::ThreadSpawn(err))
            }
        }
    }

    /// Stop a domain's aggregator and drop its graph.
    ///
    /// No notification for the domain is emitted once this returns. Until
    /// then, adding the same domain fails with [`TopologyError::DomainExists`].
    pub fn remove_domain(&self, domain_id: u32) -> Result<()> {
        let (mut handle, tx) = {
            let mut inner = self.inner.lock();
            let tx = Self::dispatcher_tx(&inner)?;
            let handle = inner
                .aggregators
                .remove(&domain_id)
                .ok_or(TopologyError::UnknownDomain(domain_id))?;
            inner.removing.insert(domain_id);
            (handle, tx)
        };

        handle.stop();
        let removed = if tx.send(Command::RemoveDomain(domain_id)).is_err() {
            Err(TopologyError::DispatcherStopped)
        } else {
            // Wait until the graph is gone so late notifications cannot follow.
            dispatcher::query(&tx, |_| ()).ok_or(TopologyError::DispatcherStopped)
        };

        self.inner.lock().removing.remove(&domain_id);
        removed
    }

    /// Supervised domain ids, ascending.
    pub fn domains(&self) -> Vec<u32> {
        self.inner.lock().aggregators.keys().copied().collect()
    }

    /// Domains whose aggregator is still polling its feed.
    pub fn active_feeds(&self) -> Vec<u32> {
        self.inner
            .lock()
            .aggregators
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(domain_id, _)| *domain_id)
            .collect()
    }

    /// Register a notification subscriber.
    pub fn subscribe(&self, subscriber: impl Subscriber + 'static) -> Result<()> {
        let tx = Self::dispatcher_tx(&self.inner.lock())?;
        tx.send(Command::Subscribe(Box::new(subscriber)))
            .map_err(|_| TopologyError::DispatcherStopped)
    }

    /// Register a channel subscriber and return its receiving end.
    pub fn subscribe_channel(&self) -> Result<Receiver<Notification>> {
        let (tx, rx) = channel::unbounded::<Notification>();
        self.subscribe(tx)?;
        Ok(rx)
    }

    /// Return once every event enqueued before the call has been applied and notified.
    pub fn flush(&self) -> Result<()> {
        self.query(|_| ())
    }

    pub fn stats(&self) -> SupervisorStats {
        let inner = self.inner.lock();
        SupervisorStats {
            dispatcher: inner
                .dispatcher
                .as_ref()
                .map(EventDispatcher::stats)
                .unwrap_or_default(),
            aggregators: inner
                .aggregators
                .iter()
                .map(|(domain_id, handle)| (*domain_id, handle.stats()))
                .collect(),
        }
    }

    // ========================================================================
    // Queries (marshaled onto the dispatcher thread)
    // ========================================================================

    /// Endpoints of one direction on a topic. Unknown domain or topic: empty.
    pub fn query_endpoints(
        &self,
        domain_id: u32,
        topic: &str,
        direction: Direction,
    ) -> Result<Vec<Endpoint>> {
        let topic = topic.to_string();
        self.query_domain(domain_id, move |graph| graph.endpoints(&topic, direction))
    }

    pub fn query_endpoints_by_participant(
        &self,
        domain_id: u32,
        participant: Guid,
    ) -> Result<Vec<Endpoint>> {
        self.query_domain(domain_id, move |graph| {
            graph.endpoints_by_participant(&participant)
        })
    }

    pub fn query_topics(&self, domain_id: u32) -> Result<Vec<TopicSummary>> {
        self.query_domain(domain_id, DomainGraph::topics)
    }

    pub fn query_participants(&self, domain_id: u32) -> Result<Vec<Participant>> {
        self.query_domain(domain_id, DomainGraph::participants)
    }

    /// Endpoints involved in a QoS mismatch on `topic`.
    pub fn query_mismatches(&self, domain_id: u32, topic: &str) -> Result<Vec<Guid>> {
        let topic = topic.to_string();
        self.query_domain(domain_id, move |graph| graph.mismatched_endpoints(&topic))
    }

    fn query_domain<R, F>(&self, domain_id: u32, f: F) -> Result<R>
    where
        R: Default + Send + 'static,
        F: FnOnce(&DomainGraph) -> R + Send + 'static,
    {
        self.query(move |graphs| graphs.get(&domain_id).map(f).unwrap_or_default())
    }

    fn query<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&BTreeMap<u32, DomainGraph>) -> R + Send + 'static,
    {
        // Release the lock before blocking on the reply.
        let tx = Self::dispatcher_tx(&self.inner.lock())?;
        dispatcher::query(&tx, f).ok_or(TopologyError::DispatcherStopped)
    }

    fn dispatcher_tx(inner: &Inner) -> Result<Sender<Command>> {
        inner
            .dispatcher
            .as_ref()
            .map(EventDispatcher::sender)
            .ok_or(TopologyError::NotRunning)
    }
}

impl Drop for DomainSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
