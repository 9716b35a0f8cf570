// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-domain discovery graph.
//!
//! Owns the topic registries, the participant table, the endpoint -> topic
//! reverse index and the updates waiting for their participant. Every method
//! runs on the dispatcher thread; there is no interior locking.

mod topic;


pub use topic::TopicRegistry;

use crate::guid::Guid;
use crate::model::{Direction, Endpoint, Participant, ParticipantUpdate};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Outcome of [`DomainGraph::add_endpoint`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointAdded {
    /// The topic registry did not exist before this endpoint.
    pub topic_created: bool,
    /// Updated mismatched-endpoint list, present only if some entry changed.
    pub mismatches: Option<Vec<Guid>>,
    /// The endpoint was previously registered on another topic and moved.
    pub relocated: Option<EndpointRemoved>,
}

/// Outcome of [`DomainGraph::remove_endpoint`].
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointRemoved {
    pub topic_name: String,
    /// The registry became empty and was deleted.
    pub topic_removed: bool,
    /// Remaining mismatched endpoints on the topic (empty if none or removed).
    pub mismatches: Vec<Guid>,
}

/// Read-only summary of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    pub name: String,
    pub type_names: Vec<String>,
    pub reader_count: usize,
    pub writer_count: usize,
    pub mismatched_endpoints: usize,
}

/// Discovery graph of a single domain.
#[derive(Debug, Clone)]
pub struct DomainGraph {
    domain_id: u32,
    topics: IndexMap<String, TopicRegistry>,
    participants: IndexMap<Guid, Participant>,
    endpoint_topics: HashMap<Guid, String>,
    pending_updates: HashMap<Guid, ParticipantUpdate>,
}

impl DomainGraph {
    pub fn new(domain_id: u32) -> Self {
        Self {
            domain_id,
            topics: IndexMap::new(),
            participants: IndexMap::new(),
            endpoint_topics: HashMap::new(),
            pending_updates: HashMap::new(),
        }
    }

    pub fn domain_id(&self) -> u32 {
        self.domain_id
    }

    // ========================================================================
    // Participants
    // ========================================================================

    /// Insert or overwrite a participant. Returns true if it was not known.
    ///
    /// A pending update for the key is merged immediately, and endpoints
    /// already owned by the key get the participant linked in.
    pub fn add_participant(&mut self, mut participant: Participant) -> bool {
        let key = participant.key;
        if let Some(update) = self.pending_updates.remove(&key) {
            log::debug!(
                "[TOPO-GRAPH] domain={} resolved pending update for {}",
                self.domain_id,
                key
            );
            participant.merge(&update);
        }

        self.link_participant(&participant);
        self.participants.insert(key, participant).is_none()
    }

    /// Merge an update into a known participant, or park it until the
    /// participant arrives (later updates for the same key are folded in).
    pub fn update_participant(&mut self, update: ParticipantUpdate) -> Option<Participant> {
        let Some(participant) = self.participants.get_mut(&update.key) else {
            log::debug!(
                "[TOPO-GRAPH] domain={} update for unknown participant {} kept pending",
                self.domain_id,
                update.key
            );
            match self.pending_updates.get_mut(&update.key) {
                Some(pending) => pending.absorb(update),
                None => {
                    self.pending_updates.insert(update.key, update);
                }
            }
            return None;
        };

        participant.merge(&update);
        let merged = participant.clone();
        self.link_participant(&merged);
        Some(merged)
    }

    /// Forget a participant and any pending update for it.
    ///
    /// Endpoints are not removed; only their participant snapshot is cleared.
    pub fn remove_participant(&mut self, key: &Guid) -> Option<Participant> {
        self.pending_updates.remove(key);
        let removed = self.participants.shift_remove(key);
        if removed.is_none() {
            log::debug!(
                "[TOPO-GRAPH] domain={} remove of unknown participant {}",
                self.domain_id,
                key
            );
            return None;
        }

        for endpoint in self.owned_endpoints_mut(key) {
            endpoint.participant = None;
        }
        removed
    }

    fn link_participant(&mut self, participant: &Participant) {
        for endpoint in self.owned_endpoints_mut(&participant.key) {
            endpoint.participant = Some(participant.clone());
        }
    }

    fn owned_endpoints_mut<'a>(
        &'a mut self,
        owner: &'a Guid,
    ) -> impl Iterator<Item = &'a mut Endpoint> + 'a {
        self.topics
            .values_mut()
            .flat_map(TopicRegistry::endpoints_mut)
            .filter(move |e| e.participant_key.as_ref() == Some(owner))
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// Register (or re-announce) an endpoint on its topic.
    pub fn add_endpoint(&mut self, mut endpoint: Endpoint) -> EndpointAdded {
        let key = endpoint.key;
        let mut outcome = EndpointAdded::default();

        if let Some(previous) = self.endpoint_topics.get(&key) {
            if *previous != endpoint.topic_name {
                log::debug!(
                    "[TOPO-GRAPH] domain={} endpoint {} moved from '{}' to '{}'",
                    self.domain_id,
                    key,
                    previous,
                    endpoint.topic_name
                );
                outcome.relocated = self.remove_endpoint(&key);
            }
        }
        self.endpoint_topics.insert(key, endpoint.topic_name.clone());

        endpoint.participant = endpoint
            .participant_key
            .and_then(|owner| self.participants.get(&owner).cloned());

        let topic_name = endpoint.topic_name.clone();
        let topic = self.topics.entry(topic_name.clone()).or_insert_with(|| {
            outcome.topic_created = true;
            TopicRegistry::new(topic_name)
        });

        if topic.add_endpoint(endpoint) {
            outcome.mismatches = Some(topic.list_mismatched_endpoint_keys());
        }
        outcome
    }

    /// Unregister an endpoint. Unknown keys return `None`.
    pub fn remove_endpoint(&mut self, key: &Guid) -> Option<EndpointRemoved> {
        let Some(topic_name) = self.endpoint_topics.remove(key) else {
            log::debug!(
                "[TOPO-GRAPH] domain={} remove of unknown endpoint {}",
                self.domain_id,
                key
            );
            return None;
        };
        let Some(topic) = self.topics.get_mut(&topic_name) else {
            log::debug!(
                "[TOPO-GRAPH] domain={} endpoint {} indexed on missing topic '{}'",
                self.domain_id,
                key,
                topic_name
            );
            return None;
        };

        if topic.remove_endpoint(key) {
            self.topics.shift_remove(&topic_name);
            return Some(EndpointRemoved {
                topic_name,
                topic_removed: true,
                mismatches: Vec::new(),
            });
        }

        let mismatches = topic.list_mismatched_endpoint_keys();
        Some(EndpointRemoved {
            topic_name,
            topic_removed: false,
            mismatches,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Endpoints of one direction on a topic, in discovery order.
    pub fn endpoints(&self, topic: &str, direction: Direction) -> Vec<Endpoint> {
        let Some(registry) = self.topics.get(topic) else {
            return Vec::new();
        };
        match direction {
            Direction::Reader => registry.readers().cloned().collect(),
            Direction::Writer => registry.writers().cloned().collect(),
        }
    }

    /// Every endpoint whose owner key is `participant`.
    pub fn endpoints_by_participant(&self, participant: &Guid) -> Vec<Endpoint> {
        self.topics
            .values()
            .flat_map(TopicRegistry::endpoints)
            .filter(|e| e.participant_key.as_ref() == Some(participant))
            .cloned()
            .collect()
    }

    pub fn topic(&self, name: &str) -> Option<&TopicRegistry> {
        self.topics.get(name)
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    pub fn topics(&self) -> Vec<TopicSummary> {
        self.topics
            .values()
            .map(|registry| {
                let type_names: BTreeSet<String> = registry
                    .endpoints()
                    .map(|e| e.type_name.clone())
                    .filter(|name| !name.is_empty())
                    .collect();
                TopicSummary {
                    name: registry.name().to_string(),
                    type_names: type_names.into_iter().collect(),
                    reader_count: registry.reader_count(),
                    writer_count: registry.writer_count(),
                    mismatched_endpoints: registry.list_mismatched_endpoint_keys().len(),
                }
            })
            .collect()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }

    pub fn participant(&self, key: &Guid) -> Option<&Participant> {
        self.participants.get(key)
    }

    pub fn endpoint(&self, key: &Guid) -> Option<&Endpoint> {
        let topic = self.endpoint_topics.get(key)?;
        self.topics.get(topic)?.endpoint(key)
    }

    /// Endpoints currently involved in a mismatch on `topic`.
    pub fn mismatched_endpoints(&self, topic: &str) -> Vec<Guid> {
        self.topics
            .get(topic)
            .map(TopicRegistry::list_mismatched_endpoint_keys)
            .unwrap_or_default()
    }

    pub fn pending_update_count(&self) -> usize {
        self.pending_updates.len()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoint_topics.len()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}
