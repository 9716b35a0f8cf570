// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic reader/writer registry with symmetric mismatch bookkeeping.

use crate::guid::Guid;
use crate::model::{Direction, Endpoint};
use crate::qos::check_compatibility;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Readers and writers discovered on one topic.
///
/// Each endpoint carries the mismatch entries against its opposite-direction
/// peers; the registry keeps both halves of every pair identical.
#[derive(Debug, Clone)]
pub struct TopicRegistry {
    name: String,
    readers: IndexMap<Guid, Endpoint>,
    writers: IndexMap<Guid, Endpoint>,
}

impl TopicRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readers: IndexMap::new(),
            writers: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn readers(&self) -> impl Iterator<Item = &Endpoint> {
        self.readers.values()
    }

    pub fn writers(&self) -> impl Iterator<Item = &Endpoint> {
        self.writers.values()
    }

    /// Readers then writers, each in discovery order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.readers.values().chain(self.writers.values())
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty() && self.writers.is_empty()
    }

    pub fn contains(&self, key: &Guid) -> bool {
        self.readers.contains_key(key) || self.writers.contains_key(key)
    }

    pub fn endpoint(&self, key: &Guid) -> Option<&Endpoint> {
        self.readers.get(key).or_else(|| self.writers.get(key))
    }

    pub(crate) fn endpoints_mut(&mut self) -> impl Iterator<Item = &mut Endpoint> {
        self.readers.values_mut().chain(self.writers.values_mut())
    }

    fn side(&self, direction: Direction) -> &IndexMap<Guid, Endpoint> {
        match direction {
            Direction::Reader => &self.readers,
            Direction::Writer => &self.writers,
        }
    }

    fn sides_mut(
        &mut self,
        direction: Direction,
    ) -> (&mut IndexMap<Guid, Endpoint>, &mut IndexMap<Guid, Endpoint>) {
        match direction {
            Direction::Reader => (&mut self.readers, &mut self.writers),
            Direction::Writer => (&mut self.writers, &mut self.readers),
        }
    }

    /// Insert or refresh an endpoint and rescan it against every opposite peer.
    ///
    /// Returns true if any mismatch entry changed (on either side of a pair).
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> bool {
        let key = endpoint.key;
        let direction = endpoint.direction;
        let mut changed = false;

        // Direction flip: drop the stale opposite entry first.
        if self.side(direction.opposite()).contains_key(&key) {
            let had_mismatches = self
                .endpoint(&key)
                .map(Endpoint::has_mismatches)
                .unwrap_or(false);
            self.remove_endpoint(&key);
            changed |= had_mismatches;
        }

        let (own, peers) = match direction {
            Direction::Reader => (&mut self.readers, &mut self.writers),
            Direction::Writer => (&mut self.writers, &mut self.readers),
        };

        let slot = match own.get_full_mut(&key) {
            Some((index, _, existing)) => {
                let mismatches = std::mem::take(&mut existing.mismatches);
                *existing = endpoint;
                existing.mismatches = mismatches;
                index
            }
            None => own.insert_full(key, endpoint).0,
        };
        let Some((_, current)) = own.get_index_mut(slot) else {
            return changed;
        };

        for peer in peers.values_mut() {
            let kinds = match direction {
                Direction::Reader => check_compatibility(current.match_side(), peer.match_side()),
                Direction::Writer => check_compatibility(peer.match_side(), current.match_side()),
            };
            if !kinds.is_empty() {
                log::debug!(
                    "[MATCH-QOS] topic={} {} {} vs {}: {:?}",
                    self.name,
                    direction,
                    key,
                    peer.key,
                    kinds
                );
            }
            changed |= current.set_mismatch(peer.key, &kinds);
            changed |= peer.set_mismatch(key, &kinds);
        }

        changed
    }

    /// Remove an endpoint and purge its entries from every peer.
    ///
    /// Returns true if the registry is now empty. Unknown keys are a no-op.
    pub fn remove_endpoint(&mut self, key: &Guid) -> bool {
        let removed = self
            .readers
            .shift_remove(key)
            .or_else(|| self.writers.shift_remove(key));

        if let Some(endpoint) = removed {
            let (_, peers) = self.sides_mut(endpoint.direction);
            for peer_key in endpoint.mismatches.keys() {
                if let Some(peer) = peers.get_mut(peer_key) {
                    peer.mismatches.shift_remove(key);
                }
            }
        }

        self.is_empty()
    }

    /// Keys of every endpoint listed in some mismatch entry, first-seen order.
    pub fn list_mismatched_endpoint_keys(&self) -> Vec<Guid> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for endpoint in self.endpoints() {
            for peer in endpoint.mismatches.keys() {
                if seen.insert(*peer) {
                    keys.push(*peer);
                }
            }
        }
        keys
    }
}
