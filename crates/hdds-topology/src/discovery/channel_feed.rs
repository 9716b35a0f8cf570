// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process discovery feed backed by a crossbeam channel.
//!
//! Embedders that already receive discovery data (their own built-in topic
//! readers, a bridge, a test) push it through a [`FeedSender`]; the
//! aggregator drains the matching [`ChannelFeed`]. The feed reports
//! [`FeedError::Closed`] once every sender is dropped and the queue is empty.

use super::{DiscoveryEvent, DiscoveryFeed, FeedError, FeedEvent};
use crate::guid::Guid;
use crate::model::{Endpoint, Participant, ParticipantUpdate};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Upper bound on events returned by a single `wait`.
const MAX_BATCH: usize = 256;

type Item = Result<FeedEvent, FeedError>;

/// Receiving half; hand it to the supervisor.
pub struct ChannelFeed {
    rx: Receiver<Item>,
    /// Error that arrived behind a batch, reported on the next `wait`.
    deferred: Option<FeedError>,
}

/// Cloneable sending half.
#[derive(Clone)]
pub struct FeedSender {
    tx: Sender<Item>,
}

impl ChannelFeed {
    /// Create a connected sender/feed pair.
    pub fn new() -> (FeedSender, ChannelFeed) {
        let (tx, rx) = channel::unbounded();
        (FeedSender { tx }, ChannelFeed { rx, deferred: None })
    }
}

impl DiscoveryFeed for ChannelFeed {
    fn wait(&mut self, timeout: Duration) -> Result<Vec<FeedEvent>, FeedError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        let first = match self.rx.recv_timeout(timeout) {
            Ok(item) => item?,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => return Err(FeedError::Closed),
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match self.rx.try_recv() {
                Ok(Ok(event)) => batch.push(event),
                Ok(Err(err)) => {
                    self.deferred = Some(err);
                    break;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(batch)
    }
}

impl FeedSender {
    /// Push one event stamped with the current time.
    ///
    /// Returns false if the feed has been dropped.
    pub fn send(&self, event: DiscoveryEvent) -> bool {
        self.tx.send(Ok(FeedEvent::new(event))).is_ok()
    }

    pub fn send_event(&self, event: FeedEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// Inject a feed error (surfaced by the next `wait`).
    pub fn send_error(&self, err: FeedError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    pub fn participant_arrived(&self, participant: Participant) -> bool {
        self.send(DiscoveryEvent::ParticipantArrived(participant))
    }

    pub fn participant_updated(&self, update: ParticipantUpdate) -> bool {
        self.send(DiscoveryEvent::ParticipantUpdated(update))
    }

    pub fn participant_disposed(&self, key: Guid) -> bool {
        self.send(DiscoveryEvent::ParticipantDisposed { key })
    }

    pub fn endpoint_arrived(&self, endpoint: Endpoint) -> bool {
        self.send(DiscoveryEvent::EndpointArrived(endpoint))
    }

    pub fn endpoint_disposed(&self, key: Guid) -> bool {
        self.send(DiscoveryEvent::EndpointDisposed { key })
    }
}
